// ── Event queue ──
//
// Unbounded FIFO between transports and the supervisor. There is no
// backpressure: Miniserver traffic is human-scale (a few state changes per
// second at most) and a full structure file arrives once per session.

use tokio::sync::mpsc;

use super::ServerEvent;
use crate::error::CoreError;

#[derive(Debug)]
pub(crate) enum QueueItem {
    Event(ServerEvent),
    /// Terminal sentinel; only enqueued by the owning handle on stop.
    Shutdown,
}

/// Cloneable producer handle given to transports.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<QueueItem>,
}

impl EventSender {
    pub fn send(&self, event: ServerEvent) -> Result<(), CoreError> {
        self.tx
            .send(QueueItem::Event(event))
            .map_err(|_| CoreError::EventQueueClosed)
    }

    /// `true` once the supervisor has terminated and released the queue.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Returns `false` if the queue was already closed.
    pub(crate) fn shutdown(&self) -> bool {
        self.tx.send(QueueItem::Shutdown).is_ok()
    }
}

/// Single-consumer end, owned by the supervisor task.
pub(crate) struct EventQueue {
    rx: mpsc::UnboundedReceiver<QueueItem>,
}

pub(crate) fn channel() -> (EventSender, EventQueue) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSender { tx }, EventQueue { rx })
}

impl EventQueue {
    /// Wait for the next item. A queue with no producers left yields
    /// `Shutdown`.
    pub(crate) async fn take(&mut self) -> QueueItem {
        self.rx.recv().await.unwrap_or(QueueItem::Shutdown)
    }

    /// Reject further sends and drop anything still buffered.
    pub(crate) fn close(&mut self) {
        self.rx.close();
        while self.rx.try_recv().is_ok() {}
    }
}
