// ── Connection supervisor ──
//
// One task per Miniserver. It owns the transport's lifecycle, the event
// queue and the entity registry, and is the only writer of any of them:
// wait → connect → drain events → (offline) → wait … until stopped or the
// Miniserver locks the account.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use chrono::Utc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ConnectionTimings;
use crate::event::{EventQueue, OfflineReason, QueueItem, ServerEvent};
use crate::listener::{ListenerFanout, Notification};
use crate::model::{ConfigSnapshot, Identity};
use crate::store::{ConfigSynchronizer, EntityRegistry, RegistrySnapshot};
use crate::transport::Transport;

/// Supervisor lifecycle, observable through
/// [`Miniserver::connection_state`](crate::Miniserver::connection_state).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Created, not started.
    Init,
    /// Sleeping before the next connection attempt.
    WaitingToConnect { delay: Duration },
    /// Transport `connect()` in progress.
    Connecting,
    /// Socket up; events are being processed.
    Connected,
    ShuttingDown,
    /// The task has exited and released the queue.
    Terminated,
}

impl ConnectionState {
    pub fn is_terminated(self) -> bool {
        matches!(self, Self::Terminated)
    }
}

/// How long to wait before reconnecting after going offline for `reason`.
/// `None` means never try again.
pub fn retry_delay(reason: OfflineReason, timings: &ConnectionTimings) -> Option<Duration> {
    match reason {
        OfflineReason::TooManyFailedLogins => None,
        OfflineReason::Unauthorized => Some(timings.user_error_delay),
        OfflineReason::None
        | OfflineReason::CommunicationError
        | OfflineReason::AuthenticationTimeout
        | OfflineReason::IdleTimeout
        | OfflineReason::InternalError
        | OfflineReason::ConnectFailed => Some(timings.com_error_delay),
    }
}

/// State shared between the supervisor task and the [`Miniserver`](crate::Miniserver)
/// handle.
pub(crate) struct Shared {
    pub timings: ArcSwap<ConnectionTimings>,
    pub listeners: ListenerFanout,
    pub state: watch::Sender<ConnectionState>,
    pub snapshot: watch::Sender<Arc<RegistrySnapshot>>,
}

impl Shared {
    pub(crate) fn new(timings: ConnectionTimings) -> Self {
        let (state, _) = watch::channel(ConnectionState::Init);
        let (snapshot, _) = watch::channel(Arc::new(RegistrySnapshot::default()));
        Self {
            timings: ArcSwap::from_pointee(timings),
            listeners: ListenerFanout::default(),
            state,
            snapshot,
        }
    }

    pub(crate) fn set_state(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!(?state, "connection state");
        }
    }
}

/// Outcome of one event.
#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Offline(OfflineReason),
    Close,
}

/// Outcome of one connected session.
enum SessionEnd {
    Retry(Duration),
    Stop,
}

pub(crate) struct Supervisor {
    shared: Arc<Shared>,
    transport: Arc<dyn Transport>,
    queue: EventQueue,
    registry: EntityRegistry,
    sync: ConfigSynchronizer,
    cancel: CancellationToken,
}

impl Supervisor {
    pub(crate) fn new(
        shared: Arc<Shared>,
        transport: Arc<dyn Transport>,
        queue: EventQueue,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            sync: ConfigSynchronizer::new(Arc::clone(&transport)),
            shared,
            transport,
            queue,
            registry: EntityRegistry::new(),
            cancel,
        }
    }

    pub(crate) async fn run(mut self) {
        info!("supervisor starting");
        let mut wait = self.shared.timings.load().first_connect_delay;

        loop {
            self.shared
                .set_state(ConnectionState::WaitingToConnect { delay: wait });
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                () = tokio::time::sleep(wait) => {}
            }

            self.shared.set_state(ConnectionState::Connecting);
            debug!("connecting");
            let connected = tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                result = self.transport.connect() => result,
            };
            if let Err(e) = connected {
                wait = self.shared.timings.load().connect_error_delay;
                warn!(error = %e, delay_secs = wait.as_secs(), "connect failed, retrying after pause");
                self.shared
                    .listeners
                    .notify(&Notification::Offline(OfflineReason::ConnectFailed));
                continue;
            }

            self.shared.set_state(ConnectionState::Connected);
            match self.session().await {
                SessionEnd::Retry(delay) => wait = delay,
                SessionEnd::Stop => break,
            }
        }

        self.shared.set_state(ConnectionState::ShuttingDown);
        self.transport.disconnect().await;
        self.queue.close();
        self.shared.set_state(ConnectionState::Terminated);
        info!("supervisor terminated");
    }

    /// Drain the queue until the session ends.
    async fn session(&mut self) -> SessionEnd {
        loop {
            let item = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return SessionEnd::Stop,
                item = self.queue.take() => item,
            };
            let event = match item {
                QueueItem::Event(event) => event,
                QueueItem::Shutdown => {
                    debug!("shutdown requested");
                    return SessionEnd::Stop;
                }
            };

            match isolate(|| self.dispatch(event)) {
                Flow::Continue => {}
                Flow::Offline(reason) => return self.go_offline(reason).await,
                Flow::Close => {
                    debug!("close acknowledged");
                    return SessionEnd::Stop;
                }
            }
        }
    }

    fn dispatch(&mut self, event: ServerEvent) -> Flow {
        match event {
            ServerEvent::ConfigurationReceived { snapshot } => {
                self.apply_configuration(*snapshot);
                Flow::Continue
            }
            ServerEvent::StateValueChanged { id, value } => {
                self.apply_state_value(&id, value);
                Flow::Continue
            }
            ServerEvent::ConnectionEstablished => {
                info!("Miniserver online");
                self.shared.listeners.notify(&Notification::Online);
                Flow::Continue
            }
            ServerEvent::ConnectionLost { reason } => Flow::Offline(reason),
            ServerEvent::CloseAcknowledged => Flow::Close,
        }
    }

    fn apply_configuration(&mut self, snapshot: ConfigSnapshot) {
        let report = self.sync.apply(&mut self.registry, snapshot);
        let published = Arc::new(self.registry.snapshot(Utc::now()));
        self.shared.snapshot.send_replace(Arc::clone(&published));

        info!(
            miniserver = %self.registry.info().miniserver_name,
            controls = published.control_count(),
            states = published.state_count(),
            "configuration applied"
        );
        published.trace_inventory();

        self.shared
            .listeners
            .notify(&Notification::ConfigurationApplied {
                snapshot: published,
                report,
            });
    }

    fn apply_state_value(&self, id: &Identity, value: f64) {
        let Some(state) = self.registry.state(id) else {
            debug!(state = %id, value, "update for unknown state dropped");
            return;
        };
        state.set_value(value);
        match state.control() {
            Some(control) => {
                debug!(
                    state = %id,
                    control = %control.name(),
                    name = %state.name(),
                    value,
                    "state update"
                );
                self.shared
                    .listeners
                    .notify(&Notification::StateChanged(control));
            }
            None => debug!(state = %id, name = %state.name(), "state update of unknown control"),
        }
    }

    async fn go_offline(&self, reason: OfflineReason) -> SessionEnd {
        info!(?reason, "Miniserver offline");
        if reason == OfflineReason::IdleTimeout {
            warn!("idle timeout from Miniserver, adjust keepalive settings");
        }

        let delay = retry_delay(reason, &self.shared.timings.load());
        let end = match delay {
            Some(delay) => {
                self.transport.disconnect().await;
                SessionEnd::Retry(delay)
            }
            None => {
                warn!("too many failed login attempts, giving up until reconfigured");
                SessionEnd::Stop
            }
        };
        self.shared.listeners.notify(&Notification::Offline(reason));
        end
    }
}

/// Run one event handler; a panic takes the session offline instead of
/// unwinding through the supervisor task.
fn isolate(handler: impl FnOnce() -> Flow) -> Flow {
    std::panic::catch_unwind(AssertUnwindSafe(handler)).unwrap_or_else(|panic| {
        error!(panic = panic_message(panic.as_ref()), "panic while processing event");
        Flow::Offline(OfflineReason::InternalError)
    })
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic>")
}
