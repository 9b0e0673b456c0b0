// ── Miniserver handle ──
//
// Public entry point. Owns the configuration, the shared state the
// supervisor publishes into, and the supervisor task itself.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span};

use crate::config::{ConnectionTimings, MiniserverConfig, Timing, TimingUpdate};
use crate::control::Control;
use crate::event::{self, EventSender};
use crate::listener::{Listener, ListenerId};
use crate::model::Identity;
use crate::store::RegistrySnapshot;
use crate::supervisor::{ConnectionState, Shared, Supervisor};
use crate::transport::Transport;

/// Supervised session to one Miniserver.
///
/// Cheaply cloneable via `Arc<MiniserverInner>`. Nothing happens until
/// [`start()`](Self::start); after [`stop()`](Self::stop) the instance is
/// spent and a new one has to be created to reconnect.
#[derive(Clone)]
pub struct Miniserver {
    inner: Arc<MiniserverInner>,
}

struct MiniserverInner {
    config: MiniserverConfig,
    shared: Arc<Shared>,
    transport: Arc<dyn Transport>,
    sender: EventSender,
    cancel: CancellationToken,
    /// Supervisor waiting to be spawned; taken by `start()`.
    pending: Mutex<Option<Supervisor>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for MiniserverInner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl Miniserver {
    /// Create the instance. `make_transport` receives the configuration and
    /// the sender the transport must report its events through.
    pub fn new<F>(config: MiniserverConfig, make_transport: F) -> Self
    where
        F: FnOnce(&MiniserverConfig, EventSender) -> Arc<dyn Transport>,
    {
        let (sender, queue) = event::channel();
        let transport = make_transport(&config, sender.clone());
        let shared = Arc::new(Shared::new(config.timings));
        let cancel = CancellationToken::new();
        let supervisor = Supervisor::new(
            Arc::clone(&shared),
            Arc::clone(&transport),
            queue,
            cancel.clone(),
        );

        Self {
            inner: Arc::new(MiniserverInner {
                config,
                shared,
                transport,
                sender,
                cancel,
                pending: Mutex::new(Some(supervisor)),
                task: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &MiniserverConfig {
        &self.inner.config
    }

    /// Timings currently in effect (initial config plus any `update()`).
    pub fn timings(&self) -> ConnectionTimings {
        **self.inner.shared.timings.load()
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Spawn the supervisor task. Must be called from within a Tokio
    /// runtime. Returns `false` if already started or stopped.
    pub fn start(&self) -> bool {
        let Some(supervisor) = lock(&self.inner.pending).take() else {
            return false;
        };

        let span = info_span!(
            "miniserver",
            host = %self.inner.config.host,
            port = self.inner.config.port
        );
        span.in_scope(|| info!(user = %self.inner.config.username, "starting"));
        let handle = tokio::spawn(supervisor.run().instrument(span));
        *lock(&self.inner.task) = Some(handle);
        true
    }

    /// Ask the supervisor to terminate. Idempotent, and safe whether or not
    /// it was ever started.
    pub fn stop(&self) {
        if self.inner.cancel.is_cancelled() {
            return;
        }
        debug!(miniserver = %self.inner.config.label(), "stop requested");
        self.inner.sender.shutdown();
        self.inner.cancel.cancel();

        // Never started: release the queue here so senders see it closed.
        if lock(&self.inner.pending).take().is_some() {
            self.inner.shared.set_state(ConnectionState::Terminated);
        }
    }

    /// [`stop()`](Self::stop) and wait for the supervisor task to exit.
    pub async fn shutdown(&self) {
        self.stop();
        let handle = lock(&self.inner.task).take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(error = %e, "supervisor task failed");
            }
        }
    }

    /// Change timings at runtime. Negative values leave a timing as is;
    /// out-of-range values are clamped. A new keepalive period is forwarded
    /// to the transport immediately; delays apply from the next wait on.
    pub fn update(&self, update: &TimingUpdate) {
        let mut changed = Vec::new();
        let mut timings = ConnectionTimings::default();
        self.inner.shared.timings.rcu(|current| {
            timings = **current;
            changed = timings.apply(update);
            timings
        });
        if changed.is_empty() {
            return;
        }
        info!(?changed, "timings updated");
        if changed.contains(&Timing::KeepAlivePeriod) {
            self.inner
                .transport
                .update_keep_alive_period(timings.keep_alive_period);
        }
    }

    // ── Subscriptions ────────────────────────────────────────────────

    /// Register a listener. Callbacks run on the supervisor task and must
    /// not block.
    pub fn subscribe(&self, listener: impl Listener) -> ListenerId {
        self.inner.shared.listeners.subscribe(Arc::new(listener))
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.inner.shared.listeners.unsubscribe(id)
    }

    /// Supervisor lifecycle state.
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.shared.state.subscribe()
    }

    /// Registry view, republished after every applied configuration.
    pub fn registry(&self) -> watch::Receiver<Arc<RegistrySnapshot>> {
        self.inner.shared.snapshot.subscribe()
    }

    /// Producer handle for injecting events (transports, replays, tests).
    pub fn event_sender(&self) -> EventSender {
        self.inner.sender.clone()
    }

    // ── Lookups ──────────────────────────────────────────────────────

    /// Latest published registry view.
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        Arc::clone(&self.inner.shared.snapshot.borrow())
    }

    pub fn find_control(&self, id: &Identity) -> Option<Arc<Control>> {
        self.snapshot().find_control(id)
    }

    pub fn find_control_by_name(&self, name: &str) -> Option<Arc<Control>> {
        self.snapshot().find_control_by_name(name)
    }

    /// Dump the current inventory at `trace` level.
    pub fn trace_inventory(&self) {
        let _span = info_span!("miniserver", host = %self.inner.config.host).entered();
        self.snapshot().trace_inventory();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl std::fmt::Debug for Miniserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Miniserver")
            .field("host", &self.inner.config.host)
            .field("port", &self.inner.config.port)
            .field("state", &*self.inner.shared.state.borrow())
            .finish_non_exhaustive()
    }
}
