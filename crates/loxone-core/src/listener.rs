// ── Listener fanout ──
//
// Notifications are delivered synchronously on the supervisor task, in
// subscription order. A subscriber that blocks stalls the whole session,
// so anything slow belongs on a channel the subscriber owns.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::error;

use crate::control::Control;
use crate::event::OfflineReason;
use crate::store::{RegistrySnapshot, SyncReport};

/// What subscribers are told about.
#[derive(Debug, Clone)]
pub enum Notification {
    /// A configuration snapshot was reconciled into the registry.
    ConfigurationApplied {
        snapshot: Arc<RegistrySnapshot>,
        report: SyncReport,
    },
    /// A state value of this control changed.
    StateChanged(Arc<Control>),
    /// The session is authenticated and usable.
    Online,
    /// The session went down.
    Offline(OfflineReason),
}

/// Receiver of [`Notification`]s. Implemented for every
/// `Fn(&Notification) + Send + Sync`.
pub trait Listener: Send + Sync + 'static {
    fn notify(&self, notification: &Notification);
}

impl<F> Listener for F
where
    F: Fn(&Notification) + Send + Sync + 'static,
{
    fn notify(&self, notification: &Notification) {
        self(notification);
    }
}

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
pub(crate) struct ListenerFanout {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(ListenerId, Arc<dyn Listener>)>>,
}

impl ListenerFanout {
    pub(crate) fn subscribe(&self, listener: Arc<dyn Listener>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push((id, listener));
        id
    }

    /// Returns `false` if `id` was not subscribed.
    pub(crate) fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.lock();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    /// Deliver to every subscriber in registration order. The list is
    /// copied first so a subscriber may (un)subscribe from its callback.
    pub(crate) fn notify(&self, notification: &Notification) {
        let listeners: Vec<_> = self.lock().iter().map(|(_, l)| Arc::clone(l)).collect();
        for listener in listeners {
            let delivered = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                listener.notify(notification);
            }));
            if delivered.is_err() {
                error!(?notification, "listener panicked");
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(ListenerId, Arc<dyn Listener>)>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn recorder(tag: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Arc<dyn Listener> {
        let log = Arc::clone(log);
        Arc::new(move |n: &Notification| {
            let what = match n {
                Notification::Online => "online".to_owned(),
                Notification::Offline(r) => format!("offline:{r}"),
                other => format!("{other:?}"),
            };
            log.lock().unwrap().push(format!("{tag}:{what}"));
        })
    }

    #[test]
    fn delivers_in_subscription_order() {
        let fanout = ListenerFanout::default();
        let log = Arc::new(Mutex::new(Vec::new()));
        fanout.subscribe(recorder("a", &log));
        fanout.subscribe(recorder("b", &log));

        fanout.notify(&Notification::Online);
        fanout.notify(&Notification::Offline(OfflineReason::IdleTimeout));

        assert_eq!(
            *log.lock().unwrap(),
            ["a:online", "b:online", "a:offline:idle_timeout", "b:offline:idle_timeout"]
        );
    }

    #[test]
    fn unsubscribed_listener_is_not_called() {
        let fanout = ListenerFanout::default();
        let log = Arc::new(Mutex::new(Vec::new()));
        let a = fanout.subscribe(recorder("a", &log));
        fanout.subscribe(recorder("b", &log));

        assert!(fanout.unsubscribe(a));
        assert!(!fanout.unsubscribe(a));
        fanout.notify(&Notification::Online);

        assert_eq!(*log.lock().unwrap(), ["b:online"]);
    }

    #[test]
    fn panicking_listener_does_not_starve_the_rest() {
        let fanout = ListenerFanout::default();
        let log = Arc::new(Mutex::new(Vec::new()));
        fanout.subscribe(Arc::new(|_: &Notification| panic!("boom")));
        fanout.subscribe(recorder("b", &log));

        fanout.notify(&Notification::Online);
        assert_eq!(*log.lock().unwrap(), ["b:online"]);
    }
}
