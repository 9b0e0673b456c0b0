#![allow(clippy::unwrap_used)]
// Integration tests for the supervisor loop, driven through an in-memory
// transport on a paused Tokio clock.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use secrecy::SecretString;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use loxone_core::{
    ConfigSnapshot, ConnectionState, ControlEntry, CoreError, Identity, Miniserver,
    MiniserverConfig, Notification, OfflineReason, RoomEntry, ServerEvent, Timing, TimingUpdate,
    Transport, TransportError,
};

// ── Helpers ─────────────────────────────────────────────────────────

struct MockTransport {
    connect_times: Mutex<Vec<Instant>>,
    connects: watch::Sender<usize>,
    disconnects: AtomicUsize,
    failing_connects: AtomicUsize,
    commands: Mutex<Vec<(Identity, String)>>,
    keep_alive: Mutex<Option<Duration>>,
}

impl MockTransport {
    fn new(failing_connects: usize) -> Arc<Self> {
        Arc::new(Self {
            connect_times: Mutex::new(Vec::new()),
            connects: watch::channel(0).0,
            disconnects: AtomicUsize::new(0),
            failing_connects: AtomicUsize::new(failing_connects),
            commands: Mutex::new(Vec::new()),
            keep_alive: Mutex::new(None),
        })
    }

    async fn wait_for_connects(&self, n: usize) {
        let mut rx = self.connects.subscribe();
        rx.wait_for(|count| *count >= n).await.unwrap();
    }

    fn connect_time(&self, idx: usize) -> Instant {
        self.connect_times.lock().unwrap()[idx]
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        self.connect_times.lock().unwrap().push(Instant::now());
        self.connects.send_modify(|n| *n += 1);
        let failing = self.failing_connects.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_connects.store(failing - 1, Ordering::SeqCst);
            return Err(TransportError::Rejected("connection refused".into()));
        }
        Ok(())
    }

    async fn disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
    }

    async fn send_command(&self, control: &Identity, command: &str) -> Result<(), TransportError> {
        self.commands
            .lock()
            .unwrap()
            .push((control.clone(), command.to_owned()));
        Ok(())
    }

    fn update_keep_alive_period(&self, period: Duration) {
        *self.keep_alive.lock().unwrap() = Some(period);
    }
}

fn setup(failing_connects: usize) -> (Miniserver, Arc<MockTransport>) {
    let mock = MockTransport::new(failing_connects);
    let config = MiniserverConfig::new(
        "192.168.1.77",
        80,
        "admin",
        SecretString::from("secret".to_owned()),
    );
    let transport = Arc::clone(&mock);
    let ms = Miniserver::new(config, move |_, _| transport as Arc<dyn Transport>);
    (ms, mock)
}

fn record(ms: &Miniserver) -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    ms.subscribe(move |n: &Notification| {
        let line = match n {
            Notification::ConfigurationApplied { snapshot, report } => format!(
                "config:{}/{} created={}",
                snapshot.control_count(),
                snapshot.state_count(),
                report.created.len()
            ),
            Notification::StateChanged(control) => format!("state:{}", control.id()),
            Notification::Online => "online".to_owned(),
            Notification::Offline(reason) => format!("offline:{reason}"),
        };
        let _ = tx.send(line);
    });
    rx
}

fn house() -> ServerEvent {
    ServerEvent::ConfigurationReceived {
        snapshot: Box::new(ConfigSnapshot {
            rooms: vec![RoomEntry::new("R1", "Living")],
            controls: vec![
                ControlEntry::new("S1", "Lamp", "Switch")
                    .in_room("R1")
                    .with_state("active", "ST1"),
                ControlEntry::new("J1", "Blind", "Jalousie")
                    .in_room("R1")
                    .with_state("up", "U1")
                    .with_state("down", "D1")
                    .with_state("position", "P1"),
            ],
            ..ConfigSnapshot::default()
        }),
    }
}

fn lost(reason: OfflineReason) -> ServerEvent {
    ServerEvent::ConnectionLost { reason }
}

fn value(id: &str, value: f64) -> ServerEvent {
    ServerEvent::StateValueChanged {
        id: id.into(),
        value,
    }
}

async fn wait_for_state(ms: &Miniserver, pred: impl Fn(&ConnectionState) -> bool) {
    let mut rx = ms.connection_state();
    rx.wait_for(|s| pred(s)).await.unwrap();
}

// ── Session flow ────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn end_to_end_switch_and_jalousie() {
    let (ms, mock) = setup(0);
    let mut rx = record(&ms);
    let tx = ms.event_sender();
    assert!(ms.start());
    assert!(!ms.start());

    tx.send(ServerEvent::ConnectionEstablished).unwrap();
    tx.send(house()).unwrap();
    tx.send(value("P1", 0.5)).unwrap();

    assert_eq!(rx.recv().await.unwrap(), "online");
    assert_eq!(rx.recv().await.unwrap(), "config:2/4 created=7");
    assert_eq!(rx.recv().await.unwrap(), "state:j1");

    let blind = ms.find_control(&"J1".into()).unwrap();
    assert_eq!(blind.as_jalousie().unwrap().position_percent(), Some(50));
    assert_eq!(blind.room().unwrap().name(), "Living");
    let lamp = ms.find_control_by_name("Lamp").unwrap();
    assert_eq!(lamp.as_switch().unwrap().is_on(), Some(false));

    blind.as_jalousie().unwrap().move_down().await.unwrap();
    lamp.as_switch().unwrap().turn_on().await.unwrap();
    assert_eq!(
        *mock.commands.lock().unwrap(),
        [
            (Identity::new("j1"), "FullDown".to_owned()),
            (Identity::new("s1"), "On".to_owned()),
        ]
    );

    let lost_at = Instant::now();
    tx.send(lost(OfflineReason::Unauthorized)).unwrap();
    assert_eq!(rx.recv().await.unwrap(), "offline:unauthorized");
    assert_eq!(mock.disconnects.load(Ordering::SeqCst), 1);

    mock.wait_for_connects(2).await;
    let waited = mock.connect_time(1) - lost_at;
    assert!(waited >= Duration::from_secs(60), "reconnected after {waited:?}");
    assert!(waited < Duration::from_secs(61), "reconnected after {waited:?}");

    ms.shutdown().await;
    assert!(ms.connection_state().borrow().is_terminated());
}

#[tokio::test(start_paused = true)]
async fn state_changes_arrive_in_enqueue_order() {
    let (ms, _mock) = setup(0);
    let mut rx = record(&ms);
    let tx = ms.event_sender();
    ms.start();

    tx.send(house()).unwrap();
    for (id, v) in [("ST1", 1.0), ("P1", 0.2), ("ST1", 0.0), ("U1", 1.0), ("P1", 0.9)] {
        tx.send(value(id, v)).unwrap();
    }
    // Unknown targets are dropped without a notification.
    tx.send(value("nope", 1.0)).unwrap();
    tx.send(ServerEvent::ConnectionEstablished).unwrap();

    let mut seen = Vec::new();
    while seen.last().map(String::as_str) != Some("online") {
        seen.push(rx.recv().await.unwrap());
    }
    assert_eq!(
        seen,
        [
            "config:2/4 created=7",
            "state:s1",
            "state:j1",
            "state:s1",
            "state:j1",
            "state:j1",
            "online",
        ]
    );
    let blind = ms.find_control(&"j1".into()).unwrap();
    assert_eq!(blind.as_jalousie().unwrap().position_percent(), Some(90));

    ms.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn reload_preserves_control_identity() {
    let (ms, _mock) = setup(0);
    let mut rx = record(&ms);
    let tx = ms.event_sender();
    ms.start();

    tx.send(house()).unwrap();
    rx.recv().await.unwrap();
    let before = ms.find_control(&"s1".into()).unwrap();

    tx.send(house()).unwrap();
    assert_eq!(rx.recv().await.unwrap(), "config:2/4 created=0");
    let after = ms.find_control(&"s1".into()).unwrap();
    assert!(Arc::ptr_eq(&before, &after));

    ms.shutdown().await;
}

// ── Backoff ─────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn failed_connects_retry_after_connect_error_delay() {
    let (ms, mock) = setup(2);
    let mut rx = record(&ms);
    let started = Instant::now();
    ms.start();

    assert_eq!(rx.recv().await.unwrap(), "offline:connect_failed");
    assert_eq!(rx.recv().await.unwrap(), "offline:connect_failed");
    mock.wait_for_connects(3).await;
    wait_for_state(&ms, |s| *s == ConnectionState::Connected).await;

    assert_eq!(mock.connect_time(0) - started, Duration::from_secs(1));
    assert_eq!(mock.connect_time(1) - mock.connect_time(0), Duration::from_secs(10));
    assert_eq!(mock.connect_time(2) - mock.connect_time(1), Duration::from_secs(10));

    ms.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn communication_error_uses_updated_com_delay() {
    let (ms, mock) = setup(0);
    let mut rx = record(&ms);
    let tx = ms.event_sender();
    ms.start();
    mock.wait_for_connects(1).await;

    ms.update(
        &TimingUpdate::default()
            .with(Timing::ComErrorDelay, 5)
            .with(Timing::KeepAlivePeriod, 30),
    );
    assert_eq!(*mock.keep_alive.lock().unwrap(), Some(Duration::from_secs(30)));
    assert_eq!(ms.timings().com_error_delay, Duration::from_secs(5));

    tx.send(lost(OfflineReason::CommunicationError)).unwrap();
    assert_eq!(rx.recv().await.unwrap(), "offline:communication_error");
    mock.wait_for_connects(2).await;
    assert_eq!(mock.connect_time(1) - mock.connect_time(0), Duration::from_secs(5));

    ms.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn too_many_failed_logins_stops_for_good() {
    let (ms, mock) = setup(0);
    let mut rx = record(&ms);
    let tx = ms.event_sender();
    ms.start();

    tx.send(lost(OfflineReason::TooManyFailedLogins)).unwrap();
    assert_eq!(rx.recv().await.unwrap(), "offline:too_many_failed_logins");
    wait_for_state(&ms, |s| s.is_terminated()).await;

    tokio::time::sleep(Duration::from_secs(3600)).await;
    assert_eq!(*mock.connects.borrow(), 1);
    assert!(matches!(
        tx.send(ServerEvent::ConnectionEstablished),
        Err(CoreError::EventQueueClosed)
    ));
}

#[tokio::test(start_paused = true)]
async fn blank_identity_does_not_block_the_rest_of_the_configuration() {
    let (ms, mock) = setup(0);
    let mut rx = record(&ms);
    let tx = ms.event_sender();
    ms.start();

    let ServerEvent::ConfigurationReceived { mut snapshot } = house() else {
        unreachable!()
    };
    snapshot.rooms.push(RoomEntry::new("  ", "Nowhere"));
    snapshot
        .controls
        .push(ControlEntry::new(" ", "Ghost", "Switch").with_state("active", "G1"));
    tx.send(ServerEvent::ConfigurationReceived { snapshot }).unwrap();
    tx.send(value("st1", 1.0)).unwrap();

    assert_eq!(rx.recv().await.unwrap(), "config:2/4 created=7");
    assert_eq!(rx.recv().await.unwrap(), "state:s1");
    assert_eq!(mock.disconnects.load(Ordering::SeqCst), 0);
    assert_eq!(*ms.connection_state().borrow(), ConnectionState::Connected);

    ms.shutdown().await;
}

#[test]
fn concurrent_timing_updates_keep_each_other() {
    let (ms, _mock) = setup(0);
    std::thread::scope(|scope| {
        for (timing, base) in [(Timing::ComErrorDelay, 100), (Timing::UserErrorDelay, 200)] {
            let ms = ms.clone();
            scope.spawn(move || {
                for i in 0..=50 {
                    ms.update(&TimingUpdate::default().with(timing, base + i));
                }
            });
        }
    });
    assert_eq!(ms.timings().com_error_delay, Duration::from_secs(150));
    assert_eq!(ms.timings().user_error_delay, Duration::from_secs(250));
}

// ── Shutdown ────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn stop_interrupts_the_initial_wait() {
    let (ms, mock) = setup(0);
    ms.start();
    wait_for_state(&ms, |s| matches!(s, ConnectionState::WaitingToConnect { .. })).await;

    ms.shutdown().await;
    ms.stop();

    assert_eq!(*mock.connects.borrow(), 0);
    assert!(ms.connection_state().borrow().is_terminated());
    assert!(ms.event_sender().is_closed());
}

#[tokio::test]
async fn stop_without_start_is_safe() {
    let (ms, _mock) = setup(0);
    ms.stop();
    ms.stop();
    assert!(!ms.start());
    assert!(ms.connection_state().borrow().is_terminated());
    assert!(matches!(
        ms.event_sender().send(ServerEvent::ConnectionEstablished),
        Err(CoreError::EventQueueClosed)
    ));
}

#[tokio::test(start_paused = true)]
async fn close_acknowledged_ends_the_session() {
    let (ms, mock) = setup(0);
    let tx = ms.event_sender();
    ms.start();

    tx.send(ServerEvent::CloseAcknowledged).unwrap();
    wait_for_state(&ms, |s| s.is_terminated()).await;
    assert_eq!(mock.disconnects.load(Ordering::SeqCst), 1);
}
