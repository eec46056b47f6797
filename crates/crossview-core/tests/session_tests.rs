//! Integration tests for session behavior.
//!
//! A scripted in-memory transport stands in for the WebSocket: each connect
//! attempt follows a plan (accept, refuse, hang), and every accepted session
//! records what was written to it and exposes a feed for inbound events.
//! Loop tests run on a paused clock so reconnect timers are deterministic.

#![allow(clippy::unwrap_used)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::future::Future;
use std::rc::Rc;
use std::time::Duration;

use crossview_core::{
    ClientConfig, ClientHandle, ClientOptions, Connection, ConnectionManager, Connector,
    FixedDelay, NoReconnect, ReconnectPolicy, SceneRenderer, SessionEvent, SessionState,
    SyncClient, SyncError, TransportError, TransportEvent,
};
use crossview_store::{EntityStore, EventBus, SignalFixture, Vehicle};
use crossview_types::{
    ControlIntent, OutboundMessage, Placement, SignalId, SyncEvent, VehicleId,
};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep};

// ---------------------------------------------------------------------------
// Scripted transport
// ---------------------------------------------------------------------------

enum Plan {
    Accept,
    Refuse,
    Hang,
}

#[derive(Default)]
struct SessionLog {
    sent: Vec<String>,
    closed: Option<(u16, String)>,
    fail_writes: bool,
}

#[derive(Default)]
struct Script {
    plans: VecDeque<Plan>,
    attempts: usize,
    sessions: Vec<Rc<RefCell<SessionLog>>>,
    feeds: Vec<mpsc::UnboundedSender<TransportEvent>>,
}

#[derive(Clone, Default)]
struct MockConnector {
    script: Rc<RefCell<Script>>,
}

impl MockConnector {
    fn with_plans(plans: impl IntoIterator<Item = Plan>) -> Self {
        let connector = Self::default();
        connector.script.borrow_mut().plans.extend(plans);
        connector
    }

    fn attempts(&self) -> usize {
        self.script.borrow().attempts
    }

    fn session_count(&self) -> usize {
        self.script.borrow().sessions.len()
    }

    fn sent(&self, session: usize) -> Vec<String> {
        self.script.borrow().sessions[session].borrow().sent.clone()
    }

    fn closed(&self, session: usize) -> Option<(u16, String)> {
        self.script.borrow().sessions[session].borrow().closed.clone()
    }

    fn fail_writes(&self, session: usize, fail: bool) {
        self.script.borrow().sessions[session].borrow_mut().fail_writes = fail;
    }

    fn push(&self, session: usize, event: TransportEvent) {
        self.script.borrow().feeds[session].send(event).unwrap();
    }

    fn push_frame(&self, session: usize, frame: &Value) {
        self.push(session, TransportEvent::Frame(frame.to_string()));
    }

    fn drop_session(&self, session: usize, code: u16) {
        self.push(
            session,
            TransportEvent::Closed {
                code,
                reason: String::from("gone"),
            },
        );
    }
}

struct MockConnection {
    inbound: mpsc::UnboundedReceiver<TransportEvent>,
    log: Rc<RefCell<SessionLog>>,
}

impl Connector for MockConnector {
    type Conn = MockConnection;

    fn connect(
        &self,
        _url: &str,
    ) -> impl Future<Output = Result<MockConnection, TransportError>> + 'static {
        let script = Rc::clone(&self.script);
        let plan = {
            let mut script = script.borrow_mut();
            script.attempts = script.attempts.saturating_add(1);
            script.plans.pop_front().unwrap_or(Plan::Accept)
        };
        async move {
            match plan {
                Plan::Refuse => Err(TransportError::Connect(String::from("refused"))),
                Plan::Hang => std::future::pending().await,
                Plan::Accept => {
                    let (tx, inbound) = mpsc::unbounded_channel();
                    let log = Rc::new(RefCell::new(SessionLog::default()));
                    let mut script = script.borrow_mut();
                    script.feeds.push(tx);
                    script.sessions.push(Rc::clone(&log));
                    Ok(MockConnection { inbound, log })
                }
            }
        }
    }
}

impl Connection for MockConnection {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        let mut log = self.log.borrow_mut();
        if log.fail_writes {
            return Err(TransportError::Send(String::from("broken pipe")));
        }
        log.sent.push(text);
        Ok(())
    }

    async fn recv(&mut self) -> TransportEvent {
        self.inbound.recv().await.unwrap_or(TransportEvent::Closed {
            code: 1006,
            reason: String::new(),
        })
    }

    async fn close(&mut self, code: u16, reason: &str) -> Result<(), TransportError> {
        self.log.borrow_mut().closed = Some((code, reason.to_owned()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Recorder {
    calls: Vec<String>,
    updates: usize,
}

impl SceneRenderer for Recorder {
    fn spawn_vehicle(&mut self, vehicle: &Vehicle) {
        self.calls.push(format!("spawn {}", vehicle.id));
    }
    fn update_vehicle(&mut self, _vehicle: &Vehicle) {
        self.updates = self.updates.saturating_add(1);
    }
    fn dispose_vehicle(&mut self, id: &VehicleId) {
        self.calls.push(format!("dispose {id}"));
    }
    fn spawn_signal(&mut self, fixture: &SignalFixture) {
        self.calls.push(format!("spawn {}", fixture.id));
    }
    fn update_signal(&mut self, _fixture: &SignalFixture) {}
    fn dispose_signal(&mut self, id: &SignalId) {
        self.calls.push(format!("dispose {id}"));
    }
}

type EventLog = Rc<RefCell<Vec<SyncEvent>>>;

fn test_config() -> ClientConfig {
    let mut config = ClientConfig::default();
    config.connection.url = String::from("ws://authority.test/ws");
    config
}

fn record(bus: &EventBus) -> EventLog {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    bus.subscribe(move |event| sink.borrow_mut().push(event.clone()))
        .unwrap();
    log
}

fn session_events(log: &EventLog) -> Vec<SyncEvent> {
    log.borrow()
        .iter()
        .filter(|e| {
            matches!(
                e,
                SyncEvent::SessionOpened { .. }
                    | SyncEvent::SessionClosed { .. }
                    | SyncEvent::SessionError { .. }
            )
        })
        .cloned()
        .collect()
}

fn manager(connector: MockConnector) -> (ConnectionManager<MockConnector>, EventLog) {
    let bus = EventBus::new();
    let log = record(&bus);
    (ConnectionManager::new(connector, bus, &test_config()), log)
}

fn client(
    connector: MockConnector,
    policy: Box<dyn ReconnectPolicy>,
) -> (SyncClient<MockConnector, Recorder>, ClientHandle, EventLog) {
    client_with(connector, policy, |_| {})
}

fn client_with(
    connector: MockConnector,
    policy: Box<dyn ReconnectPolicy>,
    prepare: impl FnOnce(&mut EntityStore),
) -> (SyncClient<MockConnector, Recorder>, ClientHandle, EventLog) {
    let bus = EventBus::new();
    let log = record(&bus);
    let config = test_config();
    let manager = ConnectionManager::new(connector, bus.clone(), &config);
    let mut store = EntityStore::new(bus);
    prepare(&mut store);
    let (client, handle) = SyncClient::new(
        manager,
        store,
        Recorder::default(),
        policy,
        ClientOptions::from(&config),
    );
    (client, handle, log)
}

fn fixed(secs: u64) -> Box<dyn ReconnectPolicy> {
    Box::new(FixedDelay::new(Duration::from_secs(secs)))
}

// ---------------------------------------------------------------------------
// Connection manager
// ---------------------------------------------------------------------------

#[test]
fn malformed_batch_applies_valid_commands() {
    let (manager, _) = manager(MockConnector::default());
    let mut store = EntityStore::new(EventBus::new());

    let frame = json!({
        "type": "batch",
        "commands": [
            { "type": "vh", "action": "spawned", "id": 1 },
            { "type": "teleporter", "action": "fire", "id": 2 },
            { "type": "time", "action": "time", "meta": 2.5 }
        ]
    });
    let report = manager.handle_frame(&frame.to_string(), &mut store).unwrap();

    assert_eq!(report.applied, 2);
    assert_eq!(report.skipped, 1);
    assert!(store.vehicle("car-1").is_some());
    assert!((store.sim_time() - 2.5).abs() < f64::EPSILON);
}

#[test]
fn undecodable_frames_are_dropped_silently() {
    let bus = EventBus::new();
    let log = record(&bus);
    let (manager, _) = manager(MockConnector::default());
    let mut store = EntityStore::new(bus);

    assert!(manager.handle_frame("{ not json", &mut store).is_none());
    let other = json!({ "type": "status", "ok": true }).to_string();
    assert!(manager.handle_frame(&other, &mut store).is_none());

    assert!(log.borrow().is_empty());
}

#[test]
fn vehicle_moves_use_wire_mapping() {
    let (manager, _) = manager(MockConnector::default());
    let mut store = EntityStore::new(EventBus::new());

    let frame = json!({
        "type": "batch",
        "commands": [
            { "type": "vh", "action": "spawned", "id": "4" },
            { "type": "vh", "action": "move", "id": "4", "meta": ["60", "45", "90"] }
        ]
    });
    manager.handle_frame(&frame.to_string(), &mut store).unwrap();

    let vehicle = store.vehicle("car-4").unwrap();
    assert!((vehicle.position.x - 10.0).abs() < 1e-9);
    assert!((vehicle.position.y + 5.0).abs() < 1e-9);
    assert!((vehicle.heading - std::f64::consts::FRAC_PI_2).abs() < 1e-9);
}

#[tokio::test]
async fn manual_connect_supersedes_open_session() {
    let connector = MockConnector::default();
    let (mut manager, log) = manager(connector.clone());

    assert!(manager.connect(false).await.unwrap());
    assert!(manager.connect(true).await.unwrap());

    assert_eq!(connector.attempts(), 2);
    assert_eq!(connector.closed(0), Some((1000, String::from("reconnect"))));
    assert_eq!(connector.closed(1), None);
    assert_eq!(manager.state(), SessionState::Open);
    assert_eq!(manager.sessions(), 2);

    let url = String::from("ws://authority.test/ws");
    assert_eq!(
        session_events(&log),
        vec![
            SyncEvent::SessionOpened { url: url.clone() },
            SyncEvent::SessionClosed {
                code: 1000,
                reason: String::from("reconnect"),
            },
            SyncEvent::SessionOpened { url },
        ]
    );
}

#[tokio::test]
async fn automatic_connect_keeps_open_session() {
    let connector = MockConnector::default();
    let (mut manager, _) = manager(connector.clone());

    assert!(manager.connect(false).await.unwrap());
    assert!(!manager.connect(false).await.unwrap());
    assert_eq!(connector.attempts(), 1);
}

#[tokio::test]
async fn create_is_sent_on_open() {
    let connector = MockConnector::default();
    let (mut manager, _) = manager(connector.clone());

    manager.connect(false).await.unwrap();
    assert_eq!(manager.pending(), 1);
    manager.flush().await;

    assert_eq!(connector.sent(0), vec![String::from(r#"{"type":"create"}"#)]);
    assert_eq!(manager.pending(), 0);
}

#[tokio::test]
async fn send_while_closed_is_dropped() {
    let connector = MockConnector::default();
    let (mut manager, _) = manager(connector.clone());

    let pause = OutboundMessage::Control(ControlIntent::pause());
    assert!(!manager.send(&pause));
    assert_eq!(manager.pending(), 0);

    manager.connect(false).await.unwrap();
    assert!(manager.send(&pause));
    manager.close(1000, "bye").await;
    assert!(!manager.send(&pause));
    assert_eq!(connector.sent(0), Vec::<String>::new());
}

#[tokio::test]
async fn refused_connect_reports_error_then_abnormal_close() {
    let connector = MockConnector::with_plans([Plan::Refuse]);
    let (mut manager, log) = manager(connector);

    let result = manager.connect(false).await;
    assert!(matches!(
        result,
        Err(SyncError::Transport(TransportError::Connect(_)))
    ));
    assert_eq!(manager.state(), SessionState::Closed);

    let events = session_events(&log);
    assert_eq!(events.len(), 2);
    assert!(matches!(events[0], SyncEvent::SessionError { .. }));
    assert!(matches!(
        events[1],
        SyncEvent::SessionClosed { code: 1006, .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn connect_timeout_is_enforced() {
    let connector = MockConnector::with_plans([Plan::Hang]);
    let (mut manager, log) = manager(connector);

    let result = manager.connect(false).await;
    assert!(matches!(
        result,
        Err(SyncError::Transport(TransportError::Timeout(10_000)))
    ));
    assert!(matches!(
        session_events(&log).last(),
        Some(SyncEvent::SessionClosed { code: 1006, .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn remote_close_ends_session() {
    let connector = MockConnector::default();
    let (mut manager, log) = manager(connector.clone());
    manager.connect(false).await.unwrap();

    connector.drop_session(0, 1001);
    let event = manager.next_event().await;
    assert_eq!(
        event,
        SessionEvent::Closed {
            code: 1001,
            reason: String::from("gone"),
        }
    );
    assert_eq!(manager.state(), SessionState::Closed);
    assert!(matches!(
        session_events(&log).last(),
        Some(SyncEvent::SessionClosed { code: 1001, .. })
    ));

    let idle = tokio::time::timeout(Duration::from_millis(50), manager.next_event()).await;
    assert!(idle.is_err());
}

#[tokio::test]
async fn transport_error_does_not_close() {
    let connector = MockConnector::default();
    let (mut manager, log) = manager(connector.clone());
    manager.connect(false).await.unwrap();

    connector.push(0, TransportEvent::Error(TransportError::Receive(String::from("bad frame"))));
    let event = manager.next_event().await;

    assert!(matches!(event, SessionEvent::Error(_)));
    assert_eq!(manager.state(), SessionState::Open);
    assert!(matches!(
        session_events(&log).last(),
        Some(SyncEvent::SessionError { .. })
    ));
}

#[tokio::test]
async fn failing_writes_are_reported_once() {
    let connector = MockConnector::default();
    let (mut manager, log) = manager(connector.clone());
    manager.connect(false).await.unwrap();
    let errors = |log: &EventLog| {
        session_events(log)
            .iter()
            .filter(|e| matches!(e, SyncEvent::SessionError { .. }))
            .count()
    };

    connector.fail_writes(0, true);
    for _ in 0..3 {
        manager.flush().await;
    }
    assert_eq!(manager.pending(), 1);
    assert_eq!(errors(&log), 1);
    assert_eq!(manager.state(), SessionState::Open);

    connector.fail_writes(0, false);
    manager.flush().await;
    assert_eq!(manager.pending(), 0);
    assert_eq!(connector.sent(0), vec![String::from(r#"{"type":"create"}"#)]);

    connector.fail_writes(0, true);
    assert!(manager.send(&OutboundMessage::Control(ControlIntent::pause())));
    manager.flush().await;
    assert_eq!(errors(&log), 2);
}

#[tokio::test]
async fn automatic_connect_waits_for_attempt_in_flight() {
    let connector = MockConnector::with_plans([Plan::Hang]);
    let (mut manager, _) = manager(connector.clone());

    let attempt = manager.begin_connect(false).await;
    assert!(attempt.is_some());
    assert_eq!(manager.state(), SessionState::Connecting);
    assert!(manager.begin_connect(false).await.is_none());
    assert_eq!(connector.attempts(), 1);

    drop(attempt);
    let superseding = manager.begin_connect(true).await.unwrap();
    let result = superseding.await;
    assert!(manager.complete_connect(result).is_ok());
    assert_eq!(connector.attempts(), 2);
    assert_eq!(manager.state(), SessionState::Open);
}

// ---------------------------------------------------------------------------
// Sync loop
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn hanging_connect_keeps_rendering_and_honors_shutdown() {
    let connector = MockConnector::with_plans([Plan::Hang]);
    let (mut client, handle, log) = client_with(connector.clone(), fixed(3), |store| {
        store.create_vehicle("car-pre", &Placement::default());
    });
    let started = Instant::now();

    let driver = async {
        sleep(Duration::from_millis(100)).await;
        assert_eq!(connector.attempts(), 1);
        handle.shutdown();
    };
    tokio::join!(client.run(), driver);

    assert!(started.elapsed() < Duration::from_secs(1));
    let renderer = client.renderer();
    assert!(renderer.calls.contains(&String::from("spawn car-pre")));
    assert!(renderer.updates >= 5);
    assert!(!client.connect_pending());
    assert_eq!(client.manager().state(), SessionState::Closed);
    assert_eq!(connector.session_count(), 0);
    assert!(session_events(&log).is_empty());
}

#[tokio::test(start_paused = true)]
async fn manual_reconnect_supersedes_hanging_connect() {
    let connector = MockConnector::with_plans([Plan::Hang, Plan::Accept]);
    let (mut client, handle, _) = client(connector.clone(), fixed(3));

    let driver = async {
        sleep(Duration::from_millis(100)).await;
        handle.reconnect();
        sleep(Duration::from_millis(10)).await;
        assert_eq!(connector.attempts(), 2);
        assert_eq!(connector.session_count(), 1);

        sleep(Duration::from_secs(15)).await;
        assert_eq!(connector.attempts(), 2);
        assert_eq!(connector.session_count(), 1);
        handle.shutdown();
    };
    tokio::join!(client.run(), driver);

    assert_eq!(client.manager().sessions(), 1);
    assert!(!client.retry_pending());
    assert_eq!(
        connector.closed(0),
        Some((1000, String::from("client shutdown")))
    );
}

#[tokio::test(start_paused = true)]
async fn loop_applies_frames_and_renders() {
    let connector = MockConnector::default();
    let (mut client, handle, _) = client(connector.clone(), fixed(3));

    let driver = async {
        sleep(Duration::from_millis(10)).await;
        connector.push_frame(
            0,
            &json!({
                "type": "batch",
                "commands": [
                    { "type": "vh", "action": "spawned", "id": 1 },
                    { "type": "time", "action": "time", "meta": 3.0 }
                ]
            }),
        );
        sleep(Duration::from_millis(100)).await;
        handle.shutdown();
    };
    tokio::join!(client.run(), driver);

    assert!(client.store().vehicle("car-1").is_some());
    assert!((client.store().sim_time() - 3.0).abs() < f64::EPSILON);
    let calls = &client.renderer().calls;
    assert!(calls.contains(&String::from("spawn car-1")));
    assert!(calls.contains(&String::from("dispose car-1")));
    assert_eq!(
        connector.closed(0),
        Some((1000, String::from("client shutdown")))
    );
    assert_eq!(connector.sent(0).first().map(String::as_str), Some(r#"{"type":"create"}"#));
}

#[tokio::test(start_paused = true)]
async fn refused_connect_is_retried_after_delay() {
    let connector = MockConnector::with_plans([Plan::Refuse, Plan::Accept]);
    let (mut client, handle, _) = client(connector.clone(), fixed(3));

    let driver = async {
        sleep(Duration::from_secs(1)).await;
        assert_eq!(connector.attempts(), 1);
        assert_eq!(connector.session_count(), 0);
        sleep(Duration::from_millis(2_500)).await;
        assert_eq!(connector.attempts(), 2);
        assert_eq!(connector.session_count(), 1);
        handle.shutdown();
    };
    tokio::join!(client.run(), driver);

    assert_eq!(client.manager().sessions(), 1);
}

#[tokio::test(start_paused = true)]
async fn reconnect_resets_vehicles_and_clock() {
    let connector = MockConnector::default();
    let (mut client, handle, log) = client(connector.clone(), fixed(3));

    let driver = async {
        sleep(Duration::from_millis(10)).await;
        connector.push_frame(
            0,
            &json!({
                "type": "batch",
                "commands": [
                    { "type": "vh", "action": "spawned", "id": 1 },
                    { "type": "vh", "action": "spawned", "id": 2 },
                    { "type": "time", "action": "time", "meta": 5.0 }
                ]
            }),
        );
        sleep(Duration::from_millis(10)).await;
        connector.drop_session(0, 1006);
        sleep(Duration::from_millis(3_500)).await;
        assert_eq!(connector.session_count(), 2);
        handle.shutdown();
    };
    tokio::join!(client.run(), driver);

    assert_eq!(client.store().vehicle_count(), 0);
    assert!(client.store().sim_time().abs() < f64::EPSILON);
    assert!(
        log.borrow()
            .contains(&SyncEvent::EntitiesReset { remaining: 0 })
    );
    assert!(client.renderer().calls.contains(&String::from("dispose car-2")));
}

#[tokio::test(start_paused = true)]
async fn manual_reconnect_cancels_pending_retry() {
    let connector = MockConnector::default();
    let (mut client, handle, _) = client(connector.clone(), fixed(3));

    let driver = async {
        sleep(Duration::from_millis(10)).await;
        connector.drop_session(0, 1006);
        sleep(Duration::from_secs(1)).await;
        assert_eq!(connector.attempts(), 1);

        handle.reconnect();
        sleep(Duration::from_millis(10)).await;
        assert_eq!(connector.attempts(), 2);

        sleep(Duration::from_secs(5)).await;
        assert_eq!(connector.attempts(), 2);
        handle.shutdown();
    };
    tokio::join!(client.run(), driver);

    assert!(!client.retry_pending());
}

#[tokio::test(start_paused = true)]
async fn manual_reconnect_while_open_closes_normally() {
    let connector = MockConnector::default();
    let (mut client, handle, _) = client(connector.clone(), fixed(3));

    let driver = async {
        sleep(Duration::from_millis(10)).await;
        handle.reconnect();
        sleep(Duration::from_millis(10)).await;
        assert_eq!(connector.session_count(), 2);
        assert_eq!(connector.closed(0), Some((1000, String::from("reconnect"))));
        assert_eq!(connector.closed(1), None);
        handle.shutdown();
    };
    tokio::join!(client.run(), driver);
}

#[tokio::test(start_paused = true)]
async fn control_intents_reach_the_wire() {
    let connector = MockConnector::default();
    let (mut client, handle, _) = client(connector.clone(), fixed(3));

    let driver = async {
        sleep(Duration::from_millis(10)).await;
        handle.control(ControlIntent::speed(2.0));
        handle.control(ControlIntent::traffic_mode("adaptive"));
        sleep(Duration::from_millis(10)).await;
        handle.shutdown();
    };
    tokio::join!(client.run(), driver);

    let sent: Vec<Value> = connector
        .sent(0)
        .iter()
        .map(|text| serde_json::from_str(text).unwrap())
        .collect();
    assert_eq!(
        sent,
        vec![
            json!({ "type": "create" }),
            json!({ "type": "control", "cmd": "speed", "value": 2.0 }),
            json!({ "type": "control", "cmd": "trafficMode", "value": "adaptive" }),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn no_reconnect_policy_stays_closed() {
    let connector = MockConnector::default();
    let (mut client, handle, _) = client(connector.clone(), Box::new(NoReconnect));

    let driver = async {
        sleep(Duration::from_millis(10)).await;
        connector.drop_session(0, 1011);
        sleep(Duration::from_secs(30)).await;
        assert_eq!(connector.attempts(), 1);
        handle.shutdown();
    };
    tokio::join!(client.run(), driver);

    assert_eq!(client.manager().state(), SessionState::Closed);
}
