//! Tests for the realtime session against in-memory collaborators.

use goterm::{
    BoardSnapshot, ConnectionState, ErrorKind, GameApi, GoError, GoResult, Identity, MoveStatus,
    Position, PushChannel, PushConnector, RawEvent, RealtimeSession, TurnStatus,
};
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Notify, mpsc};

const GAME: i64 = 99;
const ME: i64 = 42;
const OPPONENT: i64 = 7;

fn snapshot(move_number: i64, phase: &str, player_to_move: i64, size: usize) -> BoardSnapshot {
    BoardSnapshot::from_value(json!({
        "move_number": move_number,
        "player_to_move": player_to_move,
        "phase": phase,
        "board": vec![vec![0; size]; size],
        "outcome": if phase == "finished" { "B+R" } else { "" },
        "last_move": { "x": 3, "y": 15 }
    }))
    .unwrap()
}

/// Everything the mock channel saw.
#[derive(Default)]
struct ChannelLog {
    sent: Mutex<Vec<(String, Value)>>,
    closed: AtomicBool,
}

impl ChannelLog {
    fn names(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn payloads(&self, name: &str) -> Vec<Value> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, payload)| payload.clone())
            .collect()
    }
}

struct MockChannel {
    incoming: mpsc::UnboundedReceiver<RawEvent>,
    log: Arc<ChannelLog>,
}

#[async_trait::async_trait]
impl PushChannel for MockChannel {
    async fn emit(&mut self, name: &str, payload: Value) -> GoResult<()> {
        self.log.sent.lock().unwrap().push((name.to_string(), payload));
        Ok(())
    }

    async fn recv(&mut self) -> Option<GoResult<RawEvent>> {
        self.incoming.recv().await.map(Ok)
    }

    async fn close(&mut self) -> GoResult<()> {
        self.log.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

struct MockConnector {
    channels: Mutex<VecDeque<MockChannel>>,
}

#[async_trait::async_trait]
impl PushConnector for MockConnector {
    async fn open(&self) -> GoResult<Box<dyn PushChannel>> {
        match self.channels.lock().unwrap().pop_front() {
            Some(channel) => Ok(Box::new(channel)),
            None => Err(GoError::new(ErrorKind::ConnectFailed(
                "connection refused".to_string(),
            ))),
        }
    }
}

struct MockApi {
    snapshot: Mutex<GoResult<BoardSnapshot>>,
    fetches: AtomicUsize,
    token: Mutex<String>,
    token_requests: AtomicUsize,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl MockApi {
    fn serve(&self, snapshot: BoardSnapshot) {
        *self.snapshot.lock().unwrap() = Ok(snapshot);
    }

    fn fail(&self, kind: ErrorKind) {
        *self.snapshot.lock().unwrap() = Err(GoError::new(kind));
    }

    fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn token_requests(&self) -> usize {
        self.token_requests.load(Ordering::SeqCst)
    }

    /// Holds every later call until the returned gate is notified.
    fn hold(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    async fn wait_for_gate(&self) {
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
    }
}

#[async_trait::async_trait]
impl GameApi for MockApi {
    async fn game_state(&self, game_id: i64) -> GoResult<BoardSnapshot> {
        assert_eq!(game_id, GAME);
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.wait_for_gate().await;
        self.snapshot.lock().unwrap().clone()
    }

    async fn chat_token(&self) -> GoResult<String> {
        self.token_requests.fetch_add(1, Ordering::SeqCst);
        self.wait_for_gate().await;
        Ok(self.token.lock().unwrap().clone())
    }
}

struct Harness {
    session: RealtimeSession,
    api: Arc<MockApi>,
    log: Arc<ChannelLog>,
    push: mpsc::UnboundedSender<RawEvent>,
    _spare: Vec<mpsc::UnboundedSender<RawEvent>>,
}

impl Harness {
    fn new(initial: BoardSnapshot) -> Self {
        Self::with_channels(initial, 1)
    }

    fn without_channel(initial: BoardSnapshot) -> Self {
        Self::with_channels(initial, 0)
    }

    fn with_channels(initial: BoardSnapshot, count: usize) -> Self {
        let log = Arc::new(ChannelLog::default());
        let mut senders = Vec::new();
        let mut channels = VecDeque::new();
        for _ in 0..count.max(1) {
            let (tx, rx) = mpsc::unbounded_channel();
            senders.push(tx);
            channels.push_back(MockChannel {
                incoming: rx,
                log: Arc::clone(&log),
            });
        }
        channels.truncate(count);
        let api = Arc::new(MockApi {
            snapshot: Mutex::new(Ok(initial)),
            fetches: AtomicUsize::new(0),
            token: Mutex::new("chat-token".to_string()),
            token_requests: AtomicUsize::new(0),
            gate: Mutex::new(None),
        });
        let session = RealtimeSession::new(
            api.clone(),
            Arc::new(MockConnector {
                channels: Mutex::new(channels),
            }),
            Identity::new(ME, "tester".to_string()),
        );
        let push = senders.remove(0);
        Self {
            session,
            api,
            log,
            push,
            _spare: senders,
        }
    }

    async fn connect(&self) {
        self.session.connect(GAME, None).await.unwrap();
    }

    async fn connect_live(&self) {
        self.connect().await;
        self.session.authenticate().await.unwrap();
    }

    fn push(&self, topic: &str, payload: Value) {
        self.push
            .send(RawEvent::new(format!("game/{GAME}/{topic}"), payload))
            .unwrap();
    }

    fn push_move(&self, move_number: i64, x: i32, y: i32) {
        self.push(
            "move",
            json!({"game_id": GAME, "move_number": move_number, "move": [x, y, 1500]}),
        );
    }

    /// Pushes a clock tick and waits for it, so every earlier event has been handled.
    async fn sync(&self, stamp: i64) {
        self.push(
            "clock",
            json!({"current_player": ME, "last_move": stamp, "expiration": stamp + 30_000}),
        );
        let session = self.session.clone();
        eventually(move || session.clock().is_some_and(|c| c.last_move == stamp)).await;
    }
}

async fn eventually(condition: impl Fn() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test]
async fn test_connect_joins_and_fetches_snapshot() {
    let h = Harness::new(snapshot(10, "play", ME, 19));
    h.connect().await;

    assert_eq!(h.session.state(), ConnectionState::Subscribing);
    assert_eq!(h.session.game_id(), Some(GAME));
    assert_eq!(h.session.snapshot().unwrap().move_number(), 10);
    assert_eq!(h.api.fetches(), 1);

    let log = Arc::clone(&h.log);
    eventually(move || !log.payloads("game/connect").is_empty()).await;
    assert_eq!(
        h.log.payloads("game/connect")[0],
        json!({"game_id": GAME, "player_id": ME, "chat": false})
    );
}

#[tokio::test]
async fn test_connect_failure_leaves_session_disconnected() {
    let h = Harness::without_channel(snapshot(10, "play", ME, 19));
    let err = h.session.connect(GAME, None).await.unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::ConnectFailed(_)));
    assert!(err.is_retryable());
    assert_eq!(h.session.state(), ConnectionState::Disconnected);
    assert_eq!(h.session.game_id(), None);
}

#[tokio::test]
async fn test_initial_fetch_failure_tears_down() {
    let h = Harness::new(snapshot(10, "play", ME, 19));
    h.api.fail(ErrorKind::Transport("timed out".to_string()));
    let err = h.session.connect(GAME, None).await.unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::Transport(_)));
    assert_eq!(h.session.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_connect_while_connected_is_invalid() {
    let h = Harness::new(snapshot(10, "play", ME, 19));
    h.connect().await;
    let err = h.session.connect(GAME, None).await.unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::InvalidState(_)));
    assert_eq!(h.session.state(), ConnectionState::Subscribing);
}

#[tokio::test]
async fn test_operations_require_connection() {
    let h = Harness::new(snapshot(10, "play", ME, 19));
    let err = h.session.refresh_snapshot().await.unwrap_err();
    assert_eq!(*err.kind(), ErrorKind::NotConnected);
    let err = h.session.submit_move(3, 3).unwrap_err();
    assert_eq!(*err.kind(), ErrorKind::NotConnected);
    let err = h.session.authenticate().await.unwrap_err();
    assert_eq!(*err.kind(), ErrorKind::NotConnected);
}

#[tokio::test]
async fn test_move_before_authenticate_is_not_sent() {
    let h = Harness::new(snapshot(10, "play", ME, 19));
    h.connect().await;

    assert_eq!(
        h.session.submit_move(3, 15).unwrap(),
        MoveStatus::NotAuthenticated
    );
    h.sync(1).await;
    assert!(h.log.payloads("game/move").is_empty());
}

#[tokio::test]
async fn test_authenticated_move_and_pass_are_published() {
    let h = Harness::new(snapshot(10, "play", ME, 19));
    h.connect_live().await;
    assert_eq!(h.session.state(), ConnectionState::Live);
    assert!(h.session.is_authenticated());

    assert_eq!(h.session.submit_move(3, 15).unwrap(), MoveStatus::Sent);
    assert_eq!(h.session.pass().unwrap(), MoveStatus::Sent);

    let log = Arc::clone(&h.log);
    eventually(move || log.payloads("game/move").len() == 2).await;
    assert_eq!(
        h.log.names(),
        vec!["game/connect", "authenticate", "game/move", "game/move"]
    );
    assert_eq!(
        h.log.payloads("authenticate")[0],
        json!({"auth": "chat-token", "player_id": ME, "username": "tester"})
    );
    let moves = h.log.payloads("game/move");
    assert_eq!(moves[0], json!({"game_id": GAME, "player_id": ME, "move": "dp"}));
    assert_eq!(moves[1]["move"], json!(".."));
}

#[tokio::test]
async fn test_unencodable_move_is_rejected() {
    let h = Harness::new(snapshot(10, "play", ME, 19));
    h.connect_live().await;
    let err = h.session.submit_move(30, 2).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::UnsupportedCoordinate(_)));
}

#[tokio::test]
async fn test_no_move_on_finished_snapshot() {
    let h = Harness::new(snapshot(200, "finished", ME, 19));
    h.connect_live().await;

    assert_eq!(
        h.session.submit_move(3, 15).unwrap(),
        MoveStatus::AlreadyFinished
    );
    assert_eq!(h.session.pass().unwrap(), MoveStatus::AlreadyFinished);
    h.sync(1).await;
    assert!(h.log.payloads("game/move").is_empty());
}

#[tokio::test]
async fn test_realtime_finished_wins_over_lagging_snapshot() {
    let h = Harness::new(snapshot(200, "play", ME, 19));
    h.connect_live().await;

    h.push("gamedata", json!({"phase": "finished", "outcome": "B+R"}));
    let session = h.session.clone();
    eventually(move || session.is_finished()).await;

    assert!(!h.session.snapshot().unwrap().is_finished());
    assert!(matches!(
        h.session.turn_status(),
        Some(TurnStatus::Finished { .. })
    ));
    assert_eq!(
        h.session.submit_move(3, 15).unwrap(),
        MoveStatus::AlreadyFinished
    );
}

#[tokio::test]
async fn test_game_data_handler_runs_and_refreshes() {
    let h = Harness::new(snapshot(10, "play", ME, 19));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    h.session
        .connect(
            GAME,
            Some(Box::new(move |data: &goterm::GameDataEvent| {
                sink.lock().unwrap().push(data.phase.to_string());
            })),
        )
        .await
        .unwrap();

    h.api.serve(snapshot(150, "stone removal", ME, 19));
    h.push("gamedata", json!({"phase": "stone removal"}));
    let probe = Arc::clone(&seen);
    eventually(move || !probe.lock().unwrap().is_empty()).await;

    assert_eq!(seen.lock().unwrap().as_slice(), ["stone removal"]);
    assert_eq!(h.session.snapshot().unwrap().move_number(), 150);
    assert!(!h.session.is_finished());
}

#[tokio::test]
async fn test_already_applied_move_is_ignored_without_refresh() {
    let h = Harness::new(snapshot(10, "play", ME, 19));
    let moves = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&moves);
    h.session
        .on_move(move |played| sink.lock().unwrap().push(played.move_number));
    h.connect().await;
    assert_eq!(h.api.fetches(), 1);

    h.push_move(10, 3, 15);
    h.push_move(9, 4, 4);
    h.sync(1).await;

    assert_eq!(h.api.fetches(), 1);
    assert!(moves.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_new_move_refreshes_snapshot() {
    let h = Harness::new(snapshot(10, "play", ME, 19));
    let moves = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&moves);
    h.session
        .on_move(move |played| sink.lock().unwrap().push(played.move_number));
    h.connect().await;

    h.api.serve(snapshot(11, "play", OPPONENT, 19));
    h.push_move(11, 3, 3);
    h.sync(1).await;

    assert_eq!(h.api.fetches(), 2);
    assert_eq!(h.session.snapshot().unwrap().move_number(), 11);
    assert_eq!(moves.lock().unwrap().as_slice(), [11]);
    assert!(!h.session.last_turn_pass());
}

#[tokio::test]
async fn test_pass_sets_flag_without_refresh() {
    let h = Harness::new(snapshot(10, "play", OPPONENT, 19));
    h.connect().await;

    h.push_move(11, -1, -1);
    h.push_move(11, -1, -1);
    h.sync(1).await;

    assert!(h.session.last_turn_pass());
    assert_eq!(h.api.fetches(), 1);
    // The clock tick after the pass names the local player.
    assert_eq!(
        h.session.turn_status(),
        Some(TurnStatus::YourTurn {
            opponent_passed: true
        })
    );
}

#[tokio::test]
async fn test_pass_without_clock_keeps_snapshot_turn() {
    let h = Harness::new(snapshot(10, "play", OPPONENT, 19));
    h.connect().await;

    h.push_move(11, -1, -1);
    let session = h.session.clone();
    eventually(move || session.last_turn_pass()).await;

    assert_eq!(
        h.session.turn_status(),
        Some(TurnStatus::OpponentsTurn { you_passed: true })
    );
}

#[tokio::test]
async fn test_newer_snapshot_clears_clock_turn() {
    let h = Harness::new(snapshot(10, "play", OPPONENT, 19));
    h.connect().await;
    h.sync(1).await;
    assert!(matches!(
        h.session.turn_status(),
        Some(TurnStatus::YourTurn { .. })
    ));

    h.api.serve(snapshot(11, "play", OPPONENT, 19));
    h.session.refresh_snapshot().await.unwrap();
    assert!(matches!(
        h.session.turn_status(),
        Some(TurnStatus::OpponentsTurn { .. })
    ));
}

#[tokio::test]
async fn test_stale_fetch_keeps_newer_snapshot() {
    let h = Harness::new(snapshot(10, "play", ME, 19));
    h.connect().await;

    h.api.serve(snapshot(8, "play", OPPONENT, 19));
    let kept = h.session.refresh_snapshot().await.unwrap();
    assert_eq!(kept.move_number(), 10);
    assert_eq!(h.session.snapshot().unwrap().player_to_move(), ME);
}

#[tokio::test]
async fn test_failed_refresh_keeps_cached_snapshot() {
    let h = Harness::new(snapshot(10, "play", ME, 19));
    h.connect().await;

    h.api.fail(ErrorKind::Http {
        status: 502,
        path: "termination-api/game/99/state".to_string(),
    });
    let err = h.session.refresh_snapshot().await.unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(h.session.snapshot().unwrap().move_number(), 10);
    assert_eq!(h.session.state(), ConnectionState::Subscribing);
}

#[tokio::test]
async fn test_dimension_change_faults_session() {
    let h = Harness::new(snapshot(10, "play", ME, 19));
    h.connect_live().await;

    h.api.serve(snapshot(11, "play", ME, 9));
    let err = h.session.refresh_snapshot().await.unwrap_err();
    assert!(matches!(
        err.kind(),
        ErrorKind::DimensionChanged {
            old_width: 19,
            new_width: 9,
            ..
        }
    ));
    assert!(err.is_protocol_violation());
    assert_eq!(h.session.state(), ConnectionState::Faulted);
    assert_eq!(h.session.snapshot().unwrap().width(), 19);

    let err = h.session.submit_move(3, 3).unwrap_err();
    assert_eq!(*err.kind(), ErrorKind::NotConnected);

    let log = Arc::clone(&h.log);
    eventually(move || log.closed.load(Ordering::SeqCst)).await;
}

#[tokio::test]
async fn test_server_closing_channel_faults_session() {
    let h = Harness::new(snapshot(10, "play", ME, 19));
    h.connect().await;
    let Harness { session, push, .. } = h;
    drop(push);

    let probe = session.clone();
    eventually(move || probe.state() == ConnectionState::Faulted).await;
}

#[tokio::test]
async fn test_disconnect_is_idempotent_and_releases_everything() {
    let h = Harness::new(snapshot(10, "play", ME, 19));
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    h.session.on_clock(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    h.connect_live().await;
    h.session.move_selection(0, 0);
    assert_eq!(h.session.selected(), Some(Position::new(3, 15)));

    h.session.disconnect();
    h.session.disconnect();

    assert_eq!(h.session.state(), ConnectionState::Disconnected);
    assert_eq!(h.session.snapshot(), None);
    assert_eq!(h.session.selected(), None);
    assert!(!h.session.is_authenticated());

    let log = Arc::clone(&h.log);
    eventually(move || log.closed.load(Ordering::SeqCst)).await;
    assert_eq!(
        h.log.payloads("game/disconnect"),
        vec![json!({"game_id": GAME})]
    );

    // Events after disconnect reach no handler.
    let _ = h.push.send(RawEvent::new(
        format!("game/{GAME}/clock"),
        json!({"current_player": ME, "last_move": 1}),
    ));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_reconnect_after_disconnect() {
    let h = Harness::with_channels(snapshot(10, "play", ME, 19), 2);
    h.connect().await;
    h.session.disconnect();

    h.api.serve(snapshot(12, "play", ME, 19));
    h.connect().await;
    assert_eq!(h.session.state(), ConnectionState::Subscribing);
    assert_eq!(h.session.snapshot().unwrap().move_number(), 12);
}

#[tokio::test]
async fn test_cursor_follows_session_snapshot() {
    let h = Harness::new(snapshot(10, "play", ME, 19));
    assert_eq!(h.session.selected(), None);
    h.session.move_selection(1, 0);
    assert_eq!(h.session.selected(), None);

    h.connect().await;
    h.session.move_selection(1, 0);
    assert_eq!(h.session.selected(), Some(Position::new(3, 15)));
    h.session.move_selection(1, 0);
    assert_eq!(h.session.selected(), Some(Position::new(4, 15)));
    h.session.reset_selection();
    assert_eq!(h.session.selected(), None);

    let view = h.session.view();
    assert_eq!(view.state, ConnectionState::Subscribing);
    assert_eq!(
        view.turn,
        Some(TurnStatus::YourTurn {
            opponent_passed: false
        })
    );
}

#[tokio::test]
async fn test_empty_chat_token_does_not_authenticate() {
    let h = Harness::new(snapshot(10, "play", ME, 19));
    *h.api.token.lock().unwrap() = String::new();
    h.connect().await;

    let err = h.session.authenticate().await.unwrap_err();
    assert!(err.is_retryable());
    assert!(!h.session.is_authenticated());
    assert_eq!(h.session.state(), ConnectionState::Subscribing);
    assert_eq!(
        h.session.submit_move(3, 3).unwrap(),
        MoveStatus::NotAuthenticated
    );
    h.sync(1).await;
    assert!(h.log.payloads("authenticate").is_empty());
    assert!(h.log.payloads("game/move").is_empty());
}

#[tokio::test]
async fn test_fetch_finishing_after_disconnect_is_discarded() {
    let h = Harness::new(snapshot(10, "play", ME, 19));
    h.connect().await;

    let gate = h.api.hold();
    h.api.serve(snapshot(11, "play", OPPONENT, 19));
    let session = h.session.clone();
    let pending = tokio::spawn(async move { session.refresh_snapshot().await });
    let api = Arc::clone(&h.api);
    eventually(move || api.fetches() == 2).await;

    h.session.disconnect();
    gate.notify_one();

    let err = pending.await.unwrap().unwrap_err();
    assert_eq!(*err.kind(), ErrorKind::NotConnected);
    assert_eq!(h.session.snapshot(), None);
    assert_eq!(h.session.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_token_arriving_after_disconnect_is_discarded() {
    let h = Harness::new(snapshot(10, "play", ME, 19));
    h.connect().await;

    let gate = h.api.hold();
    let session = h.session.clone();
    let pending = tokio::spawn(async move { session.authenticate().await });
    let api = Arc::clone(&h.api);
    eventually(move || api.token_requests() == 1).await;

    h.session.disconnect();
    gate.notify_one();

    let err = pending.await.unwrap().unwrap_err();
    assert_eq!(*err.kind(), ErrorKind::NotConnected);
    assert!(!h.session.is_authenticated());
    assert_eq!(h.session.state(), ConnectionState::Disconnected);
    let log = Arc::clone(&h.log);
    eventually(move || log.closed.load(Ordering::SeqCst)).await;
    assert!(h.log.payloads("authenticate").is_empty());
}

#[tokio::test]
async fn test_push_triggered_dimension_change_faults_session() {
    let h = Harness::new(snapshot(10, "play", ME, 19));
    h.connect_live().await;

    h.api.serve(snapshot(11, "play", OPPONENT, 9));
    h.push_move(11, 3, 3);

    let session = h.session.clone();
    eventually(move || session.state() == ConnectionState::Faulted).await;
    let log = Arc::clone(&h.log);
    eventually(move || log.closed.load(Ordering::SeqCst)).await;

    assert_eq!(h.api.fetches(), 2);
    assert_eq!(h.session.snapshot().unwrap().width(), 19);
    assert!(!h.session.is_authenticated());
    let err = h.session.submit_move(3, 3).unwrap_err();
    assert_eq!(*err.kind(), ErrorKind::NotConnected);
}
