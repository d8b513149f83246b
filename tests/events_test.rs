//! Tests for push event decoding and outgoing requests.

use goterm::{
    ErrorKind, GameDisconnectRequest, MoveRequest, Outgoing, Phase, Position, PushEvent, RawEvent,
};
use serde_json::json;

#[test]
fn test_decodes_move_event() {
    let raw = RawEvent::new(
        "game/99/move",
        json!({"game_id": 99, "move_number": 12, "move": [3, 15, 2041.5]}),
    );
    let Some(PushEvent::MovePlayed(played)) = PushEvent::decode(99, &raw).unwrap() else {
        panic!("expected a move event");
    };
    assert_eq!(played.move_number, 12);
    assert_eq!(played.played.position, Position::new(3, 15));
    assert_eq!(played.played.elapsed_ms, Some(2041));
    assert!(!played.is_pass());
}

#[test]
fn test_decodes_pass_move() {
    let raw = RawEvent::new(
        "game/99/move",
        json!({"game_id": 99, "move_number": 13, "move": [-1, -1]}),
    );
    let Some(PushEvent::MovePlayed(played)) = PushEvent::decode(99, &raw).unwrap() else {
        panic!("expected a move event");
    };
    assert!(played.is_pass());
    assert_eq!(played.played.elapsed_ms, None);
}

#[test]
fn test_decodes_gamedata_phase() {
    let raw = RawEvent::new(
        "game/99/gamedata",
        json!({"phase": "finished", "outcome": "W+3.5", "players": {}}),
    );
    let Some(PushEvent::GameData(data)) = PushEvent::decode(99, &raw).unwrap() else {
        panic!("expected game data");
    };
    assert_eq!(data.phase, Phase::Finished);
    assert_eq!(data.outcome.as_deref(), Some("W+3.5"));
}

#[test]
fn test_decodes_clock() {
    let raw = RawEvent::new(
        "game/99/clock",
        json!({"current_player": 42, "last_move": 1_700_000_000_000i64, "expiration": 1_700_000_060_000i64}),
    );
    let Some(PushEvent::ClockTick(clock)) = PushEvent::decode(99, &raw).unwrap() else {
        panic!("expected a clock tick");
    };
    assert_eq!(clock.current_player, 42);
    let now = clock.last_move_at().unwrap();
    assert_eq!(clock.remaining(now).unwrap().num_seconds(), 60);
    let later = clock.expires_at().unwrap() + chrono::Duration::seconds(5);
    assert_eq!(clock.remaining(later).unwrap().num_seconds(), 0);
}

#[test]
fn test_other_games_and_topics_are_ignored() {
    let raw = RawEvent::new("game/100/move", json!({"move_number": 1, "move": [0, 0]}));
    assert_eq!(PushEvent::decode(99, &raw).unwrap(), None);
    let raw = RawEvent::new("net/pong", json!({}));
    assert_eq!(PushEvent::decode(99, &raw).unwrap(), None);
}

#[test]
fn test_wrong_shape_is_malformed_event() {
    let raw = RawEvent::new("game/99/move", json!({"move_number": "twelve"}));
    let err = PushEvent::decode(99, &raw).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::MalformedEvent { .. }));
}

#[test]
fn test_outgoing_payloads() {
    let request = Outgoing::Move(MoveRequest {
        game_id: 99,
        player_id: 42,
        notation: "dp".to_string(),
    });
    assert_eq!(request.name(), "game/move");
    assert_eq!(
        request.payload(),
        json!({"game_id": 99, "player_id": 42, "move": "dp"})
    );

    let request = Outgoing::GameDisconnect(GameDisconnectRequest { game_id: 99 });
    assert_eq!(request.name(), "game/disconnect");
    assert_eq!(request.payload(), json!({"game_id": 99}));
}
