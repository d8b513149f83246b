//! Tests for REST wire types.

use goterm::{ErrorKind, GameList, GameSummary, OauthResponse, Player};
use serde_json::json;

fn summary(black_lost: bool, white_lost: bool) -> GameSummary {
    serde_json::from_value(json!({
        "id": 123,
        "name": "Friendly Match",
        "width": 19,
        "height": 19,
        "players": {
            "black": {"id": 1, "username": "alice", "ranking": 25.0},
            "white": {"id": 2, "username": "bob", "ranking": 31.0}
        },
        "black_lost": black_lost,
        "white_lost": white_lost
    }))
    .unwrap()
}

#[test]
fn test_ranking_kyu_and_dan() {
    assert_eq!(Player::new(1, "a".into(), 25.0).ranking(), "5 kyu");
    assert_eq!(Player::new(1, "a".into(), 29.7).ranking(), "0 kyu");
    assert_eq!(Player::new(1, "a".into(), 30.0).ranking(), "1 dan");
    assert_eq!(Player::new(1, "a".into(), 32.0).ranking(), "3 dan");
}

#[test]
fn test_player_display_and_identity() {
    let player = Player::new(42, "alice".into(), 20.0);
    assert_eq!(player.to_string(), "alice (10 kyu)");
    let identity = player.identity();
    assert_eq!(*identity.player_id(), 42);
    assert_eq!(identity.username(), "alice");
}

#[test]
fn test_player_without_ranking_decodes() {
    let player: Player = serde_json::from_value(json!({"id": 5, "username": "new"})).unwrap();
    assert_eq!(*player.raw_ranking(), 0.0);
    assert_eq!(player.ranking(), "30 kyu");
}

#[test]
fn test_game_running_while_both_lost() {
    let game = summary(true, true);
    assert!(!game.is_over());
    assert_eq!(
        game.description(),
        "alice (5 kyu) (B) vs bob (2 dan) (W) (19x19)"
    );
}

#[test]
fn test_game_over_once_a_side_did_not_lose() {
    assert!(summary(false, true).is_over());
    assert!(summary(true, false).is_over());
    assert!(summary(true, false).description().ends_with("(ended)"));
}

#[test]
fn test_game_list_reads_results() {
    let list: GameList = serde_json::from_value(json!({
        "count": 1,
        "results": [serde_json::to_value(summary(true, true)).unwrap()]
    }))
    .unwrap();
    assert_eq!(list.games.len(), 1);
    assert_eq!(*list.games[0].id(), 123);

    let empty: GameList = serde_json::from_value(json!({})).unwrap();
    assert!(empty.games.is_empty());
}

#[test]
fn test_oauth_success_has_no_error() {
    let response: OauthResponse = serde_json::from_value(json!({
        "access_token": "abc",
        "refresh_token": "def",
        "expires_in": 36000,
        "token_type": "Bearer",
        "scope": "read write"
    }))
    .unwrap();
    assert_eq!(response.error_kind(), None);
    assert_eq!(response.refresh_token, "def");
}

#[test]
fn test_oauth_error_with_description_is_bad_credentials() {
    let response: OauthResponse = serde_json::from_value(json!({
        "error": "invalid_grant",
        "error_description": "Invalid credentials given."
    }))
    .unwrap();
    assert_eq!(
        response.error_kind(),
        Some(ErrorKind::InvalidCredentials(
            "Invalid credentials given.".to_string()
        ))
    );
}

#[test]
fn test_oauth_error_without_description_is_misconfiguration() {
    let response: OauthResponse =
        serde_json::from_value(json!({"error": "invalid_client"})).unwrap();
    assert_eq!(
        response.error_kind(),
        Some(ErrorKind::AuthProviderMisconfigured(
            "invalid_client".to_string()
        ))
    );
}
