//! Typed push events and outgoing requests for one game's realtime topics.

use crate::board::Phase;
use crate::coords::Position;
use crate::error::{ErrorKind, GoError, GoResult};
use crate::identity::{GameId, PlayerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// An untyped event as delivered by the push channel.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEvent {
    /// Event (topic) name, e.g. `game/123/move`.
    pub name: String,
    /// JSON body.
    pub payload: serde_json::Value,
}

impl RawEvent {
    /// Creates a raw event.
    pub fn new(name: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }
}

/// Topic carrying full game data (on connect and phase transitions).
pub fn gamedata_topic(game_id: GameId) -> String {
    format!("game/{game_id}/gamedata")
}

/// Topic carrying played moves.
pub fn move_topic(game_id: GameId) -> String {
    format!("game/{game_id}/move")
}

/// Topic carrying clock ticks.
pub fn clock_topic(game_id: GameId) -> String {
    format!("game/{game_id}/clock")
}

/// Full game-data broadcast. Only the fields the client reconciles on are kept.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GameDataEvent {
    /// Phase the game is in now.
    #[serde(default)]
    pub phase: Phase,
    /// Result text, present once finished.
    #[serde(default)]
    pub outcome: Option<String>,
}

/// A move as the push channel writes it: `[x, y, elapsed_ms, ...]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "Vec<serde_json::Value>")]
pub struct PlayedMove {
    /// Where the stone went, or [`Position::PASS`].
    pub position: Position,
    /// Time spent on the move, when reported.
    pub elapsed_ms: Option<i64>,
}

impl TryFrom<Vec<serde_json::Value>> for PlayedMove {
    type Error = String;

    fn try_from(values: Vec<serde_json::Value>) -> Result<Self, Self::Error> {
        let axis = |i: usize| {
            values
                .get(i)
                .and_then(serde_json::Value::as_f64)
                .map(|v| v as i32)
                .ok_or_else(|| format!("move element {i} is missing or not a number"))
        };
        Ok(Self {
            position: Position::new(axis(0)?, axis(1)?),
            elapsed_ms: values
                .get(2)
                .and_then(serde_json::Value::as_f64)
                .map(|v| v as i64),
        })
    }
}

/// A move-played broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct MoveEvent {
    /// Game the move belongs to.
    pub game_id: GameId,
    /// Move number after this move.
    pub move_number: i64,
    /// The move itself.
    #[serde(rename = "move")]
    pub played: PlayedMove,
}

impl MoveEvent {
    /// True if this move is a pass.
    pub fn is_pass(&self) -> bool {
        self.played.position.is_pass()
    }
}

/// A clock tick broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClockEvent {
    /// Player whose clock is running.
    pub current_player: PlayerId,
    /// When the last move was made, epoch milliseconds.
    pub last_move: i64,
    /// When the running clock runs out, epoch milliseconds.
    #[serde(default)]
    pub expiration: Option<i64>,
}

impl ClockEvent {
    /// Time of the last move.
    pub fn last_move_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.last_move)
    }

    /// Time the running clock expires.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expiration.and_then(DateTime::from_timestamp_millis)
    }

    /// Time left on the running clock relative to `now`, never negative.
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        self.expires_at()
            .map(|at| (at - now).max(chrono::Duration::zero()))
    }
}

/// Push events for the connected game, decoded at the subscription boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushEvent {
    /// Full game data.
    GameData(GameDataEvent),
    /// A move was played.
    MovePlayed(MoveEvent),
    /// Clock update.
    ClockTick(ClockEvent),
}

impl PushEvent {
    /// Decodes `raw` if it belongs to `game_id`'s topics.
    ///
    /// Returns `Ok(None)` for events on any other topic.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::MalformedEvent`] when a known topic carries a payload of the wrong shape.
    #[instrument(skip(raw), fields(name = %raw.name))]
    pub fn decode(game_id: GameId, raw: &RawEvent) -> GoResult<Option<Self>> {
        let event = if raw.name == gamedata_topic(game_id) {
            PushEvent::GameData(parse(raw)?)
        } else if raw.name == move_topic(game_id) {
            PushEvent::MovePlayed(parse(raw)?)
        } else if raw.name == clock_topic(game_id) {
            PushEvent::ClockTick(parse(raw)?)
        } else {
            debug!("Ignoring event for unrelated topic");
            return Ok(None);
        };
        Ok(Some(event))
    }
}

fn parse<T: serde::de::DeserializeOwned>(raw: &RawEvent) -> GoResult<T> {
    serde_json::from_value(raw.payload.clone()).map_err(|e| {
        GoError::new(ErrorKind::MalformedEvent {
            topic: raw.name.clone(),
            reason: e.to_string(),
        })
    })
}

/// Channel-join request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameConnectRequest {
    /// Game to join.
    pub game_id: GameId,
    /// Joining player.
    pub player_id: PlayerId,
    /// Whether to receive chat.
    pub chat: bool,
}

/// Authentication request for write access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthenticateRequest {
    /// Short-lived chat token from the REST API.
    pub auth: String,
    /// Authenticating player.
    pub player_id: PlayerId,
    /// Player's login name.
    pub username: String,
}

/// Move submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MoveRequest {
    /// Game the move is for.
    pub game_id: GameId,
    /// Moving player.
    pub player_id: PlayerId,
    /// Wire-encoded position.
    #[serde(rename = "move")]
    pub notation: String,
}

/// Channel-leave request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameDisconnectRequest {
    /// Game to leave.
    pub game_id: GameId,
}

/// Requests published on the push channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Outgoing {
    /// `game/connect`
    GameConnect(GameConnectRequest),
    /// `authenticate`
    Authenticate(AuthenticateRequest),
    /// `game/move`
    Move(MoveRequest),
    /// `game/disconnect`
    GameDisconnect(GameDisconnectRequest),
}

impl Outgoing {
    /// Event name the request is published under.
    pub fn name(&self) -> &'static str {
        match self {
            Outgoing::GameConnect(_) => "game/connect",
            Outgoing::Authenticate(_) => "authenticate",
            Outgoing::Move(_) => "game/move",
            Outgoing::GameDisconnect(_) => "game/disconnect",
        }
    }

    /// JSON body of the request.
    pub fn payload(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
