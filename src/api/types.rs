//! Wire types for the REST API.

use crate::error::ErrorKind;
use crate::identity::{GameId, Identity, PlayerId};
use derive_getters::Getters;
use derive_new::new;
use serde::{Deserialize, Serialize};

/// Ranking at which kyu ranks end and dan ranks begin.
const DAN_THRESHOLD: f32 = 30.0;

/// A player as reported by the service.
#[derive(Debug, Clone, PartialEq, Getters, Serialize, Deserialize, new)]
pub struct Player {
    /// Player id.
    id: PlayerId,
    /// Login name.
    username: String,
    /// Raw rating, 30 being 1 dan.
    #[serde(default, rename = "ranking")]
    raw_ranking: f32,
}

impl Player {
    /// Human-readable rank, e.g. `"5 kyu"` or `"2 dan"`.
    pub fn ranking(&self) -> String {
        // Round to nearest instead of truncating 1.9 down to 1.
        if self.raw_ranking < DAN_THRESHOLD {
            format!("{} kyu", (DAN_THRESHOLD - self.raw_ranking + 0.5) as i32)
        } else {
            format!("{} dan", (self.raw_ranking - DAN_THRESHOLD + 0.5 + 1.0) as i32)
        }
    }

    /// The identity a session acts under for this player.
    pub fn identity(&self) -> Identity {
        Identity::new(self.id, self.username.clone())
    }
}

impl std::fmt::Display for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.username, self.ranking())
    }
}

/// Black and white players of a listed game.
#[derive(Debug, Clone, PartialEq, Getters, Serialize, Deserialize, new)]
pub struct GamePlayers {
    /// Black.
    black: Player,
    /// White.
    white: Player,
}

/// One entry of the active-games list. Board contents are fetched separately.
#[derive(Debug, Clone, PartialEq, Getters, Serialize, Deserialize, new)]
pub struct GameSummary {
    /// Game id.
    id: GameId,
    /// Game name.
    #[serde(default)]
    name: String,
    /// Board width.
    width: usize,
    /// Board height.
    height: usize,
    /// Players by colour.
    players: GamePlayers,
    /// Black has not (yet) lost.
    #[serde(default)]
    black_lost: bool,
    /// White has not (yet) lost.
    #[serde(default)]
    white_lost: bool,
}

impl GameSummary {
    /// True once the game has ended.
    ///
    /// The service reports both players as having lost while a game is running;
    /// whoever did not lose flips to `false` at the end.
    pub fn is_over(&self) -> bool {
        !self.black_lost || !self.white_lost
    }

    /// One-line description for game pickers.
    pub fn description(&self) -> String {
        let ended = if self.is_over() { " (ended)" } else { "" };
        format!(
            "{} (B) vs {} (W) ({}x{}){}",
            self.players.black, self.players.white, self.width, self.height, ended
        )
    }
}

/// A page of games.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GameList {
    /// Games on this page.
    #[serde(rename = "results", default)]
    pub games: Vec<GameSummary>,
}

/// Response of the OAuth token endpoint. Every field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OauthResponse {
    /// Bearer token for API calls.
    pub access_token: String,
    /// Lifetime of the access token in seconds.
    pub expires_in: i64,
    /// Usually `Bearer`.
    pub token_type: String,
    /// Long-lived token for the refresh grant.
    pub refresh_token: String,
    /// Granted scopes, space separated.
    pub scope: String,
    /// OAuth error code, empty on success.
    pub error: String,
    /// Human-readable error text.
    pub error_description: String,
}

impl OauthResponse {
    /// Maps an OAuth error to the matching error kind, or `None` on success.
    ///
    /// An error without a description points at a bad client id rather than
    /// bad user input.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match (self.error.is_empty(), self.error_description.is_empty()) {
            (true, _) => None,
            (false, false) => Some(ErrorKind::InvalidCredentials(
                self.error_description.clone(),
            )),
            (false, true) => Some(ErrorKind::AuthProviderMisconfigured(self.error.clone())),
        }
    }
}

/// The slice of `ui/config` the realtime channel needs.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UiConfig {
    /// Chat token used to authenticate on the push channel.
    #[serde(default)]
    pub chat_auth: String,
}
