//! REST collaborator: snapshots, chat tokens, login and game lists.

mod client;
mod types;

pub use client::OgsClient;
pub use types::{GameList, GamePlayers, GameSummary, OauthResponse, Player, UiConfig};

use crate::board::BoardSnapshot;
use crate::error::GoResult;
use crate::identity::GameId;

/// What a realtime session needs from the REST API.
#[async_trait::async_trait]
pub trait GameApi: Send + Sync {
    /// Fetches the full board state of `game_id`.
    async fn game_state(&self, game_id: GameId) -> GoResult<BoardSnapshot>;

    /// Fetches a short-lived token for authenticating on the push channel.
    async fn chat_token(&self) -> GoResult<String>;
}
