//! goterm library - a terminal client core for online-go.com
//!
//! Tracks one live game over the service's REST API and realtime push
//! channel, and exposes a consistent board snapshot plus turn and cursor
//! state that a terminal UI can draw from.
//!
//! # Architecture
//!
//! - **Coordinates**: two-letter wire notation, passes and row/column labels
//! - **Board**: immutable snapshots and derived turn status
//! - **Realtime**: push-channel plumbing and the per-game [`RealtimeSession`]
//! - **Cursor**: keyboard selection bounded by the current board
//! - **API**: REST client for login, game lists, snapshots and chat tokens
//! - **Config**: settings, themes and the cached login
//!
//! # Example
//!
//! ```no_run
//! use goterm::{OgsClient, RealtimeSession, WebSocketConnector};
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let mut client = OgsClient::new("https://online-go.com".into(), "client-id".into())?;
//! let player = client.login_refresh_token("refresh-token").await?;
//!
//! let session = RealtimeSession::new(
//!     Arc::new(client),
//!     Arc::new(WebSocketConnector::new(
//!         "wss://online-go.com/socket.io/?EIO=3&transport=websocket",
//!     )),
//!     player.identity(),
//! );
//! session.connect(12345, None).await?;
//! session.authenticate().await?;
//! session.pass()?;
//! session.disconnect();
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Private module declarations
mod api;
mod board;
mod config;
mod cursor;
mod error;
mod identity;
mod realtime;

/// Coordinate notation and display labels.
pub mod coords;

// Crate-level exports - Errors
pub use error::{ErrorCategory, ErrorKind, GoError, GoResult};

// Crate-level exports - Identity
pub use identity::{GameId, Identity, PlayerId};

// Crate-level exports - Board model
pub use board::{BoardSnapshot, Cell, Phase, TurnStatus, TurnTracker};
pub use coords::Position;
pub use cursor::SelectionCursor;

// Crate-level exports - Realtime
pub use realtime::{
    AuthenticateRequest, ClockEvent, ConnectionState, Frame, GameConnectRequest, GameDataEvent,
    GameDataHandler, GameDisconnectRequest, MoveEvent, MoveRequest, MoveStatus, Outgoing,
    PlayedMove, PushChannel, PushConnector, PushEvent, RawEvent, RealtimeSession, SessionView,
    SocketIoChannel, WebSocketConnector, clock_topic, decode_frame, encode_event, gamedata_topic,
    move_topic,
};

// Crate-level exports - REST API
pub use api::{GameApi, GameList, GamePlayers, GameSummary, OauthResponse, OgsClient, Player, UiConfig};

// Crate-level exports - Configuration
pub use config::{
    AuthCache, CLIENT_ID_VAR, DEFAULT_BASE_URL, DEFAULT_SOCKET_URL, Palette, Settings, Symbols,
    Theme, ThemePreset, default_config_dir,
};
