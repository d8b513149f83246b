//! Explicit authenticated-player context.

use derive_getters::Getters;
use derive_new::new;
use serde::{Deserialize, Serialize};

/// Service-wide player identifier.
pub type PlayerId = i64;

/// Service-wide game identifier.
pub type GameId = i64;

/// The logged-in player a session acts on behalf of.
///
/// Passed explicitly into sessions and turn queries instead of living in
/// process-wide state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Getters, Serialize, Deserialize, new)]
pub struct Identity {
    /// Player id as reported by the service.
    player_id: PlayerId,
    /// Login name, sent along with the chat token.
    username: String,
}
