//! Whose turn it is, derived from a snapshot and the local player.

use super::BoardSnapshot;
use crate::identity::PlayerId;
use tracing::instrument;

/// Turn status as presented to the player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnStatus {
    /// The game is over.
    Finished {
        /// Result text reported by the service.
        outcome: String,
    },
    /// The local player is to move.
    YourTurn {
        /// The previous turn was a pass.
        opponent_passed: bool,
    },
    /// Waiting for the opponent.
    OpponentsTurn {
        /// The previous turn was a pass.
        you_passed: bool,
    },
}

impl TurnStatus {
    /// Hint text for the side panel.
    pub fn hint(&self) -> String {
        match self {
            TurnStatus::Finished { outcome } => {
                format!("The game is over.\nOutcome: {outcome}")
            }
            TurnStatus::YourTurn { opponent_passed } => {
                format!("{}It is your turn.", pass_prefix(*opponent_passed))
            }
            TurnStatus::OpponentsTurn { you_passed } => {
                format!("{}It is your opponent's turn.", pass_prefix(*you_passed))
            }
        }
    }
}

fn pass_prefix(passed: bool) -> &'static str {
    if passed {
        "The previous turn was passed.\n\n"
    } else {
        ""
    }
}

/// Derives turn queries for one local player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnTracker {
    local_player: PlayerId,
}

impl TurnTracker {
    /// Creates a tracker for `local_player`.
    pub fn new(local_player: PlayerId) -> Self {
        Self { local_player }
    }

    /// The player this tracker answers for.
    pub fn local_player(&self) -> PlayerId {
        self.local_player
    }

    /// True iff the game is running and the local player is to move.
    pub fn is_my_turn(&self, snapshot: &BoardSnapshot) -> bool {
        snapshot.is_my_turn(self.local_player)
    }

    /// Full status for display.
    ///
    /// `realtime_finished` lets the push channel override a snapshot that lags
    /// behind a phase change; `last_turn_pass` comes from the latest move event
    /// and falls back to the snapshot's own last move. `clock_player` is the
    /// player whose clock started after this snapshot was taken and takes
    /// precedence over the snapshot's player to move.
    #[instrument(level = "trace", skip(self, snapshot), fields(move_number = snapshot.move_number()))]
    pub fn status(
        &self,
        snapshot: &BoardSnapshot,
        realtime_finished: bool,
        last_turn_pass: bool,
        clock_player: Option<PlayerId>,
    ) -> TurnStatus {
        if realtime_finished || snapshot.is_finished() {
            return TurnStatus::Finished {
                outcome: snapshot.outcome().to_string(),
            };
        }
        let passed =
            last_turn_pass || (snapshot.was_last_move_pass() && snapshot.move_number() > 0);
        let to_move = clock_player.unwrap_or_else(|| snapshot.player_to_move());
        if to_move == self.local_player {
            TurnStatus::YourTurn {
                opponent_passed: passed,
            }
        } else {
            TurnStatus::OpponentsTurn { you_passed: passed }
        }
    }
}
