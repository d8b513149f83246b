//! Board state model and derived turn semantics.

mod snapshot;
mod turn;

pub use snapshot::{BoardSnapshot, Cell, Phase};
pub use turn::{TurnStatus, TurnTracker};
