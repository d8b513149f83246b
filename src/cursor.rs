//! Keyboard-driven selection of a board intersection.

use crate::board::BoardSnapshot;
use crate::coords::Position;
use tracing::{debug, instrument};

/// The currently highlighted intersection, if any.
///
/// The legal range always comes from the snapshot passed in; the cursor never
/// stores board dimensions of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SelectionCursor {
    /// Nothing highlighted.
    #[default]
    Unselected,
    /// Highlighting `(x, y)`.
    At {
        /// Column.
        x: usize,
        /// Row (storage order).
        y: usize,
    },
}

impl SelectionCursor {
    /// Creates an unselected cursor.
    pub fn new() -> Self {
        Self::Unselected
    }

    /// Moves the selection by `(dx, dy)`.
    ///
    /// From [`SelectionCursor::Unselected`] the first move lands on the last
    /// move if it is on the board, otherwise on the centre cell, and the delta
    /// is not applied. A delta that would leave the board is rejected whole.
    /// On a finished board the cursor is forced back to unselected.
    #[instrument(skip(snapshot))]
    pub fn move_selection(&mut self, dx: i32, dy: i32, snapshot: &BoardSnapshot) {
        if snapshot.is_finished() {
            self.reset();
            return;
        }
        let (width, height) = (snapshot.width(), snapshot.height());
        match *self {
            SelectionCursor::Unselected => {
                let last = snapshot.last_move();
                let landing = if last.in_bounds(width, height) {
                    last
                } else {
                    snapshot.center_cell()
                };
                *self = SelectionCursor::At {
                    x: landing.x as usize,
                    y: landing.y as usize,
                };
            }
            SelectionCursor::At { x, y } => {
                let target = (x as i32)
                    .checked_add(dx)
                    .zip((y as i32).checked_add(dy))
                    .map(|(tx, ty)| Position::new(tx, ty))
                    .filter(|target| target.in_bounds(width, height));
                match target {
                    Some(target) => {
                        *self = SelectionCursor::At {
                            x: target.x as usize,
                            y: target.y as usize,
                        };
                    }
                    None => debug!(dx, dy, "Selection delta rejected"),
                }
            }
        }
    }

    /// Clears the selection.
    pub fn reset(&mut self) {
        *self = SelectionCursor::Unselected;
    }

    /// The selected intersection, or `None`.
    pub fn selected(&self) -> Option<Position> {
        match *self {
            SelectionCursor::Unselected => None,
            SelectionCursor::At { x, y } => Some(Position::new(x as i32, y as i32)),
        }
    }

    /// True if `(x, y)` is the highlighted cell.
    pub fn is_at(&self, x: usize, y: usize) -> bool {
        *self == SelectionCursor::At { x, y }
    }
}
