//! Immutable board snapshots decoded from the service's state payload.

use crate::coords::Position;
use crate::error::{ErrorKind, GoError, GoResult};
use crate::identity::PlayerId;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Occupancy of a single intersection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Cell {
    /// No stone.
    #[default]
    Empty,
    /// Black stone.
    Black,
    /// White stone.
    White,
}

impl TryFrom<u8> for Cell {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Cell::Empty),
            1 => Ok(Cell::Black),
            2 => Ok(Cell::White),
            other => Err(format!("cell value {other} is not 0, 1 or 2")),
        }
    }
}

impl From<Cell> for u8 {
    fn from(cell: Cell) -> Self {
        match cell {
            Cell::Empty => 0,
            Cell::Black => 1,
            Cell::White => 2,
        }
    }
}

/// High-level stage of a game.
///
/// Unrecognized phase names are kept as [`Phase::Other`] and never count as finished.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Phase {
    /// Stones are being played.
    #[default]
    Play,
    /// Players are marking dead stones.
    StoneRemoval,
    /// The game is over.
    Finished,
    /// Any phase name this client does not know.
    Other(String),
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Play => write!(f, "play"),
            Phase::StoneRemoval => write!(f, "stone removal"),
            Phase::Finished => write!(f, "finished"),
            Phase::Other(name) => write!(f, "{name}"),
        }
    }
}

impl From<String> for Phase {
    fn from(name: String) -> Self {
        match name.as_str() {
            "play" => Phase::Play,
            "stone removal" | "stone-removal" => Phase::StoneRemoval,
            "finished" => Phase::Finished,
            _ => Phase::Other(name),
        }
    }
}

impl From<Phase> for String {
    fn from(phase: Phase) -> Self {
        phase.to_string()
    }
}

/// Last-move coordinates as the state endpoint writes them.
#[derive(Debug, Clone, Copy, Deserialize)]
struct LastMovePayload {
    x: i32,
    y: i32,
}

impl Default for LastMovePayload {
    fn default() -> Self {
        Self { x: -1, y: -1 }
    }
}

/// The game-state payload exactly as fetched.
#[derive(Debug, Clone, Deserialize)]
struct SnapshotPayload {
    #[serde(default)]
    width: Option<usize>,
    #[serde(default)]
    height: Option<usize>,
    move_number: i64,
    player_to_move: PlayerId,
    #[serde(default)]
    phase: Phase,
    board: Vec<Vec<Cell>>,
    #[serde(default)]
    outcome: Option<String>,
    #[serde(default)]
    removal: serde_json::Value,
    #[serde(default)]
    last_move: LastMovePayload,
}

/// One complete, immutable view of a game's board.
///
/// Cells are indexed `cells[y][x]` with row 0 at the top.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardSnapshot {
    width: usize,
    height: usize,
    cells: Vec<Vec<Cell>>,
    removal: Vec<Vec<bool>>,
    move_number: i64,
    player_to_move: PlayerId,
    phase: Phase,
    last_move: Position,
    outcome: String,
}

impl BoardSnapshot {
    /// Decodes a snapshot from the raw JSON body of the state endpoint.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::MalformedSnapshot`] if the body is not a state payload or
    /// the grid disagrees with its declared dimensions.
    #[instrument(skip(body), fields(len = body.len()))]
    pub fn from_json(body: &str) -> GoResult<Self> {
        let payload: SnapshotPayload = serde_json::from_str(body)
            .map_err(|e| GoError::new(ErrorKind::MalformedSnapshot(e.to_string())))?;
        Self::from_payload(payload)
    }

    /// Decodes a snapshot from an already-parsed JSON value.
    #[instrument(skip(value))]
    pub fn from_value(value: serde_json::Value) -> GoResult<Self> {
        let payload: SnapshotPayload = serde_json::from_value(value)
            .map_err(|e| GoError::new(ErrorKind::MalformedSnapshot(e.to_string())))?;
        Self::from_payload(payload)
    }

    fn from_payload(payload: SnapshotPayload) -> GoResult<Self> {
        let height = payload.height.unwrap_or(payload.board.len());
        let width = payload
            .width
            .unwrap_or_else(|| payload.board.first().map_or(0, Vec::len));

        if width == 0 || height == 0 {
            return Err(GoError::new(ErrorKind::MalformedSnapshot(format!(
                "board must not be empty (got {width}x{height})"
            ))));
        }
        if payload.board.len() != height {
            return Err(GoError::new(ErrorKind::MalformedSnapshot(format!(
                "declared height {height} but grid has {} rows",
                payload.board.len()
            ))));
        }
        if let Some((y, row)) = payload
            .board
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != width)
        {
            return Err(GoError::new(ErrorKind::MalformedSnapshot(format!(
                "declared width {width} but row {y} has {} columns",
                row.len()
            ))));
        }

        // Removal marks are advisory; anything that doesn't fit the grid is dropped.
        let removal = match serde_json::from_value::<Vec<Vec<u8>>>(payload.removal) {
            Ok(rows) if rows.len() == height && rows.iter().all(|row| row.len() == width) => rows
                .into_iter()
                .map(|row| row.into_iter().map(|v| v != 0).collect())
                .collect(),
            _ => vec![vec![false; width]; height],
        };

        let snapshot = Self {
            width,
            height,
            cells: payload.board,
            removal,
            move_number: payload.move_number,
            player_to_move: payload.player_to_move,
            phase: payload.phase,
            last_move: Position::new(payload.last_move.x, payload.last_move.y),
            outcome: payload.outcome.unwrap_or_default(),
        };
        debug!(
            width,
            height,
            move_number = snapshot.move_number,
            phase = %snapshot.phase,
            "Decoded board snapshot"
        );
        Ok(snapshot)
    }

    /// Board width.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Board height.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Grid rows, top row first.
    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.cells
    }

    /// Occupancy at `(x, y)`, or `None` when off the board.
    pub fn cell(&self, x: usize, y: usize) -> Option<Cell> {
        self.cells.get(y).and_then(|row| row.get(x)).copied()
    }

    /// True when the stone at `(x, y)` is marked dead during stone removal.
    pub fn is_marked_for_removal(&self, x: usize, y: usize) -> bool {
        self.removal
            .get(y)
            .and_then(|row| row.get(x))
            .copied()
            .unwrap_or(false)
    }

    /// Number of moves played so far.
    pub fn move_number(&self) -> i64 {
        self.move_number
    }

    /// Player expected to move next. Meaningless once finished.
    pub fn player_to_move(&self) -> PlayerId {
        self.player_to_move
    }

    /// Current phase.
    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    /// Last move played; may be [`Position::PASS`].
    pub fn last_move(&self) -> Position {
        self.last_move
    }

    /// Result text, only meaningful once finished.
    pub fn outcome(&self) -> &str {
        &self.outcome
    }

    /// True iff the phase is finished.
    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Finished
    }

    /// True iff the game is running and `local_player` is to move.
    pub fn is_my_turn(&self, local_player: PlayerId) -> bool {
        !self.is_finished() && self.player_to_move == local_player
    }

    /// True iff the last move was a pass.
    pub fn was_last_move_pass(&self) -> bool {
        self.last_move.is_pass()
    }

    /// Centre intersection, using floor division.
    pub fn center_cell(&self) -> Position {
        Position::new((self.width / 2) as i32, (self.height / 2) as i32)
    }

    /// True if both snapshots describe boards of the same size.
    pub fn same_dimensions(&self, other: &BoardSnapshot) -> bool {
        self.width == other.width && self.height == other.height
    }
}
