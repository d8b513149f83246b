//! Conversion between wire move notation and board grid positions.
//!
//! The service writes a position as two lowercase letters, column first:
//! `"aa"` is the top-left intersection, `"ba"` is one to the right of it and
//! `"bc"` two rows below that. A pass is written `".."`.
//!
//! Grid rows are stored top-down (row 0 is the top edge), while the labels a
//! player reads count upwards from the bottom edge. [`display_row`] and
//! [`storage_row`] convert between the two orders.

use crate::error::{ErrorKind, GoError, GoResult};
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Wire notation for a pass.
pub const PASS_NOTATION: &str = "..";

/// Largest board edge the lowercase alphabet can address.
pub const MAX_COORDINATE: i32 = 26;

/// A board intersection, `x` = column and `y` = row, both 0-indexed from the top left.
///
/// The sentinel [`Position::PASS`] (`-1, -1`) denotes a pass and has no grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    /// Column.
    pub x: i32,
    /// Row as stored by the service (row 0 = top).
    pub y: i32,
}

impl Position {
    /// The pass sentinel.
    pub const PASS: Position = Position { x: -1, y: -1 };

    /// Creates a position.
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// True if this is the pass sentinel.
    pub fn is_pass(self) -> bool {
        self == Self::PASS
    }

    /// True if the position addresses a cell on a `width` x `height` board.
    pub fn in_bounds(self, width: usize, height: usize) -> bool {
        self.x >= 0 && self.y >= 0 && (self.x as usize) < width && (self.y as usize) < height
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_pass() {
            write!(f, "pass")
        } else {
            write!(f, "({}, {})", self.x, self.y)
        }
    }
}

/// Encodes a position into two-letter wire notation.
///
/// # Errors
///
/// [`ErrorKind::UnsupportedCoordinate`] if either axis is negative (other than
/// the pass sentinel) or `>= 26`.
#[instrument]
pub fn encode(pos: Position) -> GoResult<String> {
    if pos.is_pass() {
        return Ok(PASS_NOTATION.to_string());
    }
    Ok([axis_letter(pos.x)?, axis_letter(pos.y)?].iter().collect())
}

/// Decodes two-letter wire notation into a position.
///
/// # Errors
///
/// [`ErrorKind::MalformedCoordinate`] if the input is not exactly two bytes,
/// [`ErrorKind::UnsupportedCoordinate`] if a byte is outside `'a'..='z'`.
#[instrument]
pub fn decode(notation: &str) -> GoResult<Position> {
    if notation == PASS_NOTATION {
        return Ok(Position::PASS);
    }
    let bytes = notation.as_bytes();
    if bytes.len() % 2 == 1 {
        return Err(GoError::new(ErrorKind::MalformedCoordinate(
            notation.to_string(),
        )));
    }
    let axes = bytes
        .iter()
        .map(|b| letter_axis(*b))
        .collect::<GoResult<Vec<_>>>()?;
    match axes.as_slice() {
        [x, y] => Ok(Position::new(*x, *y)),
        _ => Err(GoError::new(ErrorKind::MalformedCoordinate(
            notation.to_string(),
        ))),
    }
}

/// Decodes a flat string of coordinate pairs, left to right in two-byte strides.
///
/// Used for the sparse legacy move lists. An odd total length is malformed.
#[instrument]
pub fn decode_sequence(notation: &str) -> GoResult<Vec<Position>> {
    if notation.len() % 2 == 1 {
        return Err(GoError::new(ErrorKind::MalformedCoordinate(
            notation.to_string(),
        )));
    }
    notation
        .as_bytes()
        .chunks(2)
        .map(|pair| match pair {
            [b'.', b'.'] => Ok(Position::PASS),
            [x, y] => Ok(Position::new(letter_axis(*x)?, letter_axis(*y)?)),
            _ => Err(GoError::new(ErrorKind::MalformedCoordinate(
                notation.to_string(),
            ))),
        })
        .collect()
}

/// Row label shown to the player for storage row `y` on a board of `height` rows.
///
/// Labels count from 1 at the bottom edge, so storage row 0 is labelled `height`.
pub fn display_row(y: usize, height: usize) -> usize {
    height.saturating_sub(y)
}

/// Storage row for the 1-based row label shown to the player.
pub fn storage_row(label: usize, height: usize) -> usize {
    height.saturating_sub(label)
}

/// Column label shown to the player (`A`, `B`, ...), or the full-width form.
pub fn column_label(x: usize, full_width: bool) -> char {
    let base = if full_width { 'Ａ' } else { 'A' };
    char::from_u32(base as u32 + x as u32).unwrap_or('?')
}

fn axis_letter(v: i32) -> GoResult<char> {
    if !(0..MAX_COORDINATE).contains(&v) {
        return Err(GoError::new(ErrorKind::UnsupportedCoordinate(format!(
            "axis value {v} cannot be written with a lowercase letter"
        ))));
    }
    Ok((b'a' + v as u8) as char)
}

fn letter_axis(b: u8) -> GoResult<i32> {
    if b.is_ascii_lowercase() {
        Ok((b - b'a') as i32)
    } else {
        Err(GoError::new(ErrorKind::UnsupportedCoordinate(format!(
            "byte {b:#04x} is not a lowercase letter"
        ))))
    }
}
