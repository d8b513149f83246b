//! Key bindings.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// What a key press asks for, independent of the current screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputAction {
    /// Arrow key, as a board delta in storage order (up is `dy = -1`).
    Move {
        /// Column delta.
        dx: i32,
        /// Row delta.
        dy: i32,
    },
    /// Enter.
    Confirm,
    /// `p`.
    Pass,
    /// `q`: clear selection, leave the game or quit, depending on screen.
    Back,
    /// `r`.
    Refresh,
    /// Ctrl-C.
    Quit,
}

/// Maps a key event to an action. Releases and repeats are ignored.
pub fn map_key(key: KeyEvent) -> Option<InputAction> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(InputAction::Quit)
        }
        KeyCode::Up => Some(InputAction::Move { dx: 0, dy: -1 }),
        KeyCode::Down => Some(InputAction::Move { dx: 0, dy: 1 }),
        KeyCode::Left => Some(InputAction::Move { dx: -1, dy: 0 }),
        KeyCode::Right => Some(InputAction::Move { dx: 1, dy: 0 }),
        KeyCode::Enter => Some(InputAction::Confirm),
        KeyCode::Char('p') => Some(InputAction::Pass),
        KeyCode::Char('q') | KeyCode::Esc => Some(InputAction::Back),
        KeyCode::Char('r') => Some(InputAction::Refresh),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_arrows_map_to_storage_deltas() {
        assert_eq!(
            map_key(press(KeyCode::Up)),
            Some(InputAction::Move { dx: 0, dy: -1 })
        );
        assert_eq!(
            map_key(press(KeyCode::Right)),
            Some(InputAction::Move { dx: 1, dy: 0 })
        );
    }

    #[test]
    fn test_ctrl_c_quits_but_plain_c_does_nothing() {
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(map_key(ctrl_c), Some(InputAction::Quit));
        assert_eq!(map_key(press(KeyCode::Char('c'))), None);
    }

    #[test]
    fn test_release_is_ignored() {
        let mut key = press(KeyCode::Enter);
        key.kind = KeyEventKind::Release;
        assert_eq!(map_key(key), None);
    }
}
