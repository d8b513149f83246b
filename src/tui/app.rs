//! Application state and key handling.

use super::input::{InputAction, map_key};
use chrono::{DateTime, Local};
use crossterm::event::KeyEvent;
use goterm::{
    GameDataEvent, GameId, GameSummary, GoError, GoResult, MoveEvent, MoveStatus, PlayerId,
    RealtimeSession, SessionView, Theme, coords,
};
use tracing::{debug, info, warn};

/// Results of background work, delivered to the UI loop.
#[derive(Debug)]
pub enum UiEvent {
    /// The active-games list arrived.
    GamesLoaded(GoResult<Vec<GameSummary>>),
    /// Connecting to a game finished.
    GameOpened {
        /// Game that was opened.
        game_id: GameId,
        /// Connect outcome.
        connected: GoResult<()>,
        /// Authentication outcome, when connect succeeded.
        authenticated: Option<GoResult<()>>,
    },
    /// Full game data was broadcast.
    GameData(GameDataEvent),
    /// A move was played.
    MovePlayed(MoveEvent),
    /// A manual board refresh finished.
    BoardRefreshed(GoResult<()>),
    /// The clock ticked.
    ClockTick,
}

/// Background work requested by a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Reload the active-games list.
    RefreshGames,
    /// Connect to a game.
    OpenGame(GameId),
    /// Refetch the board of the open game.
    RefreshBoard,
}

/// Which screen is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    /// Active-games list.
    Browser,
    /// Board view.
    Game,
}

/// Main application state.
pub struct App {
    session: RealtimeSession,
    theme: Theme,
    screen: Screen,
    games: Vec<GameSummary>,
    selected_game: usize,
    last_refresh: Option<DateTime<Local>>,
    status: String,
    loading: bool,
    single_game: bool,
    should_quit: bool,
}

impl App {
    /// Creates the app. With `single_game`, leaving the board quits.
    pub fn new(session: RealtimeSession, theme: Theme, single_game: bool) -> Self {
        Self {
            session,
            theme,
            screen: Screen::Browser,
            games: Vec::new(),
            selected_game: 0,
            last_refresh: None,
            status: String::new(),
            loading: true,
            single_game,
            should_quit: false,
        }
    }

    /// Current screen.
    pub fn screen(&self) -> Screen {
        self.screen
    }

    /// Board theme.
    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    /// Games listed in the browser.
    pub fn games(&self) -> &[GameSummary] {
        &self.games
    }

    /// Index of the highlighted game.
    pub fn selected_game(&self) -> usize {
        self.selected_game
    }

    /// Time of the last successful list refresh.
    pub fn last_refresh(&self) -> Option<DateTime<Local>> {
        self.last_refresh
    }

    /// Status line text.
    pub fn status(&self) -> &str {
        &self.status
    }

    /// True while background work the user is waiting on is in flight.
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// True once the user asked to quit.
    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    /// The local player.
    pub fn player_id(&self) -> PlayerId {
        *self.session.identity().player_id()
    }

    /// Everything the board screen draws.
    pub fn view(&self) -> SessionView {
        self.session.view()
    }

    /// Marks background work as started.
    pub fn begin(&mut self, command: Command) {
        debug!(?command, "Starting background work");
        self.loading = true;
        if let Command::OpenGame(game_id) = command {
            self.status = format!("Connecting to game {game_id}...");
        }
    }

    /// Handles a key press, returning background work to start.
    pub fn handle_key(&mut self, key: KeyEvent) -> Option<Command> {
        let action = map_key(key)?;
        if action == InputAction::Quit {
            self.quit();
            return None;
        }
        match self.screen {
            Screen::Browser => self.handle_browser_key(action),
            Screen::Game => self.handle_game_key(action),
        }
    }

    fn handle_browser_key(&mut self, action: InputAction) -> Option<Command> {
        match action {
            InputAction::Move { dy, .. } if !self.games.is_empty() => {
                let last = self.games.len() - 1;
                self.selected_game = if dy < 0 {
                    self.selected_game.saturating_sub(1)
                } else {
                    (self.selected_game + 1).min(last)
                };
                None
            }
            InputAction::Confirm if !self.loading => self
                .games
                .get(self.selected_game)
                .map(|game| Command::OpenGame(*game.id())),
            InputAction::Refresh => Some(Command::RefreshGames),
            InputAction::Back => {
                self.quit();
                None
            }
            _ => None,
        }
    }

    fn handle_game_key(&mut self, action: InputAction) -> Option<Command> {
        match action {
            InputAction::Move { dx, dy } => {
                self.session.move_selection(dx, dy);
                None
            }
            InputAction::Confirm => {
                if let Some(pos) = self.session.selected() {
                    let result = self.session.submit_move(pos.x, pos.y);
                    self.report_move(result);
                }
                None
            }
            InputAction::Pass => {
                let result = self.session.pass();
                self.report_move(result);
                None
            }
            InputAction::Back => {
                if self.session.selected().is_some() {
                    self.session.reset_selection();
                    return None;
                }
                self.leave_game()
            }
            InputAction::Refresh => Some(Command::RefreshBoard),
            InputAction::Quit => None,
        }
    }

    fn report_move(&mut self, result: GoResult<MoveStatus>) {
        self.status = match result {
            Ok(MoveStatus::Sent) => "Move sent.".to_string(),
            Ok(MoveStatus::AlreadyFinished) => "The game is over.".to_string(),
            Ok(MoveStatus::NotAuthenticated) => {
                "Not authenticated; this board is read-only.".to_string()
            }
            Err(e) => error_status("Move failed", &e),
        };
    }

    fn leave_game(&mut self) -> Option<Command> {
        info!(game_id = ?self.session.game_id(), "Leaving game");
        self.session.disconnect();
        if self.single_game {
            self.should_quit = true;
            return None;
        }
        self.screen = Screen::Browser;
        self.status.clear();
        Some(Command::RefreshGames)
    }

    fn quit(&mut self) {
        info!("User quit");
        self.session.disconnect();
        self.should_quit = true;
    }

    /// Applies the result of background work.
    pub fn handle_event(&mut self, event: UiEvent) {
        match event {
            UiEvent::GamesLoaded(Ok(games)) => {
                self.loading = false;
                self.games = games.into_iter().filter(|g| !g.is_over()).collect();
                self.selected_game = self.selected_game.min(self.games.len().saturating_sub(1));
                self.last_refresh = Some(Local::now());
                debug!(count = self.games.len(), "Game list updated");
            }
            UiEvent::GamesLoaded(Err(e)) => {
                self.loading = false;
                self.status = error_status("Could not load games", &e);
            }
            UiEvent::GameOpened {
                game_id,
                connected,
                authenticated,
            } => {
                self.loading = false;
                match (connected, authenticated) {
                    (Ok(()), Some(Err(e))) => {
                        self.screen = Screen::Game;
                        self.status = error_status("Watching only", &e);
                    }
                    (Ok(()), _) => {
                        self.screen = Screen::Game;
                        self.status = format!("Connected to game {game_id}.");
                    }
                    (Err(e), _) => {
                        self.status = error_status("Could not open game", &e);
                        if self.single_game {
                            self.should_quit = true;
                        }
                    }
                }
            }
            UiEvent::GameData(data) => {
                self.status = format!("Game is in {} phase.", data.phase);
            }
            UiEvent::MovePlayed(played) => {
                self.status = if played.is_pass() {
                    format!("Move {}: pass.", played.move_number)
                } else {
                    let pos = played.played.position;
                    let height = self.view().snapshot.map_or(0, |s| s.height());
                    format!(
                        "Move {}: {}{}.",
                        played.move_number,
                        coords::column_label(pos.x.max(0) as usize, false),
                        coords::display_row(pos.y.max(0) as usize, height)
                    )
                };
            }
            UiEvent::BoardRefreshed(Ok(())) => {
                self.loading = false;
                self.status = "Board refreshed.".to_string();
            }
            UiEvent::BoardRefreshed(Err(e)) => {
                self.loading = false;
                self.status = error_status("Refresh failed", &e);
            }
            UiEvent::ClockTick => {}
        }
    }
}

fn error_status(context: &str, error: &GoError) -> String {
    warn!(error = %error, context, "Operation failed");
    let hint = if error.is_retryable() {
        " (press r or reopen to retry)"
    } else {
        ""
    };
    format!("{context}: {}{hint}", error.kind())
}
