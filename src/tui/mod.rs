//! Terminal UI: game browser and board view.

mod app;
mod input;
mod ui;

use anyhow::Result;
use app::{App, Command, UiEvent};
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use goterm::{GameDataEvent, GameId, OgsClient, RealtimeSession, Theme};
use ratatui::{Terminal, backend::CrosstermBackend};
use std::io::{self, Stdout};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument};

const INPUT_POLL: Duration = Duration::from_millis(50);

/// What the UI needs from the rest of the program.
pub struct TuiContext {
    /// Authenticated REST client.
    pub client: Arc<OgsClient>,
    /// Session reused for every game opened.
    pub session: RealtimeSession,
    /// Board theme.
    pub theme: Theme,
    /// Open this game directly instead of showing the browser.
    pub start_game: Option<GameId>,
}

/// Runs the TUI until the user quits.
pub async fn run_tui(ctx: TuiContext) -> Result<()> {
    info!("Starting goterm TUI");

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, ctx).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = &res {
        error!(error = ?err, "UI loop error");
    }
    res
}

/// Spawns background work and routes its result back to the UI loop.
struct Executor {
    client: Arc<OgsClient>,
    session: RealtimeSession,
    tx: mpsc::UnboundedSender<UiEvent>,
}

impl Executor {
    #[instrument(skip(self))]
    fn run(&self, command: Command) {
        match command {
            Command::RefreshGames => {
                let client = Arc::clone(&self.client);
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    let games = client.games_list().await;
                    let _ = tx.send(UiEvent::GamesLoaded(games));
                });
            }
            Command::OpenGame(game_id) => {
                let session = self.session.clone();
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    let event = open_game(&session, game_id, tx.clone()).await;
                    let _ = tx.send(event);
                });
            }
            Command::RefreshBoard => {
                let session = self.session.clone();
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    let refreshed = session.refresh_snapshot().await.map(|_| ());
                    let _ = tx.send(UiEvent::BoardRefreshed(refreshed));
                });
            }
        }
    }
}

async fn open_game(
    session: &RealtimeSession,
    game_id: GameId,
    tx: mpsc::UnboundedSender<UiEvent>,
) -> UiEvent {
    let move_tx = tx.clone();
    session.on_move(move |played| {
        let _ = move_tx.send(UiEvent::MovePlayed(*played));
    });
    let clock_tx = tx.clone();
    session.on_clock(move |_| {
        let _ = clock_tx.send(UiEvent::ClockTick);
    });
    let connected = session
        .connect(
            game_id,
            Some(Box::new(move |data: &GameDataEvent| {
                let _ = tx.send(UiEvent::GameData(data.clone()));
            })),
        )
        .await;
    let authenticated = match connected {
        Ok(()) => Some(session.authenticate().await),
        Err(_) => None,
    };
    UiEvent::GameOpened {
        game_id,
        connected,
        authenticated,
    }
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    ctx: TuiContext,
) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut app = App::new(ctx.session.clone(), ctx.theme, ctx.start_game.is_some());
    let executor = Executor {
        client: ctx.client,
        session: ctx.session,
        tx,
    };

    let first = match ctx.start_game {
        Some(game_id) => Command::OpenGame(game_id),
        None => Command::RefreshGames,
    };
    app.begin(first);
    executor.run(first);

    loop {
        terminal.draw(|frame| ui::draw(frame, &app))?;

        while let Ok(event) = rx.try_recv() {
            debug!(?event, "UI event");
            app.handle_event(event);
        }
        if app.should_quit() {
            break;
        }

        if event::poll(INPUT_POLL)? {
            if let Event::Key(key) = event::read()? {
                if let Some(command) = app.handle_key(key) {
                    app.begin(command);
                    executor.run(command);
                }
            }
        }
    }

    executor.session.disconnect();
    info!("TUI exited");
    Ok(())
}
