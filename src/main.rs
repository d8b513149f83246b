//! goterm - terminal client for online-go.com
//!
//! Logs in, lists active games and plays them in a board view.

#![warn(missing_docs)]

mod cli;
mod tui;

use anyhow::{Context, Result, bail};
use clap::Parser;
use cli::{Cli, Command};
use goterm::{AuthCache, ErrorKind, OgsClient, Player, RealtimeSession, Settings, WebSocketConnector};
use std::io::{BufRead, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const LOG_FILE: &str = "goterm.log";
const DEFAULT_FILTER: &str = "info,goterm=debug";
const PASSWORD_VAR: &str = "OGS_PASSWORD";

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    initialize_tracing(cli.is_interactive())?;

    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(preset) = cli.theme {
        info!(theme = %preset, "Using built-in theme");
        settings = settings.with_preset(preset);
    }
    let auth_path = cli.auth_file.clone().unwrap_or_else(AuthCache::default_path);

    match cli.command {
        Some(Command::Login { username }) => run_login(&settings, &auth_path, username).await,
        Some(Command::Games) => run_games(&settings, &auth_path).await,
        Some(Command::Play { game_id }) => run_tui(settings, &auth_path, Some(game_id)).await,
        None => run_tui(settings, &auth_path, None).await,
    }
}

/// Logs to a file while the TUI owns the terminal, to stderr otherwise.
fn initialize_tracing(to_file: bool) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    if to_file {
        let log_file = std::fs::File::create(LOG_FILE)
            .with_context(|| format!("Failed to create {LOG_FILE}"))?;
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(Arc::new(log_file))
                    .with_ansi(false),
            )
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()?;
    }
    Ok(())
}

fn new_client(settings: &Settings) -> Result<OgsClient> {
    if settings.client_id().is_empty() {
        bail!(
            "No OAuth client id configured; set {} or client_id in the config file",
            goterm::CLIENT_ID_VAR
        );
    }
    Ok(OgsClient::new(
        settings.base_url().clone(),
        settings.client_id().clone(),
    )?)
}

fn store_login(client: &OgsClient, player: &Player, auth_path: &Path) -> Result<()> {
    let Some(refresh_token) = client.refresh_token() else {
        warn!("Service returned no refresh token; login not cached");
        return Ok(());
    };
    AuthCache::new(
        player.username().clone(),
        *player.id(),
        refresh_token.to_string(),
    )
    .save(auth_path)?;
    Ok(())
}

/// Logs in with the cached refresh token and caches the rotated one.
#[instrument(skip(settings), fields(auth_path = %auth_path.display()))]
async fn authenticated_client(settings: &Settings, auth_path: &Path) -> Result<(OgsClient, Player)> {
    let cache = AuthCache::load(auth_path)?;
    if !cache.has_token() {
        bail!("Not logged in; run `goterm login` first");
    }
    let mut client = new_client(settings)?;
    let player = match client.login_refresh_token(cache.refresh_token()).await {
        Ok(player) => player,
        Err(e) if *e.kind() == ErrorKind::InvalidRefreshToken => {
            bail!("Cached login has expired; run `goterm login` again")
        }
        Err(e) => return Err(e.into()),
    };
    store_login(&client, &player, auth_path)?;
    Ok((client, player))
}

#[instrument(skip(settings), fields(auth_path = %auth_path.display()))]
async fn run_login(settings: &Settings, auth_path: &Path, username: Option<String>) -> Result<()> {
    let cached = AuthCache::load(auth_path)?;
    let username = match username {
        Some(name) => name,
        None if !cached.username().is_empty() => cached.username().clone(),
        None => prompt("Username: ")?,
    };
    let password = match std::env::var(PASSWORD_VAR) {
        Ok(password) => password,
        Err(_) => prompt("Password: ")?,
    };

    let mut client = new_client(settings)?;
    let player = client.login_password(&username, &password).await?;
    store_login(&client, &player, auth_path)?;
    println!("Logged in as {player}");
    Ok(())
}

fn prompt(label: &str) -> Result<String> {
    let mut stdout = std::io::stdout();
    write!(stdout, "{label}")?;
    stdout.flush()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

#[instrument(skip(settings), fields(auth_path = %auth_path.display()))]
async fn run_games(settings: &Settings, auth_path: &Path) -> Result<()> {
    let (client, _) = authenticated_client(settings, auth_path).await?;
    let games = client.games_list().await?;
    let active: Vec<_> = games.into_iter().filter(|g| !g.is_over()).collect();
    if active.is_empty() {
        println!("No active games.");
    }
    for game in active {
        println!("{:>10}  {}  {}", game.id(), game.name(), game.description());
    }
    Ok(())
}

#[instrument(skip(settings), fields(auth_path = %auth_path.display()))]
async fn run_tui(settings: Settings, auth_path: &Path, start_game: Option<i64>) -> Result<()> {
    let (client, player) = authenticated_client(&settings, auth_path).await?;
    let client = Arc::new(client);
    let connector = Arc::new(WebSocketConnector::new(settings.socket_url().clone()));
    let session = RealtimeSession::new(client.clone(), connector, player.identity());
    info!(player = %player, "Logged in");

    tui::run_tui(tui::TuiContext {
        client,
        session,
        theme: *settings.theme(),
        start_game,
    })
    .await
}
