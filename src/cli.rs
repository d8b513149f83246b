//! Command-line interface for goterm.

use clap::{Parser, Subcommand};
use goterm::{GameId, ThemePreset};
use std::path::PathBuf;

/// goterm - play Go on online-go.com from the terminal
#[derive(Parser, Debug)]
#[command(name = "goterm")]
#[command(about = "Terminal client for online-go.com", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Settings file (defaults to the config directory's config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Cached login file (defaults to the config directory's auth.toml)
    #[arg(long, global = true)]
    pub auth_file: Option<PathBuf>,

    /// Built-in board theme: default, vaporwave, unicode, catdog or hongoku
    #[arg(long, global = true)]
    pub theme: Option<ThemePreset>,

    /// Subcommand to run; the game browser when omitted
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Log in and cache a refresh token
    Login {
        /// Account name (defaults to the cached one)
        #[arg(short, long)]
        username: Option<String>,
    },

    /// Print your active games
    Games,

    /// Open the board view for one game
    Play {
        /// Game id, as shown in the game URL
        game_id: GameId,
    },
}

impl Cli {
    /// True when the command takes over the terminal.
    pub fn is_interactive(&self) -> bool {
        matches!(self.command, None | Some(Command::Play { .. }))
    }
}
