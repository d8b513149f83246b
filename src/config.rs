//! Settings, board themes and the cached login.

use crate::error::{ErrorKind, GoError, GoResult};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// Default REST base URL.
pub const DEFAULT_BASE_URL: &str = "https://online-go.com";
/// Default realtime websocket URL.
pub const DEFAULT_SOCKET_URL: &str = "wss://online-go.com/socket.io/?EIO=3&transport=websocket";
/// Environment variable overriding the OAuth client id.
pub const CLIENT_ID_VAR: &str = "OGS_CLIENT_ID";

const CONFIG_FILE: &str = "config.toml";
const AUTH_FILE: &str = "auth.toml";

/// 256-colour palette indices used by the board view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct Palette {
    /// Empty intersection.
    board: u8,
    /// Empty intersection, alternate shade.
    board_alt: u8,
    /// Black stone.
    black: u8,
    /// Black stone, alternate shade.
    black_alt: u8,
    /// White stone.
    white: u8,
    /// White stone, alternate shade.
    white_alt: u8,
    /// Cursor foreground.
    cursor_fg: u8,
    /// Cursor background.
    cursor_bg: u8,
    /// Background behind the last played stone.
    last_played_bg: u8,
}

/// Characters drawn for each kind of cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct Symbols {
    /// Black stone.
    black: char,
    /// White stone.
    white: char,
    /// Empty intersection.
    board: char,
    /// Cursor on an empty intersection.
    cursor: char,
    /// Marker for the last played stone.
    last_played: char,
}

/// How the board is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct Theme {
    /// Paint stones with a background colour.
    draw_stone_bg: bool,
    /// Paint the cursor with a background colour.
    draw_cursor_bg: bool,
    /// Paint the last played stone with a background colour.
    draw_last_played_bg: bool,
    /// Use full-width column letters (for double-width symbols).
    fullwidth_letters: bool,
    /// Colours.
    colors: Palette,
    /// Symbols.
    symbols: Symbols,
}

impl Default for Theme {
    fn default() -> Self {
        Theme::preset(ThemePreset::Default)
    }
}

/// Built-in themes, selectable by name.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ThemePreset {
    /// Coloured blocks on a wooden board.
    #[default]
    Default,
    /// Pastel variant of the default.
    Vaporwave,
    /// Unicode stones.
    Unicode,
    /// Cats and dogs.
    Catdog,
    /// Kanji.
    Hongoku,
}

impl Theme {
    /// Builds a built-in theme.
    pub fn preset(preset: ThemePreset) -> Self {
        let base = Theme {
            draw_stone_bg: true,
            draw_cursor_bg: false,
            draw_last_played_bg: false,
            fullwidth_letters: false,
            colors: Palette {
                board: 220,
                board_alt: 221,
                black: 233,
                black_alt: 235,
                white: 255,
                white_alt: 254,
                cursor_fg: 2,
                cursor_bg: 4,
                last_played_bg: 2,
            },
            symbols: Symbols {
                black: ' ',
                white: ' ',
                board: ' ',
                cursor: 'X',
                last_played: '/',
            },
        };
        let unicode = Theme {
            draw_stone_bg: false,
            draw_cursor_bg: true,
            draw_last_played_bg: true,
            fullwidth_letters: true,
            symbols: Symbols {
                black: '⚫',
                white: '⚪',
                board: '➕',
                ..base.symbols
            },
            ..base
        };
        match preset {
            ThemePreset::Default => base,
            ThemePreset::Vaporwave => Theme {
                colors: Palette {
                    board: 251,
                    board_alt: 252,
                    black: 164,
                    black_alt: 165,
                    white: 87,
                    white_alt: 51,
                    ..base.colors
                },
                ..base
            },
            ThemePreset::Unicode => unicode,
            ThemePreset::Catdog => Theme {
                symbols: Symbols {
                    black: '😺',
                    white: '🐶',
                    ..unicode.symbols
                },
                ..unicode
            },
            ThemePreset::Hongoku => Theme {
                draw_cursor_bg: false,
                draw_last_played_bg: false,
                colors: Palette {
                    black: 0,
                    white: 0,
                    cursor_fg: 0,
                    ..unicode.colors
                },
                symbols: Symbols {
                    black: '黒',
                    white: '白',
                    board: '空',
                    cursor: '選',
                    last_played: '前',
                },
                ..unicode
            },
        }
    }

    /// Rejects symbols that would corrupt the terminal.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::Config`] if a stone or board symbol is a control character.
    pub fn validate(&self) -> GoResult<()> {
        for (name, symbol) in [
            ("black", self.symbols.black),
            ("white", self.symbols.white),
            ("board", self.symbols.board),
        ] {
            if is_forbidden_symbol(symbol) {
                return Err(GoError::new(ErrorKind::Config(format!(
                    "{name} symbol U+{:04X} is a control character; \
                     characters U+0000-U+001F and U+007F-U+009F are not allowed",
                    symbol as u32
                ))));
            }
        }
        Ok(())
    }
}

fn is_forbidden_symbol(c: char) -> bool {
    c < ' ' || ('\u{7f}'..='\u{9f}').contains(&c)
}

/// Client settings.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// REST base URL.
    base_url: String,
    /// Realtime websocket URL.
    socket_url: String,
    /// OAuth client id.
    client_id: String,
    /// Board theme.
    theme: Theme,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            socket_url: DEFAULT_SOCKET_URL.to_string(),
            client_id: String::new(),
            theme: Theme::default(),
        }
    }
}

impl Settings {
    /// Loads settings from `path`, or from the default location when `None`.
    ///
    /// A missing file yields defaults. `OGS_CLIENT_ID` overrides the file's
    /// client id. The result is validated.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::Config`] if the file cannot be read or parsed, or fails validation.
    #[instrument(skip(path))]
    pub fn load(path: Option<&Path>) -> GoResult<Self> {
        let path = path.map_or_else(|| default_config_dir().join(CONFIG_FILE), Path::to_path_buf);
        let mut settings: Self = read_toml(&path)?.unwrap_or_default();
        if let Ok(client_id) = std::env::var(CLIENT_ID_VAR) {
            debug!("Using client id from environment");
            settings.client_id = client_id.trim().to_string();
        }
        settings.validate()?;
        info!(base_url = %settings.base_url, "Settings loaded");
        Ok(settings)
    }

    /// Replaces the theme with a built-in preset.
    pub fn with_preset(mut self, preset: ThemePreset) -> Self {
        self.theme = Theme::preset(preset);
        self
    }

    /// Checks the settings for values the client cannot work with.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::Config`] describing the first problem found.
    pub fn validate(&self) -> GoResult<()> {
        if self.base_url.is_empty() || self.socket_url.is_empty() {
            return Err(GoError::new(ErrorKind::Config(
                "base_url and socket_url must not be empty".to_string(),
            )));
        }
        self.theme.validate()
    }
}

/// Login cached between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Getters, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthCache {
    /// Login name.
    username: String,
    /// Player id.
    user_id: i64,
    /// OAuth refresh token.
    refresh_token: String,
}

impl AuthCache {
    /// Creates a cache entry.
    pub fn new(username: String, user_id: i64, refresh_token: String) -> Self {
        Self {
            username,
            user_id,
            refresh_token,
        }
    }

    /// True if a refresh token is stored.
    pub fn has_token(&self) -> bool {
        !self.refresh_token.is_empty()
    }

    /// Default location of the cache file.
    pub fn default_path() -> PathBuf {
        default_config_dir().join(AUTH_FILE)
    }

    /// Loads the cache; a missing file yields an empty cache.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::Config`] if the file exists but cannot be read or parsed.
    #[instrument(fields(path = %path.display()))]
    pub fn load(path: &Path) -> GoResult<Self> {
        Ok(read_toml(path)?.unwrap_or_default())
    }

    /// Writes the cache, readable by the owner only.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::Config`] if the file or its directory cannot be written.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub fn save(&self, path: &Path) -> GoResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| config_error(format!("Failed to serialize auth cache: {e}")))?;
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .map_err(|e| config_error(format!("Failed to create {}: {e}", dir.display())))?;
        }
        write_private(path, content.as_bytes())
            .map_err(|e| config_error(format!("Failed to write {}: {e}", path.display())))?;
        info!("Auth cache saved");
        Ok(())
    }

    /// Deletes the cache file if present.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::Config`] if an existing file cannot be removed.
    #[instrument(fields(path = %path.display()))]
    pub fn clear(path: &Path) -> GoResult<()> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(config_error(format!(
                "Failed to remove {}: {e}",
                path.display()
            ))),
        }
    }
}

#[cfg(unix)]
fn write_private(path: &Path, content: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // `mode` only applies on creation.
    file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    file.write_all(content)
}

#[cfg(not(unix))]
fn write_private(path: &Path, content: &[u8]) -> std::io::Result<()> {
    std::fs::write(path, content)
}

#[track_caller]
fn config_error(message: String) -> GoError {
    GoError::new(ErrorKind::Config(message))
}

fn read_toml<T: serde::de::DeserializeOwned>(path: &Path) -> GoResult<Option<T>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "No file, using defaults");
            return Ok(None);
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Unreadable file");
            return Err(config_error(format!(
                "Failed to read {}: {e}",
                path.display()
            )));
        }
    };
    toml::from_str(&content)
        .map(Some)
        .map_err(|e| config_error(format!("Failed to parse {}: {e}", path.display())))
}

/// Directory holding the config and auth files.
///
/// Resolution order:
/// 1. `$GOTERM_CONFIG_DIR`
/// 2. `$XDG_CONFIG_HOME/goterm`
/// 3. `$HOME/.config/goterm`
/// 4. `.goterm` in the working directory
#[instrument]
pub fn default_config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("GOTERM_CONFIG_DIR") {
        debug!(path = %dir, "Using GOTERM_CONFIG_DIR env var");
        return PathBuf::from(dir);
    }
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("goterm");
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".config").join("goterm");
    }
    debug!("Falling back to ./.goterm");
    PathBuf::from(".goterm")
}
