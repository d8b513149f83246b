//! Error types for the game client core.

use derive_more::{Display, Error};
use tracing::instrument;

/// Broad classes of failure, used by the UI to pick a recovery strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ErrorCategory {
    /// A payload violated its shape invariants.
    #[display("malformed data")]
    MalformedData,
    /// The server broke a protocol invariant mid-game.
    #[display("protocol violation")]
    ProtocolViolation,
    /// Network-level failure; the operation may be retried.
    #[display("transport failure")]
    Transport,
    /// Credentials or the OAuth provider were rejected.
    #[display("authentication failure")]
    Authentication,
    /// An operation was called in a state that does not allow it.
    #[display("usage error")]
    Usage,
    /// Local configuration could not be read or is invalid.
    #[display("configuration error")]
    Configuration,
}

/// Specific error conditions.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum ErrorKind {
    /// Coordinate letter outside `'a'..='z'`, or a coordinate that cannot be encoded.
    #[display("unsupported coordinate: {_0}")]
    UnsupportedCoordinate(String),
    /// Coordinate string of the wrong length or shape.
    #[display("malformed coordinate: {_0:?}")]
    MalformedCoordinate(String),
    /// Snapshot payload does not describe a consistent board.
    #[display("malformed snapshot: {_0}")]
    MalformedSnapshot(String),
    /// Push event payload does not match its topic's shape.
    #[display("malformed event {topic}: {reason}")]
    MalformedEvent {
        /// Event name the payload arrived on.
        topic: String,
        /// Decoder message.
        reason: String,
    },
    /// Board dimensions changed while connected to the same game.
    #[display("board dimensions changed from {old_width}x{old_height} to {new_width}x{new_height}")]
    DimensionChanged {
        /// Width of the cached board.
        old_width: usize,
        /// Height of the cached board.
        old_height: usize,
        /// Width reported by the new snapshot.
        new_width: usize,
        /// Height reported by the new snapshot.
        new_height: usize,
    },
    /// The push channel could not be opened.
    #[display("connect failed: {_0}")]
    ConnectFailed(String),
    /// Network failure while talking to the service.
    #[display("transport error: {_0}")]
    Transport(String),
    /// The service answered with a non-success status.
    #[display("HTTP {status} calling {path}")]
    Http {
        /// Response status code.
        status: u16,
        /// Request path.
        path: String,
    },
    /// The session has no live connection.
    #[display("session is not connected")]
    NotConnected,
    /// The operation is not valid in the session's current state.
    #[display("invalid session state: {_0}")]
    InvalidState(String),
    /// Username/password rejected, or missing.
    #[display("invalid credentials: {_0}")]
    InvalidCredentials(String),
    /// Stored refresh token is no longer accepted.
    #[display("invalid refresh token")]
    InvalidRefreshToken,
    /// OAuth provider returned an error without a description.
    #[display("OAuth provider misconfigured: {_0}")]
    AuthProviderMisconfigured(String),
    /// Configuration file problem.
    #[display("config error: {_0}")]
    Config(String),
}

impl ErrorKind {
    /// Returns the broad category of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UnsupportedCoordinate(_)
            | Self::MalformedCoordinate(_)
            | Self::MalformedSnapshot(_)
            | Self::MalformedEvent { .. } => ErrorCategory::MalformedData,
            Self::DimensionChanged { .. } => ErrorCategory::ProtocolViolation,
            Self::ConnectFailed(_) | Self::Transport(_) | Self::Http { .. } => {
                ErrorCategory::Transport
            }
            Self::InvalidCredentials(_)
            | Self::InvalidRefreshToken
            | Self::AuthProviderMisconfigured(_) => ErrorCategory::Authentication,
            Self::NotConnected | Self::InvalidState(_) => ErrorCategory::Usage,
            Self::Config(_) => ErrorCategory::Configuration,
        }
    }
}

/// Client error with location tracking.
#[derive(Debug, Clone, Display, Error)]
#[display("{} at {}:{}", kind, file, line)]
pub struct GoError {
    /// What went wrong.
    pub kind: ErrorKind,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl GoError {
    /// Creates a new error with caller location tracking.
    #[track_caller]
    #[instrument(skip(kind))]
    pub fn new(kind: ErrorKind) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            kind,
            line: loc.line(),
            file: loc.file(),
        }
    }

    /// Returns the error kind.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Returns the broad category of this error.
    pub fn category(&self) -> ErrorCategory {
        self.kind.category()
    }

    /// True when retrying the same operation may succeed.
    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Transport
    }

    /// True when the session must be torn down rather than retried.
    pub fn is_protocol_violation(&self) -> bool {
        self.category() == ErrorCategory::ProtocolViolation
    }
}

impl From<ErrorKind> for GoError {
    #[track_caller]
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

impl From<reqwest::Error> for GoError {
    #[track_caller]
    fn from(err: reqwest::Error) -> Self {
        Self::new(ErrorKind::Transport(err.to_string()))
    }
}

/// Result alias for client operations.
pub type GoResult<T> = Result<T, GoError>;
