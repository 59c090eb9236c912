use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

use thiserror::Error;

use crate::defines::Button;

/// Result alias for Engine Link operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Result alias for game-level operations.
pub type GameResult<T> = Result<T, GameError>;

/// Errors raised by an Engine Link while starting or talking to the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to start engine: {0}")]
    Start(String),
    #[error("engine terminated early with status {0}")]
    Exited(ExitStatus),
    #[error("engine did not report ready within {0:?}")]
    StartupTimeout(Duration),
    #[error("engine did not answer within {0:?}")]
    Unresponsive(Duration),
    #[error("engine link is not started")]
    NotStarted,
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("protocol error: {0}")]
    Protocol(#[from] serde_json::Error),
    #[error("unexpected engine reply: {0}")]
    UnexpectedReply(String),
    #[error("engine connection closed")]
    ConnectionClosed,
}

impl EngineError {
    pub(crate) fn start(err: impl Into<String>) -> Self {
        EngineError::Start(err.into())
    }

    pub(crate) fn unexpected(message: impl Into<String>) -> Self {
        EngineError::UnexpectedReply(message.into())
    }
}

/// Problems with a [`GameConfig`](crate::GameConfig) detected before the engine starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("config parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("required path is not set: {0}")]
    MissingPath(&'static str),
    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: &'static str, message: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field,
            message: message.into(),
        }
    }
}

/// Errors surfaced by [`DoomGame`](crate::DoomGame).
///
/// `InvalidAction` and `NotFound` are recoverable; `EngineLink` ends the current
/// episode and leaves the last snapshot readable.
#[derive(Debug, Error)]
pub enum GameError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("engine failed to initialize: {0}")]
    Initialization(#[source] EngineError),
    #[error("action has {got} values but {expected} buttons are available")]
    InvalidAction { expected: usize, got: usize },
    #[error("button {0} is not available")]
    NotFound(Button),
    #[error("engine link failed: {0}")]
    EngineLink(#[source] EngineError),
    #[error("game is not initialized")]
    NotInitialized,
    #[error("operation not permitted: {0}")]
    ModeViolation(String),
}
