//! Error types for the engine bridge.

use crate::session::SessionState;
use chess_rules::PgnError;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Faults of the engine session. None of them touch the game itself.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Failed to spawn engine: {0}")]
    Spawn(#[source] io::Error),
    #[error("Engine handshake failed: {0}")]
    Handshake(String),
    #[error("Engine process exited unexpectedly")]
    Crashed,
    #[error("Engine did not answer within {0:?}")]
    Timeout(Duration),
    #[error("Engine is not running (state: {0})")]
    NotRunning(SessionState),
    #[error("No position has been sent to the engine")]
    NoPosition,
    #[error("Analysis request was cancelled before it finished")]
    Cancelled,
    #[error("Engine I/O error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] io::Error),
    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Failed to encode config: {0}")]
    SerializeError(#[from] toml::ser::Error),
    #[error("Unknown config key '{0}'")]
    UnknownKey(String),
    #[error("Invalid value '{value}' for {key}")]
    InvalidValue { key: String, value: String },
}

/// Loading or saving a game file.
#[derive(Error, Debug)]
pub enum GameFileError {
    #[error("{0}")]
    Io(#[from] io::Error),
    #[error("{0}")]
    Pgn(#[from] PgnError),
}
