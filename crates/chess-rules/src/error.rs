//! Error types for move input, timeline navigation and PGN import.

use chess_core::FenError;
use thiserror::Error;

/// A move could not be parsed or is not legal in the position.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MoveError {
    #[error("illegal move: {0}")]
    Illegal(String),

    #[error("ambiguous move: {0} matches more than one legal move")]
    Ambiguous(String),

    #[error("unknown move: {0}")]
    Unknown(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TimelineError {
    #[error("nothing to undo")]
    NothingToUndo,

    #[error("nothing to redo")]
    NothingToRedo,
}

/// A PGN document was rejected. The game being loaded is discarded whole.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PgnError {
    #[error("malformed PGN at byte {offset}: {reason}")]
    Malformed { offset: usize, reason: String },

    #[error("move {ply} ({token}) is not playable: {source}")]
    IllegalMove {
        ply: usize,
        token: String,
        #[source]
        source: MoveError,
    },

    #[error("invalid FEN tag: {0}")]
    InvalidFen(#[from] FenError),
}
