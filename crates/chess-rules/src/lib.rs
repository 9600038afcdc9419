//! Chess rules on immutable positions, plus the game timeline built on them.
//!
//! This crate provides:
//! - [`Position`] - a full position as a plain value (8x8 board, side to
//!   move, castling rights, en passant square and clocks)
//! - [`legal_moves`] and [`apply_move`] - legality is decided by playing each
//!   candidate on a scratch copy and testing the mover's king
//! - SAN parsing and formatting ([`parse_algebraic`], [`move_to_san`])
//! - [`game_status`] - mate, stalemate and the draw rules
//! - [`GameTimeline`] - ply history with undo/redo and PGN import/export
//!
//! # Example
//!
//! ```
//! use chess_rules::{GameStatus, GameTimeline};
//!
//! let mut game = GameTimeline::new();
//! for san in ["f3", "e5", "g4", "Qh4#"] {
//!     game.make_move(san).unwrap();
//! }
//! assert_eq!(game.status(), GameStatus::Checkmate);
//! assert!(game.to_pgn().contains("2. g4 Qh4# 0-1"));
//! ```

mod error;
mod movegen;
mod perft;
mod pgn;
mod position;
mod san;
mod stats;
mod status;
mod timeline;
mod zobrist;

pub use error::{MoveError, PgnError, TimelineError};
pub use movegen::{apply_move, is_check, is_square_attacked, legal_moves};
pub use perft::{perft, perft_divide};
pub use pgn::PgnTags;
pub use position::Position;
pub use san::{move_to_san, parse_algebraic, parse_move, parse_uci};
pub use stats::{GameStatistics, MaterialCount};
pub use status::{game_status, is_insufficient_material, repetitions, GameStatus};
pub use timeline::{GameTimeline, Ply};
pub use zobrist::Fingerprint;
