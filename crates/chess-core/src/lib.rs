//! Core chess vocabulary.
//!
//! This crate provides the value types shared by the rules crate and the
//! engine bridge:
//! - [`Piece`] and [`Color`] for piece representation
//! - [`Square`], [`File`], and [`Rank`] for board coordinates
//! - [`Move`] and [`MoveFlag`]
//! - [`CastlingRights`]
//! - [`Fen`] parsing and serialization

mod castling;
mod color;
mod fen;
mod mov;
mod piece;
mod square;

pub use castling::CastlingRights;
pub use color::Color;
pub use fen::{Fen, FenError, Occupant, Placement};
pub use mov::{Move, MoveFlag};
pub use piece::Piece;
pub use square::{File, Rank, Square};
