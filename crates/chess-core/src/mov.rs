//! Move representation.

use crate::{Piece, Square};
use std::fmt;

/// What kind of move this is, beyond its squares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MoveFlag {
    /// Quiet move.
    Normal,
    /// Captures the piece standing on the destination square.
    Capture,
    /// Pawn advances two squares from its starting rank.
    DoublePush,
    /// O-O.
    CastleKingside,
    /// O-O-O.
    CastleQueenside,
    /// Pawn captures a pawn that just double-pushed past it.
    EnPassant,
}

impl MoveFlag {
    #[inline]
    pub const fn is_castling(self) -> bool {
        matches!(self, MoveFlag::CastleKingside | MoveFlag::CastleQueenside)
    }

    #[inline]
    pub const fn is_capture(self) -> bool {
        matches!(self, MoveFlag::Capture | MoveFlag::EnPassant)
    }
}

/// A move from one square to another.
///
/// Moves produced by move generation carry the correct flag. Moves parsed
/// from coordinate notation only know their squares and promotion piece
/// and must be matched against the legal moves of a position.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Move {
    from: Square,
    to: Square,
    promotion: Option<Piece>,
    flag: MoveFlag,
}

impl Move {
    #[inline]
    pub const fn new(from: Square, to: Square, flag: MoveFlag) -> Self {
        Move {
            from,
            to,
            promotion: None,
            flag,
        }
    }

    /// A pawn move to the last rank. `flag` is `Normal` or `Capture`.
    #[inline]
    pub const fn promotion(from: Square, to: Square, piece: Piece, flag: MoveFlag) -> Self {
        Move {
            from,
            to,
            promotion: Some(piece),
            flag,
        }
    }

    #[inline]
    pub const fn from(self) -> Square {
        self.from
    }

    #[inline]
    pub const fn to(self) -> Square {
        self.to
    }

    #[inline]
    pub const fn flag(self) -> MoveFlag {
        self.flag
    }

    #[inline]
    pub const fn promotion_piece(self) -> Option<Piece> {
        self.promotion
    }

    #[inline]
    pub const fn is_capture(self) -> bool {
        self.flag.is_capture()
    }

    /// Returns the UCI notation for this move (e.g., "e2e4", "e7e8q").
    pub fn to_uci(self) -> String {
        match self.promotion {
            Some(piece) => format!("{}{}{}", self.from, self.to, piece.to_uci_char()),
            None => format!("{}{}", self.from, self.to),
        }
    }

    /// Parses the squares and promotion piece of a UCI move string.
    ///
    /// The returned move has a `Normal` flag; resolve it against a position's
    /// legal moves to obtain the real move.
    pub fn from_uci(s: &str) -> Option<Self> {
        if !s.is_ascii() || s.len() < 4 || s.len() > 5 {
            return None;
        }
        let from = Square::from_algebraic(&s[0..2])?;
        let to = Square::from_algebraic(&s[2..4])?;
        let promotion = match s[4..].chars().next() {
            Some(c) => match Piece::from_uci_char(c.to_ascii_lowercase())? {
                Piece::Pawn | Piece::King => return None,
                piece => Some(piece),
            },
            None => None,
        };
        Some(Move {
            from,
            to,
            promotion,
            flag: MoveFlag::Normal,
        })
    }

    /// True when `other` names the same squares and promotion, ignoring flags.
    #[inline]
    pub fn same_squares(self, other: Move) -> bool {
        self.from == other.from && self.to == other.to && self.promotion == other.promotion
    }
}

impl fmt::Debug for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Move({}, {:?})", self.to_uci(), self.flag)
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_uci())
    }
}
