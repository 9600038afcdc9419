//! Castling availability.

use crate::Color;
use std::fmt;

/// Which castling moves each side may still make.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CastlingRights(u8);

impl CastlingRights {
    pub const WHITE_KINGSIDE: u8 = 0b0001;
    pub const WHITE_QUEENSIDE: u8 = 0b0010;
    pub const BLACK_KINGSIDE: u8 = 0b0100;
    pub const BLACK_QUEENSIDE: u8 = 0b1000;

    pub const NONE: CastlingRights = CastlingRights(0);
    pub const ALL: CastlingRights = CastlingRights(0b1111);

    #[inline]
    pub const fn from_bits(bits: u8) -> Self {
        CastlingRights(bits & 0b1111)
    }

    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[inline]
    pub const fn kingside(self, color: Color) -> bool {
        self.0 & Self::kingside_bit(color) != 0
    }

    #[inline]
    pub const fn queenside(self, color: Color) -> bool {
        self.0 & Self::queenside_bit(color) != 0
    }

    /// Rights with both of `color`'s castles removed.
    #[inline]
    pub const fn without_color(self, color: Color) -> Self {
        CastlingRights(self.0 & !(Self::kingside_bit(color) | Self::queenside_bit(color)))
    }

    #[inline]
    pub const fn without(self, bits: u8) -> Self {
        CastlingRights(self.0 & !bits)
    }

    const fn kingside_bit(color: Color) -> u8 {
        match color {
            Color::White => Self::WHITE_KINGSIDE,
            Color::Black => Self::BLACK_KINGSIDE,
        }
    }

    const fn queenside_bit(color: Color) -> u8 {
        match color {
            Color::White => Self::WHITE_QUEENSIDE,
            Color::Black => Self::BLACK_QUEENSIDE,
        }
    }

    /// Parses the FEN castling field ("KQkq", "Kq", "-").
    pub fn from_fen(field: &str) -> Option<Self> {
        if field == "-" {
            return Some(Self::NONE);
        }
        if field.is_empty() {
            return None;
        }
        let mut bits = 0;
        for c in field.chars() {
            let bit = match c {
                'K' => Self::WHITE_KINGSIDE,
                'Q' => Self::WHITE_QUEENSIDE,
                'k' => Self::BLACK_KINGSIDE,
                'q' => Self::BLACK_QUEENSIDE,
                _ => return None,
            };
            if bits & bit != 0 {
                return None;
            }
            bits |= bit;
        }
        Some(CastlingRights(bits))
    }
}

impl fmt::Display for CastlingRights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 {
            return write!(f, "-");
        }
        for (bit, c) in [
            (Self::WHITE_KINGSIDE, 'K'),
            (Self::WHITE_QUEENSIDE, 'Q'),
            (Self::BLACK_KINGSIDE, 'k'),
            (Self::BLACK_QUEENSIDE, 'q'),
        ] {
            if self.0 & bit != 0 {
                write!(f, "{}", c)?;
            }
        }
        Ok(())
    }
}
