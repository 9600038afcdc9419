//! Piece kinds.

use crate::Color;
use std::fmt;

/// The six kinds of chess pieces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Piece {
    Pawn = 0,
    Knight = 1,
    Bishop = 2,
    Rook = 3,
    Queen = 4,
    King = 5,
}

impl Piece {
    pub const ALL: [Piece; 6] = [
        Piece::Pawn,
        Piece::Knight,
        Piece::Bishop,
        Piece::Rook,
        Piece::Queen,
        Piece::King,
    ];

    /// Pieces a pawn may promote to, strongest first.
    pub const PROMOTIONS: [Piece; 4] = [Piece::Queen, Piece::Rook, Piece::Bishop, Piece::Knight];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Conventional material value in pawns. The king counts as zero.
    pub const fn value(self) -> i32 {
        match self {
            Piece::Pawn => 1,
            Piece::Knight | Piece::Bishop => 3,
            Piece::Rook => 5,
            Piece::Queen => 9,
            Piece::King => 0,
        }
    }

    /// Returns the FEN character for this piece with the given color.
    pub const fn to_fen_char(self, color: Color) -> char {
        let c = self.to_uci_char();
        match color {
            Color::White => c.to_ascii_uppercase(),
            Color::Black => c,
        }
    }

    /// Parses a FEN character into a piece and color.
    pub const fn from_fen_char(c: char) -> Option<(Piece, Color)> {
        let color = if c.is_ascii_uppercase() {
            Color::White
        } else {
            Color::Black
        };
        match Self::from_uci_char(c.to_ascii_lowercase()) {
            Some(piece) => Some((piece, color)),
            None => None,
        }
    }

    /// Lowercase letter used in UCI promotion suffixes and FEN for Black.
    pub const fn to_uci_char(self) -> char {
        match self {
            Piece::Pawn => 'p',
            Piece::Knight => 'n',
            Piece::Bishop => 'b',
            Piece::Rook => 'r',
            Piece::Queen => 'q',
            Piece::King => 'k',
        }
    }

    pub const fn from_uci_char(c: char) -> Option<Piece> {
        match c {
            'p' => Some(Piece::Pawn),
            'n' => Some(Piece::Knight),
            'b' => Some(Piece::Bishop),
            'r' => Some(Piece::Rook),
            'q' => Some(Piece::Queen),
            'k' => Some(Piece::King),
            _ => None,
        }
    }

    /// SAN letter. Pawns have none.
    pub const fn to_san_char(self) -> Option<char> {
        match self {
            Piece::Pawn => None,
            Piece::Knight => Some('N'),
            Piece::Bishop => Some('B'),
            Piece::Rook => Some('R'),
            Piece::Queen => Some('Q'),
            Piece::King => Some('K'),
        }
    }

    /// Parses an uppercase SAN piece letter. Pawns have no letter.
    pub const fn from_san_char(c: char) -> Option<Piece> {
        match c {
            'N' => Some(Piece::Knight),
            'B' => Some(Piece::Bishop),
            'R' => Some(Piece::Rook),
            'Q' => Some(Piece::Queen),
            'K' => Some(Piece::King),
            _ => None,
        }
    }
}

impl fmt::Display for Piece {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Piece::Pawn => "Pawn",
            Piece::Knight => "Knight",
            Piece::Bishop => "Bishop",
            Piece::Rook => "Rook",
            Piece::Queen => "Queen",
            Piece::King => "King",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn piece_to_fen() {
        assert_eq!(Piece::Pawn.to_fen_char(Color::White), 'P');
        assert_eq!(Piece::Knight.to_fen_char(Color::Black), 'n');
        assert_eq!(Piece::King.to_fen_char(Color::White), 'K');
    }

    #[test]
    fn piece_from_fen() {
        assert_eq!(Piece::from_fen_char('P'), Some((Piece::Pawn, Color::White)));
        assert_eq!(Piece::from_fen_char('q'), Some((Piece::Queen, Color::Black)));
        assert_eq!(Piece::from_fen_char('x'), None);
    }

    #[test]
    fn san_letters() {
        assert_eq!(Piece::Pawn.to_san_char(), None);
        assert_eq!(Piece::Knight.to_san_char(), Some('N'));
        assert_eq!(Piece::from_san_char('B'), Some(Piece::Bishop));
        assert_eq!(Piece::from_san_char('b'), None);
    }

    #[test]
    fn material_values() {
        let total: i32 = Piece::ALL.iter().map(|p| p.value()).sum();
        assert_eq!(total, 1 + 3 + 3 + 5 + 9);
        assert_eq!(Piece::King.value(), 0);
    }
}
