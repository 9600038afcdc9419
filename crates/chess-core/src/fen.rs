//! FEN (Forsyth-Edwards Notation) parsing and serialization.

use crate::{CastlingRights, Color, Piece, Square};
use std::fmt;
use thiserror::Error;

/// Errors that can occur when parsing FEN strings.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FenError {
    #[error("invalid FEN: expected 4 or 6 fields, got {0}")]
    InvalidPartCount(usize),

    #[error("invalid piece placement: {0}")]
    InvalidPiecePlacement(String),

    #[error("invalid active color: expected 'w' or 'b', got '{0}'")]
    InvalidActiveColor(String),

    #[error("invalid castling rights: {0}")]
    InvalidCastlingRights(String),

    #[error("invalid en passant square: {0}")]
    InvalidEnPassantSquare(String),

    #[error("invalid halfmove clock: {0}")]
    InvalidHalfmoveClock(String),

    #[error("invalid fullmove number: {0}")]
    InvalidFullmoveNumber(String),

    #[error("illegal position: {0}")]
    IllegalPosition(String),
}

/// Contents of one square: a piece and its owner, or nothing.
pub type Occupant = Option<(Piece, Color)>;

/// Square contents indexed `[rank][file]`, rank 0 being White's back rank.
pub type Placement = [[Occupant; 8]; 8];

/// The six FEN fields, decoded into typed values.
///
/// Only syntax is checked here. Whether the placement is a reachable chess
/// position (king counts, checks) is up to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fen {
    pub placement: Placement,
    pub side_to_move: Color,
    pub castling: CastlingRights,
    pub en_passant: Option<Square>,
    pub halfmove_clock: u32,
    pub fullmove_number: u32,
}

impl Fen {
    /// The standard starting position.
    pub const STARTPOS: &'static str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    /// Parses a FEN string. The two clock fields may be omitted and default to `0 1`.
    pub fn parse(fen: &str) -> Result<Self, FenError> {
        let parts: Vec<&str> = fen.split_whitespace().collect();
        if parts.len() != 6 && parts.len() != 4 {
            return Err(FenError::InvalidPartCount(parts.len()));
        }

        let placement = Self::parse_placement(parts[0])?;

        let side_to_move = match parts[1] {
            "w" => Color::White,
            "b" => Color::Black,
            other => return Err(FenError::InvalidActiveColor(other.to_string())),
        };

        let castling = CastlingRights::from_fen(parts[2])
            .ok_or_else(|| FenError::InvalidCastlingRights(parts[2].to_string()))?;

        let en_passant = Self::parse_en_passant(parts[3])?;

        let (halfmove_clock, fullmove_number) = if parts.len() == 6 {
            let halfmove = parts[4]
                .parse::<u32>()
                .map_err(|_| FenError::InvalidHalfmoveClock(parts[4].to_string()))?;
            let fullmove = parts[5]
                .parse::<u32>()
                .ok()
                .filter(|n| *n >= 1)
                .ok_or_else(|| FenError::InvalidFullmoveNumber(parts[5].to_string()))?;
            (halfmove, fullmove)
        } else {
            (0, 1)
        };

        Ok(Fen {
            placement,
            side_to_move,
            castling,
            en_passant,
            halfmove_clock,
            fullmove_number,
        })
    }

    fn parse_placement(field: &str) -> Result<Placement, FenError> {
        let rows: Vec<&str> = field.split('/').collect();
        if rows.len() != 8 {
            return Err(FenError::InvalidPiecePlacement(format!(
                "expected 8 ranks, got {}",
                rows.len()
            )));
        }

        let mut placement: Placement = [[None; 8]; 8];
        for (i, row) in rows.iter().enumerate() {
            let rank = 7 - i;
            let mut file = 0usize;
            for c in row.chars() {
                if let Some(skip) = c.to_digit(10).filter(|d| (1..=8).contains(d)) {
                    file += skip as usize;
                } else if let Some(occupant) = Piece::from_fen_char(c) {
                    if file < 8 {
                        placement[rank][file] = Some(occupant);
                    }
                    file += 1;
                } else {
                    return Err(FenError::InvalidPiecePlacement(format!(
                        "invalid character '{}' in rank {}",
                        c,
                        rank + 1
                    )));
                }
                if file > 8 {
                    break;
                }
            }
            if file != 8 {
                return Err(FenError::InvalidPiecePlacement(format!(
                    "rank {} has {} squares, expected 8",
                    rank + 1,
                    file
                )));
            }
        }
        Ok(placement)
    }

    fn parse_en_passant(field: &str) -> Result<Option<Square>, FenError> {
        if field == "-" {
            return Ok(None);
        }
        match Square::from_algebraic(field) {
            Some(sq) if matches!(sq.rank().index(), 2 | 5) => Ok(Some(sq)),
            _ => Err(FenError::InvalidEnPassantSquare(field.to_string())),
        }
    }

    /// The placement field alone ("rnbqkbnr/pppppppp/...").
    pub fn placement_field(placement: &Placement) -> String {
        let mut out = String::with_capacity(72);
        for rank in (0..8).rev() {
            let mut empty = 0;
            for occupant in placement[rank].iter() {
                match occupant {
                    Some((piece, color)) => {
                        if empty > 0 {
                            out.push(char::from(b'0' + empty));
                            empty = 0;
                        }
                        out.push(piece.to_fen_char(*color));
                    }
                    None => empty += 1,
                }
            }
            if empty > 0 {
                out.push(char::from(b'0' + empty));
            }
            if rank > 0 {
                out.push('/');
            }
        }
        out
    }
}

impl fmt::Display for Fen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ep = self
            .en_passant
            .map(|sq| sq.to_algebraic())
            .unwrap_or_else(|| "-".to_string());
        write!(
            f,
            "{} {} {} {} {} {}",
            Self::placement_field(&self.placement),
            self.side_to_move.to_fen_char(),
            self.castling,
            ep,
            self.halfmove_clock,
            self.fullmove_number
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{File, Rank};

    #[test]
    fn parse_startpos() {
        let fen = Fen::parse(Fen::STARTPOS).unwrap();
        assert_eq!(fen.side_to_move, Color::White);
        assert_eq!(fen.castling, CastlingRights::ALL);
        assert_eq!(fen.en_passant, None);
        assert_eq!(fen.halfmove_clock, 0);
        assert_eq!(fen.fullmove_number, 1);
        assert_eq!(fen.placement[0][4], Some((Piece::King, Color::White)));
        assert_eq!(fen.placement[7][3], Some((Piece::Queen, Color::Black)));
        assert_eq!(fen.placement[3][3], None);
    }

    #[test]
    fn roundtrip() {
        let original = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1";
        let parsed = Fen::parse(original).unwrap();
        assert_eq!(parsed.en_passant, Some(Square::new(File::E, Rank::R3)));
        assert_eq!(parsed.to_string(), original);
    }

    #[test]
    fn clocks_are_optional() {
        let fen = Fen::parse("8/8/8/8/8/8/8/K6k w - -").unwrap();
        assert_eq!(fen.halfmove_clock, 0);
        assert_eq!(fen.fullmove_number, 1);
    }

    #[test]
    fn invalid_fields() {
        assert!(matches!(
            Fen::parse("invalid"),
            Err(FenError::InvalidPartCount(1))
        ));
        assert!(matches!(
            Fen::parse("8/8/8/8/8/8/8/8 x KQkq - 0 1"),
            Err(FenError::InvalidActiveColor(_))
        ));
        assert!(matches!(
            Fen::parse("8/8/8/8/8/8/8 w KQkq - 0 1"),
            Err(FenError::InvalidPiecePlacement(_))
        ));
        assert!(matches!(
            Fen::parse("rnbqkbnr/pppppppp/8/8/8/8/PPPPXPPP/RNBQKBNR w KQkq - 0 1"),
            Err(FenError::InvalidPiecePlacement(_))
        ));
        assert!(matches!(
            Fen::parse("rnbqkbnrr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1"),
            Err(FenError::InvalidPiecePlacement(_))
        ));
        assert!(matches!(
            Fen::parse("8/8/8/8/8/8/8/8 w XYZ - 0 1"),
            Err(FenError::InvalidCastlingRights(_))
        ));
        assert!(matches!(
            Fen::parse("8/8/8/8/8/8/8/8 w - e4 0 1"),
            Err(FenError::InvalidEnPassantSquare(_))
        ));
        assert!(matches!(
            Fen::parse("8/8/8/8/8/8/8/8 w - - abc 1"),
            Err(FenError::InvalidHalfmoveClock(_))
        ));
        assert!(matches!(
            Fen::parse("8/8/8/8/8/8/8/8 w - - 0 0"),
            Err(FenError::InvalidFullmoveNumber(_))
        ));
    }

    #[test]
    fn placement_field_compresses_empty_squares() {
        let fen = Fen::parse("4k3/8/8/8/8/8/8/R3K2R w KQ - 0 1").unwrap();
        assert_eq!(Fen::placement_field(&fen.placement), "4k3/8/8/8/8/8/8/R3K2R");
    }

    #[test]
    fn fen_error_display() {
        let err = FenError::InvalidActiveColor("x".to_string());
        assert!(err.to_string().contains("x"));
        let err = FenError::IllegalPosition("two white kings".to_string());
        assert!(err.to_string().contains("two white kings"));
    }
}
