//! Standard Algebraic Notation parsing and formatting.
//!
//! Examples: "e4", "Nf3", "Bxc6", "O-O", "e8=Q", "Nbd2", "R1e1".

use crate::error::MoveError;
use crate::movegen::{is_check, legal_moves, play};
use crate::Position;
use chess_core::{File, Move, MoveFlag, Piece, Rank, Square};

/// Formats a legal move in SAN, including a `+` or `#` suffix.
///
/// `position` is the position before the move.
pub fn move_to_san(position: &Position, m: Move) -> String {
    let mut san = match m.flag() {
        MoveFlag::CastleKingside => "O-O".to_string(),
        MoveFlag::CastleQueenside => "O-O-O".to_string(),
        _ => piece_move_text(position, m),
    };

    let next = play(position, m);
    if is_check(&next) {
        san.push(if legal_moves(&next).is_empty() { '#' } else { '+' });
    }
    san
}

fn piece_move_text(position: &Position, m: Move) -> String {
    let mut san = String::with_capacity(7);
    let piece = position
        .piece_at(m.from())
        .map(|(piece, _)| piece)
        .unwrap_or(Piece::Pawn);

    match piece.to_san_char() {
        Some(letter) => {
            san.push(letter);
            san.push_str(&disambiguation(position, m, piece));
            if m.is_capture() {
                san.push('x');
            }
        }
        None => {
            if m.is_capture() {
                san.push(m.from().file().to_char());
                san.push('x');
            }
        }
    }

    san.push_str(&m.to().to_algebraic());
    if let Some(promo) = m.promotion_piece().and_then(Piece::to_san_char) {
        san.push('=');
        san.push(promo);
    }
    san
}

/// Shortest origin hint that singles out `m` among same-piece moves to its square.
fn disambiguation(position: &Position, m: Move, piece: Piece) -> String {
    let rivals: Vec<Square> = legal_moves(position)
        .into_iter()
        .filter(|other| other.to() == m.to() && other.from() != m.from())
        .filter(|other| position.piece_at(other.from()).map(|(p, _)| p) == Some(piece))
        .map(|other| other.from())
        .collect();

    let from = m.from();
    if rivals.is_empty() {
        String::new()
    } else if rivals.iter().all(|sq| sq.file() != from.file()) {
        from.file().to_string()
    } else if rivals.iter().all(|sq| sq.rank() != from.rank()) {
        from.rank().to_string()
    } else {
        from.to_algebraic()
    }
}

/// Parses SAN against the legal moves of `position`.
///
/// Check and annotation suffixes (`+`, `#`, `!`, `?`) are ignored, `0-0`
/// is accepted for `O-O`, and the `=` before a promotion piece is optional.
pub fn parse_algebraic(position: &Position, text: &str) -> Result<Move, MoveError> {
    let trimmed = text
        .trim()
        .trim_end_matches(|c| matches!(c, '+' | '#' | '!' | '?'));
    if trimmed.is_empty() {
        return Err(MoveError::Unknown(text.to_string()));
    }

    let castle = match trimmed {
        "O-O" | "0-0" => Some(MoveFlag::CastleKingside),
        "O-O-O" | "0-0-0" => Some(MoveFlag::CastleQueenside),
        _ => None,
    };
    if let Some(flag) = castle {
        return legal_moves(position)
            .into_iter()
            .find(|m| m.flag() == flag)
            .ok_or_else(|| MoveError::Illegal(text.to_string()));
    }

    let pattern = SanPattern::parse(trimmed).ok_or_else(|| MoveError::Unknown(text.to_string()))?;
    let candidates: Vec<Move> = legal_moves(position)
        .into_iter()
        .filter(|m| pattern.matches(position, *m))
        .collect();

    match candidates.as_slice() {
        [m] => Ok(*m),
        [] => Err(pattern.no_match_error(position, text)),
        _ => Err(MoveError::Ambiguous(text.to_string())),
    }
}

/// Parses coordinate notation ("e2e4", "e7e8q") against the legal moves.
pub fn parse_uci(position: &Position, text: &str) -> Result<Move, MoveError> {
    let parsed = Move::from_uci(text.trim()).ok_or_else(|| MoveError::Unknown(text.to_string()))?;
    legal_moves(position)
        .into_iter()
        .find(|m| m.same_squares(parsed))
        .ok_or_else(|| MoveError::Illegal(text.to_string()))
}

/// Accepts either SAN or coordinate notation, SAN first.
pub fn parse_move(position: &Position, text: &str) -> Result<Move, MoveError> {
    match parse_algebraic(position, text) {
        Err(MoveError::Unknown(_)) if Move::from_uci(text.trim()).is_some() => {
            parse_uci(position, text)
        }
        other => other,
    }
}

/// The pieces of a SAN token, before matching it to a legal move.
#[derive(Debug)]
struct SanPattern {
    piece: Piece,
    from_file: Option<File>,
    from_rank: Option<Rank>,
    to: Square,
    promotion: Option<Piece>,
    capture: bool,
}

impl SanPattern {
    fn parse(san: &str) -> Option<Self> {
        let san = san.strip_suffix("e.p.").map(str::trim_end).unwrap_or(san);
        let mut chars: Vec<char> = san.chars().collect();

        let piece = match chars.first().copied().and_then(Piece::from_san_char) {
            Some(piece) => {
                chars.remove(0);
                piece
            }
            None => Piece::Pawn,
        };

        let promotion = match chars.last().copied().and_then(Piece::from_san_char) {
            Some(promo) if piece == Piece::Pawn && promo != Piece::King => {
                chars.pop();
                if chars.last() == Some(&'=') {
                    chars.pop();
                }
                Some(promo)
            }
            Some(_) => return None,
            None => None,
        };

        if chars.len() < 2 {
            return None;
        }
        let rank = Rank::from_char(chars.pop()?)?;
        let file = File::from_char(chars.pop()?)?;
        let to = Square::new(file, rank);

        let capture = chars.last() == Some(&'x');
        if capture {
            chars.pop();
        }

        let (from_file, from_rank) = match chars.as_slice() {
            [] => (None, None),
            [c] => match (File::from_char(*c), Rank::from_char(*c)) {
                (Some(f), _) => (Some(f), None),
                (None, Some(r)) => (None, Some(r)),
                (None, None) => return None,
            },
            [f, r] => (Some(File::from_char(*f)?), Some(Rank::from_char(*r)?)),
            _ => return None,
        };

        Some(SanPattern {
            piece,
            from_file,
            from_rank,
            to,
            promotion,
            capture,
        })
    }

    fn matches(&self, position: &Position, m: Move) -> bool {
        m.to() == self.to
            && position.piece_at(m.from()).map(|(p, _)| p) == Some(self.piece)
            && self.from_file.map_or(true, |f| m.from().file() == f)
            && self.from_rank.map_or(true, |r| m.from().rank() == r)
            && m.promotion_piece() == self.promotion
            && self.capture == m.is_capture()
            && self.pawn_origin_fits()
            && !m.flag().is_castling()
    }

    /// Pawn captures name their origin file; pushes name none, or their own file.
    fn pawn_origin_fits(&self) -> bool {
        if self.piece != Piece::Pawn {
            return true;
        }
        match (self.capture, self.from_file) {
            (true, from_file) => from_file.is_some(),
            (false, None) => true,
            (false, Some(f)) => f == self.to.file(),
        }
    }

    /// A well-formed token that names no legal move is illegal; a token whose
    /// piece cannot exist is unknown.
    fn no_match_error(&self, position: &Position, text: &str) -> MoveError {
        let us = position.side_to_move();
        let has_piece = position
            .pieces()
            .any(|(_, p, c)| p == self.piece && c == us);
        if has_piece {
            MoveError::Illegal(text.to_string())
        } else {
            MoveError::Unknown(text.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apply_move;

    fn play_san(position: &Position, san: &str) -> Position {
        let m = parse_algebraic(position, san).unwrap();
        apply_move(position, m).unwrap()
    }

    fn after(line: &[&str]) -> Position {
        line.iter()
            .fold(Position::startpos(), |pos, san| play_san(&pos, san))
    }

    #[test]
    fn formats_basic_moves() {
        let pos = Position::startpos();
        let e4 = parse_uci(&pos, "e2e4").unwrap();
        assert_eq!(move_to_san(&pos, e4), "e4");
        let nf3 = parse_uci(&pos, "g1f3").unwrap();
        assert_eq!(move_to_san(&pos, nf3), "Nf3");
    }

    #[test]
    fn formats_pawn_capture_and_check() {
        let pos = after(&["e4", "d5"]);
        let m = parse_uci(&pos, "e4d5").unwrap();
        assert_eq!(move_to_san(&pos, m), "exd5");

        let pos = after(&["e4", "e5", "Qh5", "Nc6"]);
        let m = parse_uci(&pos, "h5e5").unwrap();
        assert_eq!(move_to_san(&pos, m), "Qxe5+");
    }

    #[test]
    fn formats_mate() {
        let pos = after(&["f3", "e5", "g4"]);
        let m = parse_uci(&pos, "d8h4").unwrap();
        assert_eq!(move_to_san(&pos, m), "Qh4#");
    }

    #[test]
    fn formats_castling_and_promotion() {
        let pos = Position::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        assert_eq!(move_to_san(&pos, parse_uci(&pos, "e1g1").unwrap()), "O-O");
        assert_eq!(move_to_san(&pos, parse_uci(&pos, "e1c1").unwrap()), "O-O-O");

        let pos = Position::from_fen("7k/4P3/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        assert_eq!(move_to_san(&pos, parse_uci(&pos, "e7e8q").unwrap()), "e8=Q+");
        assert_eq!(move_to_san(&pos, parse_uci(&pos, "e7e8n").unwrap()), "e8=N");
    }

    #[test]
    fn disambiguates_by_file_then_rank() {
        // Knights on b1 and f3 can both reach d2.
        let pos = Position::from_fen("4k3/8/8/8/8/5N2/8/1N2K3 w - - 0 1").unwrap();
        let m = parse_uci(&pos, "b1d2").unwrap();
        assert_eq!(move_to_san(&pos, m), "Nbd2");

        // Rooks on a1 and a5 share a file.
        let pos = Position::from_fen("4k3/8/8/R7/8/8/8/R3K3 w - - 0 1").unwrap();
        let m = parse_uci(&pos, "a1a3").unwrap();
        assert_eq!(move_to_san(&pos, m), "R1a3");
    }

    #[test]
    fn parses_common_forms() {
        let pos = Position::startpos();
        assert_eq!(parse_algebraic(&pos, "e4").unwrap().to_uci(), "e2e4");
        assert_eq!(parse_algebraic(&pos, "Nf3").unwrap().to_uci(), "g1f3");
        assert_eq!(parse_algebraic(&pos, "Nf3!?").unwrap().to_uci(), "g1f3");

        let pos = Position::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        assert_eq!(parse_algebraic(&pos, "O-O").unwrap().flag(), MoveFlag::CastleKingside);
        assert_eq!(parse_algebraic(&pos, "0-0-0").unwrap().flag(), MoveFlag::CastleQueenside);
    }

    #[test]
    fn parses_promotion_with_or_without_equals() {
        let pos = Position::from_fen("7k/4P3/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        assert_eq!(parse_algebraic(&pos, "e8=Q+").unwrap().promotion_piece(), Some(Piece::Queen));
        assert_eq!(parse_algebraic(&pos, "e8R").unwrap().promotion_piece(), Some(Piece::Rook));
        // A pawn reaching the last rank must say what it becomes.
        assert!(matches!(parse_algebraic(&pos, "e8"), Err(MoveError::Illegal(_))));
    }

    #[test]
    fn reports_ambiguity() {
        let pos = Position::from_fen("4k3/8/8/8/8/5N2/8/1N2K3 w - - 0 1").unwrap();
        assert_eq!(
            parse_algebraic(&pos, "Nd2"),
            Err(MoveError::Ambiguous("Nd2".to_string()))
        );
        assert_eq!(parse_algebraic(&pos, "Nbd2").unwrap().to_uci(), "b1d2");
        assert_eq!(parse_algebraic(&pos, "Nfd2").unwrap().to_uci(), "f3d2");
    }

    #[test]
    fn rejects_garbage_and_illegal_moves() {
        let pos = Position::startpos();
        assert!(matches!(parse_algebraic(&pos, ""), Err(MoveError::Unknown(_))));
        assert!(matches!(parse_algebraic(&pos, "hello"), Err(MoveError::Unknown(_))));
        assert!(matches!(parse_algebraic(&pos, "Ke2"), Err(MoveError::Illegal(_))));
        assert!(matches!(parse_algebraic(&pos, "e5"), Err(MoveError::Illegal(_))));
        assert!(matches!(parse_algebraic(&pos, "O-O"), Err(MoveError::Illegal(_))));
    }

    #[test]
    fn capture_marker_must_match_the_move() {
        let pos = Position::startpos();
        assert!(matches!(parse_algebraic(&pos, "Nxf3"), Err(MoveError::Illegal(_))));
        assert!(matches!(parse_algebraic(&pos, "exe4"), Err(MoveError::Illegal(_))));

        let pos = after(&["e4", "d5"]);
        assert!(matches!(parse_algebraic(&pos, "d5"), Err(MoveError::Illegal(_))));
        assert!(matches!(parse_algebraic(&pos, "xd5"), Err(MoveError::Illegal(_))));
        assert!(matches!(parse_algebraic(&pos, "ed5"), Err(MoveError::Illegal(_))));
        assert_eq!(parse_algebraic(&pos, "exd5").unwrap().to_uci(), "e4d5");
        assert_eq!(parse_algebraic(&pos, "e5").unwrap().to_uci(), "e4e5");

        let pos = after(&["e4", "a6", "e5", "d5"]);
        let m = parse_algebraic(&pos, "exd6").unwrap();
        assert_eq!(m.flag(), MoveFlag::EnPassant);
        assert!(matches!(parse_algebraic(&pos, "d6"), Err(MoveError::Illegal(_))));
    }

    #[test]
    fn parse_move_falls_back_to_coordinates() {
        let pos = Position::startpos();
        assert_eq!(parse_move(&pos, "e2e4").unwrap().flag(), MoveFlag::DoublePush);
        assert_eq!(parse_move(&pos, "Nc3").unwrap().to_uci(), "b1c3");
        assert!(matches!(parse_move(&pos, "e2e5"), Err(MoveError::Illegal(_))));
    }

    #[test]
    fn san_roundtrip_over_all_moves() {
        let pos = after(&["e4", "d5", "exd5", "Nf6", "Bb5+", "c6"]);
        for m in legal_moves(&pos) {
            let san = move_to_san(&pos, m);
            assert_eq!(parse_algebraic(&pos, &san), Ok(m), "{}", san);
        }
    }
}
