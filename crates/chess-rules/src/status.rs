//! Game termination rules.

use crate::movegen::{is_check, legal_moves};
use crate::zobrist::Fingerprint;
use crate::Position;
use chess_core::{Color, Piece};
use std::fmt;

/// Where the game stands at a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameStatus {
    Ongoing,
    /// The side to move is mated.
    Checkmate,
    Stalemate,
    /// One hundred plies without a capture or pawn move.
    FiftyMoveDraw,
    InsufficientMaterial,
    /// The same position occurred three times since the last capture or pawn move.
    Repetition,
}

impl GameStatus {
    pub fn is_over(self) -> bool {
        self != GameStatus::Ongoing
    }

    pub fn is_draw(self) -> bool {
        matches!(
            self,
            GameStatus::Stalemate
                | GameStatus::FiftyMoveDraw
                | GameStatus::InsufficientMaterial
                | GameStatus::Repetition
        )
    }

    /// PGN result token, given who was to move when the status was reached.
    pub fn result_token(self, side_to_move: Color) -> &'static str {
        match self {
            GameStatus::Ongoing => "*",
            GameStatus::Checkmate => side_to_move.opposite().win_result(),
            _ => "1/2-1/2",
        }
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            GameStatus::Ongoing => "ongoing",
            GameStatus::Checkmate => "checkmate",
            GameStatus::Stalemate => "stalemate",
            GameStatus::FiftyMoveDraw => "draw by fifty-move rule",
            GameStatus::InsufficientMaterial => "draw by insufficient material",
            GameStatus::Repetition => "draw by threefold repetition",
        };
        write!(f, "{}", text)
    }
}

/// Evaluates the status of `position`.
///
/// `history` holds the fingerprints of the positions that preceded it in the
/// game, oldest first. Only the last `halfmove_clock` entries are consulted
/// for repetition: an irreversible move makes earlier positions unreachable.
pub fn game_status(position: &Position, history: &[Fingerprint]) -> GameStatus {
    if legal_moves(position).is_empty() {
        return if is_check(position) {
            GameStatus::Checkmate
        } else {
            GameStatus::Stalemate
        };
    }
    if is_insufficient_material(position) {
        return GameStatus::InsufficientMaterial;
    }
    if position.halfmove_clock() >= 100 {
        return GameStatus::FiftyMoveDraw;
    }
    if repetitions(position, history) >= 3 {
        return GameStatus::Repetition;
    }
    GameStatus::Ongoing
}

/// How many times the current position has occurred, itself included,
/// within the reversible window.
pub fn repetitions(position: &Position, history: &[Fingerprint]) -> usize {
    let window = (position.halfmove_clock() as usize).min(history.len());
    let current = position.fingerprint();
    1 + history[history.len() - window..]
        .iter()
        .filter(|&&fp| fp == current)
        .count()
}

/// Neither side can possibly mate: bare kings, a single minor piece, or
/// bishops that all stand on one square color.
pub fn is_insufficient_material(position: &Position) -> bool {
    let mut knights = 0;
    let mut bishops_light = 0;
    let mut bishops_dark = 0;
    for (sq, piece, _) in position.pieces() {
        match piece {
            Piece::King => {}
            Piece::Knight => knights += 1,
            Piece::Bishop if sq.is_light() => bishops_light += 1,
            Piece::Bishop => bishops_dark += 1,
            Piece::Pawn | Piece::Rook | Piece::Queen => return false,
        }
    }
    let bishops = bishops_light + bishops_dark;
    match (knights, bishops) {
        (0, 0) | (1, 0) | (0, 1) => true,
        (0, _) => bishops_light == 0 || bishops_dark == 0,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(fen: &str) -> GameStatus {
        game_status(&Position::from_fen(fen).unwrap(), &[])
    }

    #[test]
    fn start_is_ongoing() {
        assert_eq!(game_status(&Position::startpos(), &[]), GameStatus::Ongoing);
    }

    #[test]
    fn detects_mate_and_stalemate() {
        assert_eq!(status("7k/6Q1/6K1/8/8/8/8/8 b - - 0 1"), GameStatus::Checkmate);
        assert_eq!(status("7k/8/6Q1/8/8/8/8/6K1 b - - 0 1"), GameStatus::Stalemate);
    }

    #[test]
    fn detects_insufficient_material() {
        assert_eq!(status("4k3/8/8/8/8/8/8/4K3 w - - 0 1"), GameStatus::InsufficientMaterial);
        assert_eq!(status("4k3/8/8/8/8/8/8/4KN2 w - - 0 1"), GameStatus::InsufficientMaterial);
        // c8 and f1 are both light squares.
        assert_eq!(status("2b1k3/8/8/8/8/8/8/4KB2 w - - 0 1"), GameStatus::InsufficientMaterial);
        // f8 and c1 are both dark.
        assert_eq!(status("5b2/4k3/8/8/8/8/8/2B1K3 w - - 0 1"), GameStatus::InsufficientMaterial);
        // Opposite-colored bishops can still mate in theory.
        assert_eq!(status("2b1k3/8/8/8/8/8/8/2B1K3 w - - 0 1"), GameStatus::Ongoing);
        assert_eq!(status("4k3/8/8/8/8/8/8/3NKN2 w - - 0 1"), GameStatus::Ongoing);
        assert_eq!(status("4k3/8/8/8/8/8/4P3/4K3 w - - 0 1"), GameStatus::Ongoing);
    }

    #[test]
    fn detects_fifty_move_rule() {
        assert_eq!(status("4k3/8/8/8/8/8/8/R3K3 w - - 100 80"), GameStatus::FiftyMoveDraw);
        assert_eq!(status("4k3/8/8/8/8/8/8/R3K3 w - - 99 80"), GameStatus::Ongoing);
    }

    #[test]
    fn mate_beats_fifty_move_rule() {
        assert_eq!(status("7k/6Q1/6K1/8/8/8/8/8 b - - 100 80"), GameStatus::Checkmate);
    }

    #[test]
    fn repetition_only_counts_reversible_window() {
        let pos = Position::from_fen("4k3/8/8/8/8/8/8/R3K3 w - - 4 10").unwrap();
        let fp = pos.fingerprint();
        let other = Fingerprint(1);

        // Two earlier occurrences inside the last four plies.
        let history = [other, other, fp, other, fp, other];
        assert_eq!(repetitions(&pos, &history), 3);
        assert_eq!(game_status(&pos, &history), GameStatus::Repetition);

        // Same occurrences but the clock says only two plies are reversible.
        let pos = Position::from_fen("4k3/8/8/8/8/8/8/R3K3 w - - 2 10").unwrap();
        assert_eq!(repetitions(&pos, &history), 2);
        assert_eq!(game_status(&pos, &history), GameStatus::Ongoing);
    }

    #[test]
    fn result_tokens() {
        assert_eq!(GameStatus::Checkmate.result_token(Color::Black), "1-0");
        assert_eq!(GameStatus::Checkmate.result_token(Color::White), "0-1");
        assert_eq!(GameStatus::Stalemate.result_token(Color::White), "1/2-1/2");
        assert_eq!(GameStatus::Ongoing.result_token(Color::White), "*");
    }
}
