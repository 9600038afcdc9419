//! Zobrist fingerprints.
//!
//! A fingerprint XORs one random key per (piece, color, square), one for
//! Black to move, one per castling right and one per en passant file.
//! The en passant file only counts when a capture onto it is actually
//! available, so positions that differ only by an unusable en passant
//! square repeat.

use crate::Position;
use chess_core::{Color, Piece};
use std::fmt;

/// Identity of a position: board, side to move, castling and en passant.
///
/// Clocks are not part of the fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(pub u64);

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

struct ZobristKeys {
    pieces: [[[u64; 64]; 2]; 6],
    black_to_move: u64,
    castling: [u64; 4],
    en_passant: [u64; 8],
}

impl ZobristKeys {
    /// Fills the tables from a fixed-seed xorshift64 stream.
    const fn new() -> Self {
        const fn next(mut x: u64) -> u64 {
            x ^= x << 13;
            x ^= x >> 7;
            x ^= x << 17;
            x
        }

        let mut state = 0x9E37_79B9_7F4A_7C15u64;
        let mut pieces = [[[0u64; 64]; 2]; 6];
        let mut castling = [0u64; 4];
        let mut en_passant = [0u64; 8];

        let mut piece = 0;
        while piece < 6 {
            let mut color = 0;
            while color < 2 {
                let mut square = 0;
                while square < 64 {
                    state = next(state);
                    pieces[piece][color][square] = state;
                    square += 1;
                }
                color += 1;
            }
            piece += 1;
        }

        state = next(state);
        let black_to_move = state;

        let mut i = 0;
        while i < 4 {
            state = next(state);
            castling[i] = state;
            i += 1;
        }

        let mut i = 0;
        while i < 8 {
            state = next(state);
            en_passant[i] = state;
            i += 1;
        }

        ZobristKeys {
            pieces,
            black_to_move,
            castling,
            en_passant,
        }
    }
}

static KEYS: ZobristKeys = ZobristKeys::new();

pub(crate) fn fingerprint(position: &Position) -> Fingerprint {
    let mut hash = 0u64;
    for (sq, piece, color) in position.pieces() {
        hash ^= KEYS.pieces[piece.index()][color.index()][sq.index() as usize];
    }
    if position.side_to_move() == Color::Black {
        hash ^= KEYS.black_to_move;
    }
    let bits = position.castling().bits();
    for (i, key) in KEYS.castling.iter().enumerate() {
        if bits & (1 << i) != 0 {
            hash ^= key;
        }
    }
    if let Some(target) = position.en_passant() {
        let us = position.side_to_move();
        let capturer_rank = -us.pawn_direction();
        let capturable = [-1, 1].into_iter().any(|df| {
            target
                .offset(df, capturer_rank)
                .and_then(|sq| position.piece_at(sq))
                == Some((Piece::Pawn, us))
        });
        if capturable {
            hash ^= KEYS.en_passant[target.file().index() as usize];
        }
    }
    Fingerprint(hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{legal_moves, apply_move};
    use chess_core::Move;

    fn play(position: &Position, uci: &str) -> Position {
        let parsed = Move::from_uci(uci).unwrap();
        let m = legal_moves(position)
            .into_iter()
            .find(|m| m.same_squares(parsed))
            .unwrap();
        apply_move(position, m).unwrap()
    }

    #[test]
    fn keys_are_distinct() {
        assert_ne!(KEYS.pieces[0][0][0], KEYS.pieces[0][0][1]);
        assert_ne!(KEYS.pieces[0][0][0], KEYS.pieces[0][1][0]);
        assert_ne!(KEYS.black_to_move, 0);
    }

    #[test]
    fn side_to_move_changes_fingerprint() {
        let white = Position::from_fen("4k3/8/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        let black = Position::from_fen("4k3/8/8/8/8/8/8/4K3 b - - 0 1").unwrap();
        assert_ne!(white.fingerprint(), black.fingerprint());
    }

    #[test]
    fn clocks_do_not_change_fingerprint() {
        let a = Position::from_fen("4k3/8/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        let b = Position::from_fen("4k3/8/8/8/8/8/8/4K3 w - - 12 40").unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn transpositions_match() {
        let start = Position::startpos();
        let a = play(&play(&play(&play(&start, "g1f3"), "g8f6"), "b1c3"), "b8c6");
        let b = play(&play(&play(&play(&start, "b1c3"), "b8c6"), "g1f3"), "g8f6");
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn unusable_en_passant_square_is_ignored() {
        // After 1.e4 no black pawn can capture on e3.
        let after_e4 = play(&Position::startpos(), "e2e4");
        let same_board =
            Position::from_fen("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1")
                .unwrap();
        assert_eq!(after_e4.fingerprint(), same_board.fingerprint());
    }

    #[test]
    fn display_is_hex() {
        assert_eq!(Fingerprint(255).to_string(), "00000000000000ff");
    }
}
