//! Perft: leaf-node counts used to validate move generation.

use crate::movegen::{legal_moves, play};
use crate::Position;

/// Counts the leaf nodes of the legal move tree to `depth` plies.
pub fn perft(position: &Position, depth: u32) -> u64 {
    if depth == 0 {
        return 1;
    }
    let moves = legal_moves(position);
    if depth == 1 {
        return moves.len() as u64;
    }
    moves
        .into_iter()
        .map(|m| perft(&play(position, m), depth - 1))
        .sum()
}

/// Per-move node counts at `depth`, sorted by UCI string.
pub fn perft_divide(position: &Position, depth: u32) -> Vec<(String, u64)> {
    let mut results: Vec<(String, u64)> = legal_moves(position)
        .into_iter()
        .map(|m| (m.to_uci(), perft(&play(position, m), depth.saturating_sub(1))))
        .collect();
    results.sort();
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    const KIWIPETE: &str = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";
    const ENDGAME: &str = "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1";
    const PROMOTIONS: &str = "r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1";
    const TRICKY: &str = "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8";

    fn count(fen: &str, depth: u32) -> u64 {
        perft(&Position::from_fen(fen).unwrap(), depth)
    }

    #[test]
    fn startpos() {
        let position = Position::startpos();
        assert_eq!(perft(&position, 1), 20);
        assert_eq!(perft(&position, 2), 400);
        assert_eq!(perft(&position, 3), 8902);
    }

    #[test]
    fn startpos_depth_4() {
        assert_eq!(perft(&Position::startpos(), 4), 197_281);
    }

    #[test]
    fn kiwipete() {
        assert_eq!(count(KIWIPETE, 1), 48);
        assert_eq!(count(KIWIPETE, 2), 2039);
    }

    #[test]
    fn endgame_with_en_passant_pins() {
        assert_eq!(count(ENDGAME, 1), 14);
        assert_eq!(count(ENDGAME, 2), 191);
        assert_eq!(count(ENDGAME, 3), 2812);
    }

    #[test]
    fn promotions_and_castling() {
        assert_eq!(count(PROMOTIONS, 1), 6);
        assert_eq!(count(PROMOTIONS, 2), 264);
    }

    #[test]
    fn tricky_position() {
        assert_eq!(count(TRICKY, 1), 44);
        assert_eq!(count(TRICKY, 2), 1486);
    }

    #[test]
    fn divide_sums_to_perft() {
        let position = Position::startpos();
        let divide = perft_divide(&position, 2);
        assert_eq!(divide.len(), 20);
        assert_eq!(divide.iter().map(|(_, n)| n).sum::<u64>(), 400);
        assert_eq!(divide[0].0, "a2a3");
    }
}
