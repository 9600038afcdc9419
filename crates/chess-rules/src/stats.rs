//! Game statistics.

use crate::movegen::is_check;
use crate::GameTimeline;
use chess_core::Color;

/// Material on the board, in pawns (P=1, N=B=3, R=5, Q=9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaterialCount {
    pub white: i32,
    pub black: i32,
}

impl MaterialCount {
    /// White's material minus Black's.
    pub fn advantage(&self) -> i32 {
        self.white - self.black
    }
}

/// Counts over the plies up to the timeline's cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameStatistics {
    pub plies: usize,
    pub captures: usize,
    pub checks: usize,
    pub castles: usize,
    pub promotions: usize,
    pub material: MaterialCount,
}

impl GameStatistics {
    pub(crate) fn collect(timeline: &GameTimeline) -> Self {
        let plies = timeline.plies();
        let current = timeline.current_position();
        GameStatistics {
            plies: plies.len(),
            captures: plies.iter().filter(|p| p.mv.is_capture()).count(),
            checks: plies.iter().filter(|p| is_check(&p.position)).count(),
            castles: plies.iter().filter(|p| p.mv.flag().is_castling()).count(),
            promotions: plies
                .iter()
                .filter(|p| p.mv.promotion_piece().is_some())
                .count(),
            material: MaterialCount {
                white: current.material(Color::White),
                black: current.material(Color::Black),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::GameTimeline;

    #[test]
    fn counts_events() {
        let mut timeline = GameTimeline::new();
        for san in [
            "e4", "d5", "exd5", "Qxd5", "Nc3", "Qe5+", "Be2", "Qxc3", "Nf3", "a6", "O-O",
        ] {
            timeline.make_move(san).unwrap();
        }
        let stats = timeline.statistics();
        assert_eq!(stats.plies, 11);
        assert_eq!(stats.captures, 3);
        assert_eq!(stats.checks, 1);
        assert_eq!(stats.castles, 1);
        assert_eq!(stats.promotions, 0);
        // White lost a pawn and a knight, Black a pawn.
        assert_eq!(stats.material.white, 39 - 4);
        assert_eq!(stats.material.black, 39 - 1);
        assert_eq!(stats.material.advantage(), -3);
    }
}
