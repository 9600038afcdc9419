//! Game review: every move classified by how much evaluation it gave away.

use crate::coordinator::AnalysisCoordinator;
use crate::error::EngineError;
use crate::session::AnalysisBackend;
use chess_core::Color;
use chess_rules::{is_check, legal_moves, GameTimeline, Position};
use serde::Serialize;
use std::fmt;

/// Classification of a move by the mover's evaluation loss in pawns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveQuality {
    Excellent,
    Good,
    Inaccuracy,
    Mistake,
    Blunder,
}

impl MoveQuality {
    pub fn classify(loss: f64) -> Self {
        if loss <= -2.0 {
            MoveQuality::Excellent
        } else if loss <= 0.5 {
            MoveQuality::Good
        } else if loss <= 1.0 {
            MoveQuality::Inaccuracy
        } else if loss <= 2.0 {
            MoveQuality::Mistake
        } else {
            MoveQuality::Blunder
        }
    }
}

impl fmt::Display for MoveQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MoveQuality::Excellent => "excellent",
            MoveQuality::Good => "good",
            MoveQuality::Inaccuracy => "inaccuracy",
            MoveQuality::Mistake => "mistake",
            MoveQuality::Blunder => "blunder",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MoveReview {
    /// 1-based ply number.
    pub ply: usize,
    /// Fullmove number of the position the move was played from.
    pub move_number: u32,
    pub mover: String,
    pub san: String,
    /// White's view, in pawns.
    pub eval_before: f64,
    pub eval_after: f64,
    /// Evaluation the mover gave away; negative when the move gained.
    pub loss: f64,
    pub quality: MoveQuality,
    /// Engine's choice in the position before the move, in SAN.
    pub best_move: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlayerSummary {
    pub moves: u32,
    pub excellent: u32,
    pub inaccuracies: u32,
    pub mistakes: u32,
    pub blunders: u32,
    pub average_loss: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GameReview {
    pub moves: Vec<MoveReview>,
    pub white: PlayerSummary,
    pub black: PlayerSummary,
    /// Mean absolute loss over all moves.
    pub average_loss: f64,
}

impl GameReview {
    /// Builds the review from one evaluation per position of the game line:
    /// `evaluations[0]` for the start, `evaluations[i]` after ply `i`.
    pub fn from_evaluations(
        timeline: &GameTimeline,
        evaluations: &[f64],
        best_moves: &[Option<String>],
    ) -> Self {
        let mut moves = Vec::new();
        let mut white = Tally::default();
        let mut black = Tally::default();

        for (i, (ply, before)) in timeline.plies().iter().zip(timeline.positions()).enumerate() {
            let (Some(&eval_before), Some(&eval_after)) =
                (evaluations.get(i), evaluations.get(i + 1))
            else {
                break;
            };
            let mover = before.side_to_move();
            let loss = (eval_before - eval_after) * f64::from(mover.sign());
            let quality = MoveQuality::classify(loss);

            match mover {
                Color::White => white.add(loss, quality),
                Color::Black => black.add(loss, quality),
            }
            moves.push(MoveReview {
                ply: i + 1,
                move_number: before.fullmove_number(),
                mover: mover.to_string(),
                san: ply.san.clone(),
                eval_before,
                eval_after,
                loss,
                quality,
                best_move: best_moves.get(i).cloned().flatten(),
            });
        }

        let total = white.summary.moves + black.summary.moves;
        let average_loss = if total == 0 {
            0.0
        } else {
            (white.abs_loss + black.abs_loss) / f64::from(total)
        };

        GameReview {
            moves,
            white: white.finish(),
            black: black.finish(),
            average_loss,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[derive(Default)]
struct Tally {
    summary: PlayerSummary,
    abs_loss: f64,
}

impl Tally {
    fn add(&mut self, loss: f64, quality: MoveQuality) {
        self.summary.moves += 1;
        self.abs_loss += loss.abs();
        match quality {
            MoveQuality::Excellent => self.summary.excellent += 1,
            MoveQuality::Good => {}
            MoveQuality::Inaccuracy => self.summary.inaccuracies += 1,
            MoveQuality::Mistake => self.summary.mistakes += 1,
            MoveQuality::Blunder => self.summary.blunders += 1,
        }
    }

    fn finish(mut self) -> PlayerSummary {
        if self.summary.moves > 0 {
            self.summary.average_loss = self.abs_loss / f64::from(self.summary.moves);
        }
        self.summary
    }
}

impl fmt::Display for GameReview {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "MOVE QUALITY")?;
        for (side, summary) in [("White", &self.white), ("Black", &self.black)] {
            writeln!(
                f,
                "  {}: {} excellent, {} inaccuracies, {} mistakes, {} blunders, average loss {:.2}",
                side,
                summary.excellent,
                summary.inaccuracies,
                summary.mistakes,
                summary.blunders,
                summary.average_loss
            )?;
        }
        writeln!(f, "  Average loss: {:.2}", self.average_loss)?;

        writeln!(f)?;
        writeln!(f, "MOVES")?;
        for m in &self.moves {
            let dots = if m.mover == Color::White.to_string() {
                "."
            } else {
                "..."
            };
            write!(
                f,
                "  {}{} {:<8} {:+7.2} -> {:+7.2}  {}",
                m.move_number, dots, m.san, m.eval_before, m.eval_after, m.quality
            )?;
            if let Some(best) = &m.best_move {
                if m.quality != MoveQuality::Good && m.quality != MoveQuality::Excellent {
                    write!(f, " (best was {})", best)?;
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Evaluates the game line up to the cursor with the engine, one detailed
/// search per position.
pub async fn review_game<B: AnalysisBackend>(
    coordinator: &AnalysisCoordinator<B>,
    timeline: &GameTimeline,
) -> Result<GameReview, EngineError> {
    let positions: Vec<Position> = timeline.positions().collect();
    let mut evaluations = Vec::with_capacity(positions.len());
    let mut best_moves = Vec::with_capacity(positions.len());

    for (i, position) in positions.iter().enumerate() {
        tracing::debug!("Reviewing position {} of {}", i + 1, positions.len());
        match final_verdict(position) {
            Some(pawns) => {
                evaluations.push(pawns);
                best_moves.push(None);
            }
            None => {
                let detailed = coordinator.evaluate_detailed(position).await?;
                evaluations.push(detailed.evaluation.map_or(0.0, |e| e.pawns()));
                best_moves.push(detailed.best_move);
            }
        }
    }

    Ok(GameReview::from_evaluations(timeline, &evaluations, &best_moves))
}

/// Positions without legal moves need no engine: mate or a dead draw.
fn final_verdict(position: &Position) -> Option<f64> {
    if !legal_moves(position).is_empty() {
        return None;
    }
    if is_check(position) {
        Some(-999.0 * f64::from(position.side_to_move().sign()))
    } else {
        Some(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game(moves: &[&str]) -> GameTimeline {
        let mut timeline = GameTimeline::new();
        for m in moves {
            timeline.make_move(m).unwrap();
        }
        timeline
    }

    #[test]
    fn classification_thresholds() {
        assert_eq!(MoveQuality::classify(-2.5), MoveQuality::Excellent);
        assert_eq!(MoveQuality::classify(-2.0), MoveQuality::Excellent);
        assert_eq!(MoveQuality::classify(0.0), MoveQuality::Good);
        assert_eq!(MoveQuality::classify(0.5), MoveQuality::Good);
        assert_eq!(MoveQuality::classify(0.75), MoveQuality::Inaccuracy);
        assert_eq!(MoveQuality::classify(1.5), MoveQuality::Mistake);
        assert_eq!(MoveQuality::classify(2.01), MoveQuality::Blunder);
    }

    #[test]
    fn losses_are_from_the_movers_view() {
        let timeline = game(&["e4", "e5", "Qh5", "Nc6"]);
        // White gains 0.1, Black drops 1.5, White drops 3.0, Black gains 2.5.
        let evaluations = [0.2, 0.3, 1.8, -1.2, -3.7];
        let review = GameReview::from_evaluations(&timeline, &evaluations, &[]);

        let qualities: Vec<_> = review.moves.iter().map(|m| m.quality).collect();
        assert_eq!(
            qualities,
            vec![
                MoveQuality::Good,
                MoveQuality::Mistake,
                MoveQuality::Blunder,
                MoveQuality::Excellent
            ]
        );
        assert!((review.moves[1].loss - 1.5).abs() < 1e-9);
        assert!((review.moves[3].loss + 2.5).abs() < 1e-9);
        assert_eq!(review.white.blunders, 1);
        assert_eq!(review.black.mistakes, 1);
        assert_eq!(review.black.excellent, 1);
        assert!((review.average_loss - 7.1 / 4.0).abs() < 1e-9);
    }

    #[test]
    fn checkmated_positions_need_no_engine() {
        let timeline = game(&["f3", "e5", "g4", "Qh4#"]);
        let mated = timeline.current_position();
        assert_eq!(final_verdict(&mated), Some(999.0 * -1.0));
        assert_eq!(final_verdict(&timeline.start_position()), None);
    }

    #[test]
    fn review_serializes_and_renders() {
        let timeline = game(&["d4", "d5"]);
        let best = vec![Some("e4".to_string()), Some("Nf6".to_string())];
        let review = GameReview::from_evaluations(&timeline, &[0.2, 0.4, 1.6], &best);

        let json = review.to_json().unwrap();
        assert!(json.contains("\"quality\": \"mistake\""));
        assert!(json.contains("\"san\": \"d5\""));

        let text = review.to_string();
        assert!(text.contains("1... d5"));
        assert!(text.contains("(best was Nf6)"));
    }

    #[test]
    fn numbering_follows_the_start_position() {
        let start =
            Position::from_fen("r1bqkbnr/pppp1ppp/2n5/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R b KQkq - 3 20")
                .unwrap();
        let mut timeline = GameTimeline::from_position(start);
        for m in ["Nf6", "Nc3", "Bc5"] {
            timeline.make_move(m).unwrap();
        }
        let review = GameReview::from_evaluations(&timeline, &[0.3, 0.3, 0.3, 0.3], &[]);

        let numbers: Vec<_> = review.moves.iter().map(|m| m.move_number).collect();
        assert_eq!(numbers, vec![20, 21, 21]);
        let text = review.to_string();
        assert!(text.contains("20... Nf6"), "{}", text);
        assert!(text.contains("21. Nc3"), "{}", text);
        assert!(text.contains("21... Bc5"), "{}", text);
        assert!(!text.contains("  1"), "{}", text);
    }
}
