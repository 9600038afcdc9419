//! Analysis values produced by the engine session.

use chess_core::Color;
use chess_rules::{move_to_san, parse_uci, Fingerprint, Position};
use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;
use uci::{GoOptions, Score};

/// Identifies one analysis request. Numbers grow monotonically per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Bounds for one search, and how many candidate lines to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchLimit {
    pub depth: Option<u32>,
    pub movetime: Option<Duration>,
    pub lines: u32,
}

impl SearchLimit {
    pub fn new(depth: Option<u32>, movetime: Option<Duration>) -> Self {
        Self {
            depth,
            movetime,
            lines: 1,
        }
    }

    pub fn depth(depth: u32) -> Self {
        Self::new(Some(depth), None)
    }

    pub fn movetime(movetime: Duration) -> Self {
        Self::new(None, Some(movetime))
    }

    pub fn with_lines(mut self, lines: u32) -> Self {
        self.lines = lines.max(1);
        self
    }

    /// The `go` options for this limit. Without any bound the engine searches
    /// until it is told to stop.
    pub fn to_go(&self) -> GoOptions {
        let movetime = self.movetime.map(|t| t.as_millis() as u64);
        let mut go = GoOptions::limited(self.depth, movetime);
        go.infinite = self.depth.is_none() && movetime.is_none();
        go
    }
}

/// An evaluation from White's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evaluation {
    /// Centipawn evaluation (positive = white advantage)
    Centipawns(i32),
    /// Mate in N moves (positive = white wins, negative = black wins).
    /// `Mate(0)` means the side to move is already mated.
    Mate(i32),
}

impl Evaluation {
    /// Converts an engine score, which is relative to the side to move.
    pub fn from_score(score: Score, side_to_move: Color) -> Self {
        match score {
            Score::Cp(cp) => Evaluation::Centipawns(cp * side_to_move.sign()),
            Score::Mate(n) => Evaluation::Mate(n * side_to_move.sign()),
        }
    }

    /// Evaluation in pawns. Mates map to +/-999 minus the distance.
    pub fn pawns(self) -> f64 {
        match self {
            Evaluation::Centipawns(cp) => f64::from(cp) / 100.0,
            Evaluation::Mate(0) => 0.0,
            Evaluation::Mate(n) if n > 0 => 999.0 - f64::from(n),
            Evaluation::Mate(n) => -999.0 - f64::from(n),
        }
    }

    /// The side delivering mate, if this is a mate score.
    pub fn mating_side(self) -> Option<Color> {
        match self {
            Evaluation::Mate(n) if n > 0 => Some(Color::White),
            Evaluation::Mate(n) if n < 0 => Some(Color::Black),
            _ => None,
        }
    }
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Evaluation::Centipawns(cp) => write!(f, "{:+.2}", f64::from(*cp) / 100.0),
            Evaluation::Mate(0) => write!(f, "Checkmate"),
            Evaluation::Mate(n) => {
                let side = if *n > 0 { Color::White } else { Color::Black };
                write!(f, "{} mates in {}", side, n.abs())
            }
        }
    }
}

/// One candidate line reported by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct PvLine {
    /// 1 for the engine's preferred line.
    pub rank: u32,
    pub evaluation: Evaluation,
    pub depth: u32,
    /// Moves in coordinate notation.
    pub moves: Vec<String>,
}

/// A snapshot of the engine's opinion about one position.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResult {
    pub request: RequestId,
    /// The position the search ran on.
    pub fingerprint: Fingerprint,
    /// Only present once the search has finished.
    pub best_move: Option<String>,
    pub evaluation: Option<Evaluation>,
    pub depth: u32,
    pub nodes: Option<u64>,
    /// Candidate lines ordered by rank.
    pub lines: Vec<PvLine>,
    pub timestamp: DateTime<Utc>,
    pub is_final: bool,
}

/// A ranked alternative in a detailed evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct Alternative {
    pub rank: u32,
    pub san: String,
    pub evaluation: Evaluation,
}

/// The breakdown shown by an "eval" command.
#[derive(Debug, Clone, PartialEq)]
pub struct DetailedEvaluation {
    pub fen: String,
    pub best_move: Option<String>,
    pub best_move_uci: Option<String>,
    pub evaluation: Option<Evaluation>,
    pub depth: u32,
    /// Lines after the best one, ranked.
    pub alternatives: Vec<Alternative>,
}

impl DetailedEvaluation {
    /// Builds the breakdown, writing moves in SAN for `position`.
    pub fn new(position: &Position, result: &AnalysisResult) -> Self {
        let best_move_uci = result
            .best_move
            .clone()
            .or_else(|| result.lines.first().and_then(|l| l.moves.first().cloned()));
        let alternatives = result
            .lines
            .iter()
            .filter(|line| line.rank > 1)
            .filter_map(|line| {
                let first = line.moves.first()?;
                Some(Alternative {
                    rank: line.rank,
                    san: san_or_uci(position, first),
                    evaluation: line.evaluation,
                })
            })
            .collect();

        DetailedEvaluation {
            fen: position.to_fen(),
            best_move: best_move_uci.as_deref().map(|m| san_or_uci(position, m)),
            best_move_uci,
            evaluation: result.evaluation,
            depth: result.depth,
            alternatives,
        }
    }
}

fn san_or_uci(position: &Position, text: &str) -> String {
    match parse_uci(position, text) {
        Ok(m) => move_to_san(position, m),
        Err(_) => text.to_string(),
    }
}

impl fmt::Display for DetailedEvaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.best_move {
            Some(m) => writeln!(f, "Best move: {}", m)?,
            None => writeln!(f, "Best move: none")?,
        }
        match self.evaluation {
            Some(eval) => write!(f, "Evaluation: {}", eval)?,
            None => write!(f, "Evaluation: unknown")?,
        }
        write!(f, " (depth {})", self.depth)?;

        if !self.alternatives.is_empty() {
            write!(f, "\n\nAlternative moves:")?;
            for alt in &self.alternatives {
                write!(f, "\n  {}. {} ({})", alt.rank, alt.san, alt.evaluation)?;
            }
        }
        Ok(())
    }
}
