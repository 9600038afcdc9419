//! Text shown by the interactive prompt.

use analysis_bridge::AnalysisResult;
use chess_rules::{move_to_san, parse_uci, GameStatistics, GameStatus, Position};
use std::fmt::Write;

pub fn board(position: &Position, status: GameStatus) -> String {
    let mut out = format!("{}\n\n", position);
    let _ = write!(
        out,
        "{} to move, move {}",
        position.side_to_move(),
        position.fullmove_number()
    );
    match status {
        GameStatus::Ongoing if chess_rules::is_check(position) => out.push_str("\nCheck!"),
        GameStatus::Ongoing => {}
        status => {
            let _ = write!(out, "\nGame over: {}", status);
        }
    }
    out
}

/// Legal moves, eight to a row.
pub fn legal_moves(moves: &[String]) -> String {
    if moves.is_empty() {
        return "No legal moves.".to_string();
    }
    let mut out = format!("Legal moves ({}):", moves.len());
    for row in moves.chunks(8) {
        let _ = write!(out, "\n  {}", row.join("  "));
    }
    out
}

/// Moves in numbered pairs, White first. `first_mover_black` handles games
/// set up with Black to move.
pub fn history(moves: &[String], first_number: u32, first_mover_black: bool) -> String {
    if moves.is_empty() {
        return "No moves played yet.".to_string();
    }
    let mut out = format!("Move history ({} plies):", moves.len());
    let mut number = first_number;
    let mut rest = moves;

    if first_mover_black {
        let _ = write!(out, "\n{:>3}. {:<8} {}", number, "...", rest[0]);
        rest = &rest[1..];
        number += 1;
    }
    for pair in rest.chunks(2) {
        match pair {
            [white, black] => {
                let _ = write!(out, "\n{:>3}. {:<8} {}", number, white, black);
            }
            [white] => {
                let _ = write!(out, "\n{:>3}. {}", number, white);
            }
            _ => {}
        }
        number += 1;
    }
    out
}

pub fn statistics(stats: &GameStatistics) -> String {
    let advantage = stats.material.advantage();
    let balance = match advantage {
        0 => "equal".to_string(),
        a if a > 0 => format!("White +{}", a),
        a => format!("Black +{}", -a),
    };
    format!(
        "Plies: {}\nCaptures: {}\nChecks: {}\nCastles: {}\nPromotions: {}\n\
         Material: White {} / Black {} ({})",
        stats.plies,
        stats.captures,
        stats.checks,
        stats.castles,
        stats.promotions,
        stats.material.white,
        stats.material.black,
        balance
    )
}

/// One-line summary of a finished live search.
pub fn live_result(result: &AnalysisResult, position: &Position) -> String {
    let best = result
        .best_move
        .as_deref()
        .map(|uci| match parse_uci(position, uci) {
            Ok(m) => move_to_san(position, m),
            Err(_) => uci.to_string(),
        })
        .unwrap_or_else(|| "none".to_string());
    match result.evaluation {
        Some(eval) => format!("Engine: {} ({}, depth {})", best, eval, result.depth),
        None => format!("Engine: {} (depth {})", best, result.depth),
    }
}
