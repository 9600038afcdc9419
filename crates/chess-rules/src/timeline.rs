//! Game timeline: the sequence of plies with an undo/redo cursor.

use crate::error::{MoveError, TimelineError};
use crate::movegen::{apply_move, is_check, legal_moves};
use crate::pgn::PgnTags;
use crate::san::{move_to_san, parse_move};
use crate::stats::GameStatistics;
use crate::status::{game_status, GameStatus};
use crate::zobrist::Fingerprint;
use crate::Position;
use chess_core::{FenError, Move};

/// One half-move of the game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ply {
    /// The move as generated for the position before it.
    pub mv: Move,
    /// SAN written against the position before the move.
    pub san: String,
    /// The position after the move.
    pub position: Position,
}

/// An ordered history of plies with a cursor marking the current one.
///
/// Plies past the cursor form the redo buffer. Playing a new move while the
/// cursor is not at the end discards them.
#[derive(Debug, Clone)]
pub struct GameTimeline {
    start: Position,
    plies: Vec<Ply>,
    cursor: usize,
    tags: PgnTags,
}

impl Default for GameTimeline {
    fn default() -> Self {
        Self::new()
    }
}

impl GameTimeline {
    /// A new game from the standard starting position.
    pub fn new() -> Self {
        Self::from_position(Position::startpos())
    }

    /// A new game from an arbitrary position.
    pub fn from_position(start: Position) -> Self {
        GameTimeline {
            start,
            plies: Vec::new(),
            cursor: 0,
            tags: PgnTags::default(),
        }
    }

    pub fn from_fen(fen: &str) -> Result<Self, FenError> {
        Ok(Self::from_position(Position::from_fen(fen)?))
    }

    pub(crate) fn with_tags(mut self, tags: PgnTags) -> Self {
        self.tags = tags;
        self
    }

    pub fn start_position(&self) -> Position {
        self.start
    }

    /// The position at the cursor.
    pub fn current_position(&self) -> Position {
        match self.cursor {
            0 => self.start,
            n => self.plies[n - 1].position,
        }
    }

    /// Parses `text` (SAN, or coordinate notation as a fallback) and plays it.
    pub fn make_move(&mut self, text: &str) -> Result<Position, MoveError> {
        let m = parse_move(&self.current_position(), text)?;
        self.play(m)
    }

    /// Plays an already-resolved move.
    pub fn play(&mut self, m: Move) -> Result<Position, MoveError> {
        let before = self.current_position();
        let after = apply_move(&before, m)?;
        let san = move_to_san(&before, m);

        self.plies.truncate(self.cursor);
        self.plies.push(Ply {
            mv: m,
            san,
            position: after,
        });
        self.cursor += 1;
        self.tags.remove("Result");
        Ok(after)
    }

    /// Steps the cursor back one ply. The ply stays available for [`redo`](Self::redo).
    pub fn undo(&mut self) -> Result<Position, TimelineError> {
        if self.cursor == 0 {
            return Err(TimelineError::NothingToUndo);
        }
        self.cursor -= 1;
        Ok(self.current_position())
    }

    pub fn redo(&mut self) -> Result<Position, TimelineError> {
        if self.cursor == self.plies.len() {
            return Err(TimelineError::NothingToRedo);
        }
        self.cursor += 1;
        Ok(self.current_position())
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor < self.plies.len()
    }

    /// Number of plies up to the cursor.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Number of plies including the redo buffer.
    pub fn len(&self) -> usize {
        self.plies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plies.is_empty()
    }

    /// Plies up to the cursor.
    pub fn plies(&self) -> &[Ply] {
        &self.plies[..self.cursor]
    }

    /// Moves up to the cursor.
    pub fn history(&self) -> Vec<Move> {
        self.plies().iter().map(|ply| ply.mv).collect()
    }

    pub fn history_san(&self) -> Vec<String> {
        self.plies().iter().map(|ply| ply.san.clone()).collect()
    }

    /// Positions from the start up to and including the current one.
    pub fn positions(&self) -> impl Iterator<Item = Position> + '_ {
        std::iter::once(self.start).chain(self.plies().iter().map(|ply| ply.position))
    }

    pub fn legal_moves(&self) -> Vec<Move> {
        legal_moves(&self.current_position())
    }

    /// Legal moves of the current position in SAN, sorted.
    pub fn legal_moves_san(&self) -> Vec<String> {
        let position = self.current_position();
        let mut moves: Vec<String> = legal_moves(&position)
            .into_iter()
            .map(|m| move_to_san(&position, m))
            .collect();
        moves.sort();
        moves
    }

    pub fn is_check(&self) -> bool {
        is_check(&self.current_position())
    }

    /// Status of the current position, repetition included.
    pub fn status(&self) -> GameStatus {
        let earlier: Vec<Fingerprint> = self
            .positions()
            .take(self.cursor)
            .map(|p| p.fingerprint())
            .collect();
        game_status(&self.current_position(), &earlier)
    }

    /// "1-0", "0-1", "1/2-1/2" or "*".
    ///
    /// A finished position decides the result. Otherwise a result recorded in
    /// a loaded game's tags (a resignation, say) is kept until a new move is
    /// played.
    pub fn result(&self) -> String {
        let position = self.current_position();
        match self.status() {
            GameStatus::Ongoing => match self.tags.get("Result") {
                Some(tag) if self.cursor == self.plies.len() && is_result_token(tag) => {
                    tag.to_string()
                }
                _ => "*".to_string(),
            },
            status => status.result_token(position.side_to_move()).to_string(),
        }
    }

    pub fn statistics(&self) -> GameStatistics {
        GameStatistics::collect(self)
    }

    pub fn tags(&self) -> &PgnTags {
        &self.tags
    }

    pub fn tags_mut(&mut self) -> &mut PgnTags {
        &mut self.tags
    }
}

pub(crate) fn is_result_token(token: &str) -> bool {
    matches!(token, "1-0" | "0-1" | "1/2-1/2" | "*")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess_core::Color;

    fn timeline(moves: &[&str]) -> GameTimeline {
        let mut timeline = GameTimeline::new();
        for san in moves {
            timeline.make_move(san).unwrap();
        }
        timeline
    }

    #[test]
    fn make_move_advances_cursor() {
        let timeline = timeline(&["e4", "e5", "Nf3"]);
        assert_eq!(timeline.cursor(), 3);
        assert_eq!(timeline.history_san(), vec!["e4", "e5", "Nf3"]);
        assert_eq!(timeline.current_position().side_to_move(), Color::Black);
    }

    #[test]
    fn failed_move_leaves_timeline_unchanged() {
        let mut timeline = timeline(&["e4"]);
        let before = timeline.current_position();
        assert!(matches!(timeline.make_move("Ke3"), Err(MoveError::Illegal(_))));
        assert!(matches!(timeline.make_move("xyz"), Err(MoveError::Unknown(_))));
        assert_eq!(timeline.current_position(), before);
        assert_eq!(timeline.cursor(), 1);
    }

    #[test]
    fn undo_and_redo_walk_the_cursor() {
        let mut timeline = timeline(&["e4", "e5"]);
        let after_e5 = timeline.current_position();

        let after_e4 = timeline.undo().unwrap();
        assert_eq!(after_e4.side_to_move(), Color::Black);
        assert_eq!(timeline.history_san(), vec!["e4"]);
        assert_eq!(timeline.len(), 2);

        assert_eq!(timeline.redo().unwrap(), after_e5);
        assert_eq!(timeline.redo(), Err(TimelineError::NothingToRedo));
    }

    #[test]
    fn undo_on_empty_game_fails() {
        let mut timeline = GameTimeline::new();
        assert_eq!(timeline.undo(), Err(TimelineError::NothingToUndo));
        assert_eq!(timeline.redo(), Err(TimelineError::NothingToRedo));
    }

    #[test]
    fn new_move_truncates_redo_buffer() {
        let mut timeline = timeline(&["e4", "e5", "Nf3"]);
        timeline.undo().unwrap();
        timeline.undo().unwrap();
        timeline.make_move("c5").unwrap();
        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline.history_san(), vec!["e4", "c5"]);
        assert!(!timeline.can_redo());
    }

    #[test]
    fn queen_takes_with_check() {
        let mut timeline = timeline(&["e4", "e5", "Qh5", "Nc6"]);
        assert!(timeline.legal_moves_san().contains(&"Qxe5+".to_string()));
        timeline.make_move("Qxe5+").unwrap();
        assert_eq!(timeline.status(), GameStatus::Ongoing);
        assert!(timeline.is_check());
        assert_eq!(timeline.current_position().side_to_move(), Color::Black);
    }

    #[test]
    fn fools_mate() {
        let timeline = timeline(&["f3", "e5", "g4", "Qh4#"]);
        assert_eq!(timeline.status(), GameStatus::Checkmate);
        assert!(timeline.legal_moves().is_empty());
        assert_eq!(timeline.result(), "0-1");
    }

    #[test]
    fn knight_shuffle_repeats() {
        let mut timeline = timeline(&["Nf3", "Nf6", "Ng1", "Ng8", "Nf3", "Nf6", "Ng1"]);
        assert_eq!(timeline.status(), GameStatus::Ongoing);
        timeline.make_move("Ng8").unwrap();
        assert_eq!(timeline.status(), GameStatus::Repetition);
        assert_eq!(timeline.result(), "1/2-1/2");

        // Stepping back leaves only two occurrences.
        timeline.undo().unwrap();
        assert_eq!(timeline.status(), GameStatus::Ongoing);
    }

    #[test]
    fn from_fen_starts_mid_game() {
        let mut timeline = GameTimeline::from_fen("4k3/8/8/8/8/8/4P3/4K3 w - - 0 30").unwrap();
        timeline.make_move("e4").unwrap();
        assert_eq!(timeline.current_position().fullmove_number(), 30);
        assert_eq!(timeline.positions().count(), 2);
    }
}
