//! The API a front end drives: game actions plus analysis.
//!
//! Every successful change of the current position is reported to the
//! coordinator. Engine trouble is logged and never fails a game action.

use crate::analysis::DetailedEvaluation;
use crate::coordinator::{AnalysisCoordinator, AnalysisUpdate};
use crate::error::{EngineError, GameFileError};
use crate::review::{review_game, GameReview};
use crate::session::{AnalysisBackend, EnginePosition, EngineSession};
use chess_rules::{
    GameStatistics, GameStatus, GameTimeline, MoveError, PgnError, Position, TimelineError,
};
use std::path::Path;
use tokio::sync::broadcast;

pub struct GameController<B: AnalysisBackend = EngineSession> {
    timeline: GameTimeline,
    coordinator: AnalysisCoordinator<B>,
    white: String,
    black: String,
}

impl<B: AnalysisBackend> GameController<B> {
    pub fn new(coordinator: AnalysisCoordinator<B>) -> Self {
        Self {
            timeline: GameTimeline::new(),
            coordinator,
            white: "?".to_string(),
            black: "?".to_string(),
        }
    }

    /// Player names written into this and every later game.
    pub fn with_players(mut self, white: impl Into<String>, black: impl Into<String>) -> Self {
        self.white = white.into();
        self.black = black.into();
        self.apply_players();
        self
    }

    fn apply_players(&mut self) {
        let tags = self.timeline.tags_mut();
        tags.set("White", self.white.clone());
        tags.set("Black", self.black.clone());
    }

    pub fn timeline(&self) -> &GameTimeline {
        &self.timeline
    }

    pub fn coordinator(&self) -> &AnalysisCoordinator<B> {
        &self.coordinator
    }

    pub fn current_position(&self) -> Position {
        self.timeline.current_position()
    }

    pub fn legal_moves(&self) -> Vec<String> {
        self.timeline.legal_moves_san()
    }

    pub fn status(&self) -> GameStatus {
        self.timeline.status()
    }

    pub fn result(&self) -> String {
        self.timeline.result()
    }

    pub fn statistics(&self) -> GameStatistics {
        self.timeline.statistics()
    }

    pub fn make_move(&mut self, text: &str) -> Result<Position, MoveError> {
        let position = self.timeline.make_move(text)?;
        self.position_changed();
        Ok(position)
    }

    pub fn undo(&mut self) -> Result<Position, TimelineError> {
        let position = self.timeline.undo()?;
        self.position_changed();
        Ok(position)
    }

    pub fn redo(&mut self) -> Result<Position, TimelineError> {
        let position = self.timeline.redo()?;
        self.position_changed();
        Ok(position)
    }

    pub fn new_game(&mut self) {
        self.timeline = GameTimeline::new();
        self.apply_players();
        self.position_changed();
    }

    pub fn new_game_from(&mut self, start: Position) {
        self.timeline = GameTimeline::from_position(start);
        self.apply_players();
        self.position_changed();
    }

    pub fn to_pgn(&self) -> String {
        self.timeline.to_pgn()
    }

    /// Replaces the game with the one in `text`. On error the current game
    /// is kept.
    pub fn load_pgn(&mut self, text: &str) -> Result<(), PgnError> {
        self.timeline = GameTimeline::from_pgn(text)?;
        tracing::info!("Loaded game with {} plies", self.timeline.len());
        self.position_changed();
        Ok(())
    }

    pub fn save_pgn_file(&self, path: impl AsRef<Path>) -> Result<(), GameFileError> {
        self.timeline.write_pgn(path.as_ref())?;
        tracing::info!("Game saved to {}", path.as_ref().display());
        Ok(())
    }

    pub fn load_pgn_file(&mut self, path: impl AsRef<Path>) -> Result<(), GameFileError> {
        let text = std::fs::read_to_string(path)?;
        self.load_pgn(&text)?;
        Ok(())
    }

    pub fn analysis_enabled(&self) -> bool {
        self.coordinator.is_enabled()
    }

    pub fn set_analysis_enabled(&self, enabled: bool) {
        if let Err(e) = self.coordinator.set_enabled(enabled) {
            tracing::warn!("Analysis unavailable: {}", e);
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AnalysisUpdate> {
        self.coordinator.subscribe()
    }

    /// A full evaluation of the current position.
    pub async fn evaluate(&self) -> Result<DetailedEvaluation, EngineError> {
        self.coordinator
            .evaluate_detailed(&self.timeline.current_position())
            .await
    }

    /// Evaluates every move played so far.
    pub async fn review(&self) -> Result<GameReview, EngineError> {
        review_game(&self.coordinator, &self.timeline).await
    }

    fn position_changed(&self) {
        let position = EnginePosition::from(&self.timeline);
        if let Err(e) = self.coordinator.on_position_changed(position) {
            tracing::warn!("Analysis unavailable: {}", e);
        }
    }
}

impl GameController<EngineSession> {
    /// Starts the engine and analyses the current position.
    pub async fn start_engine(&self) -> Result<(), EngineError> {
        self.coordinator.backend().start().await?;
        self.position_changed();
        Ok(())
    }

    pub async fn stop_engine(&self) {
        self.coordinator.backend().stop().await;
    }

    pub async fn restart_engine(&self) -> Result<(), EngineError> {
        self.stop_engine().await;
        self.start_engine().await
    }

    pub fn engine_name(&self) -> Option<String> {
        self.coordinator.backend().engine_name()
    }
}
