//! Bridge between a chess game and an external UCI analysis engine.
//!
//! - [`EngineSession`] owns the engine process: spawn, handshake, requests,
//!   crash detection and restart. Output is parsed on a reader task and
//!   pushed as [`SessionEvent`]s.
//! - [`AnalysisCoordinator`] issues one live request per position change,
//!   cancels the previous one and publishes only results whose fingerprint
//!   still matches the current position.
//! - [`GameController`] combines a [`chess_rules::GameTimeline`] with a
//!   coordinator into the API a front end drives.
//!
//! The crate also ships `mock-uci`, a scripted engine used by the tests.

mod analysis;
mod config;
mod controller;
mod coordinator;
mod error;
mod review;
mod session;

pub use analysis::{
    AnalysisResult, Alternative, DetailedEvaluation, Evaluation, PvLine, RequestId, SearchLimit,
};
pub use config::{AnalysisSettings, EngineConfig, GameConfig, HelperConfig, DEFAULT_CONFIG_FILE};
pub use controller::GameController;
pub use coordinator::{AnalysisCoordinator, AnalysisUpdate};
pub use error::{ConfigError, EngineError, GameFileError};
pub use review::{review_game, GameReview, MoveQuality, MoveReview, PlayerSummary};
pub use session::{AnalysisBackend, EnginePosition, EngineSession, SessionEvent, SessionState};

/// A controller wired to a fresh, not yet started engine session.
///
/// Must be called inside a Tokio runtime.
pub fn connect(config: &HelperConfig) -> GameController {
    let (session, events) = EngineSession::new(config.engine.clone());
    let coordinator = AnalysisCoordinator::new(session, events, config.analysis.clone());
    GameController::new(coordinator)
        .with_players(config.game.white.clone(), config.game.black.clone())
}
