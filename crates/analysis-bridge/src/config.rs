//! Configuration loading and saving for the helper.
//!
//! Every field has a default, so a missing file, a missing table or a
//! missing key all fall back to the values below.

use crate::analysis::SearchLimit;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the config file looked up by default.
pub const DEFAULT_CONFIG_FILE: &str = "chess-helper.toml";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct HelperConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub analysis: AnalysisSettings,
    #[serde(default)]
    pub game: GameConfig,
}

impl HelperConfig {
    /// Loads `path`, or returns the defaults when it does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&content)?;
        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Writes the config to `path`, creating its directory if needed.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, self.to_toml()?)?;
        tracing::info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Sets one value by its dotted key, e.g. `analysis.depth` or
    /// `engine.options.Threads`. The text is parsed to the field's type.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let engine = &mut self.engine;
        let analysis = &mut self.analysis;
        let game = &mut self.game;
        match key {
            "engine.path" => engine.path = value.to_string(),
            "engine.args" => engine.args = value.split_whitespace().map(String::from).collect(),
            "engine.handshake_timeout_ms" => engine.handshake_timeout_ms = parse(key, value)?,
            "engine.skill_level" => engine.skill_level = parse(key, value)?,
            "analysis.enabled" => analysis.enabled = parse(key, value)?,
            "analysis.depth" => analysis.depth = parse(key, value)?,
            "analysis.movetime_ms" => analysis.movetime_ms = parse(key, value)?,
            "analysis.detailed_depth" => analysis.detailed_depth = parse(key, value)?,
            "analysis.detailed_movetime_ms" => analysis.detailed_movetime_ms = parse(key, value)?,
            "analysis.detailed_lines" => analysis.detailed_lines = parse(key, value)?,
            "analysis.eval_timeout_ms" => analysis.eval_timeout_ms = parse(key, value)?,
            "game.white" => game.white = value.to_string(),
            "game.black" => game.black = value.to_string(),
            "game.auto_save" => game.auto_save = parse(key, value)?,
            "game.auto_save_interval" => game.auto_save_interval = parse(key, value)?,
            "game.pgn_export_path" => game.pgn_export_path = PathBuf::from(value),
            _ => match key.strip_prefix("engine.options.") {
                Some(name) if !name.is_empty() => {
                    engine.options.insert(name.to_string(), option_value(value));
                }
                _ => return Err(ConfigError::UnknownKey(key.to_string())),
            },
        }
        tracing::debug!("Config {} set to {}", key, value);
        Ok(())
    }
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// UCI option values keep their natural TOML type where one fits.
fn option_value(value: &str) -> toml::Value {
    if let Ok(b) = value.parse::<bool>() {
        toml::Value::Boolean(b)
    } else if let Ok(n) = value.parse::<i64>() {
        toml::Value::Integer(n)
    } else {
        toml::Value::String(value.to_string())
    }
}

/// How to launch and configure the engine process.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    #[serde(default = "default_engine_path")]
    pub path: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
    #[serde(default = "default_skill_level")]
    pub skill_level: u8,
    /// Extra UCI options, sent verbatim after the handshake.
    #[serde(default)]
    pub options: BTreeMap<String, toml::Value>,
}

fn default_engine_path() -> String {
    "stockfish".to_string()
}

fn default_handshake_timeout_ms() -> u64 {
    5000
}

fn default_skill_level() -> u8 {
    20
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            path: default_engine_path(),
            args: Vec::new(),
            handshake_timeout_ms: default_handshake_timeout_ms(),
            skill_level: default_skill_level(),
            options: BTreeMap::new(),
        }
    }
}

impl EngineConfig {
    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    /// Skill level clamped to the 0..=20 range engines accept.
    pub fn skill_level(&self) -> u8 {
        self.skill_level.min(20)
    }

    /// The `setoption` pairs sent once the engine has answered `uciok`.
    pub fn uci_options(&self) -> Vec<(String, String)> {
        let mut options = vec![("Skill Level".to_string(), self.skill_level().to_string())];
        for (name, value) in &self.options {
            let value = match value {
                toml::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            options.push((name.clone(), value));
        }
        options
    }
}

/// Search budgets for live and on-demand analysis.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnalysisSettings {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_depth")]
    pub depth: u32,
    #[serde(default = "default_movetime_ms")]
    pub movetime_ms: u64,
    #[serde(default = "default_detailed_depth")]
    pub detailed_depth: u32,
    #[serde(default = "default_detailed_movetime_ms")]
    pub detailed_movetime_ms: u64,
    #[serde(default = "default_detailed_lines")]
    pub detailed_lines: u32,
    #[serde(default = "default_eval_timeout_ms")]
    pub eval_timeout_ms: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_depth() -> u32 {
    15
}

fn default_movetime_ms() -> u64 {
    1000
}

fn default_detailed_depth() -> u32 {
    20
}

fn default_detailed_movetime_ms() -> u64 {
    3000
}

fn default_detailed_lines() -> u32 {
    3
}

fn default_eval_timeout_ms() -> u64 {
    10_000
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            depth: default_depth(),
            movetime_ms: default_movetime_ms(),
            detailed_depth: default_detailed_depth(),
            detailed_movetime_ms: default_detailed_movetime_ms(),
            detailed_lines: default_detailed_lines(),
            eval_timeout_ms: default_eval_timeout_ms(),
        }
    }
}

impl AnalysisSettings {
    /// Quick analysis while a game is being played.
    pub fn live() -> Self {
        Self {
            depth: 10,
            movetime_ms: 500,
            ..Self::default()
        }
    }

    /// Thorough analysis for reviewing a finished game.
    pub fn deep() -> Self {
        Self {
            depth: 20,
            movetime_ms: 3000,
            ..Self::default()
        }
    }

    pub fn live_limit(&self) -> SearchLimit {
        SearchLimit::new(Some(self.depth), Some(Duration::from_millis(self.movetime_ms)))
    }

    pub fn detailed_limit(&self) -> SearchLimit {
        SearchLimit::new(
            Some(self.detailed_depth),
            Some(Duration::from_millis(self.detailed_movetime_ms)),
        )
        .with_lines(self.detailed_lines)
    }

    pub fn eval_timeout(&self) -> Duration {
        Duration::from_millis(self.eval_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GameConfig {
    #[serde(default = "default_white")]
    pub white: String,
    #[serde(default = "default_black")]
    pub black: String,
    #[serde(default = "default_auto_save")]
    pub auto_save: bool,
    /// Plies between automatic saves.
    #[serde(default = "default_auto_save_interval")]
    pub auto_save_interval: u32,
    #[serde(default = "default_pgn_export_path")]
    pub pgn_export_path: PathBuf,
}

fn default_white() -> String {
    "Player".to_string()
}

fn default_black() -> String {
    "Opponent".to_string()
}

fn default_auto_save() -> bool {
    true
}

fn default_auto_save_interval() -> u32 {
    10
}

fn default_pgn_export_path() -> PathBuf {
    PathBuf::from("saved_games")
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            white: default_white(),
            black: default_black(),
            auto_save: default_auto_save(),
            auto_save_interval: default_auto_save_interval(),
            pgn_export_path: default_pgn_export_path(),
        }
    }
}
