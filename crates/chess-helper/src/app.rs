//! The interactive session: one command at a time against a `GameController`.

use crate::command::{Command, HELP};
use crate::render;
use analysis_bridge::{AnalysisUpdate, GameController, HelperConfig};
use anyhow::Context;
use chess_core::Color;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct App {
    controller: GameController,
    config: HelperConfig,
    config_path: PathBuf,
    player: Color,
}

impl App {
    pub fn new(
        controller: GameController,
        config: HelperConfig,
        config_path: PathBuf,
        player: Color,
    ) -> Self {
        Self {
            controller,
            config,
            config_path,
            player,
        }
    }

    pub fn controller(&self) -> &GameController {
        &self.controller
    }

    pub fn prompt(&self) -> String {
        let to_move = self.controller.current_position().side_to_move();
        let who = if to_move == self.player {
            "your move"
        } else {
            "opponent"
        };
        format!("chess-helper ({}, {})> ", to_move, who)
    }

    pub fn print_board(&self) {
        println!(
            "\n{}",
            render::board(&self.controller.current_position(), self.controller.status())
        );
    }

    /// Prints finished live analysis; progress lines are too chatty for a prompt.
    pub fn show_update(&self, update: AnalysisUpdate) {
        match update {
            AnalysisUpdate::Result(result) if result.is_final => {
                println!(
                    "{}",
                    render::live_result(&result, &self.controller.current_position())
                );
            }
            AnalysisUpdate::Result(_) => {}
            AnalysisUpdate::EngineStopped { crashed: true } => {
                println!("The engine crashed; analysis is unavailable until it is restarted.");
            }
            AnalysisUpdate::EngineStopped { crashed: false } => {}
        }
    }

    pub async fn execute(&mut self, command: Command) -> anyhow::Result<Flow> {
        match command {
            Command::Help => println!("{}", HELP),
            Command::Board => self.print_board(),
            Command::Moves => println!("{}", render::legal_moves(&self.controller.legal_moves())),
            Command::History => {
                let start = self.controller.timeline().start_position();
                println!(
                    "{}",
                    render::history(
                        &self.controller.timeline().history_san(),
                        start.fullmove_number(),
                        start.side_to_move() == Color::Black,
                    )
                );
            }
            Command::Undo => match self.controller.undo() {
                Ok(_) => {
                    println!("Move undone.");
                    self.print_board();
                }
                Err(e) => println!("{}", e),
            },
            Command::Redo => match self.controller.redo() {
                Ok(_) => {
                    println!("Move redone.");
                    self.print_board();
                }
                Err(e) => println!("{}", e),
            },
            Command::ToggleAnalysis => {
                let enabled = !self.controller.analysis_enabled();
                self.controller.set_analysis_enabled(enabled);
                println!(
                    "Engine analysis {}.",
                    if enabled { "enabled" } else { "disabled" }
                );
            }
            Command::Eval => match self.controller.evaluate().await {
                Ok(detailed) => println!("\nFEN: {}\n{}", detailed.fen, detailed),
                Err(e) => println!("Evaluation unavailable: {}", e),
            },
            Command::Review(path) => self.review(path.as_deref()).await?,
            Command::Stats => println!("{}", render::statistics(&self.controller.statistics())),
            Command::Fen => println!("{}", self.controller.current_position().to_fen()),
            Command::Save(path) => {
                let path = path.unwrap_or_else(|| self.timestamped("chess_game"));
                self.save(&path)?;
                println!("Game saved to {}", path.display());
            }
            Command::Load(path) => match self.controller.load_pgn_file(&path) {
                Ok(()) => {
                    println!(
                        "Loaded {} ({} plies).",
                        path.display(),
                        self.controller.timeline().len()
                    );
                    self.print_board();
                }
                Err(e) => println!("Could not load {}: {}", path.display(), e),
            },
            Command::New => {
                self.controller.new_game();
                println!("New game started.");
                self.print_board();
            }
            Command::ShowConfig => {
                let text = self.config.to_toml().context("Failed to encode config")?;
                println!("Configuration ({}):\n{}", self.config_path.display(), text);
            }
            Command::SetConfig(key, value) => self.set_config(&key, &value),
            Command::ResetConfig => {
                self.config = HelperConfig::default();
                self.controller.set_analysis_enabled(self.config.analysis.enabled);
                println!("Configuration reset to defaults.");
            }
            Command::SaveConfig => {
                self.config
                    .save(&self.config_path)
                    .with_context(|| format!("Failed to save {}", self.config_path.display()))?;
                println!("Configuration saved to {}", self.config_path.display());
            }
            Command::Quit => return Ok(Flow::Quit),
            Command::Move(text) => self.play(&text)?,
        }
        Ok(Flow::Continue)
    }

    /// Game settings apply at once; engine and search settings on the next launch.
    fn set_config(&mut self, key: &str, value: &str) {
        if let Err(e) = self.config.set(key, value) {
            println!("{}", e);
            return;
        }
        println!("Set {} = {}", key, value);
        if key == "analysis.enabled" {
            self.controller.set_analysis_enabled(self.config.analysis.enabled);
        } else if !key.starts_with("game.") {
            println!("Takes effect the next time Chess Helper starts.");
        }
    }

    fn play(&mut self, text: &str) -> anyhow::Result<()> {
        if let Err(e) = self.controller.make_move(text) {
            println!("{}", e);
            return Ok(());
        }
        self.print_board();

        let status = self.controller.status();
        if status.is_over() {
            println!("Result: {}", self.controller.result());
        }
        self.auto_save()
    }

    fn auto_save(&self) -> anyhow::Result<()> {
        let plies = self.controller.timeline().cursor();
        let game = &self.config.game;
        if !game.auto_save || game.auto_save_interval == 0 {
            return Ok(());
        }
        if plies == 0 || plies % game.auto_save_interval as usize != 0 {
            return Ok(());
        }
        let path = self.timestamped("autosave");
        self.save(&path)?;
        tracing::info!("Auto-saved after {} plies to {}", plies, path.display());
        Ok(())
    }

    fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        self.controller
            .save_pgn_file(path)
            .with_context(|| format!("Failed to save {}", path.display()))
    }

    fn timestamped(&self, prefix: &str) -> PathBuf {
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        self.config
            .game
            .pgn_export_path
            .join(format!("{}_{}.pgn", prefix, stamp))
    }

    async fn review(&self, path: Option<&Path>) -> anyhow::Result<()> {
        println!("Reviewing {} plies...", self.controller.timeline().cursor());
        let review = match self.controller.review().await {
            Ok(review) => review,
            Err(e) => {
                println!("Review unavailable: {}", e);
                return Ok(());
            }
        };
        println!("\n{}", review);

        if let Some(path) = path {
            let json = review.to_json().context("Failed to encode review")?;
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Review written to {}", path.display());
        }
        Ok(())
    }
}
