//! UCI (Universal Chess Interface) protocol types.
//!
//! Both directions of the protocol are covered: [`GuiCommand`] is what a
//! controlling program writes to an engine, [`EngineMessage`] is what the
//! engine writes back. Each side can format and parse lines, so the same
//! types drive a real engine client and a scripted test engine.
//!
//! # Commands
//!
//! - `uci` / `uciok` - Initialize engine, get id and options
//! - `setoption name <name> [value <v>]` - Configure the engine
//! - `isready` / `readyok` - Synchronization
//! - `ucinewgame` - Forget state from the previous game
//! - `position (startpos | fen <fen>) [moves <move>...]` - Set position
//! - `go [movetime <ms>] [depth <d>] [infinite]` - Start search
//! - `stop` - Stop search, the engine still answers with `bestmove`
//! - `quit` - Exit engine

mod command;
mod info;

pub use command::{GoOptions, GuiCommand};
pub use info::{EngineInfo, InfoBuilder, Score, ScoreBound};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum UciError {
    #[error("Invalid command: {0}")]
    InvalidCommand(String),
    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Messages sent from engine to GUI.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineMessage {
    /// Engine identification.
    Id { name: Option<String>, author: Option<String> },
    /// UCI initialization complete.
    UciOk,
    /// Engine is ready.
    ReadyOk,
    /// Search information.
    Info(EngineInfo),
    /// Best move found. `None` when the position has no legal moves
    /// (`bestmove (none)`).
    BestMove { mv: Option<String>, ponder: Option<String> },
}

impl EngineMessage {
    /// Format message for output.
    pub fn to_uci(&self) -> String {
        match self {
            EngineMessage::Id { name, author } => {
                let mut parts = Vec::new();
                if let Some(n) = name {
                    parts.push(format!("id name {}", n));
                }
                if let Some(a) = author {
                    parts.push(format!("id author {}", a));
                }
                parts.join("\n")
            }
            EngineMessage::UciOk => "uciok".to_string(),
            EngineMessage::ReadyOk => "readyok".to_string(),
            EngineMessage::Info(info) => info.to_uci(),
            EngineMessage::BestMove { mv, ponder } => {
                let mv = mv.as_deref().unwrap_or("(none)");
                match ponder {
                    Some(p) => format!("bestmove {} ponder {}", mv, p),
                    None => format!("bestmove {}", mv),
                }
            }
        }
    }

    /// Parse one line of engine output.
    ///
    /// Returns `None` for lines that are not part of the protocol subset we
    /// consume (`option`, `copyprotection`, banners printed before `uci`).
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        let mut parts = line.split_whitespace();

        match parts.next()? {
            "uciok" => Some(EngineMessage::UciOk),
            "readyok" => Some(EngineMessage::ReadyOk),
            "info" => EngineInfo::parse(line).map(EngineMessage::Info),
            "id" => {
                let key = parts.next()?;
                let value = parts.collect::<Vec<_>>().join(" ");
                match key {
                    "name" => Some(EngineMessage::Id {
                        name: Some(value),
                        author: None,
                    }),
                    "author" => Some(EngineMessage::Id {
                        name: None,
                        author: Some(value),
                    }),
                    _ => None,
                }
            }
            "bestmove" => {
                let mv = match parts.next() {
                    None | Some("(none)") | Some("0000") => None,
                    Some(m) => Some(m.to_string()),
                };
                let ponder = match (parts.next(), parts.next()) {
                    (Some("ponder"), Some(p)) => Some(p.to_string()),
                    _ => None,
                };
                Some(EngineMessage::BestMove { mv, ponder })
            }
            _ => None,
        }
    }
}
