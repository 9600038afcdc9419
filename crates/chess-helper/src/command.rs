//! Parsing of the lines typed at the prompt.

use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Board,
    Moves,
    History,
    Undo,
    Redo,
    ToggleAnalysis,
    Eval,
    Review(Option<PathBuf>),
    Stats,
    Fen,
    Save(Option<PathBuf>),
    Load(PathBuf),
    New,
    ShowConfig,
    /// Dotted key and the rest of the line as its value.
    SetConfig(String, String),
    ResetConfig,
    SaveConfig,
    Quit,
    /// Anything else is tried as a move in SAN or coordinate notation.
    Move(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageError(pub &'static str);

impl std::fmt::Display for UsageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "usage: {}", self.0)
    }
}

impl Command {
    /// Returns `None` for a blank line.
    pub fn parse(line: &str) -> Option<Result<Self, UsageError>> {
        let mut parts = line.split_whitespace();
        let word = parts.next()?;
        let rest: Vec<&str> = parts.collect();
        let arg = rest.first().map(|a| PathBuf::from(*a));

        let command = match word.to_ascii_lowercase().as_str() {
            "help" | "?" => Command::Help,
            "board" => Command::Board,
            "moves" => Command::Moves,
            "history" => Command::History,
            "undo" => Command::Undo,
            "redo" => Command::Redo,
            "analysis" => Command::ToggleAnalysis,
            "eval" => Command::Eval,
            "review" => Command::Review(arg),
            "stats" => Command::Stats,
            "fen" => Command::Fen,
            "save" => Command::Save(arg),
            "load" => match arg {
                Some(path) => Command::Load(path),
                None => return Some(Err(UsageError("load <file>"))),
            },
            "new" | "reset" => Command::New,
            "config" => Command::ShowConfig,
            "set" => match rest.split_first() {
                Some((key, value)) if !value.is_empty() => {
                    Command::SetConfig(key.to_string(), value.join(" "))
                }
                _ => return Some(Err(UsageError("set <key> <value>"))),
            },
            "reset_config" => Command::ResetConfig,
            "save_config" => Command::SaveConfig,
            "quit" | "exit" | "q" => Command::Quit,
            _ => Command::Move(word.to_string()),
        };
        Some(Ok(command))
    }
}

pub const HELP: &str = "\
Available commands:
  <move>         Make a move (e4, Nf3, O-O, exd5, e7e8q)
  help           Show this help message
  board          Display the current position
  moves          List legal moves
  history        Show the moves played
  undo / redo    Step back or forward one move
  analysis       Toggle live engine analysis
  eval           Detailed evaluation of the current position
  review [file]  Rate every move; writes JSON when a file is given
  stats          Game statistics
  fen            Print the current position as FEN
  save [file]    Save the game as PGN
  load <file>    Load a game from PGN
  new            Start a new game
  config         Show the current settings
  set <key> <v>  Change a setting (set analysis.depth 20)
  reset_config   Restore the default settings
  save_config    Write the settings to the config file
  quit           Exit";
