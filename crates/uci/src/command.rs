//! Commands a controlling program sends to an engine.

use crate::UciError;

/// Commands sent from GUI to engine.
#[derive(Debug, Clone, PartialEq)]
pub enum GuiCommand {
    /// Initialize UCI mode.
    Uci,
    /// Check if engine is ready.
    IsReady,
    /// Change an engine option. `value` is absent for button options.
    SetOption { name: String, value: Option<String> },
    /// The next position belongs to a different game.
    UciNewGame,
    /// Set up position.
    Position {
        fen: Option<String>,
        moves: Vec<String>,
    },
    /// Start calculating.
    Go(GoOptions),
    /// Stop calculating.
    Stop,
    /// Quit the engine.
    Quit,
    /// Unknown command (for forward compatibility).
    Unknown(String),
}

/// Options for the `go` command.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GoOptions {
    /// Search for exactly this time in milliseconds.
    pub movetime: Option<u64>,
    /// Search to this depth.
    pub depth: Option<u32>,
    /// Search this many nodes.
    pub nodes: Option<u64>,
    /// White time remaining in milliseconds.
    pub wtime: Option<u64>,
    /// Black time remaining in milliseconds.
    pub btime: Option<u64>,
    /// White increment per move in milliseconds.
    pub winc: Option<u64>,
    /// Black increment per move in milliseconds.
    pub binc: Option<u64>,
    /// Moves to go until next time control.
    pub movestogo: Option<u32>,
    /// Search indefinitely until `stop`.
    pub infinite: bool,
}

impl GoOptions {
    /// A search bounded by depth and/or move time.
    pub fn limited(depth: Option<u32>, movetime: Option<u64>) -> Self {
        Self {
            depth,
            movetime,
            ..Self::default()
        }
    }

    fn to_uci(&self) -> String {
        let mut parts = vec!["go".to_string()];
        if self.infinite {
            parts.push("infinite".to_string());
        }
        if let Some(d) = self.depth {
            parts.push(format!("depth {}", d));
        }
        if let Some(n) = self.nodes {
            parts.push(format!("nodes {}", n));
        }
        if let Some(t) = self.movetime {
            parts.push(format!("movetime {}", t));
        }
        if let Some(t) = self.wtime {
            parts.push(format!("wtime {}", t));
        }
        if let Some(t) = self.btime {
            parts.push(format!("btime {}", t));
        }
        if let Some(t) = self.winc {
            parts.push(format!("winc {}", t));
        }
        if let Some(t) = self.binc {
            parts.push(format!("binc {}", t));
        }
        if let Some(n) = self.movestogo {
            parts.push(format!("movestogo {}", n));
        }
        parts.join(" ")
    }
}

impl GuiCommand {
    /// Parse a UCI command string.
    pub fn parse(input: &str) -> Result<Self, UciError> {
        let input = input.trim();
        let mut parts = input.split_whitespace();

        let cmd = parts.next().unwrap_or("");

        match cmd {
            "uci" => Ok(GuiCommand::Uci),
            "isready" => Ok(GuiCommand::IsReady),
            "ucinewgame" => Ok(GuiCommand::UciNewGame),
            "stop" => Ok(GuiCommand::Stop),
            "quit" => Ok(GuiCommand::Quit),
            "setoption" => Self::parse_setoption(parts),
            "position" => Self::parse_position(parts),
            "go" => Self::parse_go(parts),
            "" => Ok(GuiCommand::Unknown(String::new())),
            _ => Ok(GuiCommand::Unknown(input.to_string())),
        }
    }

    /// Format the command as a protocol line (without newline).
    pub fn to_uci(&self) -> String {
        match self {
            GuiCommand::Uci => "uci".to_string(),
            GuiCommand::IsReady => "isready".to_string(),
            GuiCommand::UciNewGame => "ucinewgame".to_string(),
            GuiCommand::SetOption { name, value } => match value {
                Some(v) => format!("setoption name {} value {}", name, v),
                None => format!("setoption name {}", name),
            },
            GuiCommand::Position { fen, moves } => {
                let mut line = match fen {
                    Some(f) => format!("position fen {}", f),
                    None => "position startpos".to_string(),
                };
                if !moves.is_empty() {
                    line.push_str(" moves ");
                    line.push_str(&moves.join(" "));
                }
                line
            }
            GuiCommand::Go(opts) => opts.to_uci(),
            GuiCommand::Stop => "stop".to_string(),
            GuiCommand::Quit => "quit".to_string(),
            GuiCommand::Unknown(raw) => raw.clone(),
        }
    }

    fn parse_setoption<'a>(mut parts: impl Iterator<Item = &'a str>) -> Result<Self, UciError> {
        if parts.next() != Some("name") {
            return Err(UciError::ParseError(
                "Expected 'name' after 'setoption'".to_string(),
            ));
        }

        // Option names may contain spaces ("Skill Level"), so collect until "value".
        let mut name = Vec::new();
        let mut value = Vec::new();
        let mut in_value = false;
        for part in parts {
            if !in_value && part == "value" {
                in_value = true;
            } else if in_value {
                value.push(part);
            } else {
                name.push(part);
            }
        }

        if name.is_empty() {
            return Err(UciError::ParseError("Missing option name".to_string()));
        }

        Ok(GuiCommand::SetOption {
            name: name.join(" "),
            value: in_value.then(|| value.join(" ")),
        })
    }

    fn parse_position<'a>(mut parts: impl Iterator<Item = &'a str>) -> Result<Self, UciError> {
        let mut fen = None;
        let mut moves = Vec::new();

        match parts.next() {
            Some("startpos") => {}
            Some("fen") => {
                // Collect FEN parts until "moves" or end
                let mut fen_parts = Vec::new();
                for part in parts.by_ref() {
                    if part == "moves" {
                        break;
                    }
                    fen_parts.push(part);
                }
                if !fen_parts.is_empty() {
                    fen = Some(fen_parts.join(" "));
                }
            }
            Some(other) => {
                return Err(UciError::ParseError(format!(
                    "Expected 'startpos' or 'fen', got '{}'",
                    other
                )));
            }
            None => {
                return Err(UciError::ParseError(
                    "Expected 'startpos' or 'fen'".to_string(),
                ));
            }
        }

        let remaining: Vec<&str> = parts.collect();
        let moves_start = remaining.iter().position(|&s| s == "moves");

        if let Some(idx) = moves_start {
            moves = remaining[idx + 1..].iter().map(|s| s.to_string()).collect();
        } else if fen.is_some() {
            // FEN case already consumed "moves" in the loop
            moves = remaining.iter().map(|s| s.to_string()).collect();
        }

        Ok(GuiCommand::Position { fen, moves })
    }

    fn parse_go<'a>(parts: impl Iterator<Item = &'a str>) -> Result<Self, UciError> {
        let mut opts = GoOptions::default();
        let parts: Vec<&str> = parts.collect();
        let mut i = 0;

        while i < parts.len() {
            let next = parts.get(i + 1).copied();
            match parts[i] {
                "movetime" => opts.movetime = next.and_then(|v| v.parse().ok()),
                "depth" => opts.depth = next.and_then(|v| v.parse().ok()),
                "nodes" => opts.nodes = next.and_then(|v| v.parse().ok()),
                "wtime" => opts.wtime = next.and_then(|v| v.parse().ok()),
                "btime" => opts.btime = next.and_then(|v| v.parse().ok()),
                "winc" => opts.winc = next.and_then(|v| v.parse().ok()),
                "binc" => opts.binc = next.and_then(|v| v.parse().ok()),
                "movestogo" => opts.movestogo = next.and_then(|v| v.parse().ok()),
                "infinite" => {
                    opts.infinite = true;
                    i += 1;
                    continue;
                }
                _ => {
                    i += 1;
                    continue;
                }
            }
            i += 2;
        }

        Ok(GuiCommand::Go(opts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_uci() {
        assert_eq!(GuiCommand::parse("uci").unwrap(), GuiCommand::Uci);
    }

    #[test]
    fn parse_isready() {
        assert_eq!(GuiCommand::parse("isready").unwrap(), GuiCommand::IsReady);
    }

    #[test]
    fn parse_position_startpos_with_moves() {
        let cmd = GuiCommand::parse("position startpos moves e2e4 e7e5").unwrap();
        assert_eq!(
            cmd,
            GuiCommand::Position {
                fen: None,
                moves: vec!["e2e4".to_string(), "e7e5".to_string()]
            }
        );
    }

    #[test]
    fn parse_position_fen_with_moves() {
        let cmd = GuiCommand::parse(
            "position fen rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1 moves c7c5",
        )
        .unwrap();
        assert_eq!(
            cmd,
            GuiCommand::Position {
                fen: Some(
                    "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1".to_string()
                ),
                moves: vec!["c7c5".to_string()]
            }
        );
    }

    #[test]
    fn parse_setoption_with_spaces() {
        let cmd = GuiCommand::parse("setoption name Skill Level value 12").unwrap();
        assert_eq!(
            cmd,
            GuiCommand::SetOption {
                name: "Skill Level".to_string(),
                value: Some("12".to_string())
            }
        );
    }

    #[test]
    fn parse_setoption_button() {
        let cmd = GuiCommand::parse("setoption name Clear Hash").unwrap();
        assert_eq!(
            cmd,
            GuiCommand::SetOption {
                name: "Clear Hash".to_string(),
                value: None
            }
        );
        assert!(GuiCommand::parse("setoption value 3").is_err());
    }

    #[test]
    fn parse_go_options() {
        let cmd = GuiCommand::parse("go depth 10 movetime 250").unwrap();
        assert_eq!(cmd, GuiCommand::Go(GoOptions::limited(Some(10), Some(250))));

        let GuiCommand::Go(opts) = GuiCommand::parse("go infinite").unwrap() else {
            panic!("Expected Go command");
        };
        assert!(opts.infinite);
    }

    #[test]
    fn commands_format_and_reparse() {
        let commands = [
            GuiCommand::Uci,
            GuiCommand::UciNewGame,
            GuiCommand::SetOption {
                name: "MultiPV".to_string(),
                value: Some("3".to_string()),
            },
            GuiCommand::Position {
                fen: None,
                moves: vec!["e2e4".to_string()],
            },
            GuiCommand::Go(GoOptions::limited(Some(15), Some(1000))),
            GuiCommand::Stop,
            GuiCommand::Quit,
        ];
        for cmd in commands {
            assert_eq!(GuiCommand::parse(&cmd.to_uci()).unwrap(), cmd);
        }
    }

    #[test]
    fn position_without_moves_omits_keyword() {
        let cmd = GuiCommand::Position {
            fen: Some("8/8/8/8/8/8/8/K6k w - - 0 1".to_string()),
            moves: vec![],
        };
        assert_eq!(cmd.to_uci(), "position fen 8/8/8/8/8/8/8/K6k w - - 0 1");
    }
}
