//! Scripted UCI engine for exercising the engine session.
//!
//! It ranks moves one ply deep by material (mate in one first) and reports
//! one `info` line per depth and candidate, pausing `--think-ms` between
//! depths. Flags make it misbehave on purpose.

use chess_core::Color;
use chess_rules::{apply_move, is_check, legal_moves, parse_uci, Position};
use clap::Parser;
use std::collections::VecDeque;
use std::io::{self, BufRead};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};
use uci::{EngineMessage, GoOptions, GuiCommand, InfoBuilder, Score};

#[derive(Parser, Debug)]
#[command(name = "mock-uci")]
#[command(about = "Deterministic UCI engine for tests")]
struct Args {
    /// Name reported in `id name`
    #[arg(long, default_value = "Mock UCI")]
    name: String,

    /// Never answer `uci` or `isready`
    #[arg(long)]
    silent: bool,

    /// Accept `go` but never search or answer
    #[arg(long)]
    ignore_go: bool,

    /// Exit with an error as soon as a search is requested
    #[arg(long)]
    crash_on_go: bool,

    /// Pause between reported depths, in milliseconds
    #[arg(long, default_value_t = 5)]
    think_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

struct MockEngine {
    args: Args,
    position: Position,
    multipv: usize,
}

fn main() {
    let args = Args::parse();

    // Stdin is read on its own thread so `stop` arrives during a search.
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            match GuiCommand::parse(&line) {
                Ok(cmd) => {
                    if tx.send(cmd).is_err() {
                        break;
                    }
                }
                Err(e) => eprintln!("Error reading command: {}", e),
            }
        }
    });

    let mut engine = MockEngine {
        args,
        position: Position::startpos(),
        multipv: 1,
    };
    while let Ok(cmd) = rx.recv() {
        if engine.handle(cmd, &rx) == Flow::Quit {
            break;
        }
    }
}

fn send(message: EngineMessage) {
    println!("{}", message.to_uci());
}

impl MockEngine {
    fn handle(&mut self, cmd: GuiCommand, commands: &Receiver<GuiCommand>) -> Flow {
        match cmd {
            GuiCommand::Uci => {
                if !self.args.silent {
                    send(EngineMessage::Id {
                        name: Some(self.args.name.clone()),
                        author: Some("Chess Helper".to_string()),
                    });
                    println!("option name Skill Level type spin default 20 min 0 max 20");
                    println!("option name MultiPV type spin default 1 min 1 max 500");
                    send(EngineMessage::UciOk);
                }
            }
            GuiCommand::IsReady => {
                if !self.args.silent {
                    send(EngineMessage::ReadyOk);
                }
            }
            GuiCommand::SetOption { name, value } => {
                if name.eq_ignore_ascii_case("MultiPV") {
                    self.multipv = value.and_then(|v| v.parse().ok()).unwrap_or(1).max(1);
                }
            }
            GuiCommand::UciNewGame => self.position = Position::startpos(),
            GuiCommand::Position { fen, moves } => self.set_position(fen, &moves),
            GuiCommand::Go(opts) => {
                if self.args.crash_on_go {
                    eprintln!("crashing on request");
                    std::process::exit(3);
                }
                if !self.args.ignore_go {
                    return self.search(&opts, commands);
                }
            }
            GuiCommand::Stop => {}
            GuiCommand::Quit => return Flow::Quit,
            GuiCommand::Unknown(_) => {}
        }
        Flow::Continue
    }

    fn set_position(&mut self, fen: Option<String>, moves: &[String]) {
        self.position = match fen {
            Some(f) => Position::from_fen(&f).unwrap_or_else(|e| {
                eprintln!("Bad FEN {}: {}", f, e);
                Position::startpos()
            }),
            None => Position::startpos(),
        };

        for text in moves {
            match parse_uci(&self.position, text).and_then(|m| apply_move(&self.position, m)) {
                Ok(next) => self.position = next,
                Err(e) => {
                    eprintln!("Ignoring moves from {}: {}", text, e);
                    break;
                }
            }
        }
    }

    fn search(&mut self, opts: &GoOptions, commands: &Receiver<GuiCommand>) -> Flow {
        let candidates = rank_moves(&self.position);
        let Some((best, _)) = candidates.first().cloned() else {
            let score = if is_check(&self.position) {
                Score::Mate(0)
            } else {
                Score::Cp(0)
            };
            send(EngineMessage::Info(
                InfoBuilder::new().depth(0).score(score).build(),
            ));
            send(EngineMessage::BestMove {
                mv: None,
                ponder: None,
            });
            return Flow::Continue;
        };

        let started = Instant::now();
        let max_depth = match opts.depth {
            Some(d) => d.max(1),
            None if opts.infinite => u32::MAX,
            None => 64,
        };
        let deadline = opts.movetime.map(|ms| started + Duration::from_millis(ms));
        let think = Duration::from_millis(self.args.think_ms);
        let mut deferred = VecDeque::new();
        let mut flow = Flow::Continue;

        'search: for depth in 1..=max_depth {
            let pause_until = Instant::now() + think;
            loop {
                let remaining = pause_until.saturating_duration_since(Instant::now());
                match commands.recv_timeout(remaining) {
                    Ok(GuiCommand::Stop) => break 'search,
                    Ok(GuiCommand::Quit) => {
                        flow = Flow::Quit;
                        break 'search;
                    }
                    Ok(GuiCommand::IsReady) => send(EngineMessage::ReadyOk),
                    Ok(other) => deferred.push_back(other),
                    Err(RecvTimeoutError::Timeout) => break,
                    Err(RecvTimeoutError::Disconnected) => {
                        flow = Flow::Quit;
                        break 'search;
                    }
                }
            }

            let elapsed = started.elapsed().as_millis() as u64;
            for (rank, (mv, score)) in candidates.iter().take(self.multipv).enumerate() {
                let info = InfoBuilder::new()
                    .depth(depth)
                    .multipv(rank as u32 + 1)
                    .score(*score)
                    .nodes(u64::from(depth) * 1000)
                    .time(elapsed)
                    .pv([mv.as_str()])
                    .build();
                send(EngineMessage::Info(info));
            }

            if deadline.is_some_and(|d| Instant::now() >= d) {
                break;
            }
        }

        send(EngineMessage::BestMove {
            mv: Some(best),
            ponder: None,
        });

        while let Some(cmd) = deferred.pop_front() {
            if self.handle(cmd, commands) == Flow::Quit {
                return Flow::Quit;
            }
        }
        flow
    }
}

/// Legal moves with a one-ply score for the mover, best first.
fn rank_moves(position: &Position) -> Vec<(String, Score)> {
    let us = position.side_to_move();
    let mut ranked: Vec<(String, Score)> = legal_moves(position)
        .into_iter()
        .filter_map(|m| {
            let after = apply_move(position, m).ok()?;
            let score = if legal_moves(&after).is_empty() {
                if is_check(&after) {
                    Score::Mate(1)
                } else {
                    Score::Cp(0)
                }
            } else {
                Score::Cp(material_balance(&after, us) * 100)
            };
            Some((m.to_uci(), score))
        })
        .collect();

    ranked.sort_by(|(a_mv, a), (b_mv, b)| sort_key(*b).cmp(&sort_key(*a)).then(a_mv.cmp(b_mv)));
    ranked
}

fn sort_key(score: Score) -> i64 {
    match score {
        Score::Mate(n) => 1_000_000 - i64::from(n),
        Score::Cp(cp) => i64::from(cp),
    }
}

fn material_balance(position: &Position, side: Color) -> i32 {
    position.material(side) - position.material(side.opposite())
}
