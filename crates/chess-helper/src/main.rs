//! Chess Helper - live engine analysis for games played over the board.
//!
//! Moves are typed as they are played; the engine analyses each new
//! position in the background and its verdict is printed when ready.

mod app;
mod command;
mod render;

use analysis_bridge::{HelperConfig, DEFAULT_CONFIG_FILE};
use anyhow::Context;
use app::{App, Flow};
use chess_core::Color;
use clap::{Parser, ValueEnum};
use command::Command;
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

/// Chess Helper - analyse your games with engine assistance.
#[derive(Parser)]
#[command(name = "chess-helper")]
#[command(about = "Analyse over-the-board games with a UCI engine")]
struct Args {
    /// Configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Path to the UCI engine executable (overrides the config file)
    #[arg(long)]
    engine: Option<String>,

    /// Live analysis depth (overrides the config file)
    #[arg(long)]
    depth: Option<u32>,

    /// Start with live analysis switched off
    #[arg(long)]
    no_analysis: bool,

    /// The side you are playing
    #[arg(long, value_enum, default_value = "white")]
    color: Side,

    /// Log engine traffic and analysis decisions to stderr
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Side {
    White,
    Black,
}

impl From<Side> for Color {
    fn from(side: Side) -> Self {
        match side {
            Side::White => Color::White,
            Side::Black => Color::Black,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let mut config = HelperConfig::load(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;
    if let Some(engine) = args.engine {
        config.engine.path = engine;
    }
    if let Some(depth) = args.depth {
        config.analysis.depth = depth;
    }
    if args.no_analysis {
        config.analysis.enabled = false;
    }

    let player = Color::from(args.color);
    let mut seated = config.clone();
    if player == Color::Black {
        std::mem::swap(&mut seated.game.white, &mut seated.game.black);
    }

    let controller = analysis_bridge::connect(&seated);
    println!("Welcome to Chess Helper! You are playing {}.", player);
    match controller.start_engine().await {
        Ok(()) => println!(
            "Engine: {}",
            controller.engine_name().as_deref().unwrap_or("unnamed")
        ),
        Err(e) => {
            tracing::warn!("Engine {} unavailable: {}", config.engine.path, e);
            println!("Engine not available ({}); analysis is disabled.", e);
            controller.set_analysis_enabled(false);
        }
    }

    let mut updates = controller.subscribe();
    let mut app = App::new(controller, config, args.config, player);
    println!("Type 'help' for available commands.");
    app.print_board();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("\n{}", app.prompt());
        std::io::stdout().flush().ok();

        let line = loop {
            tokio::select! {
                line = lines.next_line() => break line.context("Failed to read input")?,
                update = updates.recv() => match update {
                    Ok(update) => app.show_update(update),
                    Err(RecvError::Lagged(n)) => tracing::debug!("Skipped {} analysis updates", n),
                    Err(RecvError::Closed) => {}
                },
            }
        };
        let Some(line) = line else { break };

        let command = match Command::parse(&line) {
            None => continue,
            Some(Ok(command)) => command,
            Some(Err(usage)) => {
                println!("{}", usage);
                continue;
            }
        };
        match app.execute(command).await {
            Ok(Flow::Quit) => break,
            Ok(Flow::Continue) => {}
            Err(e) => println!("Error: {:#}", e),
        }
    }

    app.controller().stop_engine().await;
    println!("Thanks for using Chess Helper!");
    Ok(())
}
