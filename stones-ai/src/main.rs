//! Stones self-play
//!
//! Pits two difficulty levels against each other for a number of games and
//! reports the tally. Useful for checking that stronger profiles actually win.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use stones_ai::{Ai, Difficulty, MatchStats, Settings};
use stones_core::{Color, GameResult, GameState, WinReason};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "selfplay", about = "Play the Stones AI against itself", version)]
struct Args {
    /// Board size (3-8)
    #[arg(short, long, default_value = "5")]
    size: u8,

    /// Number of games
    #[arg(short, long, default_value = "10")]
    games: u32,

    /// Difficulty playing white
    #[arg(long, default_value = "medium")]
    white: Difficulty,

    /// Difficulty playing black
    #[arg(long, default_value = "medium")]
    black: Difficulty,

    /// Swap colors every other game
    #[arg(long)]
    alternate: bool,

    /// TOML file with [ai.*] and [[allotment]] overrides
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Base seed for the noisy profiles; game n uses seed + n
    #[arg(long)]
    seed: Option<u64>,

    /// Stop a game after this many plies
    #[arg(long, default_value = "400")]
    max_plies: u32,

    /// Write one JSON line per finished game
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Serialize)]
struct GameSummary {
    game: u32,
    white: Difficulty,
    black: Difficulty,
    result: GameResult,
    reason: Option<WinReason>,
    plies: u32,
    moves: Vec<String>,
    tps: String,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let settings = Settings::load(args.config.as_deref()).context("loading config")?;
    // Fail early on a bad size or allotment.
    settings
        .allotment
        .for_size(args.size)
        .with_context(|| format!("board size {}", args.size))?;

    // Set up SIGINT handler: finish the current game, then report
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupt received, stopping after this game...");
        r.store(false, Ordering::SeqCst);
    })
    .context("installing Ctrl-C handler")?;

    let mut output = match &args.output {
        Some(path) => Some(BufWriter::new(
            File::create(path).with_context(|| format!("creating {}", path.display()))?,
        )),
        None => None,
    };

    info!(
        size = args.size,
        games = args.games,
        white = %args.white,
        black = %args.black,
        "starting self-play"
    );

    let mut stats = MatchStats::new();
    for n in 0..args.games {
        if !running.load(Ordering::SeqCst) {
            break;
        }
        let (white, black) = if args.alternate && n % 2 == 1 {
            (args.black, args.white)
        } else {
            (args.white, args.black)
        };

        let mut config = settings.ai.clone();
        if let Some(seed) = args.seed {
            for d in Difficulty::ALL {
                config.profile_mut(d).seed = Some(seed.wrapping_add(n as u64));
            }
        }
        let ai = Ai::new(config);

        let mut state = GameState::with_table(args.size, &settings.allotment)?;
        let mut nodes = 0;
        while !state.is_over() && state.history().len() < args.max_plies as usize {
            let difficulty = match state.to_move() {
                Color::White => white,
                Color::Black => black,
            };
            let outcome = ai.search(&state, difficulty);
            nodes += outcome.stats.nodes;
            let Some(mv) = outcome.mv else {
                warn!(game = n, turn = state.turn(), "no move available");
                break;
            };
            state
                .apply(mv.clone())
                .with_context(|| format!("game {n}: AI move {mv} rejected"))?;
        }
        stats.total_nodes += nodes;

        let plies = state.history().len() as u32;
        let (Some(result), Some(reason)) = (state.result(), state.win_reason()) else {
            warn!(game = n, plies, "game unfinished");
            continue;
        };
        stats.record(result, reason, plies);
        info!(game = n, %white, %black, ?result, reason = ?state.win_reason(), plies, "game finished");

        if let Some(out) = output.as_mut() {
            let summary = GameSummary {
                game: n,
                white,
                black,
                result,
                reason: state.win_reason(),
                plies,
                moves: state.history().iter().map(|r| r.notation.clone()).collect(),
                tps: state.to_tps(),
            };
            serde_json::to_writer(&mut *out, &summary)?;
            writeln!(out)?;
        }
    }

    if let Some(mut out) = output {
        out.flush()?;
    }
    stats.log_summary();

    println!();
    println!("Games: {}", stats.games);
    println!("  - White wins: {}", stats.white_wins);
    println!("  - Black wins: {}", stats.black_wins);
    println!("  - Draws: {}", stats.draws);
    println!(
        "Road wins: {}  Flat wins: {}  Time wins: {}",
        stats.road_wins, stats.flat_wins, stats.time_wins
    );
    println!("Average length: {:.1} plies", stats.average_plies());
    Ok(())
}
