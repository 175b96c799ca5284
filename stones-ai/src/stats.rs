//! Search and self-play statistics.

use std::time::{Duration, Instant};

use serde::Serialize;
use stones_core::{GameResult, WinReason};
use tracing::{debug, info};

use crate::config::Difficulty;

/// Counters collected during one search.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchStats {
    /// Positions visited, including leaves
    pub nodes: u64,

    /// Transposition table probes that returned a usable score
    pub tt_hits: u64,

    /// Beta cutoffs
    pub cutoffs: u64,

    /// Terminal positions reached
    pub terminals: u64,

    /// Deepest completed iteration
    pub depth_reached: u8,

    /// Set when the node budget or deadline stopped the search
    pub aborted: bool,

    /// Wall time spent
    #[serde(skip)]
    pub elapsed: Duration,
}

impl SearchStats {
    /// Nodes per second over the whole search.
    pub fn nodes_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.nodes as f64 / secs
        } else {
            0.0
        }
    }

    /// Percentage of visited nodes answered from the table.
    pub fn hit_rate(&self) -> f64 {
        if self.nodes > 0 {
            100.0 * self.tt_hits as f64 / self.nodes as f64
        } else {
            0.0
        }
    }

    pub fn log(&self, difficulty: Difficulty) {
        debug!(
            %difficulty,
            nodes = self.nodes,
            depth = self.depth_reached,
            tt_hits = self.tt_hits,
            cutoffs = self.cutoffs,
            terminals = self.terminals,
            aborted = self.aborted,
            nodes_per_sec = self.nodes_per_sec() as u64,
            hit_rate = self.hit_rate(),
            "search finished"
        );
    }
}

/// Running totals for a self-play match.
#[derive(Debug, Default, Serialize)]
pub struct MatchStats {
    pub games: u32,
    pub white_wins: u32,
    pub black_wins: u32,
    pub draws: u32,
    pub road_wins: u32,
    pub flat_wins: u32,
    pub time_wins: u32,
    pub total_plies: u64,
    pub total_nodes: u64,

    #[serde(skip)]
    start_time: Option<Instant>,
}

impl MatchStats {
    pub fn new() -> Self {
        Self {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    /// Record a finished game
    pub fn record(&mut self, result: GameResult, reason: WinReason, plies: u32) {
        self.games += 1;
        self.total_plies += plies as u64;
        match result {
            GameResult::WhiteWins => self.white_wins += 1,
            GameResult::BlackWins => self.black_wins += 1,
            GameResult::Draw => {
                self.draws += 1;
                return;
            }
        }
        match reason {
            WinReason::Road => self.road_wins += 1,
            WinReason::Flats => self.flat_wins += 1,
            WinReason::Time => self.time_wins += 1,
        }
    }

    pub fn average_plies(&self) -> f64 {
        if self.games > 0 {
            self.total_plies as f64 / self.games as f64
        } else {
            0.0
        }
    }

    /// Log final summary
    pub fn log_summary(&self) {
        let elapsed = self.start_time.map(|s| s.elapsed().as_secs_f64()).unwrap_or(0.0);
        info!(
            games = self.games,
            white = self.white_wins,
            black = self.black_wins,
            draws = self.draws,
            roads = self.road_wins,
            flats = self.flat_wins,
            time = self.time_wins,
            avg_plies = self.average_plies(),
            nodes = self.total_nodes,
            secs = elapsed,
            "match finished"
        );
    }
}
