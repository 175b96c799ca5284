//! Computer opponent for stones-core.
//!
//! ```text
//! GameState -> Node (board, reserves, side to move)
//!   -> iterative deepening, depth 1..=max_depth
//!        negamax + alpha-beta over an explicit frame stack
//!        transposition table keyed by xxh64 of the position
//!   -> root scores -> best move, or a noisy pick for weaker levels
//! ```
//!
//! Strength is set by [`Difficulty`], which maps to a [`SearchProfile`]
//! (depth, node budget, noise) in an [`AiConfig`].

pub mod config;
pub mod eval;
pub mod node;
pub mod search;
pub mod stats;

use stones_core::{GameState, Move};
use tracing::instrument;

pub use config::{AiConfig, ConfigError, Difficulty, EvalWeights, SearchProfile, Settings};
pub use search::{SearchOutcome, Searcher, WIN};
pub use stats::{MatchStats, SearchStats};

/// A configured opponent.
#[derive(Clone, Debug, Default)]
pub struct Ai {
    config: AiConfig,
}

impl Ai {
    pub fn new(config: AiConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AiConfig {
        &self.config
    }

    /// Search `state` at `difficulty`, returning the move with its score and
    /// counters.
    #[instrument(level = "debug", skip(self, state), fields(turn = state.turn(), to_move = %state.to_move()))]
    pub fn search(&self, state: &GameState, difficulty: Difficulty) -> SearchOutcome {
        let profile = self.config.profile(difficulty);
        let outcome = Searcher::new(profile, &self.config.weights).search(state);
        outcome.stats.log(difficulty);
        outcome
    }

    /// The move to play, or None when the game is over.
    pub fn select_move(&self, state: &GameState, difficulty: Difficulty) -> Option<Move> {
        self.search(state, difficulty).mv
    }
}

/// [`Ai::select_move`] with the default configuration.
pub fn select_move(state: &GameState, difficulty: Difficulty) -> Option<Move> {
    Ai::default().select_move(state, difficulty)
}
