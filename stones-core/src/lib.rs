//! Tak rules engine.
//!
//! An NxN board (3..=8) of piece stacks, move validation for placements and
//! stack spreads, road detection, and a turn/phase state machine with undo.
//!
//! ```text
//! Game::try_place / try_move
//!   -> validate (pure)
//!   -> play::apply (board + reserves)
//!   -> adjudicate (roads, then flat count)
//!   -> MoveRecord + BoardEvents
//! ```
//!
//! Rows grow north and columns grow east: `a1` is (row 0, col 0), `b3` is
//! (row 2, col 1).

#[cfg(feature = "wasm")]
pub mod wasm;

pub mod board;
pub mod error;
pub mod game;
pub mod movegen;
pub mod moves;
pub mod notation;
pub mod play;
pub mod preview;
pub mod reserve;
pub mod road;
pub mod state;
pub mod tps;
pub mod validate;

pub use board::{Board, Color, Direction, Piece, PieceKind, Pos, Stack, MAX_SIZE, MIN_SIZE};
pub use error::{NotationError, Rejection, SetupError};
pub use game::{BoardEvent, Game};
pub use movegen::{count_legal_moves, legal_moves};
pub use moves::{Move, Undo};
pub use preview::{drop_options, preview_spread};
pub use reserve::{default_allotment, AllotmentOverride, AllotmentTable, Reserves, Stock};
pub use road::{find_road, has_road, road_distance, Axis, Road};
pub use state::{adjudicate, Decision, GameResult, GameState, MoveRecord, Phase, Transition, WinReason};
pub use tps::{board_from_tps, board_to_tps};
pub use validate::validate;
