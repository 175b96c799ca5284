//! Error types for the rules engine.
//!
//! Move rejections are ordinary values: the engine never panics on an
//! illegal move and never mutates state when it returns one.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::board::Color;

/// Why a move was refused.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    #[error("target square is occupied")]
    OccupiedTarget,
    #[error("no pieces of that kind left in reserve")]
    InsufficientReserve,
    #[error("move type is not allowed in the current phase")]
    WrongPhase,
    #[error("stack is not controlled by the side to move")]
    NotYourStack,
    #[error("cannot carry that many pieces")]
    ExceedsCarryLimit,
    #[error("cannot land on a wall or capstone")]
    IllegalLanding,
    #[error("drop sequence is malformed")]
    MalformedDrops,
    #[error("position is off the board")]
    OutOfBounds,
    #[error("move was computed against an older game state")]
    StaleState,
}

/// Errors building or loading a game state.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SetupError {
    #[error("board size {0} is outside 3..=8")]
    InvalidSize(u8),
    #[error("board has {found} cells, expected {expected}")]
    CellCount { expected: usize, found: usize },
    #[error("{color} {what} on the board and in reserve do not match the allotment")]
    Conservation { color: Color, what: &'static str },
    #[error("inconsistent state: {0}")]
    Inconsistent(String),
    #[error("malformed TPS: {0}")]
    Tps(String),
}

/// Errors parsing move notation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NotationError {
    #[error("empty move")]
    Empty,
    #[error("bad square in `{0}`")]
    Square(String),
    #[error("bad direction `{0}`")]
    Direction(char),
    #[error("bad drop counts in `{0}`")]
    Drops(String),
    #[error("pickup count does not match drops in `{0}`")]
    CountMismatch(String),
    #[error("unexpected input in `{0}`")]
    Trailing(String),
}
