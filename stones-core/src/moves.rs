//! Move representation.

use serde::{Deserialize, Serialize};

use crate::board::{Color, Direction, PieceKind, Pos};

/// A move in the game.
#[derive(Clone, PartialEq, Eq, Debug, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Move {
    /// Place a piece from reserve onto an empty cell.
    Place { pos: Pos, kind: PieceKind },
    /// Lift the top of a stack and drop pieces along a straight line,
    /// `drops[i]` on the i-th cell past `from`.
    Spread {
        from: Pos,
        dir: Direction,
        drops: Vec<u8>,
    },
}

impl Move {
    #[inline]
    pub fn place(pos: Pos, kind: PieceKind) -> Move {
        Move::Place { pos, kind }
    }

    #[inline]
    pub fn spread(from: Pos, dir: Direction, drops: Vec<u8>) -> Move {
        Move::Spread { from, dir, drops }
    }

    /// Number of pieces lifted (zero for placements).
    pub fn carried(&self) -> usize {
        match self {
            Move::Place { .. } => 0,
            Move::Spread { drops, .. } => drops.iter().map(|&d| d as usize).sum(),
        }
    }

    /// The cell the move starts from (target cell for placements).
    pub fn origin(&self) -> Pos {
        match self {
            Move::Place { pos, .. } => *pos,
            Move::Spread { from, .. } => *from,
        }
    }
}

/// Bookkeeping needed to take an applied move back.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Serialize, Deserialize)]
pub struct Undo {
    /// Color whose reserve paid for a placement (the mover for spreads).
    pub payer: Color,
    /// A wall at the end of the spread was flattened by a capstone.
    pub flattened: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_carried() {
        let place = Move::place(Pos::new(0, 0), PieceKind::Flat);
        let spread = Move::spread(Pos::new(0, 0), Direction::East, vec![1, 2]);
        assert_eq!(place.carried(), 0);
        assert_eq!(spread.carried(), 3);
        assert_eq!(spread.origin(), Pos::new(0, 0));
    }

    #[test]
    fn test_move_json_shape() {
        let spread = Move::spread(Pos::new(1, 2), Direction::North, vec![2]);
        let json = serde_json::to_value(&spread).unwrap();
        assert_eq!(json["type"], "spread");
        assert_eq!(json["dir"], "north");
        let back: Move = serde_json::from_value(json).unwrap();
        assert_eq!(back, spread);
    }
}
