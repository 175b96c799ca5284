//! Board and stack model.
//!
//! The board is a square grid of piece stacks. This layer knows nothing about
//! legality: it only keeps the grid structurally sound (one stack per cell,
//! bottom-to-top ordering) and offers the primitives the rules layer builds on.
//!
//! ```text
//! Cell indices for a 4x4 board (row-major, row 0 first):
//!   (0,0)=0   (0,1)=1   (0,2)=2   (0,3)=3
//!   (1,0)=4   (1,1)=5   (1,2)=6   (1,3)=7
//!   ...
//! ```

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SetupError;
use crate::reserve::Stock;

/// Smallest supported board.
pub const MIN_SIZE: u8 = 3;
/// Largest supported board.
pub const MAX_SIZE: u8 = 8;

static EMPTY_STACK: Stack = Stack { pieces: Vec::new() };

/// Player color.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    White,
    Black,
}

impl Color {
    pub const ALL: [Color; 2] = [Color::White, Color::Black];

    /// Get the opponent color.
    #[inline]
    pub fn opponent(self) -> Color {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }

    /// Side to move for a 1-based ply number.
    #[inline]
    pub fn for_turn(turn: u32) -> Color {
        if turn % 2 == 1 {
            Color::White
        } else {
            Color::Black
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::White => f.write_str("white"),
            Color::Black => f.write_str("black"),
        }
    }
}

/// Piece type.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PieceKind {
    Flat,
    Standing,
    Capstone,
}

impl PieceKind {
    pub const ALL: [PieceKind; 3] = [PieceKind::Flat, PieceKind::Standing, PieceKind::Capstone];

    /// Flats and capstones carry a road; walls never do.
    #[inline]
    pub fn is_road(self) -> bool {
        !matches!(self, PieceKind::Standing)
    }
}

/// A single stone.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Serialize, Deserialize)]
pub struct Piece {
    pub color: Color,
    pub kind: PieceKind,
}

impl Piece {
    #[inline]
    pub const fn new(color: Color, kind: PieceKind) -> Piece {
        Piece { color, kind }
    }

    #[inline]
    pub const fn flat(color: Color) -> Piece {
        Piece::new(color, PieceKind::Flat)
    }
}

/// Position on the board, 0-indexed.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Pos {
    pub row: u8,
    pub col: u8,
}

impl Pos {
    #[inline]
    pub const fn new(row: u8, col: u8) -> Pos {
        Pos { row, col }
    }

    /// Row-major index for a board of the given size.
    #[inline]
    pub fn index(self, size: u8) -> usize {
        self.row as usize * size as usize + self.col as usize
    }
}

/// Direction of a stack movement.
///
/// North and south move along rows (rank `row + 1` in notation), east and
/// west along columns.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    North,
    South,
    East,
    West,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
    ];

    /// (row delta, col delta).
    #[inline]
    pub fn delta(self) -> (i8, i8) {
        match self {
            Direction::North => (1, 0),
            Direction::South => (-1, 0),
            Direction::East => (0, 1),
            Direction::West => (0, -1),
        }
    }

    /// Notation symbol.
    #[inline]
    pub fn symbol(self) -> char {
        match self {
            Direction::North => '+',
            Direction::South => '-',
            Direction::East => '>',
            Direction::West => '<',
        }
    }

    pub fn from_symbol(symbol: char) -> Option<Direction> {
        match symbol {
            '+' => Some(Direction::North),
            '-' => Some(Direction::South),
            '>' => Some(Direction::East),
            '<' => Some(Direction::West),
            _ => None,
        }
    }
}

/// An ordered pile of pieces, bottom to top.
#[derive(Clone, PartialEq, Eq, Debug, Default, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Stack {
    pieces: Vec<Piece>,
}

impl Stack {
    #[inline]
    pub fn new() -> Stack {
        Stack::default()
    }

    pub fn from_pieces(pieces: Vec<Piece>) -> Stack {
        Stack { pieces }
    }

    /// Pieces bottom to top.
    #[inline]
    pub fn pieces(&self) -> &[Piece] {
        &self.pieces
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.pieces.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    #[inline]
    pub fn top(&self) -> Option<Piece> {
        self.pieces.last().copied()
    }

    /// Color of the top piece, if any.
    #[inline]
    pub fn controller(&self) -> Option<Color> {
        self.top().map(|p| p.color)
    }

    /// A copy of this stack with `pieces` dropped on top (bottom first).
    pub fn with_pieces_added(&self, pieces: &[Piece]) -> Stack {
        let mut derived = self.clone();
        derived.pieces.extend_from_slice(pieces);
        derived
    }

    #[inline]
    pub(crate) fn push(&mut self, piece: Piece) {
        self.pieces.push(piece);
    }

    #[inline]
    pub(crate) fn extend(&mut self, pieces: &[Piece]) {
        self.pieces.extend_from_slice(pieces);
    }

    /// Remove the top `count` pieces, returned bottom to top.
    pub(crate) fn take(&mut self, count: usize) -> Vec<Piece> {
        let split = self.pieces.len().saturating_sub(count);
        self.pieces.split_off(split)
    }

    /// Retype the top piece in place (walls flattened by a capstone, and back on undo).
    pub(crate) fn set_top_kind(&mut self, kind: PieceKind) {
        if let Some(top) = self.pieces.last_mut() {
            top.kind = kind;
        }
    }
}

/// Square grid of stacks.
#[derive(Clone, PartialEq, Eq, Debug, Hash, Serialize, Deserialize)]
pub struct Board {
    size: u8,
    cells: Vec<Stack>,
}

impl Board {
    /// Create an empty board.
    pub fn new(size: u8) -> Result<Board, SetupError> {
        check_size(size)?;
        let cells = vec![Stack::new(); size as usize * size as usize];
        Ok(Board { size, cells })
    }

    /// Build a board from row-major stacks.
    pub fn from_cells(size: u8, cells: Vec<Stack>) -> Result<Board, SetupError> {
        let board = Board { size, cells };
        board.check_shape()?;
        Ok(board)
    }

    /// Verify size bounds and cell count (used after deserialization).
    pub fn check_shape(&self) -> Result<(), SetupError> {
        check_size(self.size)?;
        let expected = self.size as usize * self.size as usize;
        if self.cells.len() != expected {
            return Err(SetupError::CellCount {
                expected,
                found: self.cells.len(),
            });
        }
        Ok(())
    }

    #[inline]
    pub fn size(&self) -> u8 {
        self.size
    }

    /// Carry limit: a spread may lift at most this many pieces.
    #[inline]
    pub fn carry_limit(&self) -> usize {
        self.size as usize
    }

    #[inline]
    pub fn is_valid(&self, pos: Pos) -> bool {
        pos.row < self.size && pos.col < self.size
    }

    /// Stack at a position; off-board positions read as empty.
    #[inline]
    pub fn stack(&self, pos: Pos) -> &Stack {
        if self.is_valid(pos) {
            &self.cells[pos.index(self.size)]
        } else {
            &EMPTY_STACK
        }
    }

    #[inline]
    pub fn top(&self, pos: Pos) -> Option<Piece> {
        self.stack(pos).top()
    }

    /// All positions, row-major.
    pub fn positions(&self) -> impl Iterator<Item = Pos> {
        let size = self.size;
        (0..size).flat_map(move |row| (0..size).map(move |col| Pos::new(row, col)))
    }

    /// Positions paired with their stacks, row-major.
    pub fn stacks(&self) -> impl Iterator<Item = (Pos, &Stack)> + '_ {
        self.positions().zip(self.cells.iter())
    }

    pub fn occupied_positions(&self) -> HashSet<Pos> {
        self.stacks()
            .filter(|(_, stack)| !stack.is_empty())
            .map(|(pos, _)| pos)
            .collect()
    }

    /// Derived stack for previews; the board is untouched.
    pub fn with_pieces_added(&self, pos: Pos, pieces: &[Piece]) -> Stack {
        self.stack(pos).with_pieces_added(pieces)
    }

    /// Neighbor in a direction, or None at the edge.
    #[inline]
    pub fn step(&self, pos: Pos, dir: Direction) -> Option<Pos> {
        let (dr, dc) = dir.delta();
        let row = pos.row as i16 + dr as i16;
        let col = pos.col as i16 + dc as i16;
        let size = self.size as i16;
        if (0..size).contains(&row) && (0..size).contains(&col) {
            Some(Pos::new(row as u8, col as u8))
        } else {
            None
        }
    }

    pub fn is_full(&self) -> bool {
        self.cells.iter().all(|stack| !stack.is_empty())
    }

    /// Count every piece of a color, buried or not. None when a count does
    /// not fit in a [`Stock`], which no allotment can account for.
    pub fn count_pieces(&self, color: Color) -> Option<Stock> {
        let mut count = Stock::default();
        for piece in self.cells.iter().flat_map(|s| s.pieces()) {
            if piece.color == color {
                match piece.kind {
                    PieceKind::Capstone => count.capstones = count.capstones.checked_add(1)?,
                    PieceKind::Flat | PieceKind::Standing => count.stones = count.stones.checked_add(1)?,
                }
            }
        }
        Some(count)
    }

    /// Number of stacks topped by a flat of this color.
    pub fn flat_count(&self, color: Color) -> usize {
        self.cells
            .iter()
            .filter(|s| s.top() == Some(Piece::flat(color)))
            .count()
    }

    #[inline]
    pub(crate) fn stack_mut(&mut self, pos: Pos) -> &mut Stack {
        let idx = pos.index(self.size);
        &mut self.cells[idx]
    }

    /// Remove the top `count` pieces of a stack, bottom to top.
    #[inline]
    pub(crate) fn lift(&mut self, pos: Pos, count: usize) -> Vec<Piece> {
        self.stack_mut(pos).take(count)
    }

    /// Drop pieces onto a stack, bottom first.
    #[inline]
    pub(crate) fn drop_onto(&mut self, pos: Pos, pieces: &[Piece]) {
        self.stack_mut(pos).extend(pieces);
    }
}

fn check_size(size: u8) -> Result<(), SetupError> {
    if (MIN_SIZE..=MAX_SIZE).contains(&size) {
        Ok(())
    } else {
        Err(SetupError::InvalidSize(size))
    }
}
