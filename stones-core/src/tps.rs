//! TPS (Tak Positional System) scenarios.
//!
//! ```text
//! x3/x,1,2S/1C,x2 1 2
//! ^ rows, top row (rank N) first
//!                 ^ side to move: 1 = white, 2 = black
//!                   ^ full move number
//! ```
//!
//! A cell is `x` (or `xN` for N empty cells) or a stack of colors bottom to
//! top (`1` white, `2` black) with an optional `S`/`C` suffix for the top.

use crate::board::{Board, Color, Piece, PieceKind, Pos, Stack, MAX_SIZE, MIN_SIZE};
use crate::error::SetupError;
use crate::reserve::AllotmentTable;
use crate::state::GameState;

/// Board part of a TPS string.
pub fn board_to_tps(board: &Board) -> String {
    let size = board.size();
    let mut rows = Vec::with_capacity(size as usize);
    for row in (0..size).rev() {
        let mut cells: Vec<String> = Vec::new();
        let mut empty = 0;
        for col in 0..size {
            let stack = board.stack(Pos::new(row, col));
            if stack.is_empty() {
                empty += 1;
                continue;
            }
            if empty > 0 {
                cells.push(empty_run(empty));
                empty = 0;
            }
            cells.push(stack_to_tps(stack));
        }
        if empty > 0 {
            cells.push(empty_run(empty));
        }
        rows.push(cells.join(","));
    }
    rows.join("/")
}

fn empty_run(count: usize) -> String {
    if count == 1 {
        "x".to_string()
    } else {
        format!("x{count}")
    }
}

fn stack_to_tps(stack: &Stack) -> String {
    let mut out: String = stack
        .pieces()
        .iter()
        .map(|p| match p.color {
            Color::White => '1',
            Color::Black => '2',
        })
        .collect();
    match stack.top().map(|p| p.kind) {
        Some(PieceKind::Standing) => out.push('S'),
        Some(PieceKind::Capstone) => out.push('C'),
        _ => {}
    }
    out
}

/// Parse the board part of a TPS string. The size is the number of rows.
pub fn board_from_tps(text: &str) -> Result<Board, SetupError> {
    let rows: Vec<&str> = text.trim().split('/').collect();
    let size = rows.len();
    if !(MIN_SIZE as usize..=MAX_SIZE as usize).contains(&size) {
        return Err(SetupError::InvalidSize(size.min(u8::MAX as usize) as u8));
    }

    let mut cells = vec![Stack::new(); size * size];
    for (i, row_text) in rows.iter().enumerate() {
        let row = size - 1 - i;
        let mut col: usize = 0;
        for token in row_text.split(',') {
            let token = token.trim();
            if let Some(run) = token.strip_prefix('x') {
                let count = if run.is_empty() {
                    1
                } else {
                    run.parse::<usize>()
                        .map_err(|_| SetupError::Tps(format!("bad empty run `{token}`")))?
                };
                col = col
                    .checked_add(count)
                    .filter(|&c| c <= size)
                    .ok_or_else(|| SetupError::Tps(format!("row {} is too long", row + 1)))?;
            } else {
                if col < size {
                    cells[row * size + col] = parse_stack(token)?;
                }
                col += 1;
            }
        }
        if col != size {
            return Err(SetupError::Tps(format!(
                "row {} has {col} cells, expected {size}",
                row + 1
            )));
        }
    }
    Board::from_cells(size as u8, cells)
}

fn parse_stack(token: &str) -> Result<Stack, SetupError> {
    let (colors, top_kind) = match token.as_bytes().last() {
        Some(b'S') => (&token[..token.len() - 1], PieceKind::Standing),
        Some(b'C') => (&token[..token.len() - 1], PieceKind::Capstone),
        _ => (token, PieceKind::Flat),
    };
    if colors.is_empty() {
        return Err(SetupError::Tps(format!("empty stack `{token}`")));
    }
    let mut pieces = colors
        .chars()
        .map(|c| match c {
            '1' => Ok(Piece::flat(Color::White)),
            '2' => Ok(Piece::flat(Color::Black)),
            _ => Err(SetupError::Tps(format!("bad stack `{token}`"))),
        })
        .collect::<Result<Vec<Piece>, SetupError>>()?;
    if let Some(top) = pieces.last_mut() {
        top.kind = top_kind;
    }
    Ok(Stack::from_pieces(pieces))
}

impl GameState {
    /// Load a scenario from a full TPS string. Reserves are derived from the
    /// allotment for the board size; the side-to-move and move-number fields
    /// default to `1 1` when missing.
    pub fn from_tps(text: &str, table: &AllotmentTable) -> Result<GameState, SetupError> {
        let mut fields = text.split_whitespace();
        let board_text = fields
            .next()
            .ok_or_else(|| SetupError::Tps("empty string".into()))?;
        let player = match fields.next() {
            None | Some("1") => 1,
            Some("2") => 2,
            Some(other) => return Err(SetupError::Tps(format!("bad side to move `{other}`"))),
        };
        let move_number = match fields.next() {
            None => 1,
            Some(n) => n
                .parse::<u32>()
                .ok()
                .filter(|&n| n >= 1)
                .ok_or_else(|| SetupError::Tps(format!("bad move number `{n}`")))?,
        };
        if let Some(extra) = fields.next() {
            return Err(SetupError::Tps(format!("unexpected `{extra}`")));
        }

        let board = board_from_tps(board_text)?;
        let allotment = table.for_size(board.size())?;
        let turn = (move_number - 1)
            .checked_mul(2)
            .and_then(|plies| plies.checked_add(player))
            .ok_or_else(|| SetupError::Tps(format!("move number {move_number} is out of range")))?;
        GameState::from_position(board, turn, allotment)
    }

    /// Export the position as TPS.
    pub fn to_tps(&self) -> String {
        let player = match self.to_move() {
            Color::White => 1,
            Color::Black => 2,
        };
        format!(
            "{} {} {}",
            board_to_tps(self.board()),
            player,
            self.turn().div_ceil(2)
        )
    }
}
