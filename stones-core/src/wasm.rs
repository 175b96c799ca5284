//! WASM bindings for stones-core
//!
//! Provides a JavaScript-friendly API over [`Game`].

use wasm_bindgen::prelude::*;

use crate::{drop_options, preview_spread, Direction, Game, GameState, Move, PieceKind, Pos};

/// WASM-friendly wrapper around Game
#[wasm_bindgen]
pub struct WasmGame {
    inner: Game,
}

fn kind_from_letter(kind: &str) -> Option<PieceKind> {
    match kind {
        "" | "F" | "flat" => Some(PieceKind::Flat),
        "S" | "standing" => Some(PieceKind::Standing),
        "C" | "capstone" => Some(PieceKind::Capstone),
        _ => None,
    }
}

fn direction_from_str(dir: &str) -> Option<Direction> {
    let mut chars = dir.chars();
    match (chars.next(), chars.next()) {
        (Some(symbol), None) => Direction::from_symbol(symbol),
        _ => match dir {
            "north" => Some(Direction::North),
            "south" => Some(Direction::South),
            "east" => Some(Direction::East),
            "west" => Some(Direction::West),
            _ => None,
        },
    }
}

#[wasm_bindgen]
impl WasmGame {
    /// Create a new game on an NxN board (3..=8)
    #[wasm_bindgen(constructor)]
    pub fn new(size: u8) -> Result<WasmGame, JsError> {
        Ok(WasmGame {
            inner: Game::new(size)?,
        })
    }

    /// Restart on a fresh board
    #[wasm_bindgen(js_name = newGame)]
    pub fn new_game(&mut self, size: u8) -> Result<(), JsError> {
        Ok(self.inner.new_game(size)?)
    }

    /// Full state as a JS object
    pub fn state(&self) -> JsValue {
        serde_wasm_bindgen::to_value(self.inner.state()).unwrap_or(JsValue::NULL)
    }

    /// Replace the state from a JSON string
    #[wasm_bindgen(js_name = loadState)]
    pub fn load_state(&mut self, json: &str) -> Result<(), JsError> {
        let state: GameState = serde_json::from_str(json)?;
        Ok(self.inner.load_state(state)?)
    }

    #[wasm_bindgen(js_name = loadTps)]
    pub fn load_tps(&mut self, tps: &str) -> Result<(), JsError> {
        Ok(self.inner.load_tps(tps)?)
    }

    #[wasm_bindgen(js_name = toTps)]
    pub fn to_tps(&self) -> String {
        self.inner.state().to_tps()
    }

    /// Legal moves in notation
    #[wasm_bindgen(js_name = legalMoves)]
    pub fn legal_moves(&self) -> Vec<String> {
        self.inner
            .state()
            .legal_moves()
            .iter()
            .map(Move::to_string)
            .collect()
    }

    /// Place a piece. `kind` is "" / "F", "S" or "C". Returns true if accepted.
    #[wasm_bindgen(js_name = placePiece)]
    pub fn place_piece(&mut self, row: u8, col: u8, kind: &str) -> bool {
        match kind_from_letter(kind) {
            Some(kind) => self.inner.place_piece(Pos::new(row, col), kind),
            None => false,
        }
    }

    /// Spread a stack. `dir` is a symbol (+ - > <) or a name.
    #[wasm_bindgen(js_name = moveStack)]
    pub fn move_stack(&mut self, row: u8, col: u8, dir: &str, drops: Vec<u8>) -> bool {
        match direction_from_str(dir) {
            Some(dir) => self.inner.move_stack(Pos::new(row, col), dir, drops),
            None => false,
        }
    }

    /// Apply a move in notation, e.g. "Sc3" or "3a1>12"
    #[wasm_bindgen(js_name = playNotation)]
    pub fn play_notation(&mut self, text: &str) -> bool {
        text.parse::<Move>()
            .map(|mv| self.inner.apply(mv).is_ok())
            .unwrap_or(false)
    }

    pub fn undo(&mut self) -> bool {
        self.inner.undo().is_some()
    }

    #[wasm_bindgen(js_name = canUndo)]
    pub fn can_undo(&self) -> bool {
        self.inner.can_undo()
    }

    /// Notation of the last move, if any
    #[wasm_bindgen(js_name = lastMove)]
    pub fn last_move(&self) -> Option<String> {
        self.inner.last_move_record().map(|r| r.notation.clone())
    }

    /// Stacks after a prospective spread, as [[row, col, [pieces]], ...]
    #[wasm_bindgen(js_name = previewSpread)]
    pub fn preview_spread(&self, row: u8, col: u8, dir: &str, drops: Vec<u8>) -> JsValue {
        let Some(dir) = direction_from_str(dir) else {
            return JsValue::NULL;
        };
        let state = self.inner.state();
        let preview = preview_spread(
            state.board(),
            state.phase(),
            state.to_move(),
            Pos::new(row, col),
            dir,
            &drops,
        );
        match preview {
            Ok(preview) => serde_wasm_bindgen::to_value(&preview).unwrap_or(JsValue::NULL),
            Err(_) => JsValue::NULL,
        }
    }

    /// Legal counts for the next drop of a partially entered spread
    #[wasm_bindgen(js_name = dropOptions)]
    pub fn drop_options(&self, row: u8, col: u8, dir: &str, carried: usize, dropped: Vec<u8>) -> Vec<u8> {
        let Some(dir) = direction_from_str(dir) else {
            return Vec::new();
        };
        let state = self.inner.state();
        drop_options(
            state.board(),
            state.phase(),
            state.to_move(),
            Pos::new(row, col),
            dir,
            carried,
            &dropped,
        )
    }

    /// A player's clock ran out ("white" or "black")
    #[wasm_bindgen(js_name = setTimeExpired)]
    pub fn set_time_expired(&mut self, color: &str) -> bool {
        match color {
            "white" => self.inner.set_time_expired(crate::Color::White),
            "black" => self.inner.set_time_expired(crate::Color::Black),
            _ => false,
        }
    }
}
