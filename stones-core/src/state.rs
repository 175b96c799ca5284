//! Game state machine: board, reserves, turn/phase bookkeeping and history.
//!
//! ```text
//! Opening (plies 1-2, placements of the opponent's flat)
//!    |
//!    v
//! Playing (placements and spreads) --road / flats / time--> Over
//! ```

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use xxhash_rust::xxh64::Xxh64;

use crate::board::{Board, Color, Piece, Pos};
use crate::error::{Rejection, SetupError};
use crate::movegen;
use crate::moves::{Move, Undo};
use crate::play;
use crate::reserve::{AllotmentTable, Reserves, Stock};
use crate::road::{find_road, Road};
use crate::validate;

/// Game phase.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Opening,
    Playing,
    Over,
}

impl Phase {
    /// Phase of a game still in progress at a 1-based ply.
    #[inline]
    pub fn for_turn(turn: u32) -> Phase {
        if turn <= 2 {
            Phase::Opening
        } else {
            Phase::Playing
        }
    }
}

/// Final outcome.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameResult {
    WhiteWins,
    BlackWins,
    Draw,
}

impl GameResult {
    pub fn win_for(color: Color) -> GameResult {
        match color {
            Color::White => GameResult::WhiteWins,
            Color::Black => GameResult::BlackWins,
        }
    }

    pub fn winner(self) -> Option<Color> {
        match self {
            GameResult::WhiteWins => Some(Color::White),
            GameResult::BlackWins => Some(Color::Black),
            GameResult::Draw => None,
        }
    }
}

/// How the game ended.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WinReason {
    Road,
    Flats,
    Time,
}

/// One applied move with what is needed to take it back.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct MoveRecord {
    pub mv: Move,
    pub mover: Color,
    /// Ply the move was played on.
    pub turn: u32,
    /// Phase before the move.
    pub phase: Phase,
    /// Cells touched, in order.
    pub affected: Vec<Pos>,
    pub notation: String,
    pub undo: Undo,
}

/// A terminal verdict for a position.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Decision {
    pub result: GameResult,
    pub reason: WinReason,
    /// The winning road, for road wins.
    pub road: Option<Road>,
}

/// Result of a successful [`GameState::apply`].
#[derive(Clone, Debug)]
pub struct Transition {
    pub record: MoveRecord,
    /// Set when this move ended the game.
    pub decision: Option<Decision>,
}

/// Decide whether the position after `mover`'s move is terminal.
///
/// Roads take precedence over flat counts, and the mover's road over the
/// opponent's. Flat counts apply once either reserve is empty or the board
/// is full.
pub fn adjudicate(board: &Board, reserves: &Reserves, mover: Color) -> Option<Decision> {
    for color in [mover, mover.opponent()] {
        if let Some(road) = find_road(board, color) {
            return Some(Decision {
                result: GameResult::win_for(color),
                reason: WinReason::Road,
                road: Some(road),
            });
        }
    }
    if reserves.any_exhausted() || board.is_full() {
        let white = board.flat_count(Color::White);
        let black = board.flat_count(Color::Black);
        let result = match white.cmp(&black) {
            std::cmp::Ordering::Greater => GameResult::WhiteWins,
            std::cmp::Ordering::Less => GameResult::BlackWins,
            std::cmp::Ordering::Equal => GameResult::Draw,
        };
        return Some(Decision {
            result,
            reason: WinReason::Flats,
            road: None,
        });
    }
    None
}

/// Full game state.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct GameState {
    board: Board,
    to_move: Color,
    turn: u32,
    phase: Phase,
    reserves: Reserves,
    allotment: Stock,
    result: Option<GameResult>,
    win_reason: Option<WinReason>,
    history: Vec<MoveRecord>,
}

impl GameState {
    /// New game with the standard allotment.
    pub fn new(size: u8) -> Result<GameState, SetupError> {
        GameState::with_table(size, &AllotmentTable::default())
    }

    /// New game with allotments taken from a configured table.
    pub fn with_table(size: u8, table: &AllotmentTable) -> Result<GameState, SetupError> {
        GameState::with_allotment(size, table.for_size(size)?)
    }

    pub fn with_allotment(size: u8, allotment: Stock) -> Result<GameState, SetupError> {
        Ok(GameState {
            board: Board::new(size)?,
            to_move: Color::White,
            turn: 1,
            phase: Phase::Opening,
            reserves: Reserves::full(allotment),
            allotment,
            result: None,
            win_reason: None,
            history: Vec::new(),
        })
    }

    /// Build a state from a position (no history). Reserves are whatever the
    /// allotment leaves after the pieces on the board; an already decided
    /// position comes back as `Over`.
    pub fn from_position(board: Board, turn: u32, allotment: Stock) -> Result<GameState, SetupError> {
        board.check_shape()?;
        if turn == 0 {
            return Err(SetupError::Inconsistent("turn numbers start at 1".into()));
        }
        let mut reserves = Reserves::default();
        for color in Color::ALL {
            *reserves.get_mut(color) = remaining(&board, color, allotment)?;
        }
        let mut state = GameState {
            board,
            to_move: Color::for_turn(turn),
            turn,
            phase: Phase::for_turn(turn),
            reserves,
            allotment,
            result: None,
            win_reason: None,
            history: Vec::new(),
        };
        if turn > 1 {
            if let Some(decision) = adjudicate(&state.board, &state.reserves, state.to_move.opponent()) {
                state.finish(decision.result, decision.reason);
            }
        }
        state.check_consistency()?;
        Ok(state)
    }

    #[inline]
    pub fn board(&self) -> &Board {
        &self.board
    }

    #[inline]
    pub fn size(&self) -> u8 {
        self.board.size()
    }

    #[inline]
    pub fn to_move(&self) -> Color {
        self.to_move
    }

    #[inline]
    pub fn opponent(&self) -> Color {
        self.to_move.opponent()
    }

    /// 1-based ply number of the next move.
    #[inline]
    pub fn turn(&self) -> u32 {
        self.turn
    }

    #[inline]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[inline]
    pub fn is_over(&self) -> bool {
        self.phase == Phase::Over
    }

    #[inline]
    pub fn reserves(&self) -> &Reserves {
        &self.reserves
    }

    #[inline]
    pub fn reserve(&self, color: Color) -> Stock {
        self.reserves.get(color)
    }

    #[inline]
    pub fn allotment(&self) -> Stock {
        self.allotment
    }

    #[inline]
    pub fn result(&self) -> Option<GameResult> {
        self.result
    }

    #[inline]
    pub fn win_reason(&self) -> Option<WinReason> {
        self.win_reason
    }

    #[inline]
    pub fn history(&self) -> &[MoveRecord] {
        &self.history
    }

    pub fn last_move(&self) -> Option<&MoveRecord> {
        self.history.last()
    }

    /// Check a move for the side to move without applying it.
    pub fn validate(&self, mv: &Move) -> Result<(), Rejection> {
        validate::validate(&self.board, self.phase, self.to_move, &self.reserves, mv)
    }

    pub fn legal_moves(&self) -> Vec<Move> {
        movegen::legal_moves(&self.board, self.phase, self.to_move, &self.reserves)
    }

    /// Validate and apply a move for the side to move.
    ///
    /// On rejection nothing changes.
    #[instrument(level = "debug", skip(self), fields(turn = self.turn, mover = %self.to_move))]
    pub fn apply(&mut self, mv: Move) -> Result<Transition, Rejection> {
        self.validate(&mv)?;

        let mover = self.to_move;
        let phase = self.phase;
        let affected = play::affected_cells(&self.board, &mv);
        let undo = play::apply(&mut self.board, &mut self.reserves, phase, mover, &mv);
        let record = MoveRecord {
            notation: mv.to_string(),
            mv,
            mover,
            turn: self.turn,
            phase,
            affected,
            undo,
        };
        debug!(notation = %record.notation, "move applied");

        self.turn += 1;
        self.to_move = mover.opponent();
        self.phase = Phase::for_turn(self.turn);

        let decision = adjudicate(&self.board, &self.reserves, mover);
        if let Some(decision) = &decision {
            self.finish(decision.result, decision.reason);
        }
        self.history.push(record.clone());
        Ok(Transition { record, decision })
    }

    /// Hash of everything a move is decided on: board, reserves, ply and
    /// outcome. Two states with the same fingerprint accept the same moves.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = Xxh64::new(0);
        self.board.hash(&mut hasher);
        self.reserves.hash(&mut hasher);
        self.allotment.hash(&mut hasher);
        self.turn.hash(&mut hasher);
        self.phase.hash(&mut hasher);
        self.result.hash(&mut hasher);
        hasher.finish()
    }

    /// Apply only if the caller's view of the game is still current, i.e.
    /// `expected` is the [`fingerprint`](GameState::fingerprint) of the state
    /// the move was chosen for.
    pub fn apply_at(&mut self, expected: u64, mv: Move) -> Result<Transition, Rejection> {
        let current = self.fingerprint();
        if expected != current {
            debug!(expected, current, turn = self.turn, "stale move discarded");
            return Err(Rejection::StaleState);
        }
        self.apply(mv)
    }

    #[inline]
    pub fn can_undo(&self) -> bool {
        !self.is_over() && !self.history.is_empty()
    }

    /// Take back the last move. Unavailable once the game is over.
    pub fn undo(&mut self) -> Option<MoveRecord> {
        if !self.can_undo() {
            return None;
        }
        let record = self.history.pop()?;
        play::revert(&mut self.board, &mut self.reserves, &record.mv, record.undo);
        self.turn = record.turn;
        self.to_move = record.mover;
        self.phase = record.phase;
        debug!(notation = %record.notation, turn = self.turn, "move undone");
        Some(record)
    }

    /// A player's clock ran out. Returns whether the game ended because of it.
    ///
    /// Only meaningful while playing: ignored in the opening, a no-op once over.
    pub fn expire_time(&mut self, color: Color) -> bool {
        match self.phase {
            Phase::Playing => {
                self.finish(GameResult::win_for(color.opponent()), WinReason::Time);
                true
            }
            Phase::Opening | Phase::Over => false,
        }
    }

    fn finish(&mut self, result: GameResult, reason: WinReason) {
        info!(?result, ?reason, turn = self.turn, "game over");
        self.phase = Phase::Over;
        self.result = Some(result);
        self.win_reason = Some(reason);
    }

    /// Structural and bookkeeping checks for states that did not come from
    /// `apply` (deserialized or built from a position).
    pub fn check_consistency(&self) -> Result<(), SetupError> {
        self.board.check_shape()?;
        for color in Color::ALL {
            let expected = remaining(&self.board, color, self.allotment)?;
            let actual = self.reserves.get(color);
            if actual.stones != expected.stones {
                return Err(SetupError::Conservation { color, what: "stones" });
            }
            if actual.capstones != expected.capstones {
                return Err(SetupError::Conservation { color, what: "capstones" });
            }
        }
        if self.turn == 0 {
            return Err(SetupError::Inconsistent("turn numbers start at 1".into()));
        }
        if self.to_move != Color::for_turn(self.turn) {
            return Err(SetupError::Inconsistent(format!(
                "{} cannot be to move on ply {}",
                self.to_move, self.turn
            )));
        }
        match (self.phase, self.result, self.win_reason) {
            (Phase::Over, Some(_), Some(_)) => {}
            (Phase::Over, _, _) => {
                return Err(SetupError::Inconsistent("finished game without a result".into()));
            }
            (phase, None, None) if phase == Phase::for_turn(self.turn) => {}
            (phase, _, _) => {
                return Err(SetupError::Inconsistent(format!(
                    "phase {phase:?} does not match ply {}",
                    self.turn
                )));
            }
        }
        if self.turn == u32::MAX {
            return Err(SetupError::Inconsistent("ply counter is out of range".into()));
        }
        if self.history.len() >= self.turn as usize {
            return Err(SetupError::Inconsistent("history is longer than the game".into()));
        }
        self.check_history()
    }

    /// Take the history back on a copy of the board, newest first. Every
    /// record has to revert cleanly and replay to exactly the position it
    /// was taken back from, or `undo` could not be trusted with it.
    fn check_history(&self) -> Result<(), SetupError> {
        let mut board = self.board.clone();
        let mut reserves = self.reserves;
        let mut turn = self.turn;
        for (i, record) in self.history.iter().enumerate().rev() {
            let bad = |what: &str| {
                SetupError::Inconsistent(format!("history entry {} `{}`: {what}", i + 1, record.notation))
            };
            turn -= 1;
            if record.turn != turn
                || record.mover != Color::for_turn(turn)
                || record.phase != Phase::for_turn(turn)
            {
                return Err(bad("out of sequence"));
            }
            if record.notation != record.mv.to_string() {
                return Err(bad("notation does not match the move"));
            }
            if !board.is_valid(record.mv.origin()) {
                return Err(bad("off the board"));
            }
            if let Move::Place { pos, kind } = record.mv {
                if board.top(pos) != Some(Piece::new(record.undo.payer, kind)) {
                    return Err(bad("placed piece is not on top"));
                }
            }

            let after = board.clone();
            let reserves_after = reserves;
            play::revert(&mut board, &mut reserves, &record.mv, record.undo);
            validate::validate(&board, record.phase, record.mover, &reserves, &record.mv)
                .map_err(|reason| bad(&reason.to_string()))?;
            if record.affected != play::affected_cells(&board, &record.mv) {
                return Err(bad("affected cells do not match the move"));
            }

            let mut replay = board.clone();
            let mut replay_reserves = reserves;
            let undo = play::apply(&mut replay, &mut replay_reserves, record.phase, record.mover, &record.mv);
            if undo != record.undo || replay != after || replay_reserves != reserves_after {
                return Err(bad("does not match the board"));
            }
        }
        Ok(())
    }
}

/// What the allotment leaves after a color's pieces on the board.
fn remaining(board: &Board, color: Color, allotment: Stock) -> Result<Stock, SetupError> {
    let overdrawn = |what| SetupError::Conservation { color, what };
    let on_board = board.count_pieces(color).ok_or(overdrawn("stones"))?;
    allotment.checked_sub(on_board).ok_or(overdrawn(if on_board.stones > allotment.stones {
        "stones"
    } else {
        "capstones"
    }))
}
