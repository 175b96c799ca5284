//! Caller-owned game session with change notifications.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::board::{Color, Direction, PieceKind, Pos};
use crate::error::{Rejection, SetupError};
use crate::moves::Move;
use crate::reserve::AllotmentTable;
use crate::state::{Decision, GameResult, GameState, MoveRecord, WinReason};

/// What changed on the board. Sent to every subscriber after the state has
/// been updated.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BoardEvent {
    Placed {
        pos: Pos,
        color: Color,
        kind: PieceKind,
    },
    Spread {
        from: Pos,
        dir: Direction,
        drops: Vec<u8>,
        affected: Vec<Pos>,
    },
    WallFlattened {
        pos: Pos,
    },
    RoadCompleted {
        color: Color,
        cells: Vec<Pos>,
    },
    GameOver {
        result: GameResult,
        reason: WinReason,
    },
    Undone {
        notation: String,
    },
    Reset {
        size: u8,
    },
}

type Listener = Box<dyn FnMut(&BoardEvent) + Send>;
type RoadCallback = Box<dyn FnMut(&[Pos], Color) + Send>;

/// A game plus its observers.
pub struct Game {
    state: GameState,
    allotments: AllotmentTable,
    listeners: Vec<Listener>,
    on_road: Option<RoadCallback>,
}

impl fmt::Debug for Game {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Game")
            .field("state", &self.state)
            .field("listeners", &self.listeners.len())
            .field("on_road", &self.on_road.is_some())
            .finish()
    }
}

impl Game {
    pub fn new(size: u8) -> Result<Game, SetupError> {
        Game::with_allotments(size, AllotmentTable::default())
    }

    pub fn with_allotments(size: u8, allotments: AllotmentTable) -> Result<Game, SetupError> {
        let state = GameState::with_table(size, &allotments)?;
        Ok(Game {
            state,
            allotments,
            listeners: Vec::new(),
            on_road: None,
        })
    }

    /// Wrap an existing state after checking it. `allotments` is what later
    /// calls to [`new_game`](Game::new_game) and [`load_tps`](Game::load_tps) use.
    pub fn from_state(state: GameState, allotments: AllotmentTable) -> Result<Game, SetupError> {
        state.check_consistency()?;
        Ok(Game {
            state,
            allotments,
            listeners: Vec::new(),
            on_road: None,
        })
    }

    /// Read-only view of the current state.
    #[inline]
    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Owned copy for off-thread work such as the AI.
    pub fn snapshot(&self) -> GameState {
        self.state.clone()
    }

    pub fn subscribe<F>(&mut self, listener: F)
    where
        F: FnMut(&BoardEvent) + Send + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    /// Called with the road cells and the winner whenever a road ends the game.
    pub fn on_road_win<F>(&mut self, callback: F)
    where
        F: FnMut(&[Pos], Color) + Send + 'static,
    {
        self.on_road = Some(Box::new(callback));
    }

    /// Start over on a fresh board. Observers stay attached.
    #[instrument(level = "info", skip(self))]
    pub fn new_game(&mut self, size: u8) -> Result<(), SetupError> {
        self.state = GameState::with_table(size, &self.allotments)?;
        self.emit(BoardEvent::Reset { size });
        Ok(())
    }

    /// Replace the state wholesale. The current state is kept on error.
    pub fn load_state(&mut self, state: GameState) -> Result<(), SetupError> {
        if let Err(e) = state.check_consistency() {
            warn!(error = %e, "refusing to load state");
            return Err(e);
        }
        let size = state.size();
        self.state = state;
        info!(size, turn = self.state.turn(), "state loaded");
        self.emit(BoardEvent::Reset { size });
        Ok(())
    }

    /// Load a TPS scenario using this game's allotments.
    pub fn load_tps(&mut self, tps: &str) -> Result<(), SetupError> {
        let state = GameState::from_tps(tps, &self.allotments)?;
        self.load_state(state)
    }

    pub fn try_place(&mut self, pos: Pos, kind: PieceKind) -> Result<MoveRecord, Rejection> {
        self.apply(Move::place(pos, kind))
    }

    pub fn try_move(&mut self, from: Pos, dir: Direction, drops: Vec<u8>) -> Result<MoveRecord, Rejection> {
        self.apply(Move::spread(from, dir, drops))
    }

    /// Place a piece; false if the placement was rejected.
    pub fn place_piece(&mut self, pos: Pos, kind: PieceKind) -> bool {
        self.try_place(pos, kind).is_ok()
    }

    /// Spread a stack; false if the spread was rejected.
    pub fn move_stack(&mut self, from: Pos, dir: Direction, drops: Vec<u8>) -> bool {
        self.try_move(from, dir, drops).is_ok()
    }

    pub fn apply(&mut self, mv: Move) -> Result<MoveRecord, Rejection> {
        let transition = self.state.apply(mv)?;
        self.announce(&transition.record, transition.decision);
        Ok(transition.record)
    }

    /// Apply a move chosen for the state with this
    /// [`fingerprint`](GameState::fingerprint); rejected as stale if the game
    /// has changed since.
    pub fn apply_at(&mut self, fingerprint: u64, mv: Move) -> Result<MoveRecord, Rejection> {
        let transition = self.state.apply_at(fingerprint, mv)?;
        self.announce(&transition.record, transition.decision);
        Ok(transition.record)
    }

    pub fn undo(&mut self) -> Option<MoveRecord> {
        let record = self.state.undo()?;
        self.emit(BoardEvent::Undone {
            notation: record.notation.clone(),
        });
        Some(record)
    }

    #[inline]
    pub fn can_undo(&self) -> bool {
        self.state.can_undo()
    }

    pub fn last_move_record(&self) -> Option<&MoveRecord> {
        self.state.last_move()
    }

    /// A player's clock ran out. Returns whether this ended the game.
    pub fn set_time_expired(&mut self, color: Color) -> bool {
        if !self.state.expire_time(color) {
            debug!(%color, phase = ?self.state.phase(), "time expiry ignored");
            return false;
        }
        if let (Some(result), Some(reason)) = (self.state.result(), self.state.win_reason()) {
            self.emit(BoardEvent::GameOver { result, reason });
        }
        true
    }

    fn announce(&mut self, record: &MoveRecord, decision: Option<Decision>) {
        match &record.mv {
            Move::Place { pos, kind } => self.emit(BoardEvent::Placed {
                pos: *pos,
                color: record.undo.payer,
                kind: *kind,
            }),
            Move::Spread { from, dir, drops } => {
                self.emit(BoardEvent::Spread {
                    from: *from,
                    dir: *dir,
                    drops: drops.clone(),
                    affected: record.affected.clone(),
                });
                if record.undo.flattened {
                    if let Some(&pos) = record.affected.last() {
                        self.emit(BoardEvent::WallFlattened { pos });
                    }
                }
            }
        }

        let Some(decision) = decision else {
            return;
        };
        if let Some(road) = &decision.road {
            self.emit(BoardEvent::RoadCompleted {
                color: road.color,
                cells: road.cells.clone(),
            });
            if let Some(callback) = self.on_road.as_mut() {
                callback(&road.cells, road.color);
            }
        }
        self.emit(BoardEvent::GameOver {
            result: decision.result,
            reason: decision.reason,
        });
    }

    fn emit(&mut self, event: BoardEvent) {
        for listener in &mut self.listeners {
            listener(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reserve::Stock;
    use crate::state::Phase;
    use std::sync::{Arc, Mutex};

    fn recorded(game: &mut Game) -> Arc<Mutex<Vec<BoardEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        game.subscribe(move |e| sink.lock().unwrap().push(e.clone()));
        events
    }

    #[test]
    fn test_place_and_events() {
        let mut game = Game::new(4).unwrap();
        let events = recorded(&mut game);

        assert!(game.place_piece(Pos::new(0, 0), PieceKind::Flat));
        assert!(!game.place_piece(Pos::new(0, 0), PieceKind::Flat));
        assert_eq!(
            game.try_place(Pos::new(1, 1), PieceKind::Standing),
            Err(Rejection::WrongPhase)
        );
        assert!(game.place_piece(Pos::new(3, 3), PieceKind::Flat));

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0],
            BoardEvent::Placed {
                pos: Pos::new(0, 0),
                color: Color::Black,
                kind: PieceKind::Flat
            }
        );
        assert_eq!(game.state().phase(), Phase::Playing);
        assert_eq!(game.last_move_record().unwrap().notation, "d4");
    }

    #[test]
    fn test_road_callback_and_game_over() {
        let mut game = Game::new(3).unwrap();
        let events = recorded(&mut game);
        let roads = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&roads);
        game.on_road_win(move |cells, color| sink.lock().unwrap().push((cells.to_vec(), color)));

        game.place_piece(Pos::new(2, 2), PieceKind::Flat); // black c3
        game.place_piece(Pos::new(0, 0), PieceKind::Flat); // white a1
        game.place_piece(Pos::new(0, 1), PieceKind::Flat);
        game.place_piece(Pos::new(2, 1), PieceKind::Flat);
        game.place_piece(Pos::new(0, 2), PieceKind::Flat);

        let roads = roads.lock().unwrap();
        assert_eq!(roads.len(), 1);
        assert_eq!(roads[0].1, Color::White);
        assert_eq!(roads[0].0, vec![Pos::new(0, 0), Pos::new(0, 1), Pos::new(0, 2)]);

        let events = events.lock().unwrap();
        assert!(matches!(
            events.last(),
            Some(BoardEvent::GameOver {
                result: GameResult::WhiteWins,
                reason: WinReason::Road
            })
        ));
        assert!(!game.can_undo());
    }

    #[test]
    fn test_wall_flattened_event() {
        let mut game = Game::new(5).unwrap();
        game.load_tps("x5/x5/x5/x,2S,x3/1,1C,x3 1 4").unwrap();
        let events = recorded(&mut game);

        let record = game.try_move(Pos::new(0, 1), Direction::North, vec![1]).unwrap();
        assert!(record.undo.flattened);
        assert_eq!(record.notation, "b1+1");
        let events = events.lock().unwrap();
        assert_eq!(events[1], BoardEvent::WallFlattened { pos: Pos::new(1, 1) });
    }

    #[test]
    fn test_undo_and_reset_events() {
        let mut game = Game::new(4).unwrap();
        let events = recorded(&mut game);
        game.place_piece(Pos::new(0, 0), PieceKind::Flat);
        assert!(game.can_undo());
        let record = game.undo().unwrap();
        assert_eq!(record.notation, "a1");
        assert!(game.state().board().occupied_positions().is_empty());
        game.new_game(6).unwrap();
        assert_eq!(game.state().size(), 6);

        let events = events.lock().unwrap();
        assert_eq!(events[1], BoardEvent::Undone { notation: "a1".into() });
        assert_eq!(events[2], BoardEvent::Reset { size: 6 });
    }

    #[test]
    fn test_apply_at_stale() {
        let mut game = Game::new(4).unwrap();
        let snapshot = game.snapshot();
        game.place_piece(Pos::new(0, 0), PieceKind::Flat);
        let late = Move::place(Pos::new(1, 1), PieceKind::Flat);
        assert_eq!(game.apply_at(snapshot.fingerprint(), late.clone()), Err(Rejection::StaleState));
        assert!(game.apply_at(game.state().fingerprint(), late).is_ok());
    }

    #[test]
    fn test_apply_at_after_reset_and_replay() {
        let mut game = Game::new(4).unwrap();
        game.place_piece(Pos::new(0, 0), PieceKind::Flat);
        game.place_piece(Pos::new(3, 3), PieceKind::Flat);
        let snapshot = game.snapshot();

        game.new_game(4).unwrap();
        game.place_piece(Pos::new(0, 3), PieceKind::Flat);
        game.place_piece(Pos::new(3, 0), PieceKind::Flat);
        assert_eq!(game.state().turn(), snapshot.turn());
        let late = Move::place(Pos::new(1, 1), PieceKind::Flat);
        assert_eq!(game.apply_at(snapshot.fingerprint(), late), Err(Rejection::StaleState));
        assert_eq!(game.state().turn(), 3);
    }

    #[test]
    fn test_from_state_keeps_allotments() {
        let table = AllotmentTable::default().with_override(4, Stock::new(9, 1));
        let state = GameState::with_table(4, &table).unwrap();
        let mut game = Game::from_state(state, table).unwrap();
        game.new_game(4).unwrap();
        assert_eq!(game.state().allotment(), Stock::new(9, 1));
        game.load_tps("x4/x4/x4/x4 1 1").unwrap();
        assert_eq!(game.state().reserve(Color::Black), Stock::new(9, 1));
    }

    #[test]
    fn test_time_expired() {
        let mut game = Game::new(4).unwrap();
        let events = recorded(&mut game);
        assert!(!game.set_time_expired(Color::White));
        game.place_piece(Pos::new(0, 0), PieceKind::Flat);
        game.place_piece(Pos::new(3, 3), PieceKind::Flat);
        assert!(game.set_time_expired(Color::Black));
        assert!(!game.set_time_expired(Color::Black));
        assert_eq!(game.state().result(), Some(GameResult::WhiteWins));
        let over = events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| matches!(e, BoardEvent::GameOver { .. }))
            .count();
        assert_eq!(over, 1);
    }

    #[test]
    fn test_load_state_rejects_inconsistent() {
        let mut game = Game::new(4).unwrap();
        let mut json = serde_json::to_value(GameState::new(5).unwrap()).unwrap();
        json["turn"] = serde_json::json!(2);
        let bad: GameState = serde_json::from_value(json).unwrap();
        assert!(game.load_state(bad).is_err());
        assert_eq!(game.state().size(), 4);

        game.load_state(GameState::new(5).unwrap()).unwrap();
        assert_eq!(game.state().size(), 5);
    }
}
