//! Search position: the parts of a game state the search mutates in place.

use stones_core::play;
use stones_core::{
    adjudicate, legal_moves, Board, Color, Decision, GameState, Move, Phase, PieceKind, Reserves,
    Undo,
};
use xxhash_rust::xxh64::xxh64;

/// A position being searched. Unlike [`GameState`] it keeps no history and
/// no result; terminal checks happen in the search after each move.
#[derive(Clone, Debug)]
pub struct Node {
    pub board: Board,
    pub reserves: Reserves,
    pub to_move: Color,
    pub turn: u32,
}

impl Node {
    pub fn from_state(state: &GameState) -> Node {
        Node {
            board: state.board().clone(),
            reserves: *state.reserves(),
            to_move: state.to_move(),
            turn: state.turn(),
        }
    }

    #[inline]
    pub fn phase(&self) -> Phase {
        Phase::for_turn(self.turn)
    }

    pub fn legal_moves(&self) -> Vec<Move> {
        legal_moves(&self.board, self.phase(), self.to_move, &self.reserves)
    }

    /// Play a move generated for this node.
    pub fn make(&mut self, mv: &Move) -> Undo {
        let phase = self.phase();
        let undo = play::apply(&mut self.board, &mut self.reserves, phase, self.to_move, mv);
        self.to_move = self.to_move.opponent();
        self.turn += 1;
        undo
    }

    pub fn unmake(&mut self, mv: &Move, undo: Undo) {
        self.turn -= 1;
        self.to_move = self.to_move.opponent();
        play::revert(&mut self.board, &mut self.reserves, mv, undo);
    }

    /// Verdict on the position right after the previous player moved.
    #[inline]
    pub fn outcome(&self) -> Option<Decision> {
        adjudicate(&self.board, &self.reserves, self.to_move.opponent())
    }

    /// Transposition key. Turn only matters while the opening rule applies,
    /// so every later ply shares one bucket.
    pub fn key(&self) -> u64 {
        let size = self.board.size() as usize;
        let mut bytes = Vec::with_capacity(8 + size * size * 4);
        bytes.push(self.board.size());
        bytes.push(self.to_move as u8);
        bytes.push(self.turn.min(3) as u8);
        for color in Color::ALL {
            let stock = self.reserves.get(color);
            bytes.push(stock.stones);
            bytes.push(stock.capstones);
        }
        for (_, stack) in self.board.stacks() {
            bytes.push(stack.height() as u8);
            for piece in stack.pieces() {
                bytes.push(piece_code(piece.color, piece.kind));
            }
        }
        xxh64(&bytes, 0)
    }
}

fn piece_code(color: Color, kind: PieceKind) -> u8 {
    let kind = match kind {
        PieceKind::Flat => 0,
        PieceKind::Standing => 1,
        PieceKind::Capstone => 2,
    };
    kind * 2 + color as u8
}
