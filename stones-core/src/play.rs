//! Applying and reverting moves on a board and its reserves.
//!
//! These are the low-level primitives the state machine and the search share.
//! They assume the move already passed [`validate`](crate::validate::validate)
//! for the given phase and mover.

use std::iter;

use crate::board::{Board, Color, Direction, Piece, PieceKind, Pos};
use crate::moves::{Move, Undo};
use crate::reserve::Reserves;
use crate::state::Phase;
use crate::validate::placement_color;

/// Apply a validated move, returning what `revert` needs to take it back.
///
/// # Panics
///
/// If a spread walks off the board, which validation rules out.
pub fn apply(
    board: &mut Board,
    reserves: &mut Reserves,
    phase: Phase,
    mover: Color,
    mv: &Move,
) -> Undo {
    match mv {
        Move::Place { pos, kind } => {
            let payer = placement_color(phase, mover);
            reserves.get_mut(payer).take(*kind);
            board.drop_onto(*pos, &[Piece::new(payer, *kind)]);
            Undo {
                payer,
                flattened: false,
            }
        }
        Move::Spread { from, dir, drops } => {
            let hand = board.lift(*from, mv.carried());
            let mut rest = hand.as_slice();
            let mut pos = *from;
            let mut flattened = false;
            for &count in drops {
                pos = board.step(pos, *dir).expect("validated spread stays on the board");
                if board.top(pos).is_some_and(|p| p.kind == PieceKind::Standing) {
                    board.stack_mut(pos).set_top_kind(PieceKind::Flat);
                    flattened = true;
                }
                let (now, later) = rest.split_at(count as usize);
                board.drop_onto(pos, now);
                rest = later;
            }
            Undo {
                payer: mover,
                flattened,
            }
        }
    }
}

/// Exact inverse of [`apply`].
pub fn revert(board: &mut Board, reserves: &mut Reserves, mv: &Move, undo: Undo) {
    match mv {
        Move::Place { pos, kind } => {
            board.lift(*pos, 1);
            reserves.get_mut(undo.payer).restore(*kind);
        }
        Move::Spread { from, dir, drops } => {
            let path = spread_path(board, *from, *dir, drops.len());
            let last = path.len().saturating_sub(1);
            let mut hand: Vec<Piece> = Vec::with_capacity(mv.carried());
            for (i, (&pos, &count)) in path.iter().zip(drops).enumerate().rev() {
                let mut lifted = board.lift(pos, count as usize);
                if i == last && undo.flattened {
                    board.stack_mut(pos).set_top_kind(PieceKind::Standing);
                }
                lifted.extend_from_slice(&hand);
                hand = lifted;
            }
            board.drop_onto(*from, &hand);
        }
    }
}

/// Up to `len` cells stepping from `from` (exclusive) in `dir`.
pub fn spread_path(board: &Board, from: Pos, dir: Direction, len: usize) -> Vec<Pos> {
    iter::successors(board.step(from, dir), |&p| board.step(p, dir))
        .take(len)
        .collect()
}

/// Cells a move touches, in order: the target of a placement, or the origin
/// of a spread followed by every cell it drops on.
pub fn affected_cells(board: &Board, mv: &Move) -> Vec<Pos> {
    match mv {
        Move::Place { pos, .. } => vec![*pos],
        Move::Spread { from, dir, drops } => iter::once(*from)
            .chain(spread_path(board, *from, *dir, drops.len()))
            .collect(),
    }
}
