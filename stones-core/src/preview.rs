//! Pure helpers for a front end entering a spread one drop at a time.

use crate::board::{Board, Color, Direction, PieceKind, Pos, Stack};
use crate::error::Rejection;
use crate::movegen::drop_sequences;
use crate::state::Phase;
use crate::validate::validate_spread;

/// Stacks as they would look after a spread, without touching the board.
///
/// The first entry is the origin with the carried pieces removed, followed by
/// every cell dropped on, in order. Spreads outside [`Phase::Playing`] are
/// rejected the same way [`validate`](crate::validate::validate) rejects them.
pub fn preview_spread(
    board: &Board,
    phase: Phase,
    mover: Color,
    from: Pos,
    dir: Direction,
    drops: &[u8],
) -> Result<Vec<(Pos, Stack)>, Rejection> {
    let path = validate_spread(board, phase, mover, from, dir, drops)?;

    let origin = board.stack(from).pieces();
    let carried: usize = drops.iter().map(|&d| d as usize).sum();
    let (left, hand) = origin.split_at(origin.len() - carried);

    let mut preview = Vec::with_capacity(path.len() + 1);
    preview.push((from, Stack::from_pieces(left.to_vec())));
    let mut rest = hand;
    for (&pos, &count) in path.iter().zip(drops) {
        let (now, later) = rest.split_at(count as usize);
        let mut under = board.stack(pos).clone();
        if under.top().is_some_and(|p| p.kind == PieceKind::Standing) {
            under.set_top_kind(PieceKind::Flat);
        }
        preview.push((pos, under.with_pieces_added(now)));
        rest = later;
    }
    Ok(preview)
}

/// Legal sizes for the next drop of a partially entered spread.
///
/// `carried` is the number of pieces picked up and `dropped` the drops entered
/// so far. Empty when no legal spread continues from there.
pub fn drop_options(
    board: &Board,
    phase: Phase,
    mover: Color,
    from: Pos,
    dir: Direction,
    carried: usize,
    dropped: &[u8],
) -> Vec<u8> {
    if phase != Phase::Playing {
        return Vec::new();
    }
    let stack = board.stack(from);
    let Some(top) = stack.top().filter(|p| p.color == mover) else {
        return Vec::new();
    };
    if carried == 0 || carried > stack.height().min(board.carry_limit()) {
        return Vec::new();
    }
    let mut options: Vec<u8> = drop_sequences(board, from, dir, carried, top.kind)
        .into_iter()
        .filter(|seq| seq.len() > dropped.len() && seq.starts_with(dropped))
        .map(|seq| seq[dropped.len()])
        .collect();
    options.sort_unstable();
    options.dedup();
    options
}
