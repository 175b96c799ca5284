//! Legal move generation.
//!
//! Every move produced here passes [`validate`](crate::validate::validate);
//! the playout tests check that for random reachable positions.

use crate::board::{Board, Color, Direction, PieceKind, Pos};
use crate::moves::Move;
use crate::reserve::Reserves;
use crate::state::Phase;
use crate::validate::placement_color;

/// All legal moves, placements first.
pub fn legal_moves(board: &Board, phase: Phase, mover: Color, reserves: &Reserves) -> Vec<Move> {
    let mut moves = Vec::new();
    if phase == Phase::Over {
        return moves;
    }

    let kinds = placement_kinds(phase, mover, reserves);
    for pos in board.positions() {
        if board.stack(pos).is_empty() {
            moves.extend(kinds.iter().map(|&kind| Move::place(pos, kind)));
        }
    }

    if phase == Phase::Playing {
        for (from, stack) in board.stacks() {
            let Some(top) = stack.top().filter(|p| p.color == mover) else {
                continue;
            };
            let max_carry = stack.height().min(board.carry_limit());
            for dir in Direction::ALL {
                for carried in 1..=max_carry {
                    for drops in drop_sequences(board, from, dir, carried, top.kind) {
                        moves.push(Move::spread(from, dir, drops));
                    }
                }
            }
        }
    }
    moves
}

/// Number of legal moves without building them.
pub fn count_legal_moves(board: &Board, phase: Phase, mover: Color, reserves: &Reserves) -> usize {
    if phase == Phase::Over {
        return 0;
    }
    let kinds = placement_kinds(phase, mover, reserves).len();
    let mut count = 0;
    for (from, stack) in board.stacks() {
        match stack.top() {
            None => count += kinds,
            Some(top) if top.color == mover && phase == Phase::Playing => {
                let max_carry = stack.height().min(board.carry_limit());
                for dir in Direction::ALL {
                    for carried in 1..=max_carry {
                        count += count_sequences(board, from, dir, carried, top.kind);
                    }
                }
            }
            Some(_) => {}
        }
    }
    count
}

fn placement_kinds(phase: Phase, mover: Color, reserves: &Reserves) -> Vec<PieceKind> {
    let stock = reserves.get(placement_color(phase, mover));
    match phase {
        Phase::Opening if stock.has(PieceKind::Flat) => vec![PieceKind::Flat],
        Phase::Opening | Phase::Over => Vec::new(),
        Phase::Playing => PieceKind::ALL.into_iter().filter(|&k| stock.has(k)).collect(),
    }
}

/// Every legal way to drop `carried` pieces from `from` going `dir`.
///
/// `leading` is the kind of the top piece of the carried stack.
pub fn drop_sequences(
    board: &Board,
    from: Pos,
    dir: Direction,
    carried: usize,
    leading: PieceKind,
) -> Vec<Vec<u8>> {
    let mut out = Vec::new();
    let mut prefix = Vec::with_capacity(carried);
    extend_drops(board, from, dir, carried, leading, &mut prefix, &mut out);
    out
}

fn extend_drops(
    board: &Board,
    pos: Pos,
    dir: Direction,
    remaining: usize,
    leading: PieceKind,
    prefix: &mut Vec<u8>,
    out: &mut Vec<Vec<u8>>,
) {
    let Some(next) = board.step(pos, dir) else {
        return;
    };
    match board.top(next).map(|p| p.kind) {
        Some(PieceKind::Capstone) => {}
        Some(PieceKind::Standing) => {
            if remaining == 1 && leading == PieceKind::Capstone {
                prefix.push(1);
                out.push(prefix.clone());
                prefix.pop();
            }
        }
        None | Some(PieceKind::Flat) => {
            for drop in 1..=remaining {
                prefix.push(drop as u8);
                if drop == remaining {
                    out.push(prefix.clone());
                } else {
                    extend_drops(board, next, dir, remaining - drop, leading, prefix, out);
                }
                prefix.pop();
            }
        }
    }
}

fn count_sequences(board: &Board, pos: Pos, dir: Direction, remaining: usize, leading: PieceKind) -> usize {
    let Some(next) = board.step(pos, dir) else {
        return 0;
    };
    match board.top(next).map(|p| p.kind) {
        Some(PieceKind::Capstone) => 0,
        Some(PieceKind::Standing) => usize::from(remaining == 1 && leading == PieceKind::Capstone),
        None | Some(PieceKind::Flat) => {
            1 + (1..remaining)
                .map(|drop| count_sequences(board, next, dir, remaining - drop, leading))
                .sum::<usize>()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Piece;
    use crate::reserve::default_allotment;
    use crate::validate::validate;

    fn reserves(size: u8) -> Reserves {
        Reserves::full(default_allotment(size).unwrap())
    }

    #[test]
    fn test_opening_moves_are_flats() {
        let board = Board::new(4).unwrap();
        let moves = legal_moves(&board, Phase::Opening, Color::White, &reserves(4));
        assert_eq!(moves.len(), 16);
        assert!(moves
            .iter()
            .all(|m| matches!(m, Move::Place { kind: PieceKind::Flat, .. })));
    }

    #[test]
    fn test_empty_board_placements() {
        let board = Board::new(5).unwrap();
        let moves = legal_moves(&board, Phase::Playing, Color::White, &reserves(5));
        // Flat, wall and capstone on each of 25 cells.
        assert_eq!(moves.len(), 75);
        assert_eq!(count_legal_moves(&board, Phase::Playing, Color::White, &reserves(5)), 75);
    }

    #[test]
    fn test_no_moves_when_over() {
        let board = Board::new(3).unwrap();
        assert!(legal_moves(&board, Phase::Over, Color::White, &reserves(3)).is_empty());
    }

    #[test]
    fn test_drop_sequences_on_open_row() {
        let mut board = Board::new(5).unwrap();
        let from = Pos::new(0, 0);
        board.drop_onto(from, &[Piece::flat(Color::White); 3]);
        // Compositions of 3 with at most 4 parts: 3, 12, 21, 111.
        let seqs = drop_sequences(&board, from, Direction::East, 3, PieceKind::Flat);
        assert_eq!(seqs, vec![vec![1, 1, 1], vec![1, 2], vec![2, 1], vec![3]]);
        assert!(drop_sequences(&board, from, Direction::West, 3, PieceKind::Flat).is_empty());
    }

    #[test]
    fn test_drop_sequences_stop_at_wall() {
        let mut board = Board::new(5).unwrap();
        let from = Pos::new(0, 0);
        board.drop_onto(from, &[Piece::flat(Color::White), Piece::new(Color::White, PieceKind::Capstone)]);
        board.drop_onto(Pos::new(0, 2), &[Piece::new(Color::Black, PieceKind::Standing)]);

        let flat_led = drop_sequences(&board, from, Direction::East, 2, PieceKind::Flat);
        assert_eq!(flat_led, vec![vec![2]]);
        let cap_led = drop_sequences(&board, from, Direction::East, 2, PieceKind::Capstone);
        assert_eq!(cap_led, vec![vec![1, 1], vec![2]]);
    }

    #[test]
    fn test_generated_moves_validate_and_count_matches() {
        let mut board = Board::new(5).unwrap();
        board.drop_onto(Pos::new(2, 2), &[Piece::flat(Color::Black), Piece::flat(Color::White), Piece::new(Color::White, PieceKind::Capstone)]);
        board.drop_onto(Pos::new(2, 3), &[Piece::new(Color::Black, PieceKind::Standing)]);
        board.drop_onto(Pos::new(1, 2), &[Piece::flat(Color::White)]);
        board.drop_onto(Pos::new(3, 2), &[Piece::new(Color::Black, PieceKind::Capstone)]);
        let mut res = reserves(5);
        res.white.capstones = 0;
        res.black.capstones = 0;

        let moves = legal_moves(&board, Phase::Playing, Color::White, &res);
        for mv in &moves {
            assert_eq!(validate(&board, Phase::Playing, Color::White, &res, mv), Ok(()), "{mv:?}");
        }
        assert_eq!(moves.len(), count_legal_moves(&board, Phase::Playing, Color::White, &res));
    }
}
