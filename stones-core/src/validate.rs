//! Move validation.
//!
//! Pure functions: nothing here mutates a board or a reserve. The state
//! machine, the move generator and the AI all go through [`validate`].

use tracing::debug;

use crate::board::{Board, Color, Direction, PieceKind, Pos};
use crate::error::Rejection;
use crate::moves::Move;
use crate::reserve::Reserves;
use crate::state::Phase;

/// Check a move for the side to move.
pub fn validate(
    board: &Board,
    phase: Phase,
    mover: Color,
    reserves: &Reserves,
    mv: &Move,
) -> Result<(), Rejection> {
    let verdict = match phase {
        Phase::Over => Err(Rejection::WrongPhase),
        _ => match mv {
            Move::Place { pos, kind } => validate_place(board, phase, mover, reserves, *pos, *kind),
            Move::Spread { from, dir, drops } => {
                validate_spread(board, phase, mover, *from, *dir, drops).map(|_| ())
            }
        },
    };
    if let Err(reason) = verdict {
        debug!(?mv, ?mover, ?phase, %reason, "move rejected");
    }
    verdict
}

/// Color of the stone a placement puts down.
///
/// During the opening each player places one of the opponent's flats.
#[inline]
pub fn placement_color(phase: Phase, mover: Color) -> Color {
    match phase {
        Phase::Opening => mover.opponent(),
        Phase::Playing | Phase::Over => mover,
    }
}

fn validate_place(
    board: &Board,
    phase: Phase,
    mover: Color,
    reserves: &Reserves,
    pos: Pos,
    kind: PieceKind,
) -> Result<(), Rejection> {
    if !board.is_valid(pos) {
        return Err(Rejection::OutOfBounds);
    }
    if !board.stack(pos).is_empty() {
        return Err(Rejection::OccupiedTarget);
    }
    if phase == Phase::Opening && kind != PieceKind::Flat {
        return Err(Rejection::WrongPhase);
    }
    if !reserves.get(placement_color(phase, mover)).has(kind) {
        return Err(Rejection::InsufficientReserve);
    }
    Ok(())
}

/// Validate a spread and return the cells it lands on, in order.
pub(crate) fn validate_spread(
    board: &Board,
    phase: Phase,
    mover: Color,
    from: Pos,
    dir: Direction,
    drops: &[u8],
) -> Result<Vec<Pos>, Rejection> {
    if phase != Phase::Playing {
        return Err(Rejection::WrongPhase);
    }
    if !board.is_valid(from) {
        return Err(Rejection::OutOfBounds);
    }
    if drops.is_empty() || drops.contains(&0) {
        return Err(Rejection::MalformedDrops);
    }
    let stack = board.stack(from);
    let Some(leading) = stack.top().filter(|p| p.color == mover) else {
        return Err(Rejection::NotYourStack);
    };
    let carried: usize = drops.iter().map(|&d| d as usize).sum();
    if carried > stack.height().min(board.carry_limit()) {
        return Err(Rejection::ExceedsCarryLimit);
    }
    landing_path(board, from, dir, drops, leading.kind)
}

/// Walk the drop path, checking each landing.
///
/// `leading` is the kind of the top piece of the carried stack, which is the
/// last piece to leave the hand.
pub(crate) fn landing_path(
    board: &Board,
    from: Pos,
    dir: Direction,
    drops: &[u8],
    leading: PieceKind,
) -> Result<Vec<Pos>, Rejection> {
    let mut path = Vec::with_capacity(drops.len());
    let mut pos = from;
    for (i, &count) in drops.iter().enumerate() {
        pos = board.step(pos, dir).ok_or(Rejection::OutOfBounds)?;
        match board.top(pos).map(|p| p.kind) {
            None | Some(PieceKind::Flat) => {}
            Some(PieceKind::Capstone) => return Err(Rejection::IllegalLanding),
            Some(PieceKind::Standing) => {
                // Only a lone capstone, as the final drop, flattens a wall.
                let last = i + 1 == drops.len();
                if !(last && count == 1 && leading == PieceKind::Capstone) {
                    return Err(Rejection::IllegalLanding);
                }
            }
        }
        path.push(pos);
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Piece;
    use crate::reserve::Stock;

    fn board_with(size: u8, stacks: &[(Pos, &[Piece])]) -> Board {
        let mut board = Board::new(size).unwrap();
        for (pos, pieces) in stacks {
            board.stack_mut(*pos).extend(pieces);
        }
        board
    }

    const W: Piece = Piece::flat(Color::White);
    const B: Piece = Piece::flat(Color::Black);
    const WS: Piece = Piece::new(Color::White, PieceKind::Standing);
    const BS: Piece = Piece::new(Color::Black, PieceKind::Standing);
    const WC: Piece = Piece::new(Color::White, PieceKind::Capstone);
    const BC: Piece = Piece::new(Color::Black, PieceKind::Capstone);

    fn full(size: u8) -> Reserves {
        Reserves::full(crate::reserve::default_allotment(size).unwrap())
    }

    #[test]
    fn test_place_empty_cell() {
        let board = Board::new(5).unwrap();
        let mv = Move::place(Pos::new(2, 2), PieceKind::Capstone);
        assert_eq!(validate(&board, Phase::Playing, Color::White, &full(5), &mv), Ok(()));
    }

    #[test]
    fn test_place_occupied() {
        let board = board_with(5, &[(Pos::new(2, 2), &[B])]);
        let mv = Move::place(Pos::new(2, 2), PieceKind::Flat);
        assert_eq!(
            validate(&board, Phase::Playing, Color::White, &full(5), &mv),
            Err(Rejection::OccupiedTarget)
        );
    }

    #[test]
    fn test_place_out_of_bounds() {
        let board = Board::new(3).unwrap();
        let mv = Move::place(Pos::new(0, 3), PieceKind::Flat);
        assert_eq!(
            validate(&board, Phase::Playing, Color::White, &full(3), &mv),
            Err(Rejection::OutOfBounds)
        );
    }

    #[test]
    fn test_opening_flat_only() {
        let board = Board::new(5).unwrap();
        for kind in [PieceKind::Standing, PieceKind::Capstone] {
            let mv = Move::place(Pos::new(0, 0), kind);
            assert_eq!(
                validate(&board, Phase::Opening, Color::White, &full(5), &mv),
                Err(Rejection::WrongPhase)
            );
        }
    }

    #[test]
    fn test_opening_draws_on_opponent_reserve() {
        let board = Board::new(4).unwrap();
        let mut reserves = full(4);
        reserves.black = Stock::new(0, 0);
        let mv = Move::place(Pos::new(0, 0), PieceKind::Flat);
        // White's opening stone comes from black's pool.
        assert_eq!(
            validate(&board, Phase::Opening, Color::White, &reserves, &mv),
            Err(Rejection::InsufficientReserve)
        );
        assert_eq!(validate(&board, Phase::Opening, Color::Black, &reserves, &mv), Ok(()));
        assert_eq!(placement_color(Phase::Opening, Color::White), Color::Black);
    }

    #[test]
    fn test_no_capstone_on_small_boards() {
        let board = Board::new(4).unwrap();
        let mv = Move::place(Pos::new(1, 1), PieceKind::Capstone);
        assert_eq!(
            validate(&board, Phase::Playing, Color::White, &full(4), &mv),
            Err(Rejection::InsufficientReserve)
        );
    }

    #[test]
    fn test_wall_uses_stone_pool() {
        let board = Board::new(5).unwrap();
        let mut reserves = full(5);
        reserves.white = Stock::new(0, 1);
        let wall = Move::place(Pos::new(1, 1), PieceKind::Standing);
        let cap = Move::place(Pos::new(1, 1), PieceKind::Capstone);
        assert_eq!(
            validate(&board, Phase::Playing, Color::White, &reserves, &wall),
            Err(Rejection::InsufficientReserve)
        );
        assert_eq!(validate(&board, Phase::Playing, Color::White, &reserves, &cap), Ok(()));
    }

    #[test]
    fn test_no_moves_when_over() {
        let board = Board::new(3).unwrap();
        let mv = Move::place(Pos::new(0, 0), PieceKind::Flat);
        assert_eq!(
            validate(&board, Phase::Over, Color::White, &full(3), &mv),
            Err(Rejection::WrongPhase)
        );
    }

    #[test]
    fn test_spread_not_in_opening() {
        let board = board_with(5, &[(Pos::new(0, 0), &[W])]);
        let mv = Move::spread(Pos::new(0, 0), Direction::East, vec![1]);
        assert_eq!(
            validate(&board, Phase::Opening, Color::White, &full(5), &mv),
            Err(Rejection::WrongPhase)
        );
    }

    #[test]
    fn test_spread_not_your_stack() {
        let board = board_with(5, &[(Pos::new(0, 0), &[W, B])]);
        let mv = Move::spread(Pos::new(0, 0), Direction::East, vec![1]);
        assert_eq!(
            validate(&board, Phase::Playing, Color::White, &full(5), &mv),
            Err(Rejection::NotYourStack)
        );
        let empty = Move::spread(Pos::new(3, 3), Direction::East, vec![1]);
        assert_eq!(
            validate(&board, Phase::Playing, Color::White, &full(5), &empty),
            Err(Rejection::NotYourStack)
        );
    }

    #[test]
    fn test_spread_malformed_drops() {
        let board = board_with(5, &[(Pos::new(0, 0), &[W, W])]);
        for drops in [vec![], vec![0], vec![1, 0]] {
            let mv = Move::spread(Pos::new(0, 0), Direction::East, drops);
            assert_eq!(
                validate(&board, Phase::Playing, Color::White, &full(5), &mv),
                Err(Rejection::MalformedDrops)
            );
        }
    }

    #[test]
    fn test_carry_limit() {
        // Height 5 on a 4x4 board: at most 4 may be lifted.
        let board = board_with(4, &[(Pos::new(0, 0), &[B, W, B, W, W])]);
        let four = Move::spread(Pos::new(0, 0), Direction::East, vec![1, 1, 2]);
        let five = Move::spread(Pos::new(0, 0), Direction::East, vec![1, 1, 3]);
        assert_eq!(validate(&board, Phase::Playing, Color::White, &full(4), &four), Ok(()));
        assert_eq!(
            validate(&board, Phase::Playing, Color::White, &full(4), &five),
            Err(Rejection::ExceedsCarryLimit)
        );
    }

    #[test]
    fn test_cannot_lift_more_than_height() {
        let board = board_with(5, &[(Pos::new(0, 0), &[W, W])]);
        let mv = Move::spread(Pos::new(0, 0), Direction::East, vec![3]);
        assert_eq!(
            validate(&board, Phase::Playing, Color::White, &full(5), &mv),
            Err(Rejection::ExceedsCarryLimit)
        );
    }

    #[test]
    fn test_spread_off_board() {
        let board = board_with(3, &[(Pos::new(0, 1), &[W, W])]);
        let mv = Move::spread(Pos::new(0, 1), Direction::East, vec![1, 1]);
        assert_eq!(
            validate(&board, Phase::Playing, Color::White, &full(3), &mv),
            Err(Rejection::OutOfBounds)
        );
    }

    #[test]
    fn test_spread_onto_flats_and_empty() {
        let board = board_with(5, &[(Pos::new(0, 0), &[W, W, W]), (Pos::new(0, 1), &[B])]);
        let mv = Move::spread(Pos::new(0, 0), Direction::East, vec![1, 1, 1]);
        assert_eq!(validate(&board, Phase::Playing, Color::White, &full(5), &mv), Ok(()));
    }

    #[test]
    fn test_wall_blocks_flat_spread() {
        let board = board_with(5, &[(Pos::new(0, 0), &[W]), (Pos::new(0, 1), &[BS])]);
        let mv = Move::spread(Pos::new(0, 0), Direction::East, vec![1]);
        assert_eq!(
            validate(&board, Phase::Playing, Color::White, &full(5), &mv),
            Err(Rejection::IllegalLanding)
        );
    }

    #[test]
    fn test_capstone_flattens_wall_alone_and_last() {
        let board = board_with(
            5,
            &[(Pos::new(0, 0), &[W, WC]), (Pos::new(0, 1), &[BS]), (Pos::new(0, 2), &[WS])],
        );
        let alone = Move::spread(Pos::new(0, 0), Direction::East, vec![1]);
        assert_eq!(validate(&board, Phase::Playing, Color::White, &full(5), &alone), Ok(()));

        // Two pieces landing on the wall at once.
        let together = Move::spread(Pos::new(0, 0), Direction::East, vec![2]);
        assert_eq!(
            validate(&board, Phase::Playing, Color::White, &full(5), &together),
            Err(Rejection::IllegalLanding)
        );
    }

    #[test]
    fn test_capstone_cannot_pass_through_wall() {
        let board = board_with(5, &[(Pos::new(0, 0), &[W, WC]), (Pos::new(0, 1), &[BS])]);
        let mv = Move::spread(Pos::new(0, 0), Direction::East, vec![1, 1]);
        assert_eq!(
            validate(&board, Phase::Playing, Color::White, &full(5), &mv),
            Err(Rejection::IllegalLanding)
        );
    }

    #[test]
    fn test_spread_flattens_after_earlier_drops() {
        let board = board_with(5, &[(Pos::new(0, 0), &[W, W, WC]), (Pos::new(0, 2), &[BS])]);
        let mv = Move::spread(Pos::new(0, 0), Direction::East, vec![2, 1]);
        assert_eq!(validate(&board, Phase::Playing, Color::White, &full(5), &mv), Ok(()));
    }

    #[test]
    fn test_nothing_lands_on_capstone() {
        let board = board_with(5, &[(Pos::new(0, 0), &[WC]), (Pos::new(0, 1), &[BC])]);
        let mv = Move::spread(Pos::new(0, 0), Direction::East, vec![1]);
        assert_eq!(
            validate(&board, Phase::Playing, Color::White, &full(5), &mv),
            Err(Rejection::IllegalLanding)
        );
    }
}
