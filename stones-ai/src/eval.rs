//! Static evaluation of non-terminal positions.

use stones_core::{count_legal_moves, road_distance, Board, Color, Phase};

use crate::config::EvalWeights;
use crate::node::Node;

/// Score `node` for the side to move. Positive favors the mover.
pub fn evaluate(node: &Node, weights: &EvalWeights) -> i32 {
    let me = node.to_move;
    let them = me.opponent();
    let board = &node.board;

    let mut score = 0;

    let (my_dist, their_dist) = (road_distance(board, me), road_distance(board, them));
    score += weights.road * (road_reach(board, my_dist) - road_reach(board, their_dist));
    if my_dist == Some(1) {
        score += weights.threat;
    }
    if their_dist == Some(1) {
        score -= weights.threat;
    }

    score += weights.flats * (board.flat_count(me) as i32 - board.flat_count(them) as i32);

    if weights.mobility != 0 {
        let phase = node.phase();
        let mine = count_legal_moves(board, phase, me, &node.reserves) as i32;
        let theirs = count_legal_moves(board, Phase::for_turn(node.turn + 1), them, &node.reserves) as i32;
        score += weights.mobility * (mine - theirs);
    }

    score += weights.center * (centrality(board, me) - centrality(board, them));
    score
}

/// `size - distance`, or zero when every road is blocked.
fn road_reach(board: &Board, distance: Option<u32>) -> i32 {
    match distance {
        Some(d) => (board.size() as i32 - d as i32).max(0),
        None => 0,
    }
}

/// Sum of how close `color`'s stacks sit to the middle, in half-cells.
fn centrality(board: &Board, color: Color) -> i32 {
    let span = board.size() as i32 - 1;
    board
        .stacks()
        .filter(|(_, stack)| stack.controller() == Some(color))
        .map(|(pos, _)| {
            let off = (2 * pos.row as i32 - span).abs() + (2 * pos.col as i32 - span).abs();
            2 * span - off
        })
        .sum()
}
