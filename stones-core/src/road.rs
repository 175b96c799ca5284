//! Road detection.
//!
//! A road is a 4-connected chain of cells topped by one color's flats or
//! capstones joining two opposite edges. Walls never carry a road.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::board::{Board, Color, Direction, Pos};

/// Which pair of opposite edges a road joins.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    /// Row 0 to row N-1.
    NorthSouth,
    /// Column 0 to column N-1.
    WestEast,
}

impl Axis {
    pub const ALL: [Axis; 2] = [Axis::NorthSouth, Axis::WestEast];

    fn is_start(self, pos: Pos) -> bool {
        match self {
            Axis::NorthSouth => pos.row == 0,
            Axis::WestEast => pos.col == 0,
        }
    }

    fn is_goal(self, pos: Pos, size: u8) -> bool {
        match self {
            Axis::NorthSouth => pos.row == size - 1,
            Axis::WestEast => pos.col == size - 1,
        }
    }
}

/// A completed road: the cells of a shortest connecting path, edge to edge.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Road {
    pub color: Color,
    pub axis: Axis,
    pub cells: Vec<Pos>,
}

/// Whether a cell counts toward `color`'s road.
#[inline]
pub fn is_road_cell(board: &Board, pos: Pos, color: Color) -> bool {
    board
        .top(pos)
        .is_some_and(|p| p.color == color && p.kind.is_road())
}

/// Find a road for `color`, checking north-south first, then west-east.
pub fn find_road(board: &Board, color: Color) -> Option<Road> {
    Axis::ALL
        .into_iter()
        .find_map(|axis| road_along(board, color, axis).map(|cells| Road { color, axis, cells }))
}

#[inline]
pub fn has_road(board: &Board, color: Color) -> bool {
    find_road(board, color).is_some()
}

/// Breadth-first search from every start-edge road cell; returns the path
/// to the first goal-edge cell reached.
fn road_along(board: &Board, color: Color, axis: Axis) -> Option<Vec<Pos>> {
    let size = board.size();
    let cells = size as usize * size as usize;
    let mut parent: Vec<Option<Pos>> = vec![None; cells];
    let mut seen = vec![false; cells];
    let mut queue = VecDeque::new();

    for pos in board.positions().filter(|&p| axis.is_start(p)) {
        if is_road_cell(board, pos, color) {
            seen[pos.index(size)] = true;
            queue.push_back(pos);
        }
    }

    while let Some(pos) = queue.pop_front() {
        if axis.is_goal(pos, size) {
            let mut path = vec![pos];
            let mut cur = pos;
            while let Some(prev) = parent[cur.index(size)] {
                path.push(prev);
                cur = prev;
            }
            path.reverse();
            return Some(path);
        }
        for dir in Direction::ALL {
            let Some(next) = board.step(pos, dir) else {
                continue;
            };
            let idx = next.index(size);
            if !seen[idx] && is_road_cell(board, next, color) {
                seen[idx] = true;
                parent[idx] = Some(pos);
                queue.push_back(next);
            }
        }
    }
    None
}

/// Fewest additional placements `color` needs to complete a road, ignoring
/// the opponent's replies. Own road cells cost 0, empty cells 1, anything
/// else blocks. `None` when every path is blocked.
pub fn road_distance(board: &Board, color: Color) -> Option<u32> {
    Axis::ALL
        .into_iter()
        .filter_map(|axis| distance_along(board, color, axis))
        .min()
}

fn cell_cost(board: &Board, pos: Pos, color: Color) -> Option<u32> {
    match board.top(pos) {
        None => Some(1),
        Some(_) if is_road_cell(board, pos, color) => Some(0),
        Some(_) => None,
    }
}

/// 0-1 BFS: zero-cost cells go to the front of the deque.
fn distance_along(board: &Board, color: Color, axis: Axis) -> Option<u32> {
    let size = board.size();
    let mut dist = vec![u32::MAX; size as usize * size as usize];
    let mut deque = VecDeque::new();

    for pos in board.positions().filter(|&p| axis.is_start(p)) {
        if let Some(cost) = cell_cost(board, pos, color) {
            let idx = pos.index(size);
            if cost < dist[idx] {
                dist[idx] = cost;
                if cost == 0 {
                    deque.push_front(pos);
                } else {
                    deque.push_back(pos);
                }
            }
        }
    }

    let mut best = None;
    while let Some(pos) = deque.pop_front() {
        let here = dist[pos.index(size)];
        if axis.is_goal(pos, size) {
            best = Some(best.map_or(here, |b: u32| b.min(here)));
            continue;
        }
        for dir in Direction::ALL {
            let Some(next) = board.step(pos, dir) else {
                continue;
            };
            let Some(cost) = cell_cost(board, next, color) else {
                continue;
            };
            let idx = next.index(size);
            if here + cost < dist[idx] {
                dist[idx] = here + cost;
                if cost == 0 {
                    deque.push_front(next);
                } else {
                    deque.push_back(next);
                }
            }
        }
    }
    best
}
