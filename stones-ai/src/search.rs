//! Iterative-deepening negamax with alpha-beta pruning.
//!
//! Each iteration walks the tree with an explicit stack of frames rather than
//! recursion, making and unmaking moves on a single [`Node`]. Scores are from
//! the side to move's point of view; a win found `n` plies below the root
//! scores `WIN - n` so faster wins rank higher.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use stones_core::{Decision, GameState, Move, PieceKind, Undo};
use tracing::{trace, warn};

use crate::config::{EvalWeights, SearchProfile};
use crate::eval::evaluate;
use crate::node::Node;
use crate::stats::SearchStats;

/// Score of a won position at the root.
pub const WIN: i32 = 1_000_000;
/// Anything beyond this is a forced result rather than a heuristic.
const WIN_BAND: i32 = WIN - 1_000;
const INF: i32 = WIN + 1;

/// How often the deadline is consulted, in nodes.
const CLOCK_INTERVAL: u64 = 256;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Bound {
    Exact,
    Lower,
    Upper,
}

#[derive(Clone, Debug)]
struct Entry {
    depth: u8,
    score: i32,
    bound: Bound,
    best: Option<Move>,
}

/// Stack frame for the iterative search.
struct Frame {
    /// Transposition key of this position
    key: u64,
    /// Move that led here and how to take it back (None for the root)
    undo: Option<(Move, Undo)>,
    /// Moves to explore, best guesses first
    moves: Vec<Move>,
    move_idx: usize,
    /// Remaining depth
    depth: u8,
    alpha: i32,
    beta: i32,
    alpha_orig: i32,
    best_score: i32,
    best_move: Option<Move>,
}

impl Frame {
    /// Next move to explore, or None once exhausted or cut off.
    #[inline]
    fn next_move(&mut self) -> Option<Move> {
        if self.alpha >= self.beta {
            return None;
        }
        let mv = self.moves.get(self.move_idx)?.clone();
        self.move_idx += 1;
        Some(mv)
    }
}

/// Root move scores from one iteration.
struct Iteration {
    scores: Vec<(Move, i32)>,
    complete: bool,
}

/// What a search produced.
#[derive(Clone, Debug)]
pub struct SearchOutcome {
    /// The chosen move; None when the game is over or nothing is legal.
    pub mv: Option<Move>,
    /// Score of the chosen move for the side to move.
    pub score: i32,
    pub stats: SearchStats,
}

impl SearchOutcome {
    fn none(stats: SearchStats) -> SearchOutcome {
        SearchOutcome {
            mv: None,
            score: 0,
            stats,
        }
    }

    /// True when the score is a forced win rather than a heuristic.
    pub fn is_forced_win(&self) -> bool {
        self.score > WIN_BAND
    }
}

/// One move decision. The transposition table lives as long as the searcher.
pub struct Searcher<'a> {
    profile: &'a SearchProfile,
    weights: &'a EvalWeights,
    table: HashMap<u64, Entry>,
    stats: SearchStats,
    deadline: Option<Instant>,
}

/// The search's choice if `state` accepts it, else the first generated
/// candidate that it does accept (scored 0).
fn accepted(state: &GameState, choice: Option<(Move, i32)>, candidates: Vec<Move>) -> Option<(Move, i32)> {
    if let Some((mv, score)) = choice {
        match state.validate(&mv) {
            Ok(()) => return Some((mv, score)),
            Err(reason) => warn!(%mv, %reason, "search chose a rejected move, falling back"),
        }
    }
    candidates
        .into_iter()
        .find(|mv| state.validate(mv).is_ok())
        .map(|mv| (mv, 0))
}

impl<'a> Searcher<'a> {
    pub fn new(profile: &'a SearchProfile, weights: &'a EvalWeights) -> Self {
        Self {
            profile,
            weights,
            table: HashMap::new(),
            stats: SearchStats::default(),
            deadline: None,
        }
    }

    /// Pick a move for the side to move in `state`.
    ///
    /// Never returns a move that `state` would reject.
    pub fn search(&mut self, state: &GameState) -> SearchOutcome {
        let start = Instant::now();
        self.stats = SearchStats::default();
        self.deadline = self.profile.time_limit_ms.map(|ms| start + Duration::from_millis(ms));

        if state.is_over() {
            return SearchOutcome::none(self.stats.clone());
        }
        let mut node = Node::from_state(state);
        let legal = node.legal_moves();
        if legal.is_empty() {
            return SearchOutcome::none(self.stats.clone());
        }

        let full_window = self.profile.noise > 0;
        let mut best: Option<Vec<(Move, i32)>> = None;
        for depth in 1..=self.profile.max_depth.max(1) {
            let iteration = self.iterate(&mut node, depth, full_window);
            if !iteration.complete {
                // A partial first iteration still beats a blind pick.
                if best.is_none() && !iteration.scores.is_empty() {
                    best = Some(iteration.scores);
                }
                break;
            }
            self.stats.depth_reached = depth;
            let decided = iteration
                .scores
                .iter()
                .map(|&(_, s)| s)
                .max()
                .is_some_and(|s| s.abs() > WIN_BAND);
            best = Some(iteration.scores);
            if decided {
                break;
            }
        }

        let choice = best.and_then(|scores| self.choose(&scores, state.turn()));
        let Some((mv, score)) = accepted(state, choice, legal) else {
            return SearchOutcome::none(self.finish(start));
        };

        SearchOutcome {
            mv: Some(mv),
            score,
            stats: self.finish(start),
        }
    }

    fn finish(&mut self, start: Instant) -> SearchStats {
        self.stats.elapsed = start.elapsed();
        self.stats.clone()
    }

    /// Best root move, or a weighted random one within the noise margin.
    fn choose(&self, scores: &[(Move, i32)], turn: u32) -> Option<(Move, i32)> {
        let (best_move, best) = scores
            .iter()
            .fold(None::<&(Move, i32)>, |acc, entry| match acc {
                Some(prev) if prev.1 >= entry.1 => Some(prev),
                _ => Some(entry),
            })?
            .clone();

        let noise = self.profile.noise;
        if noise <= 0 || best.abs() > WIN_BAND {
            return Some((best_move, best));
        }

        let candidates: Vec<(&Move, i32, u64)> = scores
            .iter()
            .filter(|(_, s)| *s >= best - noise)
            .map(|(mv, s)| (mv, *s, (noise - (best - s) + 1) as u64))
            .collect();
        let total: u64 = candidates.iter().map(|c| c.2).sum();

        let mut rng = match self.profile.seed {
            Some(seed) => StdRng::seed_from_u64(seed ^ u64::from(turn)),
            None => StdRng::from_os_rng(),
        };
        let mut pick = rng.random_range(0..total);
        for (mv, score, weight) in candidates {
            if pick < weight {
                return Some((mv.clone(), score));
            }
            pick -= weight;
        }
        Some((best_move, best))
    }

    #[inline]
    fn out_of_budget(&self) -> bool {
        if self.stats.nodes >= self.profile.node_budget {
            return true;
        }
        match self.deadline {
            Some(deadline) if self.stats.nodes % CLOCK_INTERVAL == 0 => Instant::now() >= deadline,
            _ => false,
        }
    }

    /// One fixed-depth pass. With `full_window` the root never raises alpha,
    /// so every root move gets an exact score.
    fn iterate(&mut self, node: &mut Node, depth: u8, full_window: bool) -> Iteration {
        let root = self.frame(node, None, depth, -INF, INF);
        let mut stack = vec![root];
        let mut scores = Vec::new();

        loop {
            let ply = stack.len() as i32 - 1;
            let at_root = stack.len() == 1;
            let raise_alpha = !(at_root && full_window);
            let top = stack.last_mut().expect("stack holds the root until it returns");

            let Some(mv) = top.next_move() else {
                let frame = stack.pop().expect("frame present");
                self.store(&frame, ply);
                let Some((mv, undo)) = frame.undo else {
                    return Iteration {
                        scores,
                        complete: true,
                    };
                };
                node.unmake(&mv, undo);
                let score = -frame.best_score;
                if stack.len() == 1 {
                    scores.push((mv.clone(), score));
                }
                let raise = !(stack.len() == 1 && full_window);
                let parent = stack.last_mut().expect("child frames have a parent");
                self.update(parent, mv, score, raise);
                continue;
            };

            if self.out_of_budget() {
                while let Some(frame) = stack.pop() {
                    if let Some((mv, undo)) = frame.undo {
                        node.unmake(&mv, undo);
                    }
                }
                self.stats.aborted = true;
                return Iteration {
                    scores,
                    complete: false,
                };
            }

            let child_depth = top.depth - 1;
            let (child_alpha, child_beta) = (-top.beta, -top.alpha);
            let undo = node.make(&mv);
            self.stats.nodes += 1;

            let known = if let Some(decision) = node.outcome() {
                self.stats.terminals += 1;
                Some(terminal_score(&decision, node, ply + 1))
            } else if child_depth == 0 {
                Some(evaluate(node, self.weights))
            } else {
                self.probe(node.key(), child_depth, child_alpha, child_beta, ply + 1)
            };

            let known = match known {
                Some(score) => Some(score),
                None => {
                    let child = self.frame(node, None, child_depth, child_alpha, child_beta);
                    if child.moves.is_empty() {
                        Some(evaluate(node, self.weights))
                    } else {
                        stack.push(Frame {
                            undo: Some((mv.clone(), undo)),
                            ..child
                        });
                        None
                    }
                }
            };

            if let Some(score) = known {
                node.unmake(&mv, undo);
                if at_root {
                    scores.push((mv.clone(), -score));
                }
                let top = stack.last_mut().expect("frame present");
                self.update(top, mv, -score, raise_alpha);
            }
        }
    }

    fn update(&mut self, frame: &mut Frame, mv: Move, score: i32, raise_alpha: bool) {
        if score > frame.best_score {
            frame.best_score = score;
            frame.best_move = Some(mv);
        }
        if raise_alpha && score > frame.alpha {
            frame.alpha = score;
            if frame.alpha >= frame.beta {
                self.stats.cutoffs += 1;
            }
        }
    }

    fn frame(
        &mut self,
        node: &mut Node,
        undo: Option<(Move, Undo)>,
        depth: u8,
        alpha: i32,
        beta: i32,
    ) -> Frame {
        let key = node.key();
        let moves = self.order_moves(node, key, depth);
        Frame {
            key,
            undo,
            moves,
            move_idx: 0,
            depth,
            alpha,
            beta,
            alpha_orig: alpha,
            best_score: -INF,
            best_move: None,
        }
    }

    /// Table move first, then capstones, flats, spreads and walls.
    ///
    /// Above the horizon, every move is tried once to spot immediate results:
    /// a win is the only move worth searching, and moves that hand the
    /// opponent a road go last.
    fn order_moves(&mut self, node: &mut Node, key: u64, depth: u8) -> Vec<Move> {
        let mover = node.to_move;
        let mut moves = node.legal_moves();
        let mut losing = Vec::new();

        if depth >= 2 {
            let mut quiet = Vec::with_capacity(moves.len());
            for mv in moves {
                let undo = node.make(&mv);
                let winner = node.outcome().and_then(|d| d.result.winner());
                node.unmake(&mv, undo);
                match winner {
                    Some(color) if color == mover => {
                        trace!(%mv, "immediate win");
                        return vec![mv];
                    }
                    Some(_) => losing.push(mv),
                    None => quiet.push(mv),
                }
            }
            moves = quiet;
        }

        let tt_move = self.table.get(&key).and_then(|e| e.best.clone());
        moves.sort_by_key(|mv| (Some(mv) != tt_move.as_ref(), static_rank(mv)));
        moves.extend(losing);
        moves
    }

    fn probe(&mut self, key: u64, depth: u8, alpha: i32, beta: i32, ply: i32) -> Option<i32> {
        let entry = self.table.get(&key)?;
        if entry.depth < depth {
            return None;
        }
        let score = from_table(entry.score, ply);
        let usable = match entry.bound {
            Bound::Exact => true,
            Bound::Lower => score >= beta,
            Bound::Upper => score <= alpha,
        };
        if usable {
            self.stats.tt_hits += 1;
            Some(score)
        } else {
            None
        }
    }

    fn store(&mut self, frame: &Frame, ply: i32) {
        let bound = if frame.best_score <= frame.alpha_orig {
            Bound::Upper
        } else if frame.best_score >= frame.beta {
            Bound::Lower
        } else {
            Bound::Exact
        };
        let entry = Entry {
            depth: frame.depth,
            score: to_table(frame.best_score, ply),
            bound,
            best: frame.best_move.clone(),
        };
        match self.table.get(&frame.key) {
            Some(old) if old.depth > entry.depth => {}
            _ => {
                self.table.insert(frame.key, entry);
            }
        }
    }
}

fn static_rank(mv: &Move) -> u8 {
    match mv {
        Move::Place {
            kind: PieceKind::Capstone,
            ..
        } => 0,
        Move::Place {
            kind: PieceKind::Flat,
            ..
        } => 1,
        Move::Spread { .. } => 2,
        Move::Place {
            kind: PieceKind::Standing,
            ..
        } => 3,
    }
}

/// Score of a finished position for its side to move, `ply` moves below the root.
fn terminal_score(decision: &Decision, node: &Node, ply: i32) -> i32 {
    match decision.result.winner() {
        Some(color) if color == node.to_move => WIN - ply,
        Some(_) => -(WIN - ply),
        None => 0,
    }
}

/// Forced scores are stored relative to the position, not the root.
fn to_table(score: i32, ply: i32) -> i32 {
    if score > WIN_BAND {
        score + ply
    } else if score < -WIN_BAND {
        score - ply
    } else {
        score
    }
}

fn from_table(score: i32, ply: i32) -> i32 {
    if score > WIN_BAND {
        score - ply
    } else if score < -WIN_BAND {
        score + ply
    } else {
        score
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stones_core::{AllotmentTable, Color, GameResult, Pos, WinReason};

    fn state(tps: &str) -> GameState {
        GameState::from_tps(tps, &AllotmentTable::default()).unwrap()
    }

    fn profile(max_depth: u8, noise: i32) -> SearchProfile {
        SearchProfile::new(max_depth, 20_000, noise).with_seed(3)
    }

    #[test]
    fn test_takes_immediate_road() {
        let weights = EvalWeights::default();
        for depth in 1..=3 {
            let profile = profile(depth, 0);
            let mut game = state("x5/x5/x5/2,2,2,x2/1,1,1,1,x 1 5");
            let outcome = Searcher::new(&profile, &weights).search(&game);
            let mv = outcome.mv.clone().unwrap();
            assert_eq!(mv.origin(), Pos::new(0, 4), "depth {depth}: {mv}");
            assert!(outcome.is_forced_win());
            let transition = game.apply(mv).unwrap();
            assert_eq!(transition.decision.unwrap().reason, WinReason::Road);
            assert_eq!(game.result(), Some(GameResult::WhiteWins));
        }
    }

    #[test]
    fn test_rejected_choice_falls_back_to_first_valid_candidate() {
        // Opening: a capstone or an occupied cell is refused, a1 is not.
        let mut game = GameState::new(5).unwrap();
        game.apply(Move::place(Pos::new(2, 2), PieceKind::Flat)).unwrap();
        let candidates = vec![
            Move::place(Pos::new(2, 2), PieceKind::Flat),
            Move::place(Pos::new(1, 1), PieceKind::Capstone),
            Move::place(Pos::new(0, 0), PieceKind::Flat),
            Move::place(Pos::new(4, 4), PieceKind::Flat),
        ];

        let bad = Some((Move::place(Pos::new(2, 2), PieceKind::Flat), 500));
        assert_eq!(
            accepted(&game, bad, candidates.clone()),
            Some((Move::place(Pos::new(0, 0), PieceKind::Flat), 0))
        );
        assert_eq!(
            accepted(&game, None, candidates.clone()),
            Some((Move::place(Pos::new(0, 0), PieceKind::Flat), 0))
        );

        let good = Some((Move::place(Pos::new(4, 4), PieceKind::Flat), 7));
        assert_eq!(accepted(&game, good.clone(), candidates), good);
        assert_eq!(accepted(&game, None, vec![Move::place(Pos::new(9, 9), PieceKind::Flat)]), None);
    }

    #[test]
    fn test_blocks_open_road() {
        let weights = EvalWeights::default();
        let profile = profile(2, 0);
        let mut game = state("2,2,2,2,x/x5/x5/x5/1,1,x3 1 5");
        let mv = Searcher::new(&profile, &weights).search(&game).mv.unwrap();
        game.apply(mv).unwrap();
        for reply in game.legal_moves() {
            let mut after = game.clone();
            after.apply(reply.clone()).unwrap();
            assert_ne!(after.result(), Some(GameResult::BlackWins), "{reply} wins for black");
        }
    }

    #[test]
    fn test_noise_is_seeded() {
        let weights = EvalWeights::default();
        let profile = profile(1, 200);
        let game = GameState::new(5).unwrap();
        let a = Searcher::new(&profile, &weights).search(&game).mv;
        let b = Searcher::new(&profile, &weights).search(&game).mv;
        assert!(a.is_some());
        assert_eq!(a, b);
    }

    #[test]
    fn test_tiny_budget_still_moves() {
        let weights = EvalWeights::default();
        let profile = SearchProfile::new(4, 3, 0);
        let game = GameState::new(6).unwrap();
        let outcome = Searcher::new(&profile, &weights).search(&game);
        assert!(outcome.stats.aborted);
        let mv = outcome.mv.unwrap();
        assert_eq!(game.validate(&mv), Ok(()));
    }

    #[test]
    fn test_nothing_when_over() {
        let weights = EvalWeights::default();
        let profile = profile(2, 0);
        let mut game = state("x5/x5/x5/2,2,2,x2/1,1,1,1,x 1 5");
        game.apply("e1".parse().unwrap()).unwrap();
        assert!(game.is_over());
        assert!(Searcher::new(&profile, &weights).search(&game).mv.is_none());

        let mut timed = state("x4/x4/x,2,x2/x,1,x2 1 2");
        assert!(timed.expire_time(Color::White));
        assert!(Searcher::new(&profile, &weights).search(&timed).mv.is_none());
    }

    #[test]
    fn test_table_scores_round_trip_relative_to_ply() {
        for score in [WIN - 7, -(WIN - 7), 42, 0] {
            assert_eq!(from_table(to_table(score, 3), 3), score);
        }
        assert_eq!(from_table(to_table(WIN - 5, 2), 4), WIN - 7);
    }
}
