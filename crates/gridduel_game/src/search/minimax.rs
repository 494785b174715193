//! Depth- and deadline-bounded minimax with alpha-beta pruning.

use super::eval::evaluate;
use crate::rules::draw::forced_draw;
use crate::rules::lines::LineSet;
use crate::rules::win::completes_line;
use crate::types::{Player, Square};
use std::time::Instant;

/// Score of a decided game before the depth adjustment.
pub(crate) const WIN_SCORE: i64 = 1_000_000_000_000;

const INF: i64 = i64::MAX;

/// One search over a fixed line table, maximizing for `ai`.
pub(crate) struct Searcher<'a> {
    lines: &'a LineSet,
    ai: Player,
    deadline: Option<Instant>,
    order: Vec<usize>,
    nodes: u64,
    truncated: bool,
}

impl<'a> Searcher<'a> {
    pub(crate) fn new(lines: &'a LineSet, ai: Player, deadline: Option<Instant>) -> Self {
        // Cells on more lines first: better cutoffs.
        let mut order: Vec<usize> = (0..lines.config().cell_count()).collect();
        order.sort_by_key(|&cell| std::cmp::Reverse(lines.through(cell).len()));
        Self {
            lines,
            ai,
            deadline,
            order,
            nodes: 0,
            truncated: false,
        }
    }

    pub(crate) fn nodes(&self) -> u64 {
        self.nodes
    }

    pub(crate) fn truncated(&self) -> bool {
        self.truncated
    }

    /// Scores each root move with a full window so ties are real ties.
    pub(crate) fn score_root(
        &mut self,
        squares: &mut [Square],
        moves: &[usize],
        depth: u32,
    ) -> Vec<(usize, i64)> {
        let mut scored = Vec::with_capacity(moves.len());
        for &cell in moves {
            squares[cell] = Square::Occupied(self.ai);
            let score = self.minimax(squares, cell, depth.saturating_sub(1), -INF, INF, false);
            squares[cell] = Square::Empty;
            scored.push((cell, score));
        }
        scored
    }

    /// Scores the position after a move at `last`.
    ///
    /// `maximizing` is true when `ai` is the side to move now.
    fn minimax(
        &mut self,
        squares: &mut [Square],
        last: usize,
        depth: u32,
        mut alpha: i64,
        mut beta: i64,
        maximizing: bool,
    ) -> i64 {
        self.nodes += 1;

        let mover = if maximizing { self.ai.opponent() } else { self.ai };
        if completes_line(squares, self.lines, last, mover) {
            // Faster wins and slower losses score better.
            return if mover == self.ai {
                WIN_SCORE + depth as i64
            } else {
                -WIN_SCORE - depth as i64
            };
        }

        let to_move = mover.opponent();
        if forced_draw(squares, self.lines, to_move) {
            return 0;
        }

        if depth == 0 || self.out_of_time() {
            return evaluate(squares, self.lines, self.ai);
        }

        let mut best = if maximizing { -INF } else { INF };
        for i in 0..self.order.len() {
            let cell = self.order[i];
            if !squares[cell].is_empty() {
                continue;
            }
            squares[cell] = Square::Occupied(to_move);
            let score = self.minimax(squares, cell, depth - 1, alpha, beta, !maximizing);
            squares[cell] = Square::Empty;

            if maximizing {
                best = best.max(score);
                alpha = alpha.max(score);
            } else {
                best = best.min(score);
                beta = beta.min(score);
            }
            if beta <= alpha {
                break;
            }
        }
        best
    }

    fn out_of_time(&mut self) -> bool {
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                self.truncated = true;
                true
            }
            _ => false,
        }
    }
}
