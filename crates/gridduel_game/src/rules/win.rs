//! Win detection.

use super::lines::LineSet;
use crate::types::{Board, GameConfig, Player, Square};
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// A decided game: who won and with which line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Victory {
    /// The winning player.
    pub winner: Player,
    /// The completed line, in enumeration order.
    pub line: Vec<usize>,
}

/// Checks every winning combination on the board.
///
/// Returns the first completed line in enumeration order, or `None`.
#[instrument(skip(board), fields(size = board.size()))]
pub fn evaluate_terminal(board: &Board, win_condition: usize) -> Option<Victory> {
    let config = GameConfig::new(board.size(), win_condition).ok()?;
    let lines = LineSet::cached(config);
    first_completed(board.squares(), &lines)
}

pub(crate) fn first_completed(squares: &[Square], lines: &LineSet) -> Option<Victory> {
    lines.lines().iter().find_map(|line| {
        let player = line_owner(squares, line)?;
        Some(Victory {
            winner: player,
            line: line.clone(),
        })
    })
}

/// True if placing at `cell` (already on the board) completed a line for `player`.
pub(crate) fn completes_line(
    squares: &[Square],
    lines: &LineSet,
    cell: usize,
    player: Player,
) -> bool {
    lines.through(cell).iter().any(|&idx| {
        lines.lines()[idx]
            .iter()
            .all(|&i| squares[i] == Square::Occupied(player))
    })
}

fn line_owner(squares: &[Square], line: &[usize]) -> Option<Player> {
    let first = squares[*line.first()?].occupant()?;
    line.iter()
        .all(|&i| squares[i] == Square::Occupied(first))
        .then_some(first)
}
