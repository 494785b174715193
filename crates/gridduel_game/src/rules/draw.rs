//! Draw detection.

use super::lines::{Line, LineSet};
use crate::types::{Board, GameConfig, Player, Square};
use tracing::instrument;

/// Checks if the board is full (all squares occupied).
#[instrument(skip(board), fields(size = board.size()))]
pub fn is_full(board: &Board) -> bool {
    board.squares().iter().all(|s| !s.is_empty())
}

/// Checks whether nobody can win from here, even before the board fills up.
///
/// `next_player` moves first; turns alternate over the remaining empty
/// squares. A line stays live for a player only if the opponent has no mark
/// in it and the player still has enough turns left to fill its gaps.
#[instrument(skip(board), fields(size = board.size()))]
pub fn is_forced_draw(board: &Board, win_condition: usize, next_player: Player) -> bool {
    match GameConfig::new(board.size(), win_condition) {
        Ok(config) => forced_draw(board.squares(), &LineSet::cached(config), next_player),
        Err(_) => is_full(board),
    }
}

pub(crate) fn forced_draw(squares: &[Square], lines: &LineSet, next_player: Player) -> bool {
    let empty = squares.iter().filter(|s| s.is_empty()).count();
    let next_turns = empty.div_ceil(2);
    let other_turns = empty / 2;
    let other = next_player.opponent();
    !lines.lines().iter().any(|line| {
        completable(squares, line, next_player, next_turns)
            || completable(squares, line, other, other_turns)
    })
}

fn completable(squares: &[Square], line: &Line, player: Player, turns: usize) -> bool {
    let mut missing = 0;
    for &i in line {
        match squares[i] {
            Square::Empty => missing += 1,
            Square::Occupied(p) if p == player => {}
            Square::Occupied(_) => return false,
        }
    }
    missing <= turns
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::win::evaluate_terminal;

    fn parse(rows: &[&str]) -> Board {
        let size = rows.len();
        let mut board = Board::new(size);
        for (r, row) in rows.iter().enumerate() {
            for (c, ch) in row.chars().enumerate() {
                match ch {
                    'X' => board.place(r * size + c, Player::X),
                    'O' => board.place(r * size + c, Player::O),
                    _ => {}
                }
            }
        }
        board
    }

    #[test]
    fn test_empty_board_not_full() {
        assert!(!is_full(&Board::new(3)));
    }

    #[test]
    fn test_full_board() {
        let board = parse(&["XOX", "OXX", "OXO"]);
        assert!(is_full(&board));
        assert!(evaluate_terminal(&board, 3).is_none());
        assert!(is_forced_draw(&board, 3, Player::X));
    }

    #[test]
    fn test_blocked_board_is_forced_draw_before_filling() {
        // Every row, column and diagonal holds both marks; four cells remain.
        let board = parse(&["XXOO", "OOXX", "XO..", "OX.."]);
        assert!(!is_full(&board));
        assert_eq!(board.empty_indices().len(), 4);
        assert!(is_forced_draw(&board, 4, Player::X));
        assert!(is_forced_draw(&board, 4, Player::O));
    }

    #[test]
    fn test_open_line_is_not_forced_draw() {
        let board = Board::new(4);
        assert!(!is_forced_draw(&board, 4, Player::X));

        // O can still finish column 1 (cells 5, 9, 13) with three in a row.
        let board = parse(&["XXOO", "OOXX", "XOXO", "...."]);
        assert!(!is_forced_draw(&board, 3, Player::X));
    }

    #[test]
    fn test_turn_counting_matters() {
        // Only the top row is live, for X, and it needs two more marks
        // while X gets just one of the two remaining turns.
        let board = parse(&["X..", "OOX", "XXO"]);
        assert!(is_forced_draw(&board, 3, Player::O));
        assert!(is_forced_draw(&board, 3, Player::X));

        // One empty square finishes X's top row.
        let board = parse(&["XX.", "OOX", "XOO"]);
        assert!(!is_forced_draw(&board, 3, Player::X));
        // With O to move, X never gets that turn.
        assert!(is_forced_draw(&board, 3, Player::O));
    }
}
