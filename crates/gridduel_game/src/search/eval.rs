//! Static board evaluation.

use crate::rules::lines::LineSet;
use crate::types::{Board, GameConfig, Player, Square};
use tracing::instrument;

/// Bonus for holding a center square.
pub const CENTER_BONUS: i64 = 3;

/// Weight of a line holding `marks` of one player and none of the other.
///
/// Grows as a power of ten: 1, 10, 100, ...
pub fn line_weight(marks: usize) -> i64 {
    match marks {
        0 => 0,
        n => 10i64.saturating_pow(n as u32 - 1),
    }
}

/// Center squares: one on odd boards, the middle four on even boards.
pub fn center_cells(size: usize) -> Vec<usize> {
    let mid = size / 2;
    if size % 2 == 1 {
        vec![mid * size + mid]
    } else {
        vec![
            (mid - 1) * size + mid - 1,
            (mid - 1) * size + mid,
            mid * size + mid - 1,
            mid * size + mid,
        ]
    }
}

/// Evaluates the board from `player`'s point of view.
///
/// Positive favors `player`, negative favors the opponent.
#[instrument(skip(board), fields(size = board.size()))]
pub fn evaluate_board(board: &Board, win_condition: usize, player: Player) -> i64 {
    match GameConfig::new(board.size(), win_condition) {
        Ok(config) => evaluate(board.squares(), &LineSet::cached(config), player),
        Err(_) => 0,
    }
}

pub(crate) fn evaluate(squares: &[Square], lines: &LineSet, player: Player) -> i64 {
    let mut score = 0;

    for line in lines.lines() {
        let mut own = 0;
        let mut opp = 0;
        for &i in line {
            match squares[i] {
                Square::Occupied(p) if p == player => own += 1,
                Square::Occupied(_) => opp += 1,
                Square::Empty => {}
            }
        }
        // Lines holding both marks can't be completed by anyone
        if own > 0 && opp > 0 {
            continue;
        }
        score += line_weight(own);
        score -= line_weight(opp);
    }

    for cell in center_cells(lines.config().grid_size()) {
        match squares[cell] {
            Square::Occupied(p) if p == player => score += CENTER_BONUS,
            Square::Occupied(_) => score -= CENTER_BONUS,
            Square::Empty => {}
        }
    }

    score
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_weights_are_powers_of_ten() {
        assert_eq!(line_weight(0), 0);
        assert_eq!(line_weight(1), 1);
        assert_eq!(line_weight(2), 10);
        assert_eq!(line_weight(4), 1000);
    }

    #[test]
    fn test_center_cells() {
        assert_eq!(center_cells(3), vec![4]);
        assert_eq!(center_cells(4), vec![5, 6, 9, 10]);
        assert_eq!(center_cells(5), vec![12]);
    }

    #[test]
    fn test_evaluate_empty_board() {
        assert_eq!(evaluate_board(&Board::new(5), 4, Player::X), 0);
    }

    #[test]
    fn test_evaluate_is_antisymmetric() {
        let mut board = Board::new(4);
        board.place(0, Player::X);
        board.place(1, Player::X);
        board.place(10, Player::O);
        let x = evaluate_board(&board, 3, Player::X);
        let o = evaluate_board(&board, 3, Player::O);
        assert_eq!(x, -o);
        assert!(x > 0, "two in a row should outweigh one center mark");
    }

    #[test]
    fn test_center_is_worth_more_than_corner() {
        let mut center = Board::new(3);
        center.place(4, Player::X);
        let mut corner = Board::new(3);
        corner.place(0, Player::X);
        assert!(evaluate_board(&center, 3, Player::X) > evaluate_board(&corner, 3, Player::X));
    }
}
