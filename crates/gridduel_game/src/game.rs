//! Game state and the single move-application operation.

use crate::rules::draw::forced_draw;
use crate::rules::lines::LineSet;
use crate::rules::win::first_completed;
use crate::types::{Board, GameConfig, GameConfigError, GameStatus, Player, Square};
use derive_getters::Getters;
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::{debug, info, instrument};

/// Error that can occur when applying a move.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum MoveError {
    /// The game is not accepting moves.
    #[display("Game is not in progress ({})", _0)]
    GameNotActive(#[error(not(source))] GameStatus),

    /// The index is past the end of the board.
    #[display("Square {} is off the board", _0)]
    OutOfBounds(#[error(not(source))] usize),

    /// The square at the position is already occupied.
    #[display("Square {} is already occupied", _0)]
    SquareOccupied(#[error(not(source))] usize),

    /// It's not this player's turn.
    #[display("It's not {}'s turn", _0)]
    WrongPlayer(#[error(not(source))] Player),
}

/// A received [`GameState`] that no sequence of legal moves could produce.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum StateError {
    /// Board does not fit the configured grid.
    #[display("{}", _0)]
    Shape(GameConfigError),

    /// Players must alternate, so mark counts differ by at most one.
    #[display("X has {} marks and O has {}", x, o)]
    MarkCount {
        /// Marks placed by X.
        x: usize,
        /// Marks placed by O.
        o: usize,
    },

    /// The player to move already has the extra mark.
    #[display("It cannot be {}'s turn", _0)]
    TurnOrder(#[error(not(source))] Player),

    /// Winner and winning line disagree with the status.
    #[display("Status {} does not match winner {:?}", status, winner)]
    Outcome {
        /// Claimed status.
        status: GameStatus,
        /// Claimed winner.
        winner: Option<Player>,
    },

    /// The winning line is not a completed line on this board.
    #[display("Winning line {:?} is not complete", _0)]
    WinningLine(#[error(not(source))] Vec<usize>),

    /// A line is complete but the game was not settled as won.
    #[display("A line is complete but the game is {}", _0)]
    UnsettledWin(#[error(not(source))] GameStatus),
}

/// Complete state of one game.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    /// The board.
    board: Board,
    /// Player to move.
    current_player: Player,
    /// Lifecycle status.
    status: GameStatus,
    /// Winner, set only when `status` is `Won`.
    winner: Option<Player>,
    /// The completed line, set only when `status` is `Won`.
    winning_line: Option<Vec<usize>>,
    /// Board geometry.
    config: GameConfig,
}

/// Result of [`GameState::apply_move`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveOutcome {
    /// State after the move.
    pub state: GameState,
    /// Set when this move won the game; callers bump the score with it.
    pub winner_just_decided: Option<Player>,
}

impl GameState {
    /// Creates a fresh game that is ready for `starting_player`'s first move.
    #[instrument]
    pub fn new(config: GameConfig, starting_player: Player) -> Self {
        Self {
            board: Board::new(config.grid_size()),
            current_player: starting_player,
            status: GameStatus::Playing,
            winner: None,
            winning_line: None,
            config,
        }
    }

    /// Creates the pre-game placeholder shown before any room or match exists.
    #[instrument]
    pub fn idle(config: GameConfig) -> Self {
        Self {
            status: GameStatus::Idle,
            ..Self::new(config, Player::X)
        }
    }

    /// Returns true while moves are accepted.
    pub fn is_playing(&self) -> bool {
        self.status == GameStatus::Playing
    }

    /// Places `player` at `index` and settles the outcome.
    ///
    /// The move is shape-checked first: the game must be in progress, the
    /// square must exist and be empty, and `player` must be the one to move.
    /// After placement the game is won if any line is complete, drawn if the
    /// board is full or nobody can win any more, and otherwise passes to the
    /// other player.
    #[instrument(skip(self), fields(status = %self.status, to_move = %self.current_player))]
    pub fn apply_move(&self, index: usize, player: Player) -> Result<MoveOutcome, MoveError> {
        if self.status != GameStatus::Playing {
            return Err(MoveError::GameNotActive(self.status));
        }
        if index >= self.board.len() {
            return Err(MoveError::OutOfBounds(index));
        }
        if !self.board.is_empty(index) {
            return Err(MoveError::SquareOccupied(index));
        }
        if player != self.current_player {
            return Err(MoveError::WrongPlayer(player));
        }

        let mut next = self.clone();
        next.board.place(index, player);

        let lines = LineSet::cached(self.config);
        let squares = next.board.squares();
        if let Some(victory) = first_completed(squares, &lines) {
            info!(winner = %victory.winner, line = ?victory.line, "Game won");
            next.status = GameStatus::Won;
            next.winner = Some(victory.winner);
            next.winning_line = Some(victory.line);
            return Ok(MoveOutcome {
                state: next,
                winner_just_decided: Some(victory.winner),
            });
        }

        let following = player.opponent();
        if forced_draw(squares, &lines, following) {
            info!(empty = next.board.empty_indices().len(), "Game drawn");
            next.status = GameStatus::Drawn;
        } else {
            next.current_player = following;
        }
        debug!(status = %next.status, "Move applied");

        Ok(MoveOutcome {
            state: next,
            winner_just_decided: None,
        })
    }

    /// Who moved first in this game, recovered from the marks on the board.
    ///
    /// The starter has the extra mark while counts differ. With equal counts
    /// the starter is next to move, which for a finished game is the
    /// opponent of the last mover.
    pub fn starting_player(&self) -> Player {
        let x = self.board.count(Player::X);
        let o = self.board.count(Player::O);
        match x.cmp(&o) {
            Ordering::Greater => Player::X,
            Ordering::Less => Player::O,
            Ordering::Equal => match self.status {
                GameStatus::Won | GameStatus::Drawn => self.current_player.opponent(),
                GameStatus::Idle | GameStatus::Playing => self.current_player,
            },
        }
    }

    /// Checks the invariants of a state received from elsewhere.
    ///
    /// Board length must match the geometry, players must have alternated,
    /// a won game must name its winner and one of their completed lines, and
    /// any other status must carry neither and have no completed line.
    #[instrument(skip(self), fields(status = %self.status))]
    pub fn validate(&self) -> Result<(), StateError> {
        let expected = self.config.cell_count();
        if self.board.len() != expected {
            return Err(StateError::Shape(GameConfigError::BoardLength {
                expected,
                actual: self.board.len(),
            }));
        }

        let x = self.board.count(Player::X);
        let o = self.board.count(Player::O);
        if x.abs_diff(o) > 1 {
            return Err(StateError::MarkCount { x, o });
        }

        let lines = LineSet::cached(self.config);
        let completed = first_completed(self.board.squares(), &lines);
        match (self.status, self.winner, &self.winning_line) {
            (GameStatus::Won, Some(winner), Some(line)) => {
                let on_board = lines.lines().contains(line)
                    && line.iter().all(|&cell| self.board.get(cell) == Some(Square::Occupied(winner)));
                if !on_board {
                    return Err(StateError::WinningLine(line.clone()));
                }
            }
            (GameStatus::Won, winner, _) => {
                return Err(StateError::Outcome {
                    status: self.status,
                    winner,
                });
            }
            (status, None, None) => {
                if completed.is_some() {
                    return Err(StateError::UnsettledWin(status));
                }
                if status == GameStatus::Playing && x != o {
                    let behind = if x > o { Player::O } else { Player::X };
                    if self.current_player != behind {
                        return Err(StateError::TurnOrder(self.current_player));
                    }
                }
            }
            (status, winner, _) => return Err(StateError::Outcome { status, winner }),
        }
        Ok(())
    }
}

/// Running score across games in one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Score {
    /// Games won by X.
    pub x: u32,
    /// Games won by O.
    pub o: u32,
}

impl Score {
    /// Counts a win for `winner`.
    pub fn record(&mut self, winner: Player) {
        match winner {
            Player::X => self.x += 1,
            Player::O => self.o += 1,
        }
    }

    /// Wins for `player`.
    pub fn wins(&self, player: Player) -> u32 {
        match player {
            Player::X => self.x,
            Player::O => self.o,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::winning_combinations;

    fn play(state: GameState, moves: &[usize]) -> GameState {
        moves.iter().fold(state, |state, &index| {
            let player = *state.current_player();
            state.apply_move(index, player).unwrap().state
        })
    }

    #[test]
    fn test_legal_move_flips_player() {
        let state = GameState::new(GameConfig::CLASSIC, Player::X);
        let outcome = state.apply_move(4, Player::X).unwrap();
        assert_eq!(*outcome.state.current_player(), Player::O);
        assert_eq!(outcome.winner_just_decided, None);
        assert!(outcome.state.is_playing());
        // Original state is untouched.
        assert!(state.board().is_empty(4));
    }

    #[test]
    fn test_shape_checks() {
        let state = GameState::new(GameConfig::CLASSIC, Player::X);
        assert_eq!(state.apply_move(9, Player::X), Err(MoveError::OutOfBounds(9)));
        assert_eq!(state.apply_move(0, Player::O), Err(MoveError::WrongPlayer(Player::O)));
        let state = play(state, &[0]);
        assert_eq!(state.apply_move(0, Player::O), Err(MoveError::SquareOccupied(0)));
        let idle = GameState::idle(GameConfig::CLASSIC);
        assert_eq!(
            idle.apply_move(0, Player::X),
            Err(MoveError::GameNotActive(GameStatus::Idle))
        );
    }

    #[test]
    fn test_win_records_line_and_freezes_board() {
        let state = GameState::new(GameConfig::CLASSIC, Player::X);
        // X: 0, 1, 2 ; O: 3, 4
        let state = play(state, &[0, 3, 1, 4]);
        let outcome = state.apply_move(2, Player::X).unwrap();
        assert_eq!(outcome.winner_just_decided, Some(Player::X));
        let state = outcome.state;
        assert_eq!(*state.status(), GameStatus::Won);
        assert_eq!(*state.winner(), Some(Player::X));
        assert_eq!(state.winning_line().as_deref(), Some(&[0, 1, 2][..]));
        assert!(matches!(
            state.apply_move(5, Player::X),
            Err(MoveError::GameNotActive(GameStatus::Won))
        ));
    }

    #[test]
    fn test_forced_draw_ends_game_early() {
        // X O X / X O O / O X . : last square can't complete anything.
        let state = GameState::new(GameConfig::CLASSIC, Player::X);
        let state = play(state, &[0, 1, 2, 4, 3, 5, 7, 6]);
        assert_eq!(*state.status(), GameStatus::Drawn);
        assert_eq!(*state.winner(), None);
        assert!(state.board().is_empty(8));
    }

    #[test]
    fn test_score_records_wins() {
        let mut score = Score::default();
        score.record(Player::O);
        score.record(Player::O);
        score.record(Player::X);
        assert_eq!(score.wins(Player::O), 2);
        assert_eq!(score.wins(Player::X), 1);
    }

    #[test]
    fn test_state_round_trips_through_json() {
        let state = play(GameState::new(GameConfig::new(4, 4).unwrap(), Player::X), &[5]);
        let json = serde_json::to_string(&state).unwrap();
        let back: GameState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
        assert!(back.validate().is_ok());
    }

    fn permutations(cells: &[usize]) -> Vec<Vec<usize>> {
        if cells.len() <= 1 {
            return vec![cells.to_vec()];
        }
        let mut all = Vec::new();
        for (i, &first) in cells.iter().enumerate() {
            let mut rest = cells.to_vec();
            rest.remove(i);
            for mut tail in permutations(&rest) {
                tail.insert(0, first);
                all.push(tail);
            }
        }
        all
    }

    #[test]
    fn test_line_wins_in_any_order() {
        let config = GameConfig::new(5, 4).unwrap();
        let combos = winning_combinations(5, 4);
        // O's replies sit in the bottom row, away from every line below.
        let replies = [24, 23, 21];
        let lines = [
            vec![0, 1, 2, 3],
            vec![0, 5, 10, 15],
            vec![0, 6, 12, 18],
            vec![3, 7, 11, 15],
        ];
        for line in lines {
            assert!(combos.contains(&line), "{line:?} is not a winning line");
            for order in permutations(&line) {
                let mut moves = Vec::new();
                for (i, &cell) in order.iter().enumerate() {
                    moves.push(cell);
                    if let Some(&reply) = replies.get(i) {
                        moves.push(reply);
                    }
                }
                let state = play(GameState::new(config, Player::X), &moves);
                assert_eq!(*state.status(), GameStatus::Won, "order {order:?}");
                assert_eq!(*state.winner(), Some(Player::X));
                assert_eq!(state.winning_line().as_ref(), Some(&line), "order {order:?}");
            }
        }
    }

    #[test]
    fn test_validate_rejects_impossible_outcomes() {
        let base = play(GameState::new(GameConfig::CLASSIC, Player::X), &[0, 3, 1]);
        assert_eq!(base.validate(), Ok(()));

        let no_winner = GameState {
            status: GameStatus::Won,
            winner: None,
            winning_line: Some(vec![99, 100]),
            ..base.clone()
        };
        assert!(matches!(no_winner.validate(), Err(StateError::Outcome { .. })));

        let bogus_line = GameState {
            status: GameStatus::Won,
            winner: Some(Player::X),
            winning_line: Some(vec![99, 100]),
            ..base.clone()
        };
        assert_eq!(bogus_line.validate(), Err(StateError::WinningLine(vec![99, 100])));

        // A real line, but X does not hold all of it.
        let open_line = GameState {
            status: GameStatus::Won,
            winner: Some(Player::X),
            winning_line: Some(vec![0, 1, 2]),
            ..base.clone()
        };
        assert_eq!(open_line.validate(), Err(StateError::WinningLine(vec![0, 1, 2])));

        let drawn_with_winner = GameState {
            status: GameStatus::Drawn,
            winner: Some(Player::O),
            ..base.clone()
        };
        assert!(matches!(drawn_with_winner.validate(), Err(StateError::Outcome { .. })));
    }

    #[test]
    fn test_validate_rejects_unsettled_win_and_bad_turns() {
        let won = play(GameState::new(GameConfig::CLASSIC, Player::X), &[0, 3, 1, 4, 2]);
        assert_eq!(won.validate(), Ok(()));
        let still_playing = GameState {
            status: GameStatus::Playing,
            winner: None,
            winning_line: None,
            current_player: Player::O,
            ..won
        };
        assert_eq!(
            still_playing.validate(),
            Err(StateError::UnsettledWin(GameStatus::Playing))
        );

        let one_move = play(GameState::new(GameConfig::CLASSIC, Player::X), &[4]);
        let again = GameState {
            current_player: Player::X,
            ..one_move.clone()
        };
        assert_eq!(again.validate(), Err(StateError::TurnOrder(Player::X)));

        let mut board = one_move.board().clone();
        board.place(0, Player::X);
        let stacked = GameState { board, ..one_move };
        assert_eq!(stacked.validate(), Err(StateError::MarkCount { x: 2, o: 0 }));
    }

    #[test]
    fn test_starting_player_recovered_from_board() {
        let fresh = GameState::new(GameConfig::CLASSIC, Player::O);
        assert_eq!(fresh.starting_player(), Player::O);
        let midgame = play(fresh.clone(), &[4, 0, 8]);
        assert_eq!(midgame.starting_player(), Player::O);
        let even = play(fresh, &[4, 0]);
        assert_eq!(even.starting_player(), Player::O);

        // X started, O won on the sixth move: counts are even and O moved last.
        let o_wins = play(
            GameState::new(GameConfig::CLASSIC, Player::X),
            &[0, 3, 1, 4, 8, 5],
        );
        assert_eq!(*o_wins.status(), GameStatus::Won);
        assert_eq!(o_wins.starting_player(), Player::X);
    }
}
