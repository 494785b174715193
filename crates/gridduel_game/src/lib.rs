//! Gridduel game logic - pure N-in-a-row rules and a computer opponent.
//!
//! # Architecture
//!
//! - **Types**: board, players, squares and validated board geometry
//! - **Rules**: winning-line enumeration, win and forced-draw detection
//! - **Game**: the single move-application operation and running score
//! - **Search**: difficulty-tiered move selection (minimax + alpha-beta)
//!
//! # Example
//!
//! ```
//! use gridduel_game::{Difficulty, GameConfig, GameState, Player, SearchRequest, choose_move};
//!
//! let state = GameState::new(GameConfig::CLASSIC, Player::X);
//! let state = state.apply_move(4, Player::X).unwrap().state;
//!
//! let request = SearchRequest::from_state(&state, Difficulty::Hard);
//! let index = choose_move(&request, &mut rand::thread_rng()).unwrap();
//! assert!(state.board().is_empty(index));
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod game;
pub mod rules;
pub mod search;
mod types;

// Crate-level exports - Domain types
pub use types::{
    Board, GameConfig, GameConfigError, GameStatus, MAX_GRID_SIZE, MIN_GRID_SIZE,
    MIN_WIN_CONDITION, Player, Square,
};

// Crate-level exports - Game controller
pub use game::{GameState, MoveError, MoveOutcome, Score, StateError};

// Crate-level exports - Rules
pub use rules::{
    Line, LineSet, Victory, evaluate_terminal, is_forced_draw, is_full, winning_combinations,
};

// Crate-level exports - Search engine
pub use search::{
    Difficulty, MoveReason, SearchError, SearchLimits, SearchReport, SearchRequest, choose_move,
    choose_move_with_limits, evaluate_board,
};
