//! Game rules for N-in-a-row.
//!
//! Pure functions over boards: winning-line enumeration, win detection and
//! draw detection. Rules are kept apart from board storage so the controller
//! and the search engine share one definition of "over".

pub mod draw;
pub mod lines;
pub mod win;

pub use draw::{is_forced_draw, is_full};
pub use lines::{Line, LineSet, winning_combinations};
pub use win::{Victory, evaluate_terminal};
