//! Computer opponent: move selection under difficulty-tiered budgets.
//!
//! Every tier plays an immediate win when one exists. Above `easy` the engine
//! also blocks the opponent's immediate win, then runs a depth- and
//! deadline-bounded minimax with alpha-beta pruning and picks among the
//! top-scored root moves. `easy` blocks only most of the time and otherwise
//! plays from a heuristic shortlist with some randomness, so it stays
//! beatable.

mod easy;
pub mod eval;
mod minimax;

use crate::rules::lines::LineSet;
use crate::rules::win::completes_line;
use crate::types::{Board, GameConfig, GameConfigError, Player, Square};
use crate::game::GameState;
use derive_more::{Display, Error};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use strum::EnumString;
use tracing::{debug, instrument};

pub use eval::evaluate_board;

/// Difficulty tier of the computer opponent.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Difficulty {
    /// Beatable: probabilistic blocking and a randomized shortlist.
    Easy,
    /// Competent: shallow search, picks among the best three moves.
    #[default]
    Medium,
    /// Strongest search within its time budget.
    Hard,
    /// Same search as hard, deeper on large boards, with a longer pause.
    Extreme,
}

impl Difficulty {
    /// Whether this tier always blocks an immediate opponent win.
    pub fn always_blocks(self) -> bool {
        self != Difficulty::Easy
    }

    /// Wall-clock budget for the search, if this tier searches at all.
    pub fn deadline(self) -> Option<Duration> {
        match self {
            Difficulty::Easy => None,
            Difficulty::Medium => Some(Duration::from_millis(30)),
            Difficulty::Hard | Difficulty::Extreme => Some(Duration::from_millis(80)),
        }
    }

    /// How many of the best-ranked root moves are candidates.
    pub fn top_k(self) -> usize {
        match self {
            Difficulty::Medium => 3,
            _ => 1,
        }
    }

    /// Cosmetic pause before the computer's move is committed.
    pub fn thinking_delay(self) -> Duration {
        match self {
            Difficulty::Easy => Duration::from_millis(350),
            Difficulty::Medium => Duration::from_millis(500),
            Difficulty::Hard => Duration::from_millis(650),
            Difficulty::Extreme => Duration::from_millis(1100),
        }
    }

    /// Search depth in plies for a board geometry.
    ///
    /// The classic 3×3 game is searched to the end; larger boards use fixed
    /// shallow depths.
    pub fn search_depth(self, config: GameConfig) -> u32 {
        if config.grid_size() == 3 && config.win_condition() == 3 {
            return config.cell_count() as u32;
        }
        match (config.grid_size(), self) {
            (_, Difficulty::Easy) => 1,
            (4, Difficulty::Medium) => 3,
            (4, Difficulty::Hard) => 4,
            (4, Difficulty::Extreme) => 5,
            (5, Difficulty::Medium) => 2,
            (5, Difficulty::Hard) => 3,
            (5, Difficulty::Extreme) => 4,
            (_, Difficulty::Extreme) => 3,
            _ => 2,
        }
    }
}

/// Time budget override for a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchLimits {
    /// Maximum wall-clock time; `None` searches to full depth.
    pub deadline: Option<Duration>,
}

impl SearchLimits {
    /// The tier's own budget.
    pub fn for_difficulty(difficulty: Difficulty) -> Self {
        Self {
            deadline: difficulty.deadline(),
        }
    }

    /// No deadline at all.
    pub fn unbounded() -> Self {
        Self { deadline: None }
    }

    /// A deadline that has already passed when the search starts.
    pub fn zero() -> Self {
        Self {
            deadline: Some(Duration::ZERO),
        }
    }
}

/// One computer turn's input, consumed once.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchRequest {
    /// Board snapshot.
    pub board: Board,
    /// Board geometry.
    pub config: GameConfig,
    /// The side the engine plays.
    pub ai_player: Player,
    /// Difficulty tier.
    pub difficulty: Difficulty,
}

impl SearchRequest {
    /// Creates a request.
    pub fn new(board: Board, config: GameConfig, ai_player: Player, difficulty: Difficulty) -> Self {
        Self {
            board,
            config,
            ai_player,
            difficulty,
        }
    }

    /// Creates a request for the player to move in `state`.
    pub fn from_state(state: &GameState, difficulty: Difficulty) -> Self {
        Self::new(
            state.board().clone(),
            *state.config(),
            *state.current_player(),
            difficulty,
        )
    }
}

/// Why the engine chose its move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum MoveReason {
    /// Completes a line right away.
    ImmediateWin,
    /// Stops the opponent completing a line next turn.
    Block,
    /// Easy tier took the open center.
    Center,
    /// Easy tier picked from its heuristic shortlist.
    Shortlist,
    /// Easy tier picked any empty square.
    Random,
    /// Chosen by minimax.
    Search,
}

/// The engine's answer with statistics for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchReport {
    /// Chosen board index.
    pub index: usize,
    /// Why it was chosen.
    pub reason: MoveReason,
    /// Minimax score of the chosen move, when a search ran.
    pub score: Option<i64>,
    /// Nodes visited by the search.
    pub nodes: u64,
    /// Configured search depth.
    pub depth: u32,
    /// True if the deadline cut the search short.
    pub truncated: bool,
}

impl SearchReport {
    fn shortcut(index: usize, reason: MoveReason) -> Self {
        Self {
            index,
            reason,
            score: None,
            nodes: 0,
            depth: 0,
            truncated: false,
        }
    }
}

/// Invalid input to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum SearchError {
    /// The board has no empty square.
    #[display("No legal moves on the board")]
    NoLegalMoves,
    /// The board does not match the configured geometry.
    #[display("Board does not match configuration: {}", _0)]
    Shape(GameConfigError),
}

/// Picks the engine's move for `request` using the tier's own time budget.
#[instrument(skip(request, rng), fields(ai = %request.ai_player, difficulty = %request.difficulty))]
pub fn choose_move<R: Rng + ?Sized>(request: &SearchRequest, rng: &mut R) -> Result<usize, SearchError> {
    choose_move_with_limits(request, SearchLimits::for_difficulty(request.difficulty), rng)
        .map(|report| report.index)
}

/// Picks the engine's move with an explicit time budget and reports how.
#[instrument(skip(request, rng), fields(ai = %request.ai_player, difficulty = %request.difficulty))]
pub fn choose_move_with_limits<R: Rng + ?Sized>(
    request: &SearchRequest,
    limits: SearchLimits,
    rng: &mut R,
) -> Result<SearchReport, SearchError> {
    let started = Instant::now();
    if request.board.len() != request.config.cell_count() {
        return Err(SearchError::Shape(GameConfigError::BoardLength {
            expected: request.config.cell_count(),
            actual: request.board.len(),
        }));
    }

    let moves = request.board.empty_indices();
    if moves.is_empty() {
        return Err(SearchError::NoLegalMoves);
    }

    let lines = LineSet::cached(request.config);
    let mut squares = request.board.squares().to_vec();
    let ai = request.ai_player;

    if let Some(index) = immediate_win(&mut squares, &lines, ai, &moves) {
        debug!(index, "Taking immediate win");
        return Ok(SearchReport::shortcut(index, MoveReason::ImmediateWin));
    }

    let threat = immediate_win(&mut squares, &lines, ai.opponent(), &moves);

    if !request.difficulty.always_blocks() {
        let (index, reason) = easy::pick(&mut squares, &lines, ai, &moves, threat, rng);
        debug!(index, %reason, "Easy move chosen");
        return Ok(SearchReport::shortcut(index, reason));
    }

    if let Some(index) = threat {
        debug!(index, "Blocking opponent win");
        return Ok(SearchReport::shortcut(index, MoveReason::Block));
    }

    let depth = request.difficulty.search_depth(request.config);
    let deadline = limits.deadline.map(|budget| started + budget);
    let mut searcher = minimax::Searcher::new(&lines, ai, deadline);
    let scored = searcher.score_root(&mut squares, &moves, depth);

    let (index, score) = select_top_k(scored, request.difficulty.top_k(), rng).unwrap_or((moves[0], 0));

    debug!(
        index,
        score,
        depth,
        nodes = searcher.nodes(),
        truncated = searcher.truncated(),
        elapsed_us = started.elapsed().as_micros() as u64,
        "Search finished"
    );

    Ok(SearchReport {
        index,
        reason: MoveReason::Search,
        score: Some(score),
        nodes: searcher.nodes(),
        depth,
        truncated: searcher.truncated(),
    })
}

/// First empty square (ascending) where `player` completes a line.
pub(crate) fn immediate_win(
    squares: &mut [Square],
    lines: &LineSet,
    player: Player,
    moves: &[usize],
) -> Option<usize> {
    moves.iter().copied().find(|&cell| {
        squares[cell] = Square::Occupied(player);
        let wins = completes_line(squares, lines, cell, player);
        squares[cell] = Square::Empty;
        wins
    })
}

/// Ranks root moves by score and picks uniformly among the best `k`.
///
/// With `k == 1` every move tied for the best score is a candidate.
fn select_top_k<R: Rng + ?Sized>(
    mut scored: Vec<(usize, i64)>,
    k: usize,
    rng: &mut R,
) -> Option<(usize, i64)> {
    // Shuffle before the stable sort so equal scores land in random order.
    scored.shuffle(rng);
    scored.sort_by(|a, b| b.1.cmp(&a.1));
    let best = scored.first()?.1;
    let pool: Vec<_> = if k <= 1 {
        scored.into_iter().take_while(|(_, s)| *s == best).collect()
    } else {
        scored.into_iter().take(k).collect()
    };
    pool.choose(rng).copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::str::FromStr;

    #[test]
    fn test_difficulty_parses_lowercase() {
        assert_eq!(Difficulty::from_str("hard").unwrap(), Difficulty::Hard);
        assert_eq!(Difficulty::from_str("Extreme").unwrap(), Difficulty::Extreme);
        assert_eq!(Difficulty::Medium.to_string(), "medium");
        assert!(Difficulty::from_str("impossible").is_err());
    }

    #[test]
    fn test_depth_table() {
        let classic = GameConfig::CLASSIC;
        assert_eq!(Difficulty::Medium.search_depth(classic), 9);
        let big = GameConfig::new(7, 4).unwrap();
        assert!(Difficulty::Extreme.search_depth(big) >= Difficulty::Hard.search_depth(big));
        let four = GameConfig::new(4, 4).unwrap();
        assert_eq!(Difficulty::Hard.search_depth(four), 4);
        for d in [Difficulty::Medium, Difficulty::Hard, Difficulty::Extreme] {
            for n in 4..=10 {
                let depth = d.search_depth(GameConfig::new(n, 3).unwrap());
                assert!((2..=5).contains(&depth));
            }
        }
    }

    #[test]
    fn test_select_top_one_keeps_only_best_ties() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..50 {
            let scored = vec![(0, 5), (1, 9), (2, 9), (3, -1)];
            let (index, score) = select_top_k(scored, 1, &mut rng).unwrap();
            assert!(index == 1 || index == 2);
            assert_eq!(score, 9);
        }
    }

    #[test]
    fn test_select_top_three_never_picks_fourth() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        for _ in 0..100 {
            let scored = vec![(0, 1), (1, 4), (2, 3), (3, 2)];
            let (index, _) = select_top_k(scored, 3, &mut rng).unwrap();
            assert_ne!(index, 0);
        }
    }

    #[test]
    fn test_no_legal_moves_is_an_error() {
        let mut board = Board::new(3);
        for i in 0..9 {
            board.place(i, if i % 2 == 0 { Player::X } else { Player::O });
        }
        let request = SearchRequest::new(board, GameConfig::CLASSIC, Player::O, Difficulty::Hard);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert_eq!(choose_move(&request, &mut rng), Err(SearchError::NoLegalMoves));
    }

    #[test]
    fn test_mismatched_board_is_rejected() {
        let request = SearchRequest::new(
            Board::new(4),
            GameConfig::CLASSIC,
            Player::X,
            Difficulty::Medium,
        );
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(matches!(choose_move(&request, &mut rng), Err(SearchError::Shape(_))));
    }
}
