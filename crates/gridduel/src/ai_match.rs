//! Local play against the computer.
//!
//! [`AiMatch`] owns the game while the opponent is the engine. It hands out
//! at most one [`SearchRequest`] per position: a request is keyed by the board,
//! the side to move and the difficulty, and the engine's answer is only
//! committed while that key still describes the game. A reset or difficulty
//! change while the engine is thinking discards its move.

use derive_getters::Getters;
use gridduel_game::{
    Board, Difficulty, GameConfig, GameState, MoveError, MoveOutcome, Player, Score, SearchError,
    SearchRequest, choose_move,
};
use rand::Rng;
use tracing::{debug, info, instrument};

/// Identifies one engine turn.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PositionKey {
    board: Board,
    to_move: Player,
    difficulty: Difficulty,
}

/// One engine turn handed to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTurn {
    /// Position the request was made for.
    pub key: PositionKey,
    /// What to search.
    pub request: SearchRequest,
}

/// Game, score and turn bookkeeping for human-versus-engine play.
#[derive(Debug, Clone, Getters)]
pub struct AiMatch {
    /// Current game.
    game: GameState,
    /// Wins so far.
    score: Score,
    /// The human's mark.
    human: Player,
    /// Engine strength.
    difficulty: Difficulty,
    /// Who started the current game.
    starting_player: Player,
    #[getter(skip)]
    pending: Option<PositionKey>,
}

impl AiMatch {
    /// Starts a match; X moves first.
    #[instrument]
    pub fn new(config: GameConfig, human: Player, difficulty: Difficulty) -> Self {
        Self {
            game: GameState::new(config, Player::X),
            score: Score::default(),
            human,
            difficulty,
            starting_player: Player::X,
            pending: None,
        }
    }

    /// The engine's mark.
    pub fn computer(&self) -> Player {
        self.human.opponent()
    }

    /// True when the engine should move and nobody asked it yet.
    pub fn computer_to_move(&self) -> bool {
        self.game.is_playing() && *self.game.current_player() == self.computer()
    }

    fn key(&self) -> PositionKey {
        PositionKey {
            board: self.game.board().clone(),
            to_move: *self.game.current_player(),
            difficulty: self.difficulty,
        }
    }

    /// Applies the human's move.
    #[instrument(skip(self))]
    pub fn play_human(&mut self, index: usize) -> Result<MoveOutcome, MoveError> {
        let outcome = self.game.apply_move(index, self.human)?;
        self.settle(&outcome);
        Ok(outcome)
    }

    /// Returns the engine turn to run, once per position.
    #[instrument(skip(self))]
    pub fn next_turn(&mut self) -> Option<PendingTurn> {
        if !self.computer_to_move() {
            return None;
        }
        let key = self.key();
        if self.pending.as_ref() == Some(&key) {
            debug!("Search already scheduled for this position");
            return None;
        }
        self.pending = Some(key.clone());
        Some(PendingTurn {
            key,
            request: SearchRequest::from_state(&self.game, self.difficulty),
        })
    }

    /// Commits the engine's move for `key`.
    ///
    /// Returns `Ok(None)` if the position changed since the request was made.
    #[instrument(skip(self, key))]
    pub fn commit(&mut self, key: &PositionKey, index: usize) -> Result<Option<MoveOutcome>, MoveError> {
        if self.pending.as_ref() != Some(key) || self.key() != *key {
            debug!("Discarding stale engine move");
            return Ok(None);
        }
        self.pending = None;
        let outcome = self.game.apply_move(index, self.computer())?;
        self.settle(&outcome);
        Ok(Some(outcome))
    }

    fn settle(&mut self, outcome: &MoveOutcome) {
        self.game = outcome.state.clone();
        if let Some(winner) = outcome.winner_just_decided {
            self.score.record(winner);
        }
    }

    /// Starts the next game; the other player moves first.
    #[instrument(skip(self))]
    pub fn reset(&mut self) {
        self.starting_player = self.starting_player.opponent();
        self.game = GameState::new(*self.game.config(), self.starting_player);
        self.pending = None;
        info!(starting = %self.starting_player, "New game");
    }

    /// Changes the engine strength; any pending search is discarded.
    pub fn set_difficulty(&mut self, difficulty: Difficulty) {
        self.difficulty = difficulty;
        self.pending = None;
    }
}

/// Waits the tier's thinking delay, then searches.
///
/// The pause is cosmetic; it also keeps the human from acting before the
/// engine's move lands.
#[instrument(skip(request, rng), fields(difficulty = %request.difficulty))]
pub async fn think<R: Rng + ?Sized>(request: &SearchRequest, rng: &mut R) -> Result<usize, SearchError> {
    tokio::time::sleep(request.difficulty.thinking_delay()).await;
    choose_move(request, rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_one_request_per_position() {
        let mut game = AiMatch::new(GameConfig::CLASSIC, Player::O, Difficulty::Hard);
        let turn = game.next_turn().unwrap();
        assert_eq!(turn.request.ai_player, Player::X);
        assert!(game.next_turn().is_none());
    }

    #[test]
    fn test_no_request_on_human_turn() {
        let mut game = AiMatch::new(GameConfig::CLASSIC, Player::X, Difficulty::Easy);
        assert!(game.next_turn().is_none());
        game.play_human(4).unwrap();
        assert!(game.next_turn().is_some());
    }

    #[test]
    fn test_reset_discards_pending_move() {
        let mut game = AiMatch::new(GameConfig::CLASSIC, Player::O, Difficulty::Medium);
        let turn = game.next_turn().unwrap();
        game.reset();
        assert_eq!(game.commit(&turn.key, 0), Ok(None));
        assert!(game.game().board().is_empty(0));
        // O starts the second game, so the engine waits.
        assert!(game.next_turn().is_none());
    }

    #[test]
    fn test_difficulty_change_discards_pending_move() {
        let mut game = AiMatch::new(GameConfig::CLASSIC, Player::O, Difficulty::Medium);
        let turn = game.next_turn().unwrap();
        game.set_difficulty(Difficulty::Hard);
        assert_eq!(game.commit(&turn.key, 0), Ok(None));
        assert!(game.next_turn().is_some());
    }

    #[test]
    fn test_score_tracks_wins() {
        // Human X wins the top row while the engine's moves are forced in.
        let mut game = AiMatch::new(GameConfig::CLASSIC, Player::X, Difficulty::Easy);
        for (human, computer) in [(0, 3), (1, 4)] {
            game.play_human(human).unwrap();
            let turn = game.next_turn().unwrap();
            game.commit(&turn.key, computer).unwrap();
        }
        let outcome = game.play_human(2).unwrap();
        assert_eq!(outcome.winner_just_decided, Some(Player::X));
        assert_eq!(game.score().wins(Player::X), 1);
        assert!(game.next_turn().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_think_waits_before_moving() {
        let mut game = AiMatch::new(GameConfig::CLASSIC, Player::O, Difficulty::Extreme);
        let turn = game.next_turn().unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(12);
        let started = tokio::time::Instant::now();
        let index = think(&turn.request, &mut rng).await.unwrap();
        assert!(started.elapsed() >= Difficulty::Extreme.thinking_delay());
        let outcome = game.commit(&turn.key, index).unwrap().unwrap();
        assert_eq!(*outcome.state.current_player(), Player::O);
    }
}
