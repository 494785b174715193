//! Integration tests for the computer opponent.

use gridduel_game::{
    Difficulty, GameConfig, GameState, GameStatus, MoveReason, Player, SearchLimits,
    SearchRequest, choose_move, choose_move_with_limits,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn play(mut state: GameState, moves: &[usize]) -> GameState {
    for &index in moves {
        let player = *state.current_player();
        state = state.apply_move(index, player).unwrap().state;
    }
    state
}

#[test]
fn test_takes_immediate_win_at_every_difficulty() {
    // X: 0, 1 ; O: 3, 4 ; X to move - 2 wins.
    let state = play(GameState::new(GameConfig::CLASSIC, Player::X), &[0, 3, 1, 4]);
    let mut rng = ChaCha8Rng::seed_from_u64(3);
    for difficulty in [
        Difficulty::Easy,
        Difficulty::Medium,
        Difficulty::Hard,
        Difficulty::Extreme,
    ] {
        for _ in 0..20 {
            let request = SearchRequest::from_state(&state, difficulty);
            let report = choose_move_with_limits(&request, SearchLimits::unbounded(), &mut rng).unwrap();
            assert_eq!(report.index, 2, "{difficulty} missed the win");
            assert_eq!(report.reason, MoveReason::ImmediateWin);
        }
    }
}

#[test]
fn test_blocks_above_easy() {
    // X: 0, 1 ; O: 4 ; O to move must take 2.
    let state = play(GameState::new(GameConfig::CLASSIC, Player::X), &[0, 4, 1]);
    let mut rng = ChaCha8Rng::seed_from_u64(5);
    for difficulty in [Difficulty::Medium, Difficulty::Hard, Difficulty::Extreme] {
        let request = SearchRequest::from_state(&state, difficulty);
        assert_eq!(choose_move(&request, &mut rng).unwrap(), 2, "{difficulty} failed to block");
    }
}

#[test]
fn test_blocks_on_large_board() {
    // 6x6, K=4: O holds 7, 8, 9 with both ends open at 6 and 10.
    let config = GameConfig::new(6, 4).unwrap();
    let state = play(GameState::new(config, Player::O), &[7, 0, 8, 35, 9]);
    assert_eq!(*state.current_player(), Player::X);
    let mut rng = ChaCha8Rng::seed_from_u64(9);
    let request = SearchRequest::from_state(&state, Difficulty::Hard);
    let index = choose_move(&request, &mut rng).unwrap();
    assert!(index == 6 || index == 10, "chose {index}");
}

/// Plays every opponent reply against the engine and fails if any line loses.
fn assert_never_loses(state: &GameState, engine: Player, rng: &mut ChaCha8Rng, path: &mut Vec<usize>) {
    match state.status() {
        GameStatus::Won => {
            assert_eq!(*state.winner(), Some(engine), "engine lost after {path:?}");
            return;
        }
        GameStatus::Drawn => return,
        _ => {}
    }

    let to_move = *state.current_player();
    if to_move == engine {
        let request = SearchRequest::from_state(state, Difficulty::Hard);
        let report = choose_move_with_limits(&request, SearchLimits::unbounded(), rng).unwrap();
        let next = state.apply_move(report.index, engine).unwrap().state;
        path.push(report.index);
        assert_never_loses(&next, engine, rng, path);
        path.pop();
    } else {
        for index in state.board().empty_indices() {
            let next = state.apply_move(index, to_move).unwrap().state;
            path.push(index);
            assert_never_loses(&next, engine, rng, path);
            path.pop();
        }
    }
}

#[test]
fn test_classic_hard_is_unbeatable_moving_first() {
    let mut rng = ChaCha8Rng::seed_from_u64(17);
    let state = GameState::new(GameConfig::CLASSIC, Player::X);
    assert_never_loses(&state, Player::X, &mut rng, &mut Vec::new());
}

#[test]
fn test_classic_hard_is_unbeatable_moving_second() {
    let mut rng = ChaCha8Rng::seed_from_u64(23);
    let state = GameState::new(GameConfig::CLASSIC, Player::X);
    assert_never_loses(&state, Player::O, &mut rng, &mut Vec::new());
}

#[test]
fn test_zero_budget_still_returns_legal_move() {
    let config = GameConfig::new(10, 5).unwrap();
    let state = play(GameState::new(config, Player::X), &[44, 45, 55]);
    let mut rng = ChaCha8Rng::seed_from_u64(31);
    for difficulty in [Difficulty::Medium, Difficulty::Hard, Difficulty::Extreme] {
        let request = SearchRequest::from_state(&state, difficulty);
        let report = choose_move_with_limits(&request, SearchLimits::zero(), &mut rng).unwrap();
        assert!(state.board().is_empty(report.index));
        assert!(report.truncated);
    }
}

#[test]
fn test_every_geometry_gets_a_legal_move() {
    let mut rng = ChaCha8Rng::seed_from_u64(41);
    for n in 3..=10 {
        for k in 3..=n {
            let config = GameConfig::new(n, k).unwrap();
            let state = play(GameState::new(config, Player::X), &[0]);
            for difficulty in [Difficulty::Easy, Difficulty::Medium] {
                let request = SearchRequest::from_state(&state, difficulty);
                let index = choose_move(&request, &mut rng).unwrap();
                assert!(index < config.cell_count());
                assert!(state.board().is_empty(index), "{n}x{n} k={k} chose {index}");
            }
        }
    }
}

#[test]
fn test_engine_plays_side_to_move() {
    let state = play(GameState::new(GameConfig::new(4, 3).unwrap(), Player::O), &[5]);
    let request = SearchRequest::from_state(&state, Difficulty::Hard);
    assert_eq!(request.ai_player, Player::X);
    let mut rng = ChaCha8Rng::seed_from_u64(2);
    let index = choose_move(&request, &mut rng).unwrap();
    assert!(state.apply_move(index, Player::X).is_ok());
}
