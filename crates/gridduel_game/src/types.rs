//! Core domain types for N-in-a-row games.

use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Smallest supported board edge.
pub const MIN_GRID_SIZE: usize = 3;

/// Largest supported board edge.
pub const MAX_GRID_SIZE: usize = 10;

/// Shortest supported winning run.
pub const MIN_WIN_CONDITION: usize = 3;

/// Player in the game.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Player {
    /// Player X (hosts and starts the first game).
    X,
    /// Player O.
    O,
}

impl Player {
    /// Returns the opponent player.
    pub fn opponent(self) -> Self {
        match self {
            Player::X => Player::O,
            Player::O => Player::X,
        }
    }
}

/// A square on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Option<Player>", into = "Option<Player>")]
pub enum Square {
    /// Empty square.
    #[default]
    Empty,
    /// Square occupied by a player.
    Occupied(Player),
}

impl Square {
    /// Returns true if nobody has played here.
    pub fn is_empty(self) -> bool {
        self == Square::Empty
    }

    /// Returns the occupant, if any.
    pub fn occupant(self) -> Option<Player> {
        match self {
            Square::Empty => None,
            Square::Occupied(player) => Some(player),
        }
    }
}

impl From<Option<Player>> for Square {
    fn from(value: Option<Player>) -> Self {
        value.map_or(Square::Empty, Square::Occupied)
    }
}

impl From<Square> for Option<Player> {
    fn from(value: Square) -> Self {
        value.occupant()
    }
}

/// Board geometry rejected by [`GameConfig::new`].
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum GameConfigError {
    /// Grid edge outside the supported range.
    #[display("Grid size {} is outside {}..={}", _0, MIN_GRID_SIZE, MAX_GRID_SIZE)]
    GridSize(#[error(not(source))] usize),
    /// Winning run longer than the board or shorter than three.
    #[display("Win condition {} must be between {} and the grid size {}", win_condition, MIN_WIN_CONDITION, grid_size)]
    WinCondition {
        /// Requested grid edge.
        grid_size: usize,
        /// Requested winning run.
        win_condition: usize,
    },
    /// Board cell count does not match the configured grid.
    #[display("Board has {} squares, expected {}", actual, expected)]
    BoardLength {
        /// Squares required by the configuration.
        expected: usize,
        /// Squares actually present.
        actual: usize,
    },
}

/// Board geometry: an N×N grid won by K in a row.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[display("{}x{}, {} in a row", grid_size, grid_size, win_condition)]
#[serde(try_from = "RawGameConfig", rename_all = "camelCase")]
pub struct GameConfig {
    grid_size: usize,
    win_condition: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawGameConfig {
    grid_size: usize,
    win_condition: usize,
}

impl TryFrom<RawGameConfig> for GameConfig {
    type Error = GameConfigError;

    fn try_from(raw: RawGameConfig) -> Result<Self, Self::Error> {
        GameConfig::new(raw.grid_size, raw.win_condition)
    }
}

impl GameConfig {
    /// Classic 3×3 board, three in a row.
    pub const CLASSIC: GameConfig = GameConfig {
        grid_size: 3,
        win_condition: 3,
    };

    /// Validates and creates a board configuration.
    #[instrument]
    pub fn new(grid_size: usize, win_condition: usize) -> Result<Self, GameConfigError> {
        if !(MIN_GRID_SIZE..=MAX_GRID_SIZE).contains(&grid_size) {
            return Err(GameConfigError::GridSize(grid_size));
        }
        if win_condition < MIN_WIN_CONDITION || win_condition > grid_size {
            return Err(GameConfigError::WinCondition {
                grid_size,
                win_condition,
            });
        }
        Ok(Self {
            grid_size,
            win_condition,
        })
    }

    /// Board edge length N.
    pub fn grid_size(&self) -> usize {
        self.grid_size
    }

    /// Marks in a row needed to win (K).
    pub fn win_condition(&self) -> usize {
        self.win_condition
    }

    /// Total number of squares (N²).
    pub fn cell_count(&self) -> usize {
        self.grid_size * self.grid_size
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self::CLASSIC
    }
}

/// N×N board stored row-major (`index = row * N + col`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<Square>", into = "Vec<Square>")]
pub struct Board {
    size: usize,
    squares: Vec<Square>,
}

impl Board {
    /// Creates an empty board with the given edge length.
    pub fn new(size: usize) -> Self {
        Self {
            size,
            squares: vec![Square::Empty; size * size],
        }
    }

    /// Board edge length.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of squares.
    pub fn len(&self) -> usize {
        self.squares.len()
    }

    /// Returns true when no marks have been placed yet.
    pub fn is_empty_board(&self) -> bool {
        self.squares.iter().all(|s| s.is_empty())
    }

    /// Gets the square at the given index.
    pub fn get(&self, index: usize) -> Option<Square> {
        self.squares.get(index).copied()
    }

    /// Checks if the square at `index` exists and is empty.
    pub fn is_empty(&self, index: usize) -> bool {
        matches!(self.get(index), Some(Square::Empty))
    }

    /// Returns all squares as a slice.
    pub fn squares(&self) -> &[Square] {
        &self.squares
    }

    /// Indices of every empty square, ascending.
    pub fn empty_indices(&self) -> Vec<usize> {
        self.squares
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_empty())
            .map(|(i, _)| i)
            .collect()
    }

    /// Number of marks `player` has on the board.
    pub fn count(&self, player: Player) -> usize {
        self.squares
            .iter()
            .filter(|s| **s == Square::Occupied(player))
            .count()
    }

    /// Places a mark without any rule checks.
    pub(crate) fn place(&mut self, index: usize, player: Player) {
        self.squares[index] = Square::Occupied(player);
    }

    /// Formats the board as a human-readable grid.
    ///
    /// Empty squares show their 1-based cell number.
    pub fn display(&self) -> String {
        let width = self.squares.len().to_string().len();
        let mut result = String::new();
        for row in 0..self.size {
            for col in 0..self.size {
                let pos = row * self.size + col;
                let symbol = match self.squares[pos] {
                    Square::Empty => (pos + 1).to_string(),
                    Square::Occupied(player) => player.to_string(),
                };
                result.push_str(&format!("{symbol:>width$}"));
                if col + 1 < self.size {
                    result.push('|');
                }
            }
            if row + 1 < self.size {
                result.push('\n');
                let rule = vec!["-".repeat(width); self.size].join("+");
                result.push_str(&rule);
                result.push('\n');
            }
        }
        result
    }
}

impl TryFrom<Vec<Square>> for Board {
    type Error = GameConfigError;

    fn try_from(squares: Vec<Square>) -> Result<Self, Self::Error> {
        let size = squares.len().isqrt();
        if size * size != squares.len() || !(MIN_GRID_SIZE..=MAX_GRID_SIZE).contains(&size) {
            return Err(GameConfigError::BoardLength {
                expected: size.clamp(MIN_GRID_SIZE, MAX_GRID_SIZE).pow(2),
                actual: squares.len(),
            });
        }
        Ok(Self { size, squares })
    }
}

impl From<Board> for Vec<Square> {
    fn from(board: Board) -> Self {
        board.squares
    }
}

/// Lifecycle of a single game.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameStatus {
    /// No room or match has been started yet.
    Idle,
    /// Moves are being accepted.
    Playing,
    /// Someone completed a winning line.
    Won,
    /// Nobody can win any more.
    Drawn,
}
