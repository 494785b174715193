//! Winning-line enumeration.

use crate::types::GameConfig;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};
use tracing::{debug, instrument};

/// Board indices that win when all are held by one player.
pub type Line = Vec<usize>;

/// Enumerates every length-`win_condition` run on a `grid_size` board.
///
/// Order is stable: rows, then columns, then ↘ diagonals, then ↙ diagonals.
/// Within a family, runs are listed by their first cell in row-major order.
#[instrument]
pub fn winning_combinations(grid_size: usize, win_condition: usize) -> Vec<Line> {
    let n = grid_size;
    let k = win_condition;
    if k == 0 || k > n {
        return Vec::new();
    }
    let span = n - k + 1;
    let mut lines = Vec::with_capacity(2 * n * span + 2 * span * span);

    // Rows
    for row in 0..n {
        for col in 0..span {
            lines.push((0..k).map(|i| row * n + col + i).collect());
        }
    }

    // Columns
    for col in 0..n {
        for row in 0..span {
            lines.push((0..k).map(|i| (row + i) * n + col).collect());
        }
    }

    // Diagonals (down-right)
    for row in 0..span {
        for col in 0..span {
            lines.push((0..k).map(|i| (row + i) * n + col + i).collect());
        }
    }

    // Diagonals (down-left)
    for row in 0..span {
        for col in (k - 1)..n {
            lines.push((0..k).map(|i| (row + i) * n + col - i).collect());
        }
    }

    lines
}

/// Winning lines for one board geometry, indexed by cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineSet {
    config: GameConfig,
    lines: Vec<Line>,
    through: Vec<Vec<usize>>,
}

impl LineSet {
    /// Builds the line set for a configuration.
    pub fn new(config: GameConfig) -> Self {
        let lines = winning_combinations(config.grid_size(), config.win_condition());
        let mut through = vec![Vec::new(); config.cell_count()];
        for (line_idx, line) in lines.iter().enumerate() {
            for &cell in line {
                through[cell].push(line_idx);
            }
        }
        Self {
            config,
            lines,
            through,
        }
    }

    /// Returns the shared line set for a configuration, building it once.
    pub fn cached(config: GameConfig) -> Arc<LineSet> {
        static CACHE: OnceLock<Mutex<HashMap<GameConfig, Arc<LineSet>>>> = OnceLock::new();
        let cache = CACHE.get_or_init(|| Mutex::new(HashMap::new()));
        let mut guard = cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard
            .entry(config)
            .or_insert_with(|| {
                debug!(
                    grid_size = config.grid_size(),
                    win_condition = config.win_condition(),
                    "Building winning-line table"
                );
                Arc::new(LineSet::new(config))
            })
            .clone()
    }

    /// Geometry these lines belong to.
    pub fn config(&self) -> GameConfig {
        self.config
    }

    /// All lines in enumeration order.
    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    /// Indices into [`LineSet::lines`] of the lines passing through `cell`.
    pub fn through(&self, cell: usize) -> &[usize] {
        &self.through[cell]
    }
}
