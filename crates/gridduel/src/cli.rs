//! Command-line interface for gridduel.

use clap::{Parser, Subcommand, ValueEnum};
use gridduel_game::{Difficulty, Player};
use std::path::PathBuf;

/// Gridduel - N-in-a-row against the computer or over a peer connection
#[derive(Parser, Debug)]
#[command(name = "gridduel")]
#[command(about = "Two-player N-in-a-row with a minimax opponent", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Configuration file (TOML); defaults apply if it does not exist
    #[arg(short, long, default_value = "gridduel.toml", global = true)]
    pub config: PathBuf,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Side the human plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Side {
    /// Play X (moves first in the first game).
    X,
    /// Play O.
    O,
}

impl From<Side> for Player {
    fn from(side: Side) -> Self {
        match side {
            Side::X => Player::X,
            Side::O => Player::O,
        }
    }
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Play the computer in the terminal
    Ai {
        /// Board edge N (overrides config and saved preferences)
        #[arg(long)]
        grid: Option<usize>,

        /// Marks in a row needed to win (overrides config and saved preferences)
        #[arg(long)]
        win: Option<usize>,

        /// easy, medium, hard or extreme
        #[arg(short, long)]
        difficulty: Option<Difficulty>,

        /// Your mark
        #[arg(long, value_enum, default_value = "x")]
        side: Side,

        /// Where to remember your last settings
        #[arg(long, default_value = ".gridduel_prefs.toml")]
        prefs: PathBuf,
    },

    /// Host and join a room in-process, both sides played by the engine
    Loopback {
        /// Board edge N
        #[arg(long)]
        grid: Option<usize>,

        /// Marks in a row needed to win
        #[arg(long)]
        win: Option<usize>,

        /// Engine strength for both sides
        #[arg(short, long, default_value = "medium")]
        difficulty: Difficulty,

        /// Games to play
        #[arg(short, long, default_value = "1")]
        games: u32,
    },

    /// Print the winning lines of an N×N board with K in a row
    Combos {
        /// Board edge N
        grid: usize,

        /// Marks in a row needed to win
        win: usize,

        /// List every line, not just the count
        #[arg(long)]
        list: bool,
    },

    /// Fetch ICE servers from the configured endpoint
    Ice {
        /// Endpoint to query instead of the configured one
        #[arg(long)]
        endpoint: Option<String>,
    },
}
