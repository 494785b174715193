//! Gridduel - command-line front end.
//!
//! Play the computer in the terminal, or watch two engine-driven sessions
//! play over the in-process transport.

#![warn(missing_docs)]

mod cli;

use anyhow::{Context, Result, bail};
use clap::Parser;
use cli::{Cli, Command};
use gridduel::{
    AiMatch, AppConfig, ConnectionStatus, HttpIceProvider, IceProvider, MemoryNetwork,
    Preferences, PreferencesStore, Session, SessionCommand, SessionDriver, SessionHandle,
    SessionNotice, TomlPreferencesStore, think,
};
use gridduel_game::{
    Difficulty, GameConfig, GameState, GameStatus, Player, SearchRequest, choose_move,
    winning_combinations,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, instrument, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = AppConfig::load_or_default(&cli.config)?;

    match cli.command {
        Command::Ai {
            grid,
            win,
            difficulty,
            side,
            prefs,
        } => run_ai(config, grid, win, difficulty, side.into(), prefs).await,
        Command::Loopback {
            grid,
            win,
            difficulty,
            games,
        } => run_loopback(config, grid, win, difficulty, games).await,
        Command::Combos { grid, win, list } => run_combos(grid, win, list),
        Command::Ice { endpoint } => run_ice(config, endpoint).await,
    }
}

fn describe(game: &GameState) -> String {
    match game.status() {
        GameStatus::Won => match game.winner() {
            Some(winner) => format!("{winner} wins!"),
            None => "Game over".to_string(),
        },
        GameStatus::Drawn => "Draw: nobody can complete a line.".to_string(),
        GameStatus::Playing => format!("{} to move", game.current_player()),
        GameStatus::Idle => "Waiting".to_string(),
    }
}

/// Play the computer in the terminal
#[instrument(skip(config, prefs_path))]
async fn run_ai(
    config: AppConfig,
    grid: Option<usize>,
    win: Option<usize>,
    difficulty: Option<Difficulty>,
    human: Player,
    prefs_path: PathBuf,
) -> Result<()> {
    let store = TomlPreferencesStore::new(prefs_path);
    let saved = store.load().unwrap_or_else(|err| {
        warn!(error = %err, "Ignoring unreadable preferences");
        Preferences::default()
    });

    let grid = grid.or(saved.grid_size).unwrap_or(*config.grid_size());
    let win = win
        .or(saved.win_condition)
        .unwrap_or(*config.win_condition())
        .min(grid);
    let difficulty = difficulty.or(saved.difficulty).unwrap_or(*config.difficulty());
    let game_config = GameConfig::new(grid, win).context("Invalid board settings")?;

    info!(%game_config, %difficulty, %human, "Starting match against the computer");
    let mut ai = AiMatch::new(game_config, human, difficulty);
    let mut rng = StdRng::from_entropy();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        println!("\n{}\n", ai.game().board().display());

        if !ai.game().is_playing() {
            println!("{}", describe(ai.game()));
            println!(
                "Score - you: {}  computer: {}",
                ai.score().wins(human),
                ai.score().wins(ai.computer())
            );
            println!("Play again? [y/N]");
            match lines.next_line().await? {
                Some(answer) if answer.trim().eq_ignore_ascii_case("y") => {
                    ai.reset();
                    continue;
                }
                _ => break,
            }
        }

        if let Some(turn) = ai.next_turn() {
            println!("Computer ({difficulty}) is thinking...");
            let index = think(&turn.request, &mut rng).await?;
            ai.commit(&turn.key, index)?;
            continue;
        }

        println!(
            "You are {human}. Pick a square 1-{} (q to quit):",
            game_config.cell_count()
        );
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.eq_ignore_ascii_case("q") {
            break;
        }
        match input.parse::<usize>() {
            Ok(cell) if cell >= 1 => {
                if let Err(err) = ai.play_human(cell - 1) {
                    println!("{err}");
                }
            }
            _ => println!("Enter a square number."),
        }
    }

    let prefs = Preferences {
        display_name: saved.display_name.or_else(|| Some(config.display_name().clone())),
        grid_size: Some(grid),
        win_condition: Some(win),
        difficulty: Some(difficulty),
        quick_replies: if saved.quick_replies.is_empty() {
            config.quick_replies().clone()
        } else {
            saved.quick_replies
        },
    };
    if let Err(err) = store.save(&prefs) {
        warn!(error = %err, "Could not save preferences");
    }
    Ok(())
}

/// Waits for the room code, failing if the host gives up.
async fn room_code(handle: &mut SessionHandle) -> Result<gridduel::RoomCode> {
    while let Some(notice) = handle.next_notice().await {
        match notice {
            SessionNotice::RoomOpened(code) => return Ok(code),
            SessionNotice::Failed(err) if err.is_retryable() => {
                bail!("Hosting failed: {}", err.user_message())
            }
            SessionNotice::Failed(err) => {
                bail!("Hosting failed, fix the configuration first: {}", err.user_message())
            }
            other => debug!(?other, "Host notice"),
        }
    }
    bail!("Host session stopped")
}

/// Host and join a room in-process, both sides played by the engine
#[instrument(skip(config))]
async fn run_loopback(
    config: AppConfig,
    grid: Option<usize>,
    win: Option<usize>,
    difficulty: Difficulty,
    games: u32,
) -> Result<()> {
    let game_config = GameConfig::new(
        grid.unwrap_or(*config.grid_size()),
        win.unwrap_or(*config.win_condition()),
    )
    .context("Invalid board settings")?;
    let session_config = config.session_config()?.with_game(game_config);

    // The memory transport does not use ICE; fetch anyway so a bad endpoint
    // shows up in the logs, without holding up the session.
    if let Some(endpoint) = config.ice_endpoint().clone() {
        tokio::spawn(async move {
            let servers = HttpIceProvider::new(endpoint).ice_servers().await;
            info!(count = servers.len(), "ICE servers available");
        });
    }

    let network = MemoryNetwork::new();
    let host = Session::new(
        session_config
            .clone()
            .with_display_name(format!("{} (host)", config.display_name())),
    );
    let joiner = Session::new(
        session_config.with_display_name(format!("{} (joiner)", config.display_name())),
    );
    let (mut host_handle, host_task) = SessionDriver::spawn(host, network.transport());
    let (mut joiner_handle, joiner_task) = SessionDriver::spawn(joiner, network.transport());

    host_handle.send(SessionCommand::Host);
    let code = room_code(&mut host_handle).await?;
    println!("Room {code} open on {game_config}");

    joiner_handle.send(SessionCommand::Join(code));
    joiner_handle
        .wait_for(|s| *s.status() == ConnectionStatus::Connected && s.game().is_playing())
        .await
        .context("Joiner stopped before connecting")?;
    host_handle
        .wait_for(|s| *s.status() == ConnectionStatus::Connected)
        .await
        .context("Host stopped before connecting")?;

    let mut rng = StdRng::from_entropy();
    for round in 1..=games {
        println!("\nGame {round}");
        loop {
            let game = host_handle.snapshot().game().clone();
            if !game.is_playing() {
                break;
            }
            let mover = *game.current_player();
            let index = choose_move(&SearchRequest::from_state(&game, difficulty), &mut rng)?;
            let (active, other) = match mover {
                Player::X => (&mut host_handle, &mut joiner_handle),
                Player::O => (&mut joiner_handle, &mut host_handle),
            };
            active.send(SessionCommand::Move(index));
            let mine = active
                .wait_for(|s| !s.game().board().is_empty(index))
                .await
                .context("Mover stopped")?;
            let theirs = other
                .wait_for(|s| !s.game().board().is_empty(index))
                .await
                .context("Opponent stopped")?;
            if mine.game() != theirs.game() {
                bail!("Peers disagree after move {}", index + 1);
            }
            println!("\n{mover} plays {}\n{}", index + 1, mine.game().board().display());
        }
        let snapshot = host_handle.snapshot();
        println!("{}", describe(snapshot.game()));

        if round < games {
            host_handle.send(SessionCommand::Reset);
            for handle in [&mut host_handle, &mut joiner_handle] {
                handle
                    .wait_for(|s| s.game().is_playing() && s.game().board().is_empty_board())
                    .await
                    .context("Session stopped during reset")?;
            }
        }
    }

    let score = *host_handle.snapshot().score();
    println!("\nFinal score - X: {}  O: {}", score.x, score.o);

    host_handle.send(SessionCommand::Leave);
    drop(host_handle);
    drop(joiner_handle);
    host_task.await?;
    joiner_task.await?;
    Ok(())
}

/// Print the winning lines of an N×N board with K in a row
fn run_combos(grid: usize, win: usize, list: bool) -> Result<()> {
    let config = GameConfig::new(grid, win)?;
    let lines = winning_combinations(grid, win);
    println!("{config}: {} winning lines", lines.len());
    if list {
        for line in &lines {
            let cells: Vec<String> = line.iter().map(|i| (i + 1).to_string()).collect();
            println!("  {}", cells.join(" "));
        }
    }
    Ok(())
}

/// Fetch ICE servers from the configured endpoint
async fn run_ice(config: AppConfig, endpoint: Option<String>) -> Result<()> {
    let Some(endpoint) = endpoint.or_else(|| config.ice_endpoint().clone()) else {
        println!("No ICE endpoint configured; peers will connect without a relay.");
        return Ok(());
    };
    let servers = HttpIceProvider::new(endpoint).ice_servers().await;
    if servers.is_empty() {
        println!("No ICE servers available.");
    }
    for server in servers {
        println!("{}", server.urls.to_vec().join(", "));
    }
    Ok(())
}
