//! Application configuration loaded from TOML.

use crate::error::ConfigError;
use crate::machine::SessionConfig;
use crate::room::DEFAULT_PEER_PREFIX;
use derive_getters::Getters;
use derive_setters::Setters;
use gridduel_game::{Difficulty, GameConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Settings for the `gridduel` binary.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Setters, Serialize, Deserialize)]
#[setters(prefix = "with_")]
#[serde(default)]
pub struct AppConfig {
    /// Name shown to the opponent.
    display_name: String,
    /// Board edge N.
    grid_size: usize,
    /// Marks in a row needed to win (K).
    win_condition: usize,
    /// Computer opponent strength.
    difficulty: Difficulty,
    /// Namespace for room identifiers.
    peer_prefix: String,
    /// Joiner's connect deadline.
    connect_timeout_ms: u64,
    /// Keepalive period.
    heartbeat_interval_ms: u64,
    /// Room codes tried before giving up.
    max_room_attempts: u32,
    /// URL returning `{"iceServers": [...]}`.
    ice_endpoint: Option<String>,
    /// Chat presets.
    quick_replies: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            display_name: "Player".to_string(),
            grid_size: 3,
            win_condition: 3,
            difficulty: Difficulty::default(),
            peer_prefix: DEFAULT_PEER_PREFIX.to_string(),
            connect_timeout_ms: 10_000,
            heartbeat_interval_ms: 4_000,
            max_room_attempts: 5,
            ice_endpoint: None,
            quick_replies: vec![
                "Good game!".to_string(),
                "Nice move".to_string(),
                "Rematch?".to_string(),
            ],
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;
        Self::from_toml(&content)
    }

    /// Parses configuration text; missing fields take their defaults.
    #[instrument(skip(content))]
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))?;
        config.game_config()?;
        info!(name = %config.display_name, grid = config.grid_size, "Config loaded");
        Ok(config)
    }

    /// Loads `path` if it exists, defaults otherwise.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            debug!("No config file; using defaults");
            Ok(Self::default())
        }
    }

    /// Validated board geometry.
    pub fn game_config(&self) -> Result<GameConfig, ConfigError> {
        Ok(GameConfig::new(self.grid_size, self.win_condition)?)
    }

    /// Session settings derived from this configuration.
    #[instrument(skip(self))]
    pub fn session_config(&self) -> Result<SessionConfig, ConfigError> {
        if self.max_room_attempts == 0 {
            return Err(ConfigError::new("max_room_attempts must be at least 1"));
        }
        Ok(SessionConfig::default()
            .with_display_name(self.display_name.clone())
            .with_game(self.game_config()?)
            .with_peer_prefix(self.peer_prefix.clone())
            .with_connect_timeout(Duration::from_millis(self.connect_timeout_ms))
            .with_heartbeat_interval(Duration::from_millis(self.heartbeat_interval_ms))
            .with_max_room_attempts(self.max_room_attempts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = AppConfig::from_toml(
            r#"
            display_name = "Ana"
            grid_size = 5
            win_condition = 4
            difficulty = "extreme"
            "#,
        )
        .unwrap();
        assert_eq!(config.display_name(), "Ana");
        assert_eq!(*config.difficulty(), Difficulty::Extreme);
        assert_eq!(*config.connect_timeout_ms(), 10_000);
        let session = config.session_config().unwrap();
        assert_eq!(*session.game(), GameConfig::new(5, 4).unwrap());
        assert_eq!(*session.heartbeat_interval(), Duration::from_secs(4));
    }

    #[test]
    fn test_invalid_geometry_is_rejected() {
        let err = AppConfig::from_toml("grid_size = 4\nwin_condition = 5").unwrap_err();
        assert!(err.message.contains("Invalid board"), "{err}");
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let config = AppConfig::default().with_max_room_attempts(0);
        assert!(config.session_config().is_err());
    }

    #[test]
    fn test_load_from_file_and_missing_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "peer_prefix = \"test-v1-\"").unwrap();
        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.peer_prefix(), "test-v1-");

        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_or_default(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
    }
}
