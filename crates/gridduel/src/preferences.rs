//! User preferences remembered between runs.
//!
//! Only the binary reads and writes these. Sessions and the engine get plain
//! values.

use crate::error::ConfigError;
use gridduel_game::Difficulty;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, instrument};

/// Last-used settings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    /// Display name.
    pub display_name: Option<String>,
    /// Board edge N.
    pub grid_size: Option<usize>,
    /// Marks in a row needed to win.
    pub win_condition: Option<usize>,
    /// Computer opponent strength.
    pub difficulty: Option<Difficulty>,
    /// Chat presets.
    pub quick_replies: Vec<String>,
}

/// Where preferences live.
pub trait PreferencesStore {
    /// Reads saved preferences; empty preferences if none were saved.
    fn load(&self) -> Result<Preferences, ConfigError>;

    /// Replaces saved preferences.
    fn save(&self, preferences: &Preferences) -> Result<(), ConfigError>;
}

/// Preferences in a TOML file.
#[derive(Debug, Clone)]
pub struct TomlPreferencesStore {
    path: PathBuf,
}

impl TomlPreferencesStore {
    /// Store backed by `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PreferencesStore for TomlPreferencesStore {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    fn load(&self) -> Result<Preferences, ConfigError> {
        if !self.path.exists() {
            debug!("No saved preferences");
            return Ok(Preferences::default());
        }
        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| ConfigError::new(format!("Failed to read preferences: {}", e)))?;
        toml::from_str(&content)
            .map_err(|e| ConfigError::new(format!("Failed to parse preferences: {}", e)))
    }

    #[instrument(skip(self, preferences), fields(path = %self.path.display()))]
    fn save(&self, preferences: &Preferences) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(preferences)
            .map_err(|e| ConfigError::new(format!("Failed to encode preferences: {}", e)))?;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .map_err(|e| ConfigError::new(format!("Failed to create directory: {}", e)))?;
        }
        std::fs::write(&self.path, content)
            .map_err(|e| ConfigError::new(format!("Failed to write preferences: {}", e)))?;
        info!("Preferences saved");
        Ok(())
    }
}
