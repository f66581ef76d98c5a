//! Configuration file support for Hearth.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/hearth/config.toml`.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub history: HistoryConfig,

    #[serde(default)]
    pub catalog: CatalogConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// In-progress session configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionConfig {
    /// File name of the session slot, relative to the data directory
    #[serde(default = "default_slot_file")]
    pub slot_file: String,

    /// Elapsed-time refresh interval
    #[serde(default = "default_tick_millis")]
    pub tick_millis: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            slot_file: default_slot_file(),
            tick_millis: default_tick_millis(),
        }
    }
}

/// History view configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_history_days")]
    pub days: i64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            days: default_history_days(),
        }
    }
}

/// User workout definitions
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct CatalogConfig {
    /// Directory of `*.toml` workout files; defaults to `<data_dir>/workouts`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workouts_dir: Option<PathBuf>,
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));
    base.join("hearth")
}

fn default_slot_file() -> String {
    "active_session.json".into()
}

fn default_tick_millis() -> u64 {
    1000
}

fn default_history_days() -> i64 {
    30
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Reject values that would make the session unusable
    pub fn validate(&self) -> Result<()> {
        if self.session.slot_file.trim().is_empty() {
            return Err(Error::Config("session.slot_file must not be empty".into()));
        }
        if self.session.tick_millis == 0 {
            return Err(Error::Config("session.tick_millis must be positive".into()));
        }
        if self.history.days <= 0 {
            return Err(Error::Config("history.days must be positive".into()));
        }
        Ok(())
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
            .unwrap_or_else(|| PathBuf::from("."));
        base.join("hearth").join("config.toml")
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }

    /// Path of the session slot under `data_dir`
    pub fn slot_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(&self.session.slot_file)
    }

    /// Path of the archive of finished sessions under `data_dir`
    pub fn archive_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join("archive").join("sessions.jsonl")
    }

    /// Directory of user workout files
    pub fn workouts_dir(&self, data_dir: &Path) -> PathBuf {
        self.catalog
            .workouts_dir
            .clone()
            .unwrap_or_else(|| data_dir.join("workouts"))
    }
}
