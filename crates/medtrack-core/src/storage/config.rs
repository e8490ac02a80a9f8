//! TOML-based application configuration.
//!
//! Stores the operational settings of the scan driver:
//! - Notification delivery (mail relay endpoint, sender name, master switch)
//! - The standing auto-progress policy
//!
//! Configuration is stored at `~/.config/medtrack/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::error::ConfigError;

/// Notification delivery configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    /// Master switch. When false, scans still run and report but no message
    /// leaves the system.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// HTTP mail relay endpoint. Unset means the console backend.
    #[serde(default)]
    pub relay_url: Option<String>,
    /// Bearer token for the relay, if it requires one.
    #[serde(default)]
    pub relay_token: Option<String>,
    #[serde(default = "default_from_name")]
    pub from_name: String,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/medtrack/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub notifications: NotificationsConfig,
    /// Standing policy: complete-and-advance each step right after its
    /// notification succeeds. The CLI flag enables it per run regardless.
    #[serde(default)]
    pub auto_progress: bool,
}

fn default_true() -> bool {
    true
}

fn default_from_name() -> String {
    "Your Medical Treatment Team".to_string()
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            relay_url: None,
            relay_token: None,
            from_name: default_from_name(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            notifications: NotificationsConfig::default(),
            auto_progress: false,
        }
    }
}

impl Config {
    /// Path of the configuration file inside the data directory.
    pub fn path() -> Result<PathBuf, ConfigError> {
        let dir = data_dir().map_err(|e| ConfigError::LoadFailed {
            path: PathBuf::from("~/.config/medtrack"),
            message: e.to_string(),
        })?;
        Ok(dir.join("config.toml"))
    }

    /// Load the configuration, falling back to defaults when the file does
    /// not exist yet.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        toml::from_str(&raw).map_err(|e| ConfigError::ParseFailed(e.to_string()))
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let raw = toml::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        std::fs::write(path, raw).map_err(|e| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}
