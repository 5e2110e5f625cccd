//! Configuration management for Keyboard Stats
//!
//! Settings are read from a platform-specific TOML file when it exists and
//! can be overridden on the command line.
//!
//! ## Config File Locations
//!
//! | Platform | Path |
//! |----------|------|
//! | Linux | `~/.config/keyboard-stats/config.toml` |
//! | macOS | `~/Library/Application Support/keyboard-stats/config.toml` |
//!
//! ## Example
//!
//! ```no_run
//! use keyboard_stats::Config;
//!
//! // Load existing config or use defaults
//! let mut config = Config::load().unwrap_or_default();
//!
//! // Save every five minutes instead of every minute
//! config.monitor.save_interval_secs = 300;
//! ```

use crate::keyboard::{Classifier, KeyCode, DEFAULT_NAME_PATTERNS, REFERENCE_KEYS};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Error type for configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to determine config directory
    #[error("Could not determine config directory")]
    NoConfigDir,
    /// IO error reading or writing config file
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// Failed to parse config file
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Failed to serialize config
    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    /// A setting is out of range
    #[error("Invalid setting: {0}")]
    Invalid(String),
}

/// Returns the path to the default config file. Does not create anything.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
    Ok(config_dir.join("keyboard-stats").join("config.toml"))
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Event loop and persistence settings
    #[serde(default)]
    pub monitor: MonitorConfig,
    /// Keyboard detection settings
    #[serde(default)]
    pub classifier: ClassifierConfig,
}

/// Event loop and persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MonitorConfig {
    /// Seconds between periodic saves
    pub save_interval_secs: u64,
    /// Upper bound on one readiness wait, in milliseconds
    pub poll_timeout_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            save_interval_secs: 60,
            poll_timeout_ms: 250,
        }
    }
}

/// Keyboard detection configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Case-insensitive substrings a keyboard's name must contain one of
    pub name_patterns: Vec<String>,
    /// Key codes a keyboard must support
    pub required_keys: Vec<u16>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            name_patterns: DEFAULT_NAME_PATTERNS.iter().map(|s| s.to_string()).collect(),
            required_keys: REFERENCE_KEYS.iter().map(|k| k.as_u16()).collect(),
        }
    }
}

impl Config {
    /// Load configuration from the default config file.
    ///
    /// Returns the default configuration if the file doesn't exist.
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a specific path, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Reject settings the monitor cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.monitor.save_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "monitor.save_interval_secs must be at least 1".to_string(),
            ));
        }
        if self.monitor.poll_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "monitor.poll_timeout_ms must be at least 1".to_string(),
            ));
        }
        if self.classifier.required_keys.is_empty() {
            return Err(ConfigError::Invalid(
                "classifier.required_keys must list at least one key code".to_string(),
            ));
        }
        if self.classifier.name_patterns.iter().all(|p| p.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "classifier.name_patterns must contain a non-empty pattern".to_string(),
            ));
        }
        Ok(())
    }

    /// Get the save interval as Duration
    pub fn save_interval(&self) -> Duration {
        Duration::from_secs(self.monitor.save_interval_secs)
    }

    /// Get the readiness wait bound as Duration
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.monitor.poll_timeout_ms)
    }

    /// Build the keyboard classifier from these settings
    pub fn classifier(&self) -> Classifier {
        Classifier::new(
            &self.classifier.name_patterns,
            self.classifier.required_keys.iter().copied().map(KeyCode),
        )
    }
}
