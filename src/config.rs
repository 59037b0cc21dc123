//! Configuration for the sleep-stage inference agent.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration for the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Port the HTTP server binds to
    pub port: u16,

    /// Root directory for per-session logs and feature series
    pub data_dir: PathBuf,

    /// Path to the classifier artifact
    pub model_path: PathBuf,

    /// External feature-extraction command, invoked as
    /// `<command> <session_id> <data_dir>`
    pub extractor_command: Option<PathBuf>,

    /// Batches whose first accelerometer timestamp is below this many
    /// seconds are treated as the start of a fresh session
    pub session_start_threshold_secs: f64,

    /// Minimum number of raw epochs required before a prediction is made
    pub min_epochs: usize,

    /// Trailing epochs dropped from every series (most recent epochs are
    /// not yet settled)
    pub settle_epochs: usize,

    /// Number of trailing predictions returned to the caller
    pub response_window: usize,

    /// Deadline for one extraction attempt, in seconds
    pub extraction_timeout_secs: u64,

    /// Retries after a failed or timed-out extraction attempt
    pub extraction_retries: u32,

    /// Base backoff between extraction retries, in milliseconds (doubles
    /// per attempt)
    pub extraction_backoff_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sleepstage-agent");

        Self {
            port: 5001,
            model_path: data_dir.join("models").join("classifier.json"),
            data_dir,
            extractor_command: None,
            session_start_threshold_secs: 10.0,
            min_epochs: 20,
            settle_epochs: 10,
            response_window: 10,
            extraction_timeout_secs: 30,
            extraction_retries: 2,
            extraction_backoff_ms: 200,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .map_err(|e| ConfigError::IoError(e.to_string()))?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path();

        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(&config_path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sleepstage-agent")
            .join("config.json")
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}
