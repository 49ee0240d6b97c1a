//! Orchestrator tuning.
//!
//! Loaded from a TOML file (default: `devsync.toml` in the data directory).
//! Every field has a default, so an empty file or a missing section is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration for the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Reachability probe configuration.
    #[serde(default)]
    pub probe: ProbeConfig,
    /// Progress reporting configuration.
    #[serde(default)]
    pub progress: ProgressConfig,
}

/// Reachability probe configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Delay between two pings in milliseconds (default: 500).
    #[serde(default = "default_probe_interval_ms")]
    pub interval_ms: u64,
    /// Give up on an endpoint after this many seconds (default: 60).
    #[serde(default = "default_probe_timeout_secs")]
    pub timeout_secs: u64,
}

/// Progress reporting configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressConfig {
    /// Samples are held back for this long before the first render
    /// (default: 2000).
    #[serde(default = "default_progress_warmup_ms")]
    pub warmup_ms: u64,
}

// Default value functions
fn default_probe_interval_ms() -> u64 {
    500
}

fn default_probe_timeout_secs() -> u64 {
    60
}

fn default_progress_warmup_ms() -> u64 {
    2000
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_probe_interval_ms(),
            timeout_secs: default_probe_timeout_secs(),
        }
    }
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            warmup_ms: default_progress_warmup_ms(),
        }
    }
}

impl ProbeConfig {
    /// Delay between two pings.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Overall deadline of one wait.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ProgressConfig {
    /// Warm-up period before the first render.
    pub fn warmup(&self) -> Duration {
        Duration::from_millis(self.warmup_ms)
    }
}

impl OrchestratorConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Load configuration from `path` if it exists, defaults otherwise.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {}: {source}", path.display())]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {}: {source}", path.display())]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
}
