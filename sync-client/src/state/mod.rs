//! Session state sink.
//!
//! The orchestrator reports every phase transition here so that other
//! processes (`devsync status`) can observe the session.

mod file;
mod mock;

pub use file::FileStateSink;
pub use mock::MockStateSink;

use async_trait::async_trait;
use devsync_core::SessionPhase;
use devsync_types::SessionId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Errors from the state sink.
#[derive(Debug, Error)]
pub enum StateError {
    /// Writing the state file failed.
    #[error("failed to write session state to {}: {source}", path.display())]
    Write {
        /// Path of the state file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Reading the state file failed.
    #[error("failed to read session state from {}: {source}", path.display())]
    Read {
        /// Path of the state file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The state file is not valid JSON.
    #[error("invalid session state in {}: {source}", path.display())]
    Parse {
        /// Path of the state file.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// Serializing the record failed.
    #[error("failed to encode session state: {0}")]
    Encode(#[from] serde_json::Error),

    /// The sink is not accepting writes.
    #[error("session state sink unavailable: {0}")]
    Unavailable(String),
}

/// One observation of the session, as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateRecord {
    /// Session the record belongs to.
    pub session_id: SessionId,
    /// Phase entered.
    pub phase: SessionPhase,
    /// When the phase was entered (Unix seconds).
    pub updated_at: u64,
}

impl StateRecord {
    /// A record for `phase`, stamped with the current time.
    pub fn now(session_id: SessionId, phase: SessionPhase) -> Self {
        Self {
            session_id,
            phase,
            updated_at: current_timestamp(),
        }
    }
}

/// Receiver of phase transitions.
#[async_trait]
pub trait StateSink: Send + Sync {
    /// Record that the session entered `phase`.
    async fn update(&self, phase: SessionPhase) -> Result<(), StateError>;
}

fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
