//! Remote unit lifecycle.
//!
//! Destroying the remote unit makes its controller schedule a fresh one,
//! which is how the orchestrator recovers an agent that never came up.

mod mock;

pub use mock::MockPods;

use async_trait::async_trait;
use devsync_types::RemoteUnit;
use thiserror::Error;

/// Errors from the remote unit lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PodError {
    /// The unit exists but could not be deleted.
    #[error("failed to destroy {unit}: {reason}")]
    Destroy {
        /// The unit that survived.
        unit: RemoteUnit,
        /// Cause reported by the cluster.
        reason: String,
    },

    /// The cluster could not be reached.
    #[error("cluster unavailable: {0}")]
    Unavailable(String),
}

/// Lifecycle operations on the remote unit.
#[async_trait]
pub trait PodLifecycle: Send + Sync {
    /// Destroy the unit so that it is recreated.
    ///
    /// Idempotent: destroying an absent unit succeeds.
    async fn destroy(&self, unit: &RemoteUnit) -> Result<(), PodError>;
}
