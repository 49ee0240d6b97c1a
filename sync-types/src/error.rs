//! Error types for devsync.

use thiserror::Error;

/// Errors reported by the remote sync agent.
///
/// The agent's own protocol is opaque; these are the externally observable
/// failure signals the orchestrator reacts to.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AgentError {
    /// The agent process could not be launched.
    #[error("failed to launch the synchronization service: {0}")]
    Launch(String),

    /// The agent stopped answering (or never answered) on an endpoint.
    #[error("lost connection to the synchronization service")]
    LostConnection,

    /// The remote side ran out of disk space.
    #[error("insufficient space on the remote volume: {0}")]
    InsufficientSpace(String),

    /// The agent refused a configuration change.
    #[error("configuration rejected by the synchronization service: {0}")]
    Rejected(String),

    /// The operation was cancelled by the caller.
    #[error("operation cancelled")]
    Cancelled,

    /// Any other agent failure.
    #[error("{0}")]
    Other(String),
}

impl AgentError {
    /// Whether this error means the agent is gone rather than misbehaving.
    pub fn is_lost_connection(&self) -> bool {
        matches!(self, Self::LostConnection)
    }
}

/// A progress value that is not a finite number.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("progress must be a finite percentage, got {0}")]
pub struct InvalidProgress(pub f64);

/// Errors detected when validating a [`SessionConfig`](crate::SessionConfig).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionConfigError {
    /// A port was left unassigned.
    #[error("{name} port is not assigned")]
    UnassignedPort {
        /// Which port is missing.
        name: &'static str,
    },

    /// The same port is used for two roles.
    #[error("port {port} is assigned to both {first} and {second}")]
    DuplicatePort {
        /// The conflicting port.
        port: u16,
        /// First role using the port.
        first: &'static str,
        /// Second role using the port.
        second: &'static str,
    },

    /// The workspace root is empty.
    #[error("workspace root must not be empty")]
    EmptyWorkspaceRoot,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = AgentError::InsufficientSpace("no space left on device".into());
        assert_eq!(
            err.to_string(),
            "insufficient space on the remote volume: no space left on device"
        );
    }

    #[test]
    fn only_lost_connection_is_lost_connection() {
        assert!(AgentError::LostConnection.is_lost_connection());
        assert!(!AgentError::Other("boom".into()).is_lost_connection());
        assert!(!AgentError::Cancelled.is_lost_connection());
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AgentError>();
        assert_send_sync::<SessionConfigError>();
    }
}
