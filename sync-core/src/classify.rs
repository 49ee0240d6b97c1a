//! Failure classification.
//!
//! Maps agent failures into a small taxonomy and builds the user-facing
//! errors for the kinds that are not retried.

use devsync_types::AgentError;
use thiserror::Error;

/// Hint attached to errors that need free space on the remote volume.
pub const INSUFFICIENT_SPACE_HINT: &str = "The remote volume is full. \
Free up space in the development container or increase the size of its persistent volume, \
then run 'devsync down' followed by 'devsync up'.";

/// Hint attached to failures the orchestrator cannot diagnose.
pub const RESTART_HINT: &str = "Run 'devsync down -v' followed by 'devsync up' to restart \
the session from scratch. If the problem persists, please file an issue at \
https://github.com/ydun-code-library/devsync/issues/new and include the output of 'devsync status'.";

/// Kind of a failure, as far as recovery is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureSignal {
    /// The agent is gone; the caller may recreate the remote unit.
    LostConnection,
    /// The remote side ran out of space; the user must act.
    InsufficientSpace,
    /// Anything else; reported with a support hint.
    Generic,
}

impl FailureSignal {
    /// Classify an agent error.
    pub fn of(err: &AgentError) -> Self {
        match err {
            AgentError::LostConnection => Self::LostConnection,
            AgentError::InsufficientSpace(_) => Self::InsufficientSpace,
            _ => Self::Generic,
        }
    }
}

/// An error meant to be read by a human, with remediation guidance.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct UserError {
    message: String,
    #[source]
    source: Option<AgentError>,
    hint: String,
}

impl UserError {
    /// Create an error with a message and no hint.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
            hint: String::new(),
        }
    }

    /// Wrap an agent failure nobody knows how to fix automatically.
    pub fn generic(err: AgentError) -> Self {
        Self::new(err.to_string())
            .with_source(err)
            .with_hint(RESTART_HINT)
    }

    /// Wrap an out-of-space failure.
    pub fn insufficient_space(err: AgentError) -> Self {
        Self::new("There isn't enough disk space available to synchronize your files")
            .with_source(err)
            .with_hint(INSUFFICIENT_SPACE_HINT)
    }

    /// Attach the underlying agent failure.
    pub fn with_source(mut self, source: AgentError) -> Self {
        self.source = Some(source);
        self
    }

    /// Attach remediation guidance.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = hint.into();
        self
    }

    /// The headline message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Remediation guidance (may be empty).
    pub fn hint(&self) -> &str {
        &self.hint
    }

    /// The underlying agent failure, if any.
    pub fn agent_error(&self) -> Option<&AgentError> {
        self.source.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn classifies_agent_errors() {
        assert_eq!(
            FailureSignal::of(&AgentError::LostConnection),
            FailureSignal::LostConnection
        );
        assert_eq!(
            FailureSignal::of(&AgentError::InsufficientSpace("disk full".into())),
            FailureSignal::InsufficientSpace
        );
        assert_eq!(
            FailureSignal::of(&AgentError::Other("folder marker missing".into())),
            FailureSignal::Generic
        );
        assert_eq!(
            FailureSignal::of(&AgentError::Rejected("bad folder type".into())),
            FailureSignal::Generic
        );
    }

    #[test]
    fn generic_error_carries_restart_hint() {
        let err = UserError::generic(AgentError::Other("folder marker missing".into()));

        assert_eq!(err.to_string(), "folder marker missing");
        assert_eq!(err.hint(), RESTART_HINT);
        assert!(err.source().is_some());
    }

    #[test]
    fn insufficient_space_carries_remediation() {
        let err = UserError::insufficient_space(AgentError::InsufficientSpace("ENOSPC".into()));

        assert!(err.hint().contains("persistent volume"));
        assert!(err.hint().contains("Free up space"));
        assert!(matches!(
            err.agent_error(),
            Some(AgentError::InsufficientSpace(_))
        ));
    }

    #[test]
    fn builder_pattern() {
        let err = UserError::new("Failed to connect to the synchronization service")
            .with_hint("try again");
        assert_eq!(err.message(), "Failed to connect to the synchronization service");
        assert_eq!(err.hint(), "try again");
        assert!(err.agent_error().is_none());
    }
}
