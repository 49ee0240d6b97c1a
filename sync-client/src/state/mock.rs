//! In-memory state sink for testing.

use super::{StateError, StateSink};
use async_trait::async_trait;
use devsync_core::SessionPhase;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Mock state sink for testing.
///
/// Records every phase it is told about. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockStateSink {
    inner: Arc<Mutex<MockStateSinkInner>>,
}

#[derive(Debug, Default)]
struct MockStateSinkInner {
    phases: Vec<SessionPhase>,
    fail_on: HashSet<SessionPhase>,
}

impl MockStateSink {
    /// Create a sink that accepts every update.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every update to `phase`.
    pub fn fail_on(&self, phase: SessionPhase) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_on.insert(phase);
    }

    /// Phases accepted so far, in order.
    pub fn phases(&self) -> Vec<SessionPhase> {
        let inner = self.inner.lock().unwrap();
        inner.phases.clone()
    }

    /// The last phase accepted.
    pub fn last(&self) -> Option<SessionPhase> {
        let inner = self.inner.lock().unwrap();
        inner.phases.last().copied()
    }
}

#[async_trait]
impl StateSink for MockStateSink {
    async fn update(&self, phase: SessionPhase) -> Result<(), StateError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_on.contains(&phase) {
            return Err(StateError::Unavailable(format!("rejected {phase}")));
        }
        inner.phases.push(phase);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_phases_in_order() {
        let sink = MockStateSink::new();

        sink.update(SessionPhase::Starting).await.unwrap();
        sink.update(SessionPhase::Scanning).await.unwrap();

        assert_eq!(
            sink.phases(),
            vec![SessionPhase::Starting, SessionPhase::Scanning]
        );
        assert_eq!(sink.last(), Some(SessionPhase::Scanning));
    }

    #[tokio::test]
    async fn fail_on_rejects_phase() {
        let sink = MockStateSink::new();
        sink.fail_on(SessionPhase::Scanning);

        assert!(sink.update(SessionPhase::Starting).await.is_ok());
        let err = sink.update(SessionPhase::Scanning).await.unwrap_err();

        assert!(matches!(err, StateError::Unavailable(_)));
        assert_eq!(sink.phases(), vec![SessionPhase::Starting]);
    }
}
