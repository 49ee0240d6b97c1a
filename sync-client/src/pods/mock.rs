//! Mock remote unit lifecycle for testing.

use super::{PodError, PodLifecycle};
use async_trait::async_trait;
use devsync_types::RemoteUnit;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Mock pod lifecycle for testing.
///
/// Records destroyed units. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockPods {
    inner: Arc<Mutex<MockPodsInner>>,
}

#[derive(Debug, Default)]
struct MockPodsInner {
    destroyed: Vec<RemoteUnit>,
    fail_next: VecDeque<PodError>,
}

impl MockPods {
    /// Create a mock where every destroy succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cause the next destroy to fail with `error`.
    pub fn fail_next(&self, error: PodError) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next.push_back(error);
    }

    /// Units successfully destroyed so far, in order.
    pub fn destroyed(&self) -> Vec<RemoteUnit> {
        let inner = self.inner.lock().unwrap();
        inner.destroyed.clone()
    }
}

#[async_trait]
impl PodLifecycle for MockPods {
    async fn destroy(&self, unit: &RemoteUnit) -> Result<(), PodError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(error) = inner.fail_next.pop_front() {
            return Err(error);
        }
        inner.destroyed.push(unit.clone());
        Ok(())
    }
}
