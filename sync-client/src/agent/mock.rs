//! Mock agent for testing.
//!
//! Records every call, lets tests inject failures or hangs per operation,
//! replays progress samples and simulates a disconnect after steady state.

use super::{ProgressSender, RemoteAgent};
use async_trait::async_trait;
use devsync_types::{AgentError, Endpoint, ProgressSample, SyncMode};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

/// Operations whose outcome can be scripted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentOp {
    /// `run()`
    Run,
    /// `restart()`
    Restart,
    /// `terminate()`
    Terminate,
    /// `update_config()`
    UpdateConfig,
    /// `send_ignore_rules()`
    SendIgnoreRules,
    /// `ping(endpoint)`
    Ping(Endpoint),
    /// `reset_database(dry_run)`
    ResetDatabase {
        /// Which of the two resets.
        dry_run: bool,
    },
    /// `wait_for_scanning(endpoint)`
    WaitForScanning(Endpoint),
    /// `wait_for_completion()`
    WaitForCompletion,
}

/// A recorded call, with its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentCall {
    /// `run()`
    Run,
    /// `restart()`
    Restart,
    /// `terminate()`
    Terminate,
    /// `update_config()`
    UpdateConfig {
        /// Requested mode.
        mode: SyncMode,
        /// Requested ignore-deletes flag.
        ignore_deletes: bool,
    },
    /// `send_ignore_rules()`
    SendIgnoreRules,
    /// `ping(endpoint)`
    Ping(Endpoint),
    /// `reset_database(dry_run)`
    ResetDatabase {
        /// Which of the two resets.
        dry_run: bool,
    },
    /// `wait_for_scanning(endpoint)`
    WaitForScanning(Endpoint),
    /// `wait_for_completion()`
    WaitForCompletion,
    /// `monitor()`
    Monitor,
    /// `monitor_status()`
    MonitorStatus,
}

impl AgentCall {
    /// The scriptable operation this call belongs to, if any.
    pub fn op(&self) -> Option<AgentOp> {
        match self {
            Self::Run => Some(AgentOp::Run),
            Self::Restart => Some(AgentOp::Restart),
            Self::Terminate => Some(AgentOp::Terminate),
            Self::UpdateConfig { .. } => Some(AgentOp::UpdateConfig),
            Self::SendIgnoreRules => Some(AgentOp::SendIgnoreRules),
            Self::Ping(endpoint) => Some(AgentOp::Ping(*endpoint)),
            Self::ResetDatabase { dry_run } => Some(AgentOp::ResetDatabase { dry_run: *dry_run }),
            Self::WaitForScanning(endpoint) => Some(AgentOp::WaitForScanning(*endpoint)),
            Self::WaitForCompletion => Some(AgentOp::WaitForCompletion),
            Self::Monitor | Self::MonitorStatus => None,
        }
    }
}

/// Mock agent for testing.
///
/// Clones share state, so a test can keep one handle while the orchestrator
/// owns another.
#[derive(Debug, Clone)]
pub struct MockAgent {
    inner: Arc<Mutex<MockAgentInner>>,
    lost: Arc<watch::Sender<Option<AgentError>>>,
}

#[derive(Debug, Default)]
struct MockAgentInner {
    calls: Vec<AgentCall>,
    fail_next: HashMap<AgentOp, VecDeque<AgentError>>,
    fail_always: HashMap<AgentOp, AgentError>,
    fail_after: HashMap<AgentOp, (usize, AgentError)>,
    hang: HashSet<AgentOp>,
    progress: Vec<f64>,
}

impl MockAgent {
    /// Create a mock agent where every operation succeeds.
    pub fn new() -> Self {
        let (lost, _) = watch::channel(None);
        Self {
            inner: Arc::new(Mutex::new(MockAgentInner::default())),
            lost: Arc::new(lost),
        }
    }

    /// Cause the next call of `op` to fail with `error`.
    ///
    /// Repeated calls queue up; each failure is used once.
    pub fn fail_next(&self, op: AgentOp, error: AgentError) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next.entry(op).or_default().push_back(error);
    }

    /// Cause every call of `op` to fail with `error` (after queued failures).
    pub fn fail_always(&self, op: AgentOp, error: AgentError) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_always.insert(op, error);
    }

    /// Let the first `successes` calls of `op` succeed, then fail every
    /// later one with `error`.
    pub fn fail_after(&self, op: AgentOp, successes: usize, error: AgentError) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_after.insert(op, (successes, error));
    }

    /// Make every call of `op` block until its future is dropped.
    ///
    /// `wait_for_completion()` still streams its samples first.
    pub fn hang(&self, op: AgentOp) {
        let mut inner = self.inner.lock().unwrap();
        inner.hang.insert(op);
    }

    /// Remove all scripted failures and hangs of `op`.
    pub fn heal(&self, op: AgentOp) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next.remove(&op);
        inner.fail_always.remove(&op);
        inner.fail_after.remove(&op);
        inner.hang.remove(&op);
    }

    /// Samples streamed by the next `wait_for_completion()` calls.
    pub fn queue_progress(&self, samples: &[f64]) {
        let mut inner = self.inner.lock().unwrap();
        inner.progress = samples.to_vec();
    }

    /// Make both monitors resolve with `error`.
    pub fn disconnect(&self, error: AgentError) {
        self.lost.send_replace(Some(error));
    }

    /// All calls so far, in order.
    pub fn calls(&self) -> Vec<AgentCall> {
        let inner = self.inner.lock().unwrap();
        inner.calls.clone()
    }

    /// Number of calls of `op` so far.
    pub fn count(&self, op: AgentOp) -> usize {
        let inner = self.inner.lock().unwrap();
        inner
            .calls
            .iter()
            .filter(|call| call.op() == Some(op))
            .count()
    }

    /// Clear all state (calls, scripted failures, progress, disconnect).
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        *inner = MockAgentInner::default();
        self.lost.send_replace(None);
    }

    fn record(&self, call: AgentCall) -> Result<(), AgentError> {
        let mut inner = self.inner.lock().unwrap();
        let op = call.op();
        inner.calls.push(call);

        let Some(op) = op else {
            return Ok(());
        };
        if let Some(error) = inner.fail_next.get_mut(&op).and_then(VecDeque::pop_front) {
            return Err(error);
        }
        if let Some(error) = inner.fail_always.get(&op) {
            return Err(error.clone());
        }
        if let Some((successes, error)) = inner.fail_after.get(&op) {
            let made = inner
                .calls
                .iter()
                .filter(|call| call.op() == Some(op))
                .count();
            if made > *successes {
                return Err(error.clone());
            }
        }
        Ok(())
    }

    fn hangs(&self, op: AgentOp) -> bool {
        self.inner.lock().unwrap().hang.contains(&op)
    }

    async fn respond(&self, call: AgentCall) -> Result<(), AgentError> {
        let hang = call.op().is_some_and(|op| self.hangs(op));
        let outcome = self.record(call);
        if hang {
            std::future::pending::<()>().await;
        }
        outcome
    }

    async fn wait_until_lost(&self, call: AgentCall) -> AgentError {
        self.inner.lock().unwrap().calls.push(call);

        let mut rx = self.lost.subscribe();
        loop {
            let current = rx.borrow_and_update().clone();
            if let Some(error) = current {
                return error;
            }
            if rx.changed().await.is_err() {
                return AgentError::LostConnection;
            }
        }
    }
}

impl Default for MockAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteAgent for MockAgent {
    async fn run(&self) -> Result<(), AgentError> {
        self.respond(AgentCall::Run).await
    }

    async fn restart(&self) -> Result<(), AgentError> {
        self.respond(AgentCall::Restart).await
    }

    async fn terminate(&self) -> Result<(), AgentError> {
        self.respond(AgentCall::Terminate).await
    }

    async fn update_config(&self, mode: SyncMode, ignore_deletes: bool) -> Result<(), AgentError> {
        self.respond(AgentCall::UpdateConfig {
            mode,
            ignore_deletes,
        })
        .await
    }

    async fn send_ignore_rules(&self) -> Result<(), AgentError> {
        self.respond(AgentCall::SendIgnoreRules).await
    }

    async fn ping(&self, endpoint: Endpoint) -> Result<(), AgentError> {
        self.respond(AgentCall::Ping(endpoint)).await
    }

    async fn reset_database(&self, dry_run: bool) -> Result<(), AgentError> {
        self.respond(AgentCall::ResetDatabase { dry_run }).await
    }

    async fn wait_for_scanning(&self, endpoint: Endpoint) -> Result<(), AgentError> {
        self.respond(AgentCall::WaitForScanning(endpoint)).await
    }

    async fn wait_for_completion(&self, progress: ProgressSender) -> Result<(), AgentError> {
        let hang = self.hangs(AgentOp::WaitForCompletion);
        let outcome = self.record(AgentCall::WaitForCompletion);
        let samples = self.inner.lock().unwrap().progress.clone();

        // Samples go out before the outcome, like an agent dying mid-transfer.
        for sample in samples.into_iter().filter_map(ProgressSample::new) {
            if progress.send(sample).is_err() {
                break;
            }
        }
        if hang {
            std::future::pending::<()>().await;
        }
        outcome
    }

    async fn monitor(&self) -> AgentError {
        self.wait_until_lost(AgentCall::Monitor).await
    }

    async fn monitor_status(&self) -> AgentError {
        self.wait_until_lost(AgentCall::MonitorStatus).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::mpsc;

    // ===========================================
    // Recording Tests
    // ===========================================

    #[tokio::test]
    async fn mock_agent_records_calls_in_order() {
        let agent = MockAgent::new();

        agent.run().await.unwrap();
        agent.ping(Endpoint::Local).await.unwrap();
        agent.update_config(SyncMode::SendReceive, false).await.unwrap();

        assert_eq!(
            agent.calls(),
            vec![
                AgentCall::Run,
                AgentCall::Ping(Endpoint::Local),
                AgentCall::UpdateConfig {
                    mode: SyncMode::SendReceive,
                    ignore_deletes: false,
                },
            ]
        );
        assert_eq!(agent.count(AgentOp::Ping(Endpoint::Local)), 1);
        assert_eq!(agent.count(AgentOp::Ping(Endpoint::Remote)), 0);
    }

    #[tokio::test]
    async fn mock_agent_clone_shares_state() {
        let agent1 = MockAgent::new();
        let agent2 = agent1.clone();

        agent1.run().await.unwrap();
        agent2.restart().await.unwrap();

        assert_eq!(agent1.calls().len(), 2);
    }

    // ===========================================
    // Failure Injection Tests
    // ===========================================

    #[tokio::test]
    async fn fail_next_is_used_once() {
        let agent = MockAgent::new();
        agent.fail_next(AgentOp::Restart, AgentError::Other("busy".into()));

        assert!(agent.restart().await.is_err());
        assert!(agent.restart().await.is_ok());
    }

    #[tokio::test]
    async fn fail_next_queues_in_order() {
        let agent = MockAgent::new();
        let op = AgentOp::Ping(Endpoint::Remote);
        agent.fail_next(op, AgentError::LostConnection);
        agent.fail_next(op, AgentError::Other("refused".into()));

        assert_eq!(
            agent.ping(Endpoint::Remote).await,
            Err(AgentError::LostConnection)
        );
        assert_eq!(
            agent.ping(Endpoint::Remote).await,
            Err(AgentError::Other("refused".into()))
        );
        assert_eq!(agent.ping(Endpoint::Remote).await, Ok(()));
    }

    #[tokio::test]
    async fn fail_always_until_healed() {
        let agent = MockAgent::new();
        let op = AgentOp::ResetDatabase { dry_run: true };
        agent.fail_always(op, AgentError::Other("locked".into()));

        assert!(agent.reset_database(true).await.is_err());
        assert!(agent.reset_database(true).await.is_err());
        assert!(agent.reset_database(false).await.is_ok());

        agent.heal(op);
        assert!(agent.reset_database(true).await.is_ok());
    }

    #[tokio::test]
    async fn fail_after_lets_first_calls_through() {
        let agent = MockAgent::new();
        let op = AgentOp::Ping(Endpoint::Remote);
        agent.fail_after(op, 1, AgentError::Other("refused".into()));

        assert_eq!(agent.ping(Endpoint::Remote).await, Ok(()));
        assert!(agent.ping(Endpoint::Remote).await.is_err());
        assert!(agent.ping(Endpoint::Remote).await.is_err());
        assert_eq!(agent.ping(Endpoint::Local).await, Ok(()));
    }

    #[tokio::test]
    async fn hang_blocks_until_healed() {
        let agent = MockAgent::new();
        agent.hang(AgentOp::Restart);

        let blocked = tokio::time::timeout(Duration::from_millis(20), agent.restart()).await;
        assert!(blocked.is_err());
        assert_eq!(agent.count(AgentOp::Restart), 1);

        agent.heal(AgentOp::Restart);
        assert!(agent.restart().await.is_ok());
    }

    // ===========================================
    // Progress and Monitor Tests
    // ===========================================

    #[tokio::test]
    async fn completion_streams_queued_samples() {
        let agent = MockAgent::new();
        agent.queue_progress(&[12.0, f64::NAN, 80.0]);
        let (tx, mut rx) = mpsc::unbounded_channel();

        agent.wait_for_completion(tx).await.unwrap();

        let mut received = Vec::new();
        while let Some(sample) = rx.recv().await {
            received.push(sample.percent());
        }
        assert_eq!(received, vec![12.0, 80.0]);
    }

    #[tokio::test]
    async fn completion_failure_after_samples() {
        let agent = MockAgent::new();
        agent.queue_progress(&[30.0]);
        agent.fail_next(AgentOp::WaitForCompletion, AgentError::LostConnection);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let result = agent.wait_for_completion(tx).await;

        assert_eq!(result, Err(AgentError::LostConnection));
        assert_eq!(rx.recv().await.map(|s| s.percent()), Some(30.0));
    }

    #[tokio::test]
    async fn monitor_resolves_on_disconnect() {
        let agent = MockAgent::new();
        let watcher = agent.clone();
        let handle = tokio::spawn(async move { watcher.monitor().await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!handle.is_finished());

        agent.disconnect(AgentError::LostConnection);
        let error = handle.await.unwrap();
        assert_eq!(error, AgentError::LostConnection);
        assert_eq!(agent.calls(), vec![AgentCall::Monitor]);
    }

    #[tokio::test]
    async fn reset_clears_all() {
        let agent = MockAgent::new();
        agent.run().await.unwrap();
        agent.fail_always(AgentOp::Run, AgentError::Launch("no binary".into()));
        agent.disconnect(AgentError::LostConnection);

        agent.reset();

        assert!(agent.calls().is_empty());
        assert!(agent.run().await.is_ok());
    }
}
