//! Remote sync agent abstraction.
//!
//! This module provides the seam between the orchestrator and the
//! externally-managed sync agent (a local instance plus one inside the
//! remote unit, talking to each other over forwarded ports).
//!
//! # Design
//!
//! The agent's wire protocol is opaque. The orchestrator only relies on
//! these verbs and on the externally observable failure signals in
//! [`AgentError`]:
//! - `run()` / `restart()` / `terminate()` manage the process lifecycle
//! - `ping()` is a single liveness check; the bounded wait lives in
//!   [`ReachabilityProbe`](crate::ReachabilityProbe)
//! - `reset_database()`, `wait_for_scanning()`, `wait_for_completion()`
//!   drive the initial convergence
//! - `update_config()` switches the replication mode in place
//! - `monitor()` / `monitor_status()` resolve when the agent is lost
//!
//! Cancellation is handled by the caller, which races every call against its
//! `CancellationToken` and drops the future on cancellation.

mod mock;

pub use mock::{AgentCall, AgentOp, MockAgent};

use async_trait::async_trait;
use devsync_types::{AgentError, Endpoint, ProgressSample, SyncMode};
use tokio::sync::mpsc;

/// Producer half of the progress channel.
///
/// Unbounded so that a slow renderer never stalls the completion wait.
pub type ProgressSender = mpsc::UnboundedSender<ProgressSample>;

/// Lifecycle and status verbs of the remote sync agent.
#[async_trait]
pub trait RemoteAgent: Send + Sync {
    /// Launch the agent.
    ///
    /// Returns once the launch is accepted, not once the agent is ready.
    async fn run(&self) -> Result<(), AgentError>;

    /// Stop and relaunch the agent, keeping its configuration.
    async fn restart(&self) -> Result<(), AgentError>;

    /// Stop the agent for good.
    async fn terminate(&self) -> Result<(), AgentError>;

    /// Persist a new replication mode without a full restart.
    ///
    /// Fails with [`AgentError::Rejected`] if the agent refuses it.
    async fn update_config(&self, mode: SyncMode, ignore_deletes: bool) -> Result<(), AgentError>;

    /// Push the ignore-pattern file to both instances.
    async fn send_ignore_rules(&self) -> Result<(), AgentError>;

    /// Single liveness check of one endpoint.
    async fn ping(&self, endpoint: Endpoint) -> Result<(), AgentError>;

    /// Clear the agent's index (`dry_run = false`) or the local
    /// bookkeeping about it (`dry_run = true`).
    async fn reset_database(&self, dry_run: bool) -> Result<(), AgentError>;

    /// Block until the initial scan of one side has finished.
    async fn wait_for_scanning(&self, endpoint: Endpoint) -> Result<(), AgentError>;

    /// Block until the agent reports zero outstanding work.
    ///
    /// Streams completion samples meanwhile. The sender is consumed so the
    /// channel closes when this call returns.
    async fn wait_for_completion(&self, progress: ProgressSender) -> Result<(), AgentError>;

    /// Watch the connection between the instances.
    ///
    /// Resolves with the cause once the agent becomes unreachable.
    async fn monitor(&self) -> AgentError;

    /// Watch the agent's folder status.
    ///
    /// Resolves with the cause once the agent reports an unrecoverable status.
    async fn monitor_status(&self) -> AgentError;
}
