//! SyncOrchestrator - brings a sync session online.
//!
//! # Architecture
//!
//! The orchestrator feeds events to the pure phase machine in sync-core and
//! interprets the actions it returns. All I/O goes through three seams:
//!
//! ```text
//! SyncOrchestrator ─┬─► RemoteAgent   (launch, probe, scan, transfer, promote)
//!        │          ├─► PodLifecycle  (recreate the remote unit)
//!        │          └─► StateSink     (one record per phase transition)
//!        ↓
//!   sync-core (SessionPhase, SyncSession, ProgressFilter, FailureSignal)
//! ```
//!
//! # Start sequence
//!
//! 1. `run()` the agent, then probe the local and the remote endpoint.
//! 2. If a reset was requested: reset both databases, re-probe both sides.
//! 3. Push the ignore rules (best-effort).
//! 4. Wait for the local scan, then the remote scan unless the remote keeps
//!    its files on a persistent volume.
//! 5. Wait for completion while streaming progress.
//! 6. Switch to bidirectional mode, spawn the monitors, restart the agent.
//!
//! A remote endpoint that answers neither the first probe nor the remote
//! scan is assumed wedged: the remote unit is destroyed once so that it gets
//! recreated, and the remote endpoint is probed again.

use crate::agent::RemoteAgent;
use crate::config::OrchestratorConfig;
use crate::monitors::{DisconnectHandler, Disconnected, MonitorSet};
use crate::pods::{PodError, PodLifecycle};
use crate::ports::{PortError, PortLease};
use crate::probe::ReachabilityProbe;
use crate::reporter::{ProgressRenderer, ProgressReporter};
use crate::state::{StateError, StateSink};
use devsync_core::{
    Action, Event, FailureSignal, SessionPhase, SyncSession, UserError, RESTART_HINT,
};
use devsync_types::{AgentError, Endpoint, RemoteUnit, SessionConfig, SyncMode};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Headline of a remote failure that is neither a lost connection nor
/// anything the user can fix directly.
const CONNECT_FAILED: &str = "Failed to connect to the synchronization service";

/// Session lifecycle errors.
#[derive(Debug, Error)]
pub enum StartError {
    /// `start` was called on a session that is already running.
    #[error("session is already {0}")]
    AlreadyRunning(SessionPhase),

    /// The agent could not be launched.
    #[error("failed to launch the synchronization service")]
    Launch(#[source] AgentError),

    /// An endpoint did not answer before the probe deadline.
    #[error("{endpoint} synchronization service is not reachable while {phase}")]
    Unreachable {
        /// Phase of the failed probe.
        phase: SessionPhase,
        /// Endpoint that did not answer.
        endpoint: Endpoint,
        /// Probe failure.
        #[source]
        source: AgentError,
    },

    /// Destroying the remote unit failed.
    #[error("failed to recreate {unit}")]
    Recreate {
        /// The unit that could not be destroyed.
        unit: RemoteUnit,
        /// Cluster failure.
        #[source]
        source: PodError,
    },

    /// The agent is gone and recreating the remote unit did not help.
    #[error("lost connection to the synchronization service while {phase}")]
    LostConnection {
        /// Phase in which the connection was lost.
        phase: SessionPhase,
    },

    /// A database reset failed.
    #[error("failed to reset the synchronization database")]
    Reset {
        /// Which of the two resets failed.
        dry_run: bool,
        /// Agent failure.
        #[source]
        source: AgentError,
    },

    /// The initial scan of one side failed.
    #[error("initial {endpoint} scan failed")]
    Scan {
        /// Side that failed to scan.
        endpoint: Endpoint,
        /// Agent failure.
        #[source]
        source: AgentError,
    },

    /// The remote side ran out of disk space.
    #[error(transparent)]
    InsufficientSpace(UserError),

    /// Any other failure, with remediation guidance.
    #[error(transparent)]
    Sync(UserError),

    /// The agent refused the bidirectional configuration.
    #[error("failed to switch the synchronization to {mode}")]
    ConfigRejected {
        /// Mode that was refused.
        mode: SyncMode,
        /// Agent failure.
        #[source]
        source: AgentError,
    },

    /// The agent could not be restarted after promotion.
    #[error("failed to restart the synchronization service")]
    Restart(#[source] AgentError),

    /// The agent could not be stopped.
    #[error("failed to stop the synchronization service")]
    Terminate(#[source] AgentError),

    /// A phase transition could not be recorded.
    #[error("failed to record the {phase} phase")]
    StateFile {
        /// Phase being recorded.
        phase: SessionPhase,
        /// Sink failure.
        #[source]
        source: StateError,
    },

    /// The caller cancelled the session.
    #[error("cancelled while {phase}")]
    Cancelled {
        /// Phase at cancellation.
        phase: SessionPhase,
    },
}

impl StartError {
    /// Remediation guidance for the user, if any.
    pub fn hint(&self) -> Option<&str> {
        match self {
            Self::InsufficientSpace(e) | Self::Sync(e) if !e.hint().is_empty() => Some(e.hint()),
            _ => None,
        }
    }
}

/// Drives one sync session from launch to steady state.
pub struct SyncOrchestrator<A, P, S> {
    agent: Arc<A>,
    pods: P,
    state: S,
    config: SessionConfig,
    unit: RemoteUnit,
    settings: OrchestratorConfig,
    probe: ReachabilityProbe,
    session: SyncSession,
    cancel: CancellationToken,
    monitors: Option<MonitorSet>,
    on_disconnect: DisconnectHandler,
    launched: bool,
    lease: Option<PortLease>,
}

impl<A, P, S> SyncOrchestrator<A, P, S>
where
    A: RemoteAgent + 'static,
    P: PodLifecycle,
    S: StateSink,
{
    /// Create an orchestrator with default settings and no reset.
    pub fn new(
        agent: Arc<A>,
        pods: P,
        state: S,
        config: SessionConfig,
        unit: RemoteUnit,
    ) -> Self {
        let settings = OrchestratorConfig::default();
        Self {
            agent,
            pods,
            state,
            config,
            unit,
            probe: ReachabilityProbe::from_config(&settings.probe),
            settings,
            session: SyncSession::new(false),
            cancel: CancellationToken::new(),
            monitors: None,
            // Monitors log the loss themselves.
            on_disconnect: Arc::new(|_: Disconnected| {}),
            launched: false,
            lease: None,
        }
    }

    /// Use the given probe and progress settings.
    pub fn with_settings(mut self, settings: OrchestratorConfig) -> Self {
        self.probe = ReachabilityProbe::from_config(&settings.probe);
        self.settings = settings;
        self
    }

    /// Request an index reset on the next start.
    pub fn with_reset(mut self, reset: bool) -> Self {
        self.session = SyncSession::new(reset);
        self
    }

    /// Tie the session to an external cancellation token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Hold `lease` for as long as the orchestrator lives.
    ///
    /// Fails if a session port is not part of the lease.
    pub fn with_port_lease(mut self, lease: PortLease) -> Result<Self, PortError> {
        lease.covers(&self.config)?;
        self.lease = Some(lease);
        Ok(self)
    }

    /// Call `handler` when a monitor loses the agent.
    pub fn with_disconnect_handler(mut self, handler: DisconnectHandler) -> Self {
        self.on_disconnect = handler;
        self
    }

    /// Runtime state of the session.
    pub fn session(&self) -> &SyncSession {
        &self.session
    }

    /// Current phase.
    pub fn phase(&self) -> SessionPhase {
        self.session.phase()
    }

    /// Immutable session description.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Get a reference to the agent (for testing).
    pub fn agent(&self) -> &A {
        &self.agent
    }

    /// Get a reference to the pod lifecycle (for testing).
    pub fn pods(&self) -> &P {
        &self.pods
    }

    /// Get a reference to the state sink (for testing).
    pub fn state(&self) -> &S {
        &self.state
    }

    /// The port lease held by this session, if any.
    pub fn port_lease(&self) -> Option<&PortLease> {
        self.lease.as_ref()
    }

    /// Token cancelling every pending round trip of this session.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Whether the background monitors are running.
    pub fn monitors_running(&self) -> bool {
        self.monitors.as_ref().is_some_and(MonitorSet::is_running)
    }

    /// Bring the session online.
    ///
    /// On error the session ends in [`SessionPhase::Failed`] with its
    /// monitors stopped. A failed or stopped session can be started again.
    pub async fn start<R: ProgressRenderer>(&mut self, renderer: R) -> Result<(), StartError> {
        let phase = self.session.phase();
        if phase.is_active() {
            return Err(StartError::AlreadyRunning(phase));
        }
        if phase != SessionPhase::Idle {
            // A pending reset survives a failed start.
            let reset = self.session.reset_requested();
            self.session = SyncSession::new(reset);
        }

        match self.run_start(renderer).await {
            Ok(()) => {
                tracing::info!(unit = %self.unit, "Files synchronized");
                Ok(())
            }
            Err(e) => {
                self.fail(&e).await;
                Err(e)
            }
        }
    }

    /// Stop the monitors and the agent.
    ///
    /// Does nothing if the session is not running. The agent is only
    /// terminated if a launch succeeded.
    pub async fn stop(&mut self) -> Result<(), StartError> {
        let phase = self.session.phase();
        let actions = self.session.apply(Event::StopRequested);
        if actions.is_empty() {
            tracing::debug!(%phase, "Session not running, nothing to stop");
            return Ok(());
        }

        let mut outcome = Ok(());
        for action in actions {
            match action {
                Action::StopMonitors => self.stop_monitors().await,
                Action::Persist(phase) => {
                    if let Err(source) = self.state.update(phase).await {
                        tracing::warn!(%phase, error = %source, "Failed to record session state");
                        outcome = Err(StartError::StateFile { phase, source });
                    }
                }
            }
        }

        if self.launched {
            self.call(self.agent.terminate())
                .await
                .map_err(|e| self.cancelled_or(e, StartError::Terminate))?;
            self.launched = false;
        } else {
            tracing::debug!("Agent was never launched, nothing to terminate");
        }
        tracing::info!(unit = %self.unit, "Synchronization stopped");
        outcome
    }

    async fn run_start<R: ProgressRenderer>(&mut self, renderer: R) -> Result<(), StartError> {
        self.transition(Event::StartRequested).await?;
        tracing::info!(
            unit = %self.unit,
            workspace = %self.config.workspace_root().display(),
            ports = ?self.config.ports(),
            "Starting file synchronization"
        );

        self.call(self.agent.run())
            .await
            .map_err(|e| self.cancelled_or(e, StartError::Launch))?;
        self.launched = true;

        let mut recreated = false;
        self.wait_reachable(Endpoint::Local).await?;
        if let Err(err) = self.probe_remote().await {
            self.recover_remote(err, &mut recreated).await?;
        }

        let reset = self.session.reset_requested();
        self.transition(Event::AgentReachable {
            reset_requested: reset,
        })
        .await?;
        if reset {
            self.reset_cycle().await?;
            self.transition(Event::ResetCompleted).await?;
        }

        self.send_ignore_rules().await?;
        self.scan(&mut recreated).await?;
        self.transition(Event::ScanCompleted).await?;

        self.synchronize(renderer).await?;
        self.promote().await?;
        self.transition(Event::SyncCompleted).await
    }

    async fn reset_cycle(&mut self) -> Result<(), StartError> {
        for dry_run in [false, true] {
            self.call(self.agent.reset_database(dry_run))
                .await
                .map_err(|e| self.cancelled_or(e, |source| StartError::Reset { dry_run, source }))?;
        }
        self.wait_reachable(Endpoint::Remote).await?;
        self.wait_reachable(Endpoint::Local).await?;

        self.session.consume_reset();
        tracing::info!("Synchronization database reset");
        Ok(())
    }

    async fn send_ignore_rules(&self) -> Result<(), StartError> {
        match self.call(self.agent.send_ignore_rules()).await {
            Ok(()) => Ok(()),
            Err(AgentError::Cancelled) => Err(self.cancelled()),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to send ignore rules, continuing");
                Ok(())
            }
        }
    }

    async fn scan(&self, recreated: &mut bool) -> Result<(), StartError> {
        self.call(self.agent.wait_for_scanning(Endpoint::Local))
            .await
            .map_err(|e| {
                self.cancelled_or(e, |source| StartError::Scan {
                    endpoint: Endpoint::Local,
                    source,
                })
            })?;

        if self.config.persistent_volume() {
            tracing::debug!("Remote files are on a persistent volume, skipping remote scan");
            return Ok(());
        }

        if let Err(err) = self.call(self.agent.wait_for_scanning(Endpoint::Remote)).await {
            self.recover_remote(err, recreated).await?;
            tracing::info!("Retrying remote scan");
            if let Err(err) = self.call(self.agent.wait_for_scanning(Endpoint::Remote)).await {
                self.recover_remote(err, recreated).await?;
            }
        }
        Ok(())
    }

    async fn synchronize<R: ProgressRenderer>(&self, renderer: R) -> Result<(), StartError> {
        let (progress, reporter) =
            ProgressReporter::spawn(renderer, self.settings.progress.warmup());
        let outcome = self.call(self.agent.wait_for_completion(progress)).await;
        reporter.finish(outcome.is_ok()).await;

        let Err(err) = outcome else {
            return Ok(());
        };
        if err == AgentError::Cancelled {
            return Err(self.cancelled());
        }
        tracing::warn!(error = %err, "Initial synchronization failed");
        Err(match FailureSignal::of(&err) {
            FailureSignal::LostConnection => StartError::LostConnection {
                phase: self.session.phase(),
            },
            FailureSignal::InsufficientSpace => {
                StartError::InsufficientSpace(UserError::insufficient_space(err))
            }
            FailureSignal::Generic => StartError::Sync(UserError::generic(err)),
        })
    }

    async fn promote(&mut self) -> Result<(), StartError> {
        let previous = self.session.promote();
        let (mode, ignore_deletes) = (self.session.mode(), self.session.ignore_deletes());

        if let Err(err) = self.call(self.agent.update_config(mode, ignore_deletes)).await {
            if let Some(previous) = previous {
                self.session.rollback(previous);
            }
            return Err(
                self.cancelled_or(err, |source| StartError::ConfigRejected { mode, source })
            );
        }
        tracing::debug!(%mode, ignore_deletes, "Synchronization mode updated");

        self.monitors = Some(MonitorSet::spawn(
            Arc::clone(&self.agent),
            &self.cancel,
            Arc::clone(&self.on_disconnect),
        ));

        self.call(self.agent.restart())
            .await
            .map_err(|e| self.cancelled_or(e, StartError::Restart))
    }

    /// Decide what a failed remote round trip means.
    ///
    /// A lost connection recreates the remote unit once per start and
    /// re-probes; any other failure is reported with a restart hint.
    async fn recover_remote(
        &self,
        err: AgentError,
        recreated: &mut bool,
    ) -> Result<(), StartError> {
        let phase = self.session.phase();
        match FailureSignal::of(&err) {
            _ if err == AgentError::Cancelled => Err(self.cancelled()),
            FailureSignal::LostConnection if !*recreated => {
                *recreated = true;
                tracing::warn!(
                    unit = %self.unit,
                    %phase,
                    "Remote synchronization service is not responding, recreating the remote unit"
                );
                until_cancelled(&self.cancel, self.pods.destroy(&self.unit))
                    .await
                    .ok_or(StartError::Cancelled { phase })?
                    .map_err(|source| StartError::Recreate {
                        unit: self.unit.clone(),
                        source,
                    })?;

                match self.probe_remote().await {
                    Ok(()) => {
                        tracing::info!(unit = %self.unit, "Remote unit recreated");
                        Ok(())
                    }
                    Err(AgentError::Cancelled) => Err(StartError::Cancelled { phase }),
                    Err(e) => {
                        tracing::error!(error = %e, "Remote unit still unreachable");
                        Err(StartError::LostConnection { phase })
                    }
                }
            }
            FailureSignal::LostConnection => Err(StartError::LostConnection { phase }),
            FailureSignal::InsufficientSpace | FailureSignal::Generic => {
                tracing::warn!(error = %err, %phase, "Remote synchronization service failed");
                Err(StartError::Sync(
                    UserError::new(CONNECT_FAILED)
                        .with_source(err)
                        .with_hint(RESTART_HINT),
                ))
            }
        }
    }

    async fn probe_remote(&self) -> Result<(), AgentError> {
        self.probe
            .wait_for_ping(self.agent.as_ref(), Endpoint::Remote, &self.cancel)
            .await
    }

    /// Probe an endpoint; a failure here is fatal.
    async fn wait_reachable(&self, endpoint: Endpoint) -> Result<(), StartError> {
        self.probe
            .wait_for_ping(self.agent.as_ref(), endpoint, &self.cancel)
            .await
            .map_err(|e| {
                self.cancelled_or(e, |source| StartError::Unreachable {
                    phase: self.session.phase(),
                    endpoint,
                    source,
                })
            })
    }

    async fn transition(&mut self, event: Event) -> Result<(), StartError> {
        for action in self.session.apply(event) {
            self.execute(action).await?;
        }
        Ok(())
    }

    async fn execute(&mut self, action: Action) -> Result<(), StartError> {
        match action {
            Action::Persist(phase) => {
                tracing::info!(%phase, unit = %self.unit, "Session phase changed");
                until_cancelled(&self.cancel, self.state.update(phase))
                    .await
                    .ok_or(StartError::Cancelled { phase })?
                    .map_err(|source| StartError::StateFile { phase, source })
            }
            Action::StopMonitors => {
                self.stop_monitors().await;
                Ok(())
            }
        }
    }

    /// Record the failure. Nothing here can fail the caller any further.
    async fn fail(&mut self, err: &StartError) {
        tracing::error!(phase = %self.session.phase(), error = %err, "Synchronization failed");
        let actions = self.session.apply(Event::Failed {
            reason: err.to_string(),
        });
        for action in actions {
            match action {
                Action::StopMonitors => self.stop_monitors().await,
                Action::Persist(phase) => {
                    if let Err(e) = self.state.update(phase).await {
                        tracing::warn!(%phase, error = %e, "Failed to record session state");
                    }
                }
            }
        }
    }

    async fn stop_monitors(&mut self) {
        if let Some(monitors) = self.monitors.take() {
            monitors.shutdown().await;
            tracing::debug!("Monitors stopped");
        }
    }

    /// Race an agent round trip against cancellation.
    async fn call<T>(
        &self,
        fut: impl Future<Output = Result<T, AgentError>>,
    ) -> Result<T, AgentError> {
        until_cancelled(&self.cancel, fut)
            .await
            .unwrap_or(Err(AgentError::Cancelled))
    }

    fn cancelled(&self) -> StartError {
        StartError::Cancelled {
            phase: self.session.phase(),
        }
    }

    fn cancelled_or(
        &self,
        err: AgentError,
        wrap: impl FnOnce(AgentError) -> StartError,
    ) -> StartError {
        match err {
            AgentError::Cancelled => self.cancelled(),
            other => wrap(other),
        }
    }
}

async fn until_cancelled<F: Future>(cancel: &CancellationToken, fut: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        output = fut => Some(output),
    }
}
