//! Bounded reachability wait.
//!
//! Polls [`RemoteAgent::ping`] until the endpoint answers, the deadline
//! passes or the caller cancels.

use crate::agent::RemoteAgent;
use crate::config::ProbeConfig;
use devsync_types::{AgentError, Endpoint};
use std::time::Duration;
use tokio::time::{sleep_until, timeout_at, Instant};
use tokio_util::sync::CancellationToken;

/// Polls an agent endpoint until it answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReachabilityProbe {
    interval: Duration,
    timeout: Duration,
}

impl ReachabilityProbe {
    /// Create a probe pinging every `interval` for at most `timeout`.
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    /// Create a probe from configuration.
    pub fn from_config(config: &ProbeConfig) -> Self {
        Self::new(config.interval(), config.timeout())
    }

    /// Delay between two pings.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Overall deadline of one wait.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Wait until `endpoint` answers a ping.
    ///
    /// Ping errors before the deadline are retried. Returns
    /// [`AgentError::LostConnection`] once the deadline passes and
    /// [`AgentError::Cancelled`] as soon as `cancel` fires.
    pub async fn wait_for_ping<A: RemoteAgent + ?Sized>(
        &self,
        agent: &A,
        endpoint: Endpoint,
        cancel: &CancellationToken,
    ) -> Result<(), AgentError> {
        let deadline = Instant::now() + self.timeout;
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(AgentError::Cancelled),
                outcome = timeout_at(deadline, agent.ping(endpoint)) => outcome,
            };

            match outcome {
                Ok(Ok(())) => {
                    tracing::debug!(%endpoint, attempts, "Agent answered ping");
                    return Ok(());
                }
                Ok(Err(AgentError::Cancelled)) => return Err(AgentError::Cancelled),
                Ok(Err(e)) => {
                    tracing::debug!(%endpoint, attempts, error = %e, "Agent not reachable yet");
                }
                Err(_) => break,
            }

            let next = (Instant::now() + self.interval).min(deadline);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(AgentError::Cancelled),
                _ = sleep_until(next) => {}
            }
            if Instant::now() >= deadline {
                break;
            }
        }

        tracing::warn!(
            %endpoint,
            attempts,
            timeout_secs = self.timeout.as_secs(),
            "Agent did not answer before the deadline"
        );
        Err(AgentError::LostConnection)
    }
}
