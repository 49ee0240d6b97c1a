//! Background watchdogs of a running session.
//!
//! Once the session is bidirectional, two tasks watch the agent: one for the
//! connection between the instances, one for the folder status. Each reports
//! through the disconnect handler when the agent is lost.
//!
//! The tasks run under a child of the session's cancellation token, so they
//! stop when the session is cancelled, when [`MonitorSet::shutdown`] is
//! called or when the set is dropped.

use crate::agent::RemoteAgent;
use devsync_types::AgentError;
use std::fmt;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Which watchdog fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MonitorKind {
    /// Connection between the local and remote instances.
    Connection,
    /// Folder status of the agent.
    Status,
}

impl fmt::Display for MonitorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection => f.write_str("connection"),
            Self::Status => f.write_str("status"),
        }
    }
}

/// Notification sent when a monitor loses the agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disconnected {
    /// The monitor that fired.
    pub monitor: MonitorKind,
    /// Why the agent is considered lost.
    pub error: AgentError,
}

/// Callback invoked on disconnect. Called from a background task.
pub type DisconnectHandler = Arc<dyn Fn(Disconnected) + Send + Sync>;

/// The supervised monitor tasks of one session.
#[derive(Debug)]
pub struct MonitorSet {
    token: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl MonitorSet {
    /// Spawn both monitors under a child of `parent`.
    pub fn spawn<A>(
        agent: Arc<A>,
        parent: &CancellationToken,
        on_disconnect: DisconnectHandler,
    ) -> Self
    where
        A: RemoteAgent + 'static,
    {
        let token = parent.child_token();
        let handles = [MonitorKind::Connection, MonitorKind::Status]
            .into_iter()
            .map(|kind| {
                let agent = Arc::clone(&agent);
                let token = token.clone();
                let on_disconnect = Arc::clone(&on_disconnect);
                tokio::spawn(async move {
                    let error = tokio::select! {
                        biased;
                        _ = token.cancelled() => {
                            tracing::debug!(monitor = %kind, "Monitor stopped");
                            return;
                        }
                        error = watch(agent.as_ref(), kind) => error,
                    };
                    tracing::warn!(
                        monitor = %kind,
                        error = %error,
                        "Lost the synchronization service"
                    );
                    on_disconnect(Disconnected {
                        monitor: kind,
                        error,
                    });
                })
            })
            .collect();

        tracing::debug!("Monitors started");
        Self { token, handles }
    }

    /// Whether any monitor task is still running.
    pub fn is_running(&self) -> bool {
        self.handles.iter().any(|handle| !handle.is_finished())
    }

    /// Cancel both monitors and wait for them to exit.
    pub async fn shutdown(mut self) {
        self.token.cancel();
        for handle in std::mem::take(&mut self.handles) {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Monitor task failed");
            }
        }
    }
}

impl Drop for MonitorSet {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

async fn watch<A: RemoteAgent + ?Sized>(agent: &A, kind: MonitorKind) -> AgentError {
    match kind {
        MonitorKind::Connection => agent.monitor().await,
        MonitorKind::Status => agent.monitor_status().await,
    }
}
