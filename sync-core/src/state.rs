//! Session phase state machine for devsync.
//!
//! This module provides a pure, side-effect-free state machine for the
//! lifecycle of a sync session. The state machine takes events as input and
//! produces a new phase plus a list of actions to execute.
//!
//! The actual I/O (agent calls, state file writes) is performed by
//! sync-client, not by this module.
//!
//! ```text
//! Idle ─► Starting ─┬─────────────► Scanning ─► Synchronizing ─► Monitoring
//!                   └─► Resetting ─┘
//!   (any active phase) ─► Failed | Stopped
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Session phase - NO I/O, just transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionPhase {
    /// Created, nothing launched yet.
    #[default]
    Idle,
    /// Agent launching and being probed.
    Starting,
    /// Agent index being cleared.
    Resetting,
    /// Waiting for the initial scans.
    Scanning,
    /// Initial bulk transfer in progress.
    Synchronizing,
    /// Bidirectional and watched by background monitors.
    Monitoring,
    /// Start sequence aborted.
    Failed,
    /// Explicitly stopped.
    Stopped,
}

impl SessionPhase {
    /// Create a new state machine in the Idle phase.
    pub fn new() -> Self {
        Self::Idle
    }

    /// Process an event and return the new phase plus actions to execute.
    ///
    /// This is a pure function - no side effects. The caller (sync-client)
    /// is responsible for executing the returned actions.
    pub fn on_event(self, event: Event) -> (Self, Vec<Action>) {
        match (self, event) {
            // Entry (also re-entry after a failure or stop)
            (Self::Idle | Self::Failed | Self::Stopped, Event::StartRequested) => {
                enter(Self::Starting)
            }

            // From Starting
            (Self::Starting, Event::AgentReachable { reset_requested }) => {
                if reset_requested {
                    enter(Self::Resetting)
                } else {
                    enter(Self::Scanning)
                }
            }

            // From Resetting
            (Self::Resetting, Event::ResetCompleted) => enter(Self::Scanning),

            // From Scanning
            (Self::Scanning, Event::ScanCompleted) => enter(Self::Synchronizing),

            // From Synchronizing
            (Self::Synchronizing, Event::SyncCompleted) => enter(Self::Monitoring),

            // Failure of any active phase
            (state, Event::Failed { .. }) if state.is_active() => (
                Self::Failed,
                vec![Action::StopMonitors, Action::Persist(Self::Failed)],
            ),

            // Explicit stop
            (state, Event::StopRequested) if state.is_active() || state == Self::Failed => (
                Self::Stopped,
                vec![Action::StopMonitors, Action::Persist(Self::Stopped)],
            ),

            // Invalid transitions - stay in current phase
            (state, _) => (state, vec![]),
        }
    }

    /// Whether the session is somewhere between launch and stop.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            Self::Starting
                | Self::Resetting
                | Self::Scanning
                | Self::Synchronizing
                | Self::Monitoring
        )
    }

    /// Whether the start sequence has reached steady state.
    pub fn is_steady(&self) -> bool {
        matches!(self, Self::Monitoring)
    }

    /// Name persisted to the state file.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::Resetting => "resetting",
            Self::Scanning => "scanning",
            Self::Synchronizing => "synchronizing",
            Self::Monitoring => "monitoring",
            Self::Failed => "failed",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn enter(phase: SessionPhase) -> (SessionPhase, Vec<Action>) {
    (phase, vec![Action::Persist(phase)])
}

/// Events that can occur in the session lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Caller asked to bring the session online.
    StartRequested,
    /// Both endpoints answered the first reachability probes.
    AgentReachable {
        /// Whether an index reset was requested for this start.
        reset_requested: bool,
    },
    /// Both database resets succeeded and the endpoints answered again.
    ResetCompleted,
    /// The initial scans finished.
    ScanCompleted,
    /// The agent reported zero outstanding work and the session was promoted.
    SyncCompleted,
    /// The start sequence failed.
    Failed {
        /// Human-readable cause, for logs.
        reason: String,
    },
    /// Caller asked to stop the session.
    StopRequested,
}

/// Actions to be executed by sync-client.
///
/// These are instructions, not side effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Write the new phase to the session state sink.
    Persist(SessionPhase),
    /// Cancel and join the background monitors, if any.
    StopMonitors,
}
