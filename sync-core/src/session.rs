//! Mutable runtime state of one sync session.
//!
//! Owned exclusively by the orchestrator. Holds the current phase, the
//! replication mode and the one-shot reset request.

use crate::state::{Action, Event, SessionPhase};
use devsync_types::SyncMode;

/// Runtime state of a sync session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSession {
    phase: SessionPhase,
    mode: SyncMode,
    ignore_deletes: bool,
    reset_requested: bool,
}

impl SyncSession {
    /// A fresh session in mirror mode.
    pub fn new(reset_requested: bool) -> Self {
        Self {
            phase: SessionPhase::Idle,
            mode: SyncMode::SendOnly,
            ignore_deletes: true,
            reset_requested,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Current replication mode.
    pub fn mode(&self) -> SyncMode {
        self.mode
    }

    /// Whether remote deletions are ignored.
    pub fn ignore_deletes(&self) -> bool {
        self.ignore_deletes
    }

    /// Whether an index reset is still pending.
    pub fn reset_requested(&self) -> bool {
        self.reset_requested
    }

    /// Feed an event to the phase machine and return the actions to run.
    pub fn apply(&mut self, event: Event) -> Vec<Action> {
        let (next, actions) = self.phase.on_event(event);
        self.phase = next;
        actions
    }

    /// Clear the reset request after a successful reset-and-reverify cycle.
    ///
    /// Returns whether a request was pending; a second call returns `false`.
    pub fn consume_reset(&mut self) -> bool {
        std::mem::replace(&mut self.reset_requested, false)
    }

    /// Switch to bidirectional replication with deletion propagation.
    ///
    /// Returns the previous `(mode, ignore_deletes)` so the caller can roll
    /// back if the agent rejects the change, or `None` if the session was
    /// already promoted.
    pub fn promote(&mut self) -> Option<(SyncMode, bool)> {
        if self.mode == SyncMode::SendReceive {
            return None;
        }
        let previous = (self.mode, self.ignore_deletes);
        self.mode = SyncMode::SendReceive;
        self.ignore_deletes = false;
        Some(previous)
    }

    /// Undo a promotion the agent refused.
    pub fn rollback(&mut self, previous: (SyncMode, bool)) {
        self.mode = previous.0;
        self.ignore_deletes = previous.1;
    }
}

impl Default for SyncSession {
    fn default() -> Self {
        Self::new(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_in_mirror_mode() {
        let session = SyncSession::new(false);
        assert_eq!(session.phase(), SessionPhase::Idle);
        assert_eq!(session.mode(), SyncMode::SendOnly);
        assert!(session.ignore_deletes());
    }

    #[test]
    fn reset_consumed_once() {
        let mut session = SyncSession::new(true);
        assert!(session.reset_requested());

        assert!(session.consume_reset());
        assert!(!session.consume_reset());
        assert!(!session.reset_requested());
    }

    #[test]
    fn promote_flips_mode_once() {
        let mut session = SyncSession::new(false);

        let previous = session.promote();
        assert_eq!(previous, Some((SyncMode::SendOnly, true)));
        assert_eq!(session.mode(), SyncMode::SendReceive);
        assert!(!session.ignore_deletes());

        assert_eq!(session.promote(), None);
        assert_eq!(session.mode(), SyncMode::SendReceive);
    }

    #[test]
    fn rollback_restores_mirror_mode() {
        let mut session = SyncSession::new(false);
        let previous = session.promote().unwrap();
        session.rollback(previous);

        assert_eq!(session.mode(), SyncMode::SendOnly);
        assert!(session.ignore_deletes());
    }

    #[test]
    fn apply_tracks_phase() {
        let mut session = SyncSession::new(false);
        let actions = session.apply(Event::StartRequested);

        assert_eq!(session.phase(), SessionPhase::Starting);
        assert_eq!(actions, vec![Action::Persist(SessionPhase::Starting)]);
    }
}
