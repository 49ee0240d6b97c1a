//! # sync-core
//!
//! Pure logic for devsync (no I/O, instant tests).
//!
//! This crate implements the session state machine, the progress low-pass
//! filter and the failure classifier without any network, process or disk
//! I/O, enabling fast unit tests.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. This enables:
//! - Instant unit tests (no mocks, no async)
//! - Deterministic behavior (same input → same output)
//! - Easy reasoning about phase transitions
//!
//! The actual I/O (agent calls, state file writes, pod deletion) is performed
//! by `sync-client`, which interprets the actions produced here.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod classify;
pub mod progress;
pub mod session;
pub mod state;

pub use classify::{FailureSignal, UserError, INSUFFICIENT_SPACE_HINT, RESTART_HINT};
pub use progress::ProgressFilter;
pub use session::SyncSession;
pub use state::{Action, Event, SessionPhase};
