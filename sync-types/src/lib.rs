//! # sync-types
//!
//! Shared types for devsync, the remote workspace synchronization orchestrator.
//!
//! This crate provides the foundational types used across all devsync crates:
//! - [`SessionConfig`], [`SessionPorts`] - Immutable description of a sync session
//! - [`SyncMode`], [`Endpoint`] - Direction of replication and agent endpoints
//! - [`SessionId`], [`RemoteUnit`] - Identity of a session and of the remote container
//! - [`ProgressSample`] - A single completion percentage reported by the agent
//! - [`AgentError`] - Errors surfaced by the remote sync agent

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod ids;
mod progress;
mod session;

pub use error::{AgentError, InvalidProgress, SessionConfigError};
pub use ids::{RemoteUnit, SessionId};
pub use progress::ProgressSample;
pub use session::{Endpoint, SessionConfig, SessionPorts, SyncMode};
