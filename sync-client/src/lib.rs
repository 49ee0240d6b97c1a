//! # sync-client
//!
//! Orchestration of remote workspace synchronization sessions.
//!
//! This is the library a CLI uses to bring a workspace online: it launches
//! the remote sync agent, supervises it through the start sequence and
//! promotes the session to bidirectional sync.
//!
//! ## Features
//!
//! - **Explicit phases**: driven by the pure state machine in sync-core
//! - **Agent Abstraction**: the sync agent, the remote unit lifecycle and the
//!   session state sink are traits with mock implementations
//! - **Cancellation**: every agent round trip honors a `CancellationToken`
//! - **Supervised monitors**: background watchdogs stop with the session
//!
//! ## Example
//!
//! ```ignore
//! use devsync_client::{MockAgent, MockPods, MockStateSink, SyncOrchestrator};
//!
//! let agent = Arc::new(MockAgent::new());
//! let mut orchestrator =
//!     SyncOrchestrator::new(agent, MockPods::new(), MockStateSink::new(), config, unit);
//!
//! orchestrator.start(LogRenderer).await?;
//! assert!(orchestrator.phase().is_steady());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod agent;
pub mod config;
pub mod monitors;
pub mod orchestrator;
pub mod pods;
pub mod ports;
pub mod probe;
pub mod reporter;
pub mod state;

pub use agent::{AgentCall, AgentOp, MockAgent, ProgressSender, RemoteAgent};
pub use config::{ConfigError, OrchestratorConfig, ProbeConfig, ProgressConfig};
pub use monitors::{DisconnectHandler, Disconnected, MonitorKind, MonitorSet};
pub use orchestrator::{StartError, SyncOrchestrator};
pub use pods::{MockPods, PodError, PodLifecycle};
pub use ports::{PortError, PortLease, PortRegistry};
pub use probe::ReachabilityProbe;
pub use reporter::{LogRenderer, ProgressRenderer, ProgressReporter};
pub use state::{FileStateSink, MockStateSink, StateError, StateRecord, StateSink};
