//! Session description: ports, workspace, replication mode.

use crate::error::SessionConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// The four ports a session uses on the local host.
///
/// GUI ports carry the control API of each agent instance, sync ports carry
/// the replication traffic. Remote ports are local ends of port forwards into
/// the remote unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionPorts {
    /// Control API of the local agent.
    pub local_gui: u16,
    /// Replication port of the local agent.
    pub local_sync: u16,
    /// Forwarded control API of the remote agent.
    pub remote_gui: u16,
    /// Forwarded replication port of the remote agent.
    pub remote_sync: u16,
}

impl SessionPorts {
    /// All ports with their role names, in a fixed order.
    pub fn named(&self) -> [(&'static str, u16); 4] {
        [
            ("local GUI", self.local_gui),
            ("local sync", self.local_sync),
            ("remote GUI", self.remote_gui),
            ("remote sync", self.remote_sync),
        ]
    }

    /// Check that every port is assigned and no port is used twice.
    pub fn validate(&self) -> Result<(), SessionConfigError> {
        let named = self.named();
        for (i, &(name, port)) in named.iter().enumerate() {
            if port == 0 {
                return Err(SessionConfigError::UnassignedPort { name });
            }
            if let Some(&(first, _)) = named[..i].iter().find(|&&(_, p)| p == port) {
                return Err(SessionConfigError::DuplicatePort {
                    port,
                    first,
                    second: name,
                });
            }
        }
        Ok(())
    }
}

/// Immutable description of a sync session.
///
/// Created once per "bring workspace online" operation and never mutated;
/// the runtime mode lives in the orchestrator's session state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    ports: SessionPorts,
    workspace_root: PathBuf,
    persistent_volume: bool,
}

impl SessionConfig {
    /// Create and validate a session configuration.
    pub fn new(
        ports: SessionPorts,
        workspace_root: impl Into<PathBuf>,
        persistent_volume: bool,
    ) -> Result<Self, SessionConfigError> {
        let workspace_root = workspace_root.into();
        if workspace_root.as_os_str().is_empty() {
            return Err(SessionConfigError::EmptyWorkspaceRoot);
        }
        ports.validate()?;
        Ok(Self {
            ports,
            workspace_root,
            persistent_volume,
        })
    }

    /// Ports assigned to this session.
    pub fn ports(&self) -> SessionPorts {
        self.ports
    }

    /// Local directory being mirrored.
    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    /// Whether the remote side keeps its files on a durable volume.
    ///
    /// With a durable volume the reverse-direction initial scan is skipped.
    pub fn persistent_volume(&self) -> bool {
        self.persistent_volume
    }
}

/// Direction of replication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// Mirror to remote: local changes propagate, remote deletions are ignored.
    #[default]
    SendOnly,
    /// Two-directional replication with deletion propagation.
    SendReceive,
}

impl SyncMode {
    /// Name used by the agent's folder configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SendOnly => "sendonly",
            Self::SendReceive => "sendreceive",
        }
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which agent instance an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endpoint {
    /// The agent running on the developer's machine.
    Local,
    /// The agent running inside the remote unit.
    Remote,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::Remote => f.write_str("remote"),
        }
    }
}
