//! Local port allocation.
//!
//! A session needs four distinct free ports on the loopback interface. They
//! are obtained from the OS by binding ephemeral listeners, then leased from a
//! process-wide registry so that two sessions in one process never receive
//! the same port. A lease gives its ports back when dropped.
//!
//! The registry only coordinates sessions of this process. Another process
//! may still bind a port after the probe listeners are closed; the agent
//! then fails to launch and the session reports it.

use devsync_types::{SessionConfig, SessionConfigError, SessionPorts};
use std::collections::HashSet;
use std::path::PathBuf;
use std::net::{Ipv4Addr, TcpListener};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use thiserror::Error;

/// How many times [`PortRegistry::lease`] asks the OS for a fresh set.
const MAX_LEASE_ATTEMPTS: usize = 8;

/// Errors from port allocation.
#[derive(Debug, Error)]
pub enum PortError {
    /// Binding a probe listener failed.
    #[error("failed to allocate a local port: {0}")]
    Io(#[from] std::io::Error),

    /// The port is already leased by another session.
    #[error("port {0} is already in use by another session")]
    InUse(u16),

    /// The requested set is not a valid session port set.
    #[error(transparent)]
    Invalid(#[from] SessionConfigError),

    /// A session port is not covered by the lease handed to it.
    #[error("port {0} is not covered by the session's lease")]
    NotLeased(u16),

    /// The OS kept handing out ports that are already leased.
    #[error("no free ports after {attempts} attempts")]
    Exhausted {
        /// Attempts made.
        attempts: usize,
    },
}

type Leased = Arc<Mutex<HashSet<u16>>>;

/// Registry of ports leased by live sessions.
#[derive(Debug, Clone, Default)]
pub struct PortRegistry {
    leased: Leased,
}

static GLOBAL: OnceLock<PortRegistry> = OnceLock::new();

impl PortRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    pub fn global() -> &'static PortRegistry {
        GLOBAL.get_or_init(PortRegistry::new)
    }

    /// Lease four fresh loopback ports.
    pub fn lease(&self) -> Result<PortLease, PortError> {
        for attempt in 1..=MAX_LEASE_ATTEMPTS {
            let ports = probe_free_ports()?;
            match self.lease_exact(ports) {
                Ok(lease) => {
                    tracing::debug!(?ports, attempt, "Leased session ports");
                    return Ok(lease);
                }
                Err(PortError::InUse(port)) => {
                    tracing::debug!(port, attempt, "OS returned a leased port, retrying");
                }
                Err(e) => return Err(e),
            }
        }
        Err(PortError::Exhausted {
            attempts: MAX_LEASE_ATTEMPTS,
        })
    }

    /// Lease a specific set of ports.
    ///
    /// Fails without leasing anything if one of them is already leased.
    pub fn lease_exact(&self, ports: SessionPorts) -> Result<PortLease, PortError> {
        ports.validate()?;

        let mut leased = lock(&self.leased);
        if let Some(&(_, port)) = ports.named().iter().find(|(_, p)| leased.contains(p)) {
            return Err(PortError::InUse(port));
        }
        for (_, port) in ports.named() {
            leased.insert(port);
        }

        Ok(PortLease {
            ports,
            leased: Arc::clone(&self.leased),
        })
    }

    /// Whether `port` is currently leased.
    pub fn is_leased(&self, port: u16) -> bool {
        lock(&self.leased).contains(&port)
    }
}

/// Ports held by one session. Released on drop.
#[derive(Debug)]
pub struct PortLease {
    ports: SessionPorts,
    leased: Leased,
}

impl PortLease {
    /// The leased ports.
    pub fn ports(&self) -> SessionPorts {
        self.ports
    }

    /// Describe a session using the leased ports.
    pub fn session_config(
        &self,
        workspace_root: impl Into<PathBuf>,
        persistent_volume: bool,
    ) -> Result<SessionConfig, SessionConfigError> {
        SessionConfig::new(self.ports, workspace_root, persistent_volume)
    }

    /// Fail unless every port of `config` belongs to this lease.
    pub fn covers(&self, config: &SessionConfig) -> Result<(), PortError> {
        let leased = self.ports.named();
        match config
            .ports()
            .named()
            .into_iter()
            .find(|(_, port)| !leased.iter().any(|(_, p)| p == port))
        {
            Some((_, port)) => Err(PortError::NotLeased(port)),
            None => Ok(()),
        }
    }
}

impl Drop for PortLease {
    fn drop(&mut self) {
        let mut leased = lock(&self.leased);
        for (_, port) in self.ports.named() {
            leased.remove(&port);
        }
    }
}

// Poisoned locks are recovered; every update is a single insert/remove pass.
fn lock(leased: &Leased) -> MutexGuard<'_, HashSet<u16>> {
    leased.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Ask the OS for four distinct free ports.
///
/// All listeners are held until every port is known, so the OS cannot hand
/// out the same port twice.
fn probe_free_ports() -> std::io::Result<SessionPorts> {
    let listeners = (0..4)
        .map(|_| TcpListener::bind((Ipv4Addr::LOCALHOST, 0)))
        .collect::<std::io::Result<Vec<_>>>()?;
    let ports = listeners
        .iter()
        .map(|l| l.local_addr().map(|addr| addr.port()))
        .collect::<std::io::Result<Vec<_>>>()?;

    Ok(SessionPorts {
        local_gui: ports[0],
        local_sync: ports[1],
        remote_gui: ports[2],
        remote_sync: ports[3],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_ports() -> SessionPorts {
        SessionPorts {
            local_gui: 58384,
            local_sync: 22001,
            remote_gui: 58385,
            remote_sync: 22002,
        }
    }

    // ===========================================
    // Lease Tests
    // ===========================================

    #[test]
    fn lease_returns_four_distinct_ports() {
        let registry = PortRegistry::new();
        let lease = registry.lease().unwrap();

        assert!(lease.ports().validate().is_ok());
        for (_, port) in lease.ports().named() {
            assert!(registry.is_leased(port));
        }
    }

    #[test]
    fn two_leases_never_overlap() {
        let registry = PortRegistry::new();
        let a = registry.lease().unwrap();
        let b = registry.lease().unwrap();

        let a_ports: HashSet<u16> = a.ports().named().iter().map(|(_, p)| *p).collect();
        for (_, port) in b.ports().named() {
            assert!(!a_ports.contains(&port));
        }
    }

    #[test]
    fn drop_releases_ports() {
        let registry = PortRegistry::new();
        let lease = registry.lease_exact(fixed_ports()).unwrap();
        assert!(registry.is_leased(58384));

        drop(lease);

        assert!(!registry.is_leased(58384));
        assert!(registry.lease_exact(fixed_ports()).is_ok());
    }

    // ===========================================
    // Exact Lease Tests
    // ===========================================

    #[test]
    fn lease_exact_conflict_leases_nothing() {
        let registry = PortRegistry::new();
        let _held = registry.lease_exact(fixed_ports()).unwrap();

        let overlapping = SessionPorts {
            local_gui: 40000,
            local_sync: 40001,
            remote_gui: 40002,
            remote_sync: 22002,
        };
        let err = registry.lease_exact(overlapping).unwrap_err();

        assert!(matches!(err, PortError::InUse(22002)));
        assert!(!registry.is_leased(40000));
    }

    #[test]
    fn lease_exact_rejects_invalid_set() {
        let registry = PortRegistry::new();
        let ports = SessionPorts {
            local_gui: 40000,
            local_sync: 40000,
            remote_gui: 40002,
            remote_sync: 40003,
        };

        let err = registry.lease_exact(ports).unwrap_err();
        assert!(matches!(
            err,
            PortError::Invalid(SessionConfigError::DuplicatePort { port: 40000, .. })
        ));
    }

    // ===========================================
    // Session Config Tests
    // ===========================================

    #[test]
    fn session_config_uses_leased_ports() {
        let registry = PortRegistry::new();
        let lease = registry.lease().unwrap();

        let config = lease.session_config("/home/dev/api", false).unwrap();

        assert_eq!(config.ports(), lease.ports());
        assert!(lease.covers(&config).is_ok());
    }

    #[test]
    fn covers_rejects_foreign_port() {
        let registry = PortRegistry::new();
        let lease = registry.lease_exact(fixed_ports()).unwrap();
        let foreign = SessionPorts {
            remote_sync: 40003,
            ..fixed_ports()
        };
        let config = SessionConfig::new(foreign, "/home/dev/api", false).unwrap();

        assert!(matches!(
            lease.covers(&config),
            Err(PortError::NotLeased(40003))
        ));
    }

    #[test]
    fn global_registry_is_shared() {
        let a = PortRegistry::global();
        let b = PortRegistry::global();
        assert!(std::ptr::eq(a, b));
    }
}
