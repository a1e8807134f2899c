//! Protocol detection.
//!
//! Servers on a home network range from modern NAS boxes that have SMB1
//! disabled to old routers and media players that only speak SMB1. Rather
//! than guess, [`ProtocolDetector`] probes each host once and remembers the
//! answer for the lifetime of the detector.

use crate::endpoint::ServerEndpoint;
use crate::error::Result;
use crate::transport::{Dialect, Timeouts, TransportHandle, TransportProfile};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Mutex, PoisonError};
use tracing::instrument;

/// What a server is known to speak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolCapability {
    Smb2Plus,
    Smb1Only,
    /// Neither probe succeeded (or a probe is still running).
    Unknown,
}
impl ProtocolCapability {
    /// Connection profile to use for a server with this capability.
    ///
    /// Unknown servers get the permissive negotiate profile.
    pub fn profile(self, timeouts: Timeouts) -> TransportProfile {
        let dialect = match self {
            Self::Smb2Plus => Dialect::Smb2Plus,
            Self::Smb1Only => Dialect::Smb1Only,
            Self::Unknown => Dialect::Negotiate,
        };
        TransportProfile::new(dialect, timeouts)
    }
}
impl fmt::Display for ProtocolCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Smb2Plus => "SMB2+",
            Self::Smb1Only => "SMB1 only",
            Self::Unknown => "unknown",
        })
    }
}

#[derive(Default)]
struct ProbeState {
    capabilities: HashMap<String, ProtocolCapability>,
    in_flight: HashSet<String>,
    /// Bumped by `clear()`; probes started before that neither record their
    /// result nor touch the in-flight set.
    generation: u64,
}

/// Probes servers for the SMB generation they speak and caches the result
/// per host (case-insensitive).
///
/// At most one probe per host runs at a time. Callers arriving while a probe
/// is running do not wait for it: they get whatever is cached, or
/// [`Unknown`](ProtocolCapability::Unknown).
pub struct ProtocolDetector {
    transport: TransportHandle,
    timeouts: Timeouts,
    state: Mutex<ProbeState>,
}
impl ProtocolDetector {
    pub fn new(transport: TransportHandle, timeouts: Timeouts) -> Self {
        Self { transport, timeouts, state: Mutex::default() }
    }

    /// Determine the capability of the endpoint's host.
    ///
    /// Never fails: anything that goes wrong during probing is logged and
    /// folded into [`Unknown`](ProtocolCapability::Unknown), which is cached
    /// like any other result.
    #[instrument(skip(self), fields(host = %endpoint.host()))]
    pub async fn detect(&self, endpoint: &ServerEndpoint) -> ProtocolCapability {
        let key = endpoint.cache_key();
        let in_flight = {
            let mut state = self.lock();
            if let Some(capability) = state.capabilities.get(&key) {
                return *capability;
            }
            if !state.in_flight.insert(key.clone()) {
                tracing::debug!("probe already running");
                return ProtocolCapability::Unknown;
            }
            InFlight { detector: self, key: key.clone(), generation: state.generation }
        };

        let capability = if self.probe(endpoint, Dialect::Smb2Plus).await {
            ProtocolCapability::Smb2Plus
        } else if self.probe(endpoint, Dialect::Smb1Only).await {
            ProtocolCapability::Smb1Only
        } else {
            ProtocolCapability::Unknown
        };
        tracing::info!(%capability, "detected protocol");
        {
            let mut state = self.lock();
            if state.generation == in_flight.generation {
                state.capabilities.insert(key, capability);
            }
        }
        capability
    }

    /// Cached capability for `host`, without probing.
    pub fn cached(&self, host: &str) -> Option<ProtocolCapability> {
        self.lock().capabilities.get(&host.to_lowercase()).copied()
    }

    /// Forget every cached capability, and any probe still running.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.capabilities.clear();
        state.in_flight.clear();
        state.generation += 1;
    }

    /// Connect with a single dialect and list the server root.
    ///
    /// An authentication failure still counts as success: the server
    /// negotiated the dialect and only then rejected the credentials.
    async fn probe(&self, endpoint: &ServerEndpoint, dialect: Dialect) -> bool {
        let profile = TransportProfile::new(dialect, self.timeouts);
        let outcome: Result<()> = async {
            let session = self.transport.connect(endpoint, &profile).await?;
            let listed = session.list_shares().await;
            session.close().await;
            listed.map(|_| ())
        }
        .await;
        match outcome {
            Ok(()) => true,
            Err(err) if err.is_auth() => {
                tracing::debug!(%dialect, "credentials rejected, dialect supported");
                true
            },
            Err(err) => {
                tracing::debug!(%dialect, error = %err, "probe failed");
                false
            },
        }
    }

    // Critical sections never await, so a std mutex is fine. A poisoned lock
    // only means another probe panicked; the maps themselves stay consistent.
    fn lock(&self) -> std::sync::MutexGuard<'_, ProbeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Clears the in-flight marker on every exit path, including cancellation.
struct InFlight<'a> {
    detector: &'a ProtocolDetector,
    key: String,
    generation: u64,
}
impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut state = self.detector.lock();
        if state.generation == self.generation {
            state.in_flight.remove(&self.key);
        }
    }
}
