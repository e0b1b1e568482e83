/*!
 * Peer Metadata
 * Cached destination info per socket descriptor, read back at audit time
 */

use crate::core::types::{Port, SockFd};
use ahash::RandomState;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// Placeholder host recorded when a descriptor has no resolved destination.
pub const UNKNOWN_HOST: &str = "unknown";

/// Destination metadata cached on a socket descriptor at connect/send time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerInfo {
    pub host: String,
    pub port: Port,
    /// Whether a destination has ever been recorded for the descriptor.
    pub resolved: bool,
}

impl PeerInfo {
    /// The placeholder returned for descriptors that never resolved a peer.
    #[must_use]
    pub fn unknown() -> Self {
        Self {
            host: UNKNOWN_HOST.to_string(),
            port: 0,
            resolved: false,
        }
    }

    /// Metadata for a known destination.
    #[must_use]
    pub fn known(host: impl Into<String>, port: Port) -> Self {
        Self {
            host: host.into(),
            port,
            resolved: true,
        }
    }
}

/// Concurrent descriptor → destination table.
///
/// Entries are replaced wholesale, so a reader never observes a torn
/// host/port pair. There is deliberately no cross-operation locking: a send
/// racing a connect on the same descriptor stamps whichever destination won,
/// last writer wins in the table.
pub struct PeerTable {
    entries: DashMap<SockFd, PeerInfo, RandomState>,
}

impl PeerTable {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: DashMap::with_hasher(RandomState::new()),
        }
    }

    /// Record a destination, overwriting any prior value.
    pub fn record(&self, fd: SockFd, host: impl Into<String>, port: Port) {
        self.entries.insert(fd, PeerInfo::known(host, port));
    }

    /// Metadata for a descriptor; the unknown placeholder if none recorded.
    #[must_use]
    pub fn lookup(&self, fd: SockFd) -> PeerInfo {
        self.entries
            .get(&fd)
            .map(|entry| entry.value().clone())
            .unwrap_or_else(PeerInfo::unknown)
    }

    /// Drop the entry at close so a recycled descriptor does not inherit it.
    pub fn forget(&self, fd: SockFd) {
        self.entries.remove(&fd);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for PeerTable {
    fn default() -> Self {
        Self::new()
    }
}
