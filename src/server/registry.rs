//! Live bookkeeping of connected peers per listening port

use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Point-in-time copy of the registry, ordered by port then peer
pub type RegistrySnapshot = BTreeMap<u16, BTreeSet<String>>;

/// Thread-safe mapping from listening port to connected peer identifiers.
///
/// A port disappears from the map as soon as its last peer is removed.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: Mutex<RegistrySnapshot>,
}

impl ClientRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `peer` as connected on `port`
    pub fn add(&self, port: u16, peer: &str) {
        self.clients
            .lock()
            .entry(port)
            .or_default()
            .insert(peer.to_string());
    }

    /// Forget `peer` on `port`. Removing an absent peer is a no-op.
    pub fn remove(&self, port: u16, peer: &str) {
        let mut clients = self.clients.lock();
        if let Some(peers) = clients.get_mut(&port) {
            peers.remove(peer);
            if peers.is_empty() {
                clients.remove(&port);
            }
        }
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> RegistrySnapshot {
        self.clients.lock().clone()
    }

    /// Total number of connected peers across all ports
    pub fn connection_count(&self) -> usize {
        self.clients.lock().values().map(BTreeSet::len).sum()
    }

    /// Add `peer` and return a guard that removes it again when dropped
    pub fn register(self: &Arc<Self>, port: u16, peer: impl Into<String>) -> Registration {
        let peer = peer.into();
        self.add(port, &peer);
        Registration {
            registry: Arc::clone(self),
            port,
            peer,
        }
    }
}

/// Scope guard tying a registry entry to the lifetime of a connection
#[derive(Debug)]
pub struct Registration {
    registry: Arc<ClientRegistry>,
    port: u16,
    peer: String,
}

impl Registration {
    /// Port the peer is registered under
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Registered peer identifier
    pub fn peer(&self) -> &str {
        &self.peer
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.remove(self.port, &self.peer);
    }
}
