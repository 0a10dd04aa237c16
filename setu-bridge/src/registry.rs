//! Registry of connected network clients
//!
//! Broadcast takes a snapshot of the clients in registration order and
//! delivers with the registry lock released, so a sink may add or remove
//! clients, itself included, from inside `deliver`. A client removed after
//! the snapshot is skipped; once `remove` returns it receives nothing more.

use crate::error::Result;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifier handed out by [`ConnectionRegistry::add`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "client#{}", self.0)
    }
}

/// Delivery endpoint of one connected client
pub trait ClientSink: Send + Sync {
    /// Queue `message` for the client; an error means the client is gone
    fn deliver(&self, message: &str) -> Result<()>;
}

/// Ordered set of connected clients
#[derive(Default)]
pub struct ConnectionRegistry {
    next_id: AtomicU64,
    clients: Mutex<Vec<(ConnectionId, Arc<dyn ClientSink>)>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client; it receives every broadcast from now on
    pub fn add(&self, sink: Box<dyn ClientSink>) -> ConnectionId {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut clients = self.clients.lock();
        clients.push((id, Arc::from(sink)));
        log::debug!("Registered {} ({} connected)", id, clients.len());
        id
    }

    /// Unregister a client; unknown ids are ignored
    pub fn remove(&self, id: ConnectionId) -> bool {
        let mut clients = self.clients.lock();
        let before = clients.len();
        clients.retain(|(cid, _)| *cid != id);
        let removed = clients.len() != before;
        if removed {
            log::debug!("Unregistered {} ({} connected)", id, clients.len());
        }
        removed
    }

    /// Deliver `message` to every client, returning the number of successes
    ///
    /// A client whose sink fails is logged and dropped from the registry;
    /// the remaining clients still receive the message.
    pub fn broadcast(&self, message: &str) -> usize {
        let targets = self.clients.lock().clone();
        let mut delivered = 0;
        let mut failed = Vec::new();

        for (id, sink) in targets {
            if !self.contains(id) {
                continue;
            }
            match sink.deliver(message) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    log::warn!("Dropping {}: delivery failed: {}", id, e);
                    failed.push(id);
                }
            }
        }

        if !failed.is_empty() {
            self.clients.lock().retain(|(id, _)| !failed.contains(id));
        }
        log::trace!("Broadcast {} bytes to {} clients", message.len(), delivered);
        delivered
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.clients.lock().iter().any(|(cid, _)| *cid == id)
    }

    pub fn len(&self) -> usize {
        self.clients.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
