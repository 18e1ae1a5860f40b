//! Connection registry
//!
//! The registry is the single owner of the set of open connections and of
//! the server-wide counters. All mutation goes through an internal mutex that
//! is only held for the duration of a map operation, never across I/O.
//! Callers that need to iterate (fan-out, heartbeat) take a copy with
//! [`ConnectionRegistry::connections`] so that concurrent register/unregister
//! calls cannot disturb the iteration.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use tracing::{debug, info};

use crate::registry::connection::{Connection, ConnectionId};

/// Point-in-time view of the registry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegistrySnapshot {
    pub connected_clients: usize,
    pub total_messages: u64,
    pub uptime_seconds: f64,
}

#[derive(Debug)]
pub struct ConnectionRegistry {
    connections: Mutex<HashMap<ConnectionId, Connection>>,
    message_count: AtomicU64,
    started_at: Instant,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
            message_count: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ConnectionId, Connection>> {
        // The map is always left consistent, so a poisoned lock is still usable.
        self.connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds `conn` to the open set and returns a fresh snapshot.
    ///
    /// Registering an id that is already present leaves the set unchanged.
    pub fn register(&self, conn: Connection) -> RegistrySnapshot {
        self.register_with(conn, |_, _| {})
    }

    /// Like [`register`](Self::register), but runs `on_open` with the
    /// post-insert snapshot before the connection becomes visible to
    /// [`connections`](Self::connections).
    ///
    /// Anything `on_open` queues on the connection is therefore ahead of any
    /// concurrent fan-out. `on_open` runs under the registry lock and must not
    /// call back into the registry. It is skipped for an id that is already
    /// registered.
    pub fn register_with<F>(&self, conn: Connection, on_open: F) -> RegistrySnapshot
    where
        F: FnOnce(&Connection, RegistrySnapshot),
    {
        let (id, addr) = (conn.id, conn.remote_addr);
        let total = {
            let mut connections = self.lock();
            if !connections.contains_key(&id) {
                let snapshot = RegistrySnapshot {
                    connected_clients: connections.len() + 1,
                    total_messages: self.total_messages(),
                    uptime_seconds: self.uptime_seconds(),
                };
                on_open(&conn, snapshot);
                connections.insert(id, conn);
            }
            connections.len()
        };
        info!("Client connected: {addr} ({id}) (Total: {total})");
        self.snapshot()
    }

    /// Removes the connection with `id`. Returns `false` if it was not registered.
    pub fn unregister(&self, id: &ConnectionId) -> bool {
        let (removed, total) = {
            let mut connections = self.lock();
            let removed = connections.remove(id).is_some();
            (removed, connections.len())
        };
        if removed {
            info!("Client disconnected: {id} (Total: {total})");
        } else {
            debug!("Ignoring unregister for unknown connection {id}");
        }
        removed
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            connected_clients: self.len(),
            total_messages: self.message_count.load(Ordering::SeqCst),
            uptime_seconds: self.uptime_seconds(),
        }
    }

    /// Counts one processed inbound message and returns the new total.
    pub fn record_message(&self) -> u64 {
        self.message_count.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn total_messages(&self) -> u64 {
        self.message_count.load(Ordering::SeqCst)
    }

    /// Copy of the open set, safe to iterate while others register or leave.
    pub fn connections(&self) -> Vec<Connection> {
        self.lock().values().cloned().collect()
    }

    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn uptime_seconds(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64()
    }
}
