//! Live connection pool, the [`Transport`] the hub sends through.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use metrics::counter;
use nsmux_core::{ConnectionId, Frame, Transport, TransportError};
use parking_lot::RwLock;
use tracing::{debug, warn};

use super::connection::ClientConnection;
use crate::metrics::WS_SLOW_CLIENT_DISCONNECTS_TOTAL;

/// Maximum total lifetime frame drops before forcibly disconnecting a slow client.
pub const MAX_TOTAL_DROPS: u64 = 100;

/// Connected clients indexed by connection ID.
pub struct ConnectionPool {
    connections: RwLock<HashMap<ConnectionId, Arc<ClientConnection>>>,
    /// Tracks the map size so count queries skip the lock.
    active_count: AtomicUsize,
    max_connections: usize,
}

impl ConnectionPool {
    /// Create an empty pool admitting at most `max_connections`.
    pub fn new(max_connections: usize) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            active_count: AtomicUsize::new(0),
            max_connections,
        }
    }

    /// Add a connection. Returns `false` when the pool is full.
    pub fn add(&self, connection: Arc<ClientConnection>) -> bool {
        let mut conns = self.connections.write();
        if conns.len() >= self.max_connections && !conns.contains_key(&connection.id) {
            return false;
        }
        if conns.insert(connection.id.clone(), connection).is_none() {
            let _ = self.active_count.fetch_add(1, Ordering::Relaxed);
        }
        true
    }

    /// Remove a connection by ID.
    pub fn remove(&self, id: &ConnectionId) -> Option<Arc<ClientConnection>> {
        let removed = self.connections.write().remove(id);
        if removed.is_some() {
            let _ = self.active_count.fetch_sub(1, Ordering::Relaxed);
        }
        removed
    }

    /// Look up a connection.
    pub fn get(&self, id: &ConnectionId) -> Option<Arc<ClientConnection>> {
        self.connections.read().get(id).cloned()
    }

    /// Number of active connections.
    pub fn connection_count(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }

    /// Whether another connection would exceed the limit.
    pub fn is_full(&self) -> bool {
        self.connection_count() >= self.max_connections
    }

    /// Signal every connection to close.
    pub fn close_all(&self) {
        let conns: Vec<Arc<ClientConnection>> =
            self.connections.read().values().cloned().collect();
        debug!(count = conns.len(), "closing all connections");
        for conn in conns {
            conn.close();
        }
    }
}

impl Transport for ConnectionPool {
    fn send_to(&self, conn: &ConnectionId, frame: Frame) -> Result<(), TransportError> {
        let Some(client) = self.get(conn) else {
            return Err(TransportError::UnknownConnection(conn.to_string()));
        };
        let result = client.send(frame);
        if matches!(result, Err(TransportError::Backpressure(_))) {
            let drops = client.drop_count();
            if drops >= MAX_TOTAL_DROPS {
                if !client.is_closed() {
                    counter!(WS_SLOW_CLIENT_DISCONNECTS_TOTAL).increment(1);
                    warn!(conn_id = %conn, drops, "disconnecting slow client");
                }
                client.close();
            } else {
                debug!(conn_id = %conn, total_drops = drops, "outbound queue full, frame dropped");
            }
        }
        result
    }

    fn connections(&self) -> Vec<ConnectionId> {
        self.connections
            .read()
            .values()
            .filter(|c| !c.is_closed())
            .map(|c| c.id.clone())
            .collect()
    }

    fn is_open(&self, conn: &ConnectionId) -> bool {
        self.get(conn).is_some_and(|c| !c.is_closed())
    }

    fn close(&self, conn: &ConnectionId) {
        if let Some(client) = self.get(conn) {
            client.close();
        }
    }
}
