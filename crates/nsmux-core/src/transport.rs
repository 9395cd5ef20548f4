//! The session-transport surface the hub drives.

use std::sync::Arc;

use metrics::counter;
use tracing::warn;

use crate::connection::ConnectionId;
use crate::errors::TransportError;
use crate::telemetry::SEND_FAILURES_TOTAL;

/// One encoded outbound text frame, shared across all recipients of a fan-out.
pub type Frame = Arc<String>;

/// Send and lifecycle operations provided by the connection-owning transport.
///
/// Implementations must not block: a send either enqueues the frame or fails
/// for that one connection.
pub trait Transport: Send + Sync {
    /// Enqueue a frame for one connection.
    fn send_to(&self, conn: &ConnectionId, frame: Frame) -> Result<(), TransportError>;

    /// Ids of every currently open connection.
    fn connections(&self) -> Vec<ConnectionId>;

    /// Whether the connection is still open.
    fn is_open(&self, conn: &ConnectionId) -> bool;

    /// Close a connection. Closing an unknown or closed connection is a no-op.
    fn close(&self, conn: &ConnectionId);

    /// Send one frame to each listed connection.
    ///
    /// A failing send is logged and skipped; the remaining targets are still
    /// attempted. Returns the number of successful sends.
    fn send_to_many(&self, frame: Frame, conns: &[ConnectionId]) -> usize {
        let mut delivered = 0;
        for conn in conns {
            match self.send_to(conn, Arc::clone(&frame)) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    counter!(SEND_FAILURES_TOTAL).increment(1);
                    warn!(conn_id = %conn, error = %e, "failed to send frame");
                }
            }
        }
        delivered
    }

    /// Send one frame to every open connection.
    fn send_to_all(&self, frame: Frame) -> usize {
        let conns = self.connections();
        self.send_to_many(frame, &conns)
    }

    /// Send one frame to every open connection except `excluded`.
    fn send_to_all_except(&self, frame: Frame, excluded: &ConnectionId) -> usize {
        let conns: Vec<ConnectionId> = self
            .connections()
            .into_iter()
            .filter(|c| c != excluded)
            .collect();
        self.send_to_many(frame, &conns)
    }
}
