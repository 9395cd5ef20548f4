//! `/health` endpoint body.

use std::time::Instant;

use chrono::{DateTime, Utc};
use nsmux_core::NamespaceHub;
use serde::Serialize;

use crate::websocket::pool::ConnectionPool;

/// Server start, captured once on both clocks.
#[derive(Debug, Clone, Copy)]
pub struct Uptime {
    started: Instant,
    started_at: DateTime<Utc>,
}

impl Uptime {
    /// Start counting now.
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
            started_at: Utc::now(),
        }
    }

    /// Whole seconds since start.
    pub fn secs(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    /// Wall-clock start time.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}

/// Coarse server state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Accepting connections.
    Ok,
    /// Shutdown has begun.
    Draining,
}

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// `ok`, or `draining` once shutdown has started.
    pub status: Status,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Start time, serialized as RFC 3339.
    pub started_at: DateTime<Utc>,
    /// Open WebSocket connections.
    pub connections: usize,
    /// Registered namespaces, root included.
    pub namespaces: usize,
    /// Memberships summed over every namespace.
    pub subscriptions: usize,
}

impl HealthResponse {
    /// Read the live figures off the hub and the pool.
    pub fn collect(
        uptime: &Uptime,
        hub: &NamespaceHub,
        pool: &ConnectionPool,
        draining: bool,
    ) -> Self {
        Self {
            status: if draining { Status::Draining } else { Status::Ok },
            uptime_secs: uptime.secs(),
            started_at: uptime.started_at(),
            connections: pool.connection_count(),
            namespaces: hub.namespaces().len(),
            subscriptions: hub.subscription_count(),
        }
    }
}
