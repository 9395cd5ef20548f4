//! WebSocket transport: connection state, pool, liveness and session loop.

pub mod connection;
pub mod liveness;
pub mod pool;
pub mod session;
