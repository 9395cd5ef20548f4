//! # nsmux-server
//!
//! Axum `WebSocket` transport and HTTP surface for an nsmux hub.
//!
//! - `WebSocket` gateway: admission (auth, origin, capacity), per-connection
//!   session loop, ping-based liveness, slow-client eviction
//! - [`ConnectionPool`](websocket::pool::ConnectionPool) implements the hub's
//!   `Transport`
//! - HTTP endpoints: `/health`, `/metrics`
//! - Layered configuration (defaults, JSON file, `NSMUX_*` env)
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod errors;
pub mod health;
pub mod loader;
pub mod logging;
pub mod metrics;
pub mod origin;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::ServerConfig;
pub use errors::ConfigError;
pub use server::NsmuxServer;
