//! Error types for the routing core.

use thiserror::Error;

/// Failures surfaced to callers of the emit/broadcast API.
#[derive(Debug, Error)]
pub enum HubError {
    /// The target namespace was never registered.
    #[error("namespace not found: {0}")]
    NamespaceNotFound(String),
    /// The payload could not be encoded.
    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A malformed inbound envelope. Reported to the sender only.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The frame is not valid JSON or does not match the envelope shape.
    #[error("invalid envelope: {0}")]
    Invalid(#[from] serde_json::Error),
}

/// Per-connection send failures reported by a transport.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// No connection with this id is known to the transport.
    #[error("unknown connection: {0}")]
    UnknownConnection(String),
    /// The connection has been closed.
    #[error("connection closed: {0}")]
    Closed(String),
    /// The connection's outbound queue is full.
    #[error("outbound queue full: {0}")]
    Backpressure(String),
}

/// Result type for hub operations.
pub type Result<T> = std::result::Result<T, HubError>;
