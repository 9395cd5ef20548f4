//! # nsmux-core
//!
//! Namespace-scoped publish/subscribe over a pool of long-lived message
//! streams.
//!
//! - [`namespace`]: canonical namespace keys (`default`, `default/<suffix>`)
//! - [`registry`]: lock-guarded namespace → subscriber set mapping
//! - [`envelope`]: inbound control/application envelopes, acknowledgements
//! - [`events`]: per-namespace event handler table with connect/disconnect hooks
//! - [`hub`]: routing engine plus the emit/broadcast API handed to handlers
//! - [`transport`]: the send/close surface a session transport must provide
//! - [`telemetry`]: metric names recorded while routing
//!
//! The core never owns connections. It tracks [`ConnectionId`]s and pushes
//! encoded frames through a [`Transport`].

#![deny(unsafe_code)]

pub mod connection;
pub mod envelope;
pub mod errors;
pub mod events;
pub mod hub;
pub mod namespace;
pub mod registry;
pub mod telemetry;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_support;

pub use connection::ConnectionId;
pub use envelope::{Ack, AckStatus, ControlAction, Envelope, EnvelopeKind, OutboundEnvelope};
pub use errors::{DecodeError, HubError, Result, TransportError};
pub use events::{EventHandler, EventTable, HubConfig, ON_CONNECT, ON_DISCONNECT};
pub use hub::NamespaceHub;
pub use namespace::{ROOT_NAMESPACE, resolve};
pub use registry::SubscriptionRegistry;
pub use transport::{Frame, Transport};
