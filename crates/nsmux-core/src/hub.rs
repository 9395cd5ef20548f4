//! Routing engine and emit/broadcast API.
//!
//! A [`NamespaceHub`] is built once from a [`HubConfig`] and a
//! [`Transport`]. The transport feeds it connect, disconnect and message
//! callbacks; handlers receive a reference back to the hub so they can
//! subscribe connections and push data.

use std::fmt;
use std::sync::Arc;

use metrics::counter;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::connection::ConnectionId;
use crate::envelope::{Ack, ControlAction, Envelope, EnvelopeKind, OutboundEnvelope, encode_bare};
use crate::errors::{HubError, Result};
use crate::events::{EventTable, HubConfig, ON_CONNECT, ON_DISCONNECT};
use crate::namespace::{ROOT_NAMESPACE, resolve};
use crate::registry::SubscriptionRegistry;
use crate::telemetry::{
    DECODE_FAILURES_TOTAL, EMIT_DELIVERIES_TOTAL, ENVELOPES_TOTAL, SEND_FAILURES_TOTAL,
};
use crate::transport::{Frame, Transport};

/// Namespace registry, handler table and transport bound together.
pub struct NamespaceHub {
    registry: SubscriptionRegistry,
    events: EventTable,
    transport: Arc<dyn Transport>,
}

impl NamespaceHub {
    /// Build a hub. The registry is seeded from the root event keys.
    pub fn new(config: HubConfig, transport: Arc<dyn Transport>) -> Self {
        let events = EventTable::from_config(config);
        let registry = SubscriptionRegistry::new(events.declared_namespaces());
        debug!(namespaces = ?registry.namespaces(), "namespace hub created");
        Self {
            registry,
            events,
            transport,
        }
    }

    /// The subscription registry.
    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    /// A connection opened. Runs the connect handler, if any.
    pub fn on_connect(&self, conn: &ConnectionId) {
        self.fire_lifecycle(ON_CONNECT, conn);
    }

    /// A connection closed.
    ///
    /// Removes it from every namespace (evicting any other closed
    /// subscriber on the way), then runs the disconnect handler.
    pub fn on_disconnect(&self, conn: &ConnectionId) {
        let removed = self
            .registry
            .cleanup_connection(conn, |c| self.transport.is_open(c));
        debug!(conn_id = %conn, removed, "connection cleaned up");
        self.fire_lifecycle(ON_DISCONNECT, conn);
    }

    fn fire_lifecycle(&self, event: &str, conn: &ConnectionId) {
        if let Some(handler) = self.events.lookup(ROOT_NAMESPACE, event) {
            handler.handle(conn, Value::Null, self);
        }
    }

    // ── Routing ─────────────────────────────────────────────────────

    /// Route one inbound frame from `conn`.
    #[instrument(skip_all, fields(conn_id = %conn))]
    pub fn on_message(&self, conn: &ConnectionId, raw: &[u8]) {
        let envelope = match Envelope::decode(raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                counter!(DECODE_FAILURES_TOTAL).increment(1);
                debug!(error = %e, "rejected malformed envelope");
                self.reply(conn, &Ack::failed(e.to_string()));
                return;
            }
        };
        counter!(ENVELOPES_TOTAL, "kind" => envelope.kind_label()).increment(1);

        match envelope.kind {
            EnvelopeKind::Control { action, namespace } => {
                let namespace = namespace.unwrap_or_default();
                let _ = match action {
                    ControlAction::Subscribe => self.subscribe(&namespace, conn),
                    ControlAction::Unsubscribe => self.unsubscribe(&namespace, conn),
                };
            }
            EnvelopeKind::Application { namespace, body } => {
                let namespace = resolve(namespace.as_deref().unwrap_or(ROOT_NAMESPACE));
                match self.events.lookup(ROOT_NAMESPACE, &namespace) {
                    Some(handler) => handler.handle(conn, body, self),
                    None => debug!(namespace, "no handler, dropping payload"),
                }
                self.reply(conn, &Ack::received(envelope.id));
            }
        }
    }

    fn reply(&self, conn: &ConnectionId, ack: &Ack) {
        let frame = match ack.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "failed to encode acknowledgement");
                return;
            }
        };
        if let Err(e) = self.transport.send_to(conn, frame) {
            counter!(SEND_FAILURES_TOTAL).increment(1);
            debug!(error = %e, "acknowledgement not delivered");
        }
    }

    // ── Subscriptions ───────────────────────────────────────────────

    /// Subscribe `conn` to `namespace` (any alias form).
    ///
    /// Undeclared namespaces are ignored. Returns whether it was newly added.
    pub fn subscribe(&self, namespace: &str, conn: &ConnectionId) -> bool {
        self.registry.subscribe(&resolve(namespace), conn)
    }

    /// Unsubscribe `conn` from `namespace` (any alias form).
    pub fn unsubscribe(&self, namespace: &str, conn: &ConnectionId) -> bool {
        self.registry.unsubscribe(&resolve(namespace), conn)
    }

    // ── Emit / broadcast ────────────────────────────────────────────

    /// Send `payload` as an application envelope to every subscriber of
    /// `namespace`. Returns the number of successful sends.
    pub fn emit<T: ?Sized + Serialize>(&self, payload: &T, namespace: &str) -> Result<usize> {
        self.emit_inner(payload, namespace, None)
    }

    /// Like [`emit`](Self::emit) but skips `excluded`.
    pub fn emit_excluding<T: ?Sized + Serialize>(
        &self,
        payload: &T,
        namespace: &str,
        excluded: &ConnectionId,
    ) -> Result<usize> {
        self.emit_inner(payload, namespace, Some(excluded))
    }

    fn emit_inner<T: ?Sized + Serialize>(
        &self,
        payload: &T,
        namespace: &str,
        excluded: Option<&ConnectionId>,
    ) -> Result<usize> {
        let namespace = resolve(namespace);
        let mut targets = self
            .registry
            .snapshot(&namespace)
            .ok_or_else(|| HubError::NamespaceNotFound(namespace.clone()))?;
        if let Some(excluded) = excluded {
            targets.retain(|c| c != excluded);
        }
        if targets.is_empty() {
            return Ok(0);
        }

        let frame = OutboundEnvelope::new(&namespace, payload).to_frame()?;
        let delivered = self.transport.send_to_many(frame, &targets);
        counter!(EMIT_DELIVERIES_TOTAL).increment(delivered as u64);
        debug!(namespace, recipients = targets.len(), delivered, "emitted");
        Ok(delivered)
    }

    /// Send the bare payload to every open connection.
    pub fn broadcast_all<T: ?Sized + Serialize>(&self, payload: &T) -> Result<usize> {
        let frame: Frame = encode_bare(payload)?;
        Ok(self.transport.send_to_all(frame))
    }

    /// Send the bare payload to every open connection except `sender`.
    pub fn broadcast_others<T: ?Sized + Serialize>(
        &self,
        payload: &T,
        sender: &ConnectionId,
    ) -> Result<usize> {
        let frame: Frame = encode_bare(payload)?;
        Ok(self.transport.send_to_all_except(frame, sender))
    }

    // ── Introspection ───────────────────────────────────────────────

    /// Current subscribers of `namespace` (any alias form).
    pub fn subscribers(&self, namespace: &str) -> Result<Vec<ConnectionId>> {
        let namespace = resolve(namespace);
        self.registry
            .snapshot(&namespace)
            .ok_or(HubError::NamespaceNotFound(namespace))
    }

    /// Registered namespace keys, sorted.
    pub fn namespaces(&self) -> Vec<String> {
        self.registry.namespaces()
    }

    /// Total memberships across all namespaces.
    pub fn subscription_count(&self) -> usize {
        self.registry.subscription_count()
    }
}

impl fmt::Debug for NamespaceHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamespaceHub")
            .field("namespaces", &self.registry.namespaces())
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}
