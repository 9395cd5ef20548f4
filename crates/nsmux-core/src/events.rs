//! Event handler table.
//!
//! Handlers are registered once through [`HubConfig`] and frozen into an
//! [`EventTable`] when the hub is built. Application envelopes are routed by
//! looking up the resolved namespace as an event key in the root
//! namespace's map, so every non-reserved root key also declares a
//! subscribable namespace.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use crate::connection::ConnectionId;
use crate::hub::NamespaceHub;
use crate::namespace::{ROOT_NAMESPACE, is_root, resolve};

/// Root event key fired when a connection opens.
pub const ON_CONNECT: &str = "$connect";

/// Root event key fired after a connection closed and was cleaned up.
pub const ON_DISCONNECT: &str = "$disconnect";

/// Server-side reaction to an inbound message or lifecycle event.
///
/// Runs on the connection's read loop; long work should be spawned.
pub trait EventHandler: Send + Sync {
    /// Handle `payload` from `conn`. Lifecycle events carry `Value::Null`.
    fn handle(&self, conn: &ConnectionId, payload: Value, hub: &NamespaceHub);
}

impl<F> EventHandler for F
where
    F: Fn(&ConnectionId, Value, &NamespaceHub) + Send + Sync,
{
    fn handle(&self, conn: &ConnectionId, payload: Value, hub: &NamespaceHub) {
        self(conn, payload, hub);
    }
}

fn is_reserved(event: &str) -> bool {
    event == ON_CONNECT || event == ON_DISCONNECT
}

/// Handler registrations supplied at construction time.
#[derive(Clone, Default)]
pub struct HubConfig {
    entries: Vec<(String, String, Arc<dyn EventHandler>)>,
}

impl HubConfig {
    /// Empty configuration: only the root namespace, no handlers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a namespace → event key → handler mapping.
    pub fn from_map(map: HashMap<String, HashMap<String, Arc<dyn EventHandler>>>) -> Self {
        let mut config = Self::new();
        for (namespace, events) in map {
            for (event, handler) in events {
                config.entries.push((namespace.clone(), event, handler));
            }
        }
        config
    }

    /// Register a root handler; `event` also declares namespace `resolve(event)`.
    #[must_use]
    pub fn on<F>(self, event: &str, handler: F) -> Self
    where
        F: Fn(&ConnectionId, Value, &NamespaceHub) + Send + Sync + 'static,
    {
        self.handler(ROOT_NAMESPACE, event, Arc::new(handler))
    }

    /// Register a handler for the connect lifecycle event.
    #[must_use]
    pub fn on_connect<F>(self, handler: F) -> Self
    where
        F: Fn(&ConnectionId, Value, &NamespaceHub) + Send + Sync + 'static,
    {
        self.handler(ROOT_NAMESPACE, ON_CONNECT, Arc::new(handler))
    }

    /// Register a handler for the disconnect lifecycle event.
    #[must_use]
    pub fn on_disconnect<F>(self, handler: F) -> Self
    where
        F: Fn(&ConnectionId, Value, &NamespaceHub) + Send + Sync + 'static,
    {
        self.handler(ROOT_NAMESPACE, ON_DISCONNECT, Arc::new(handler))
    }

    /// Register any handler under an arbitrary namespace and event key.
    #[must_use]
    pub fn handler(mut self, namespace: &str, event: &str, handler: Arc<dyn EventHandler>) -> Self {
        self.entries
            .push((namespace.to_owned(), event.to_owned(), handler));
        self
    }

    /// Number of registrations.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for HubConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|(ns, ev, _)| (ns, ev)))
            .finish()
    }
}

/// Frozen `(namespace, event key) → handler` lookup table.
pub struct EventTable {
    handlers: HashMap<String, HashMap<String, Arc<dyn EventHandler>>>,
}

impl EventTable {
    /// Normalize and freeze a configuration.
    ///
    /// Namespace keys are resolved. Inside the root namespace, every event key
    /// except the reserved lifecycle keys is resolved as well.
    pub fn from_config(config: HubConfig) -> Self {
        let mut handlers: HashMap<String, HashMap<String, Arc<dyn EventHandler>>> =
            HashMap::new();
        let _ = handlers.entry(ROOT_NAMESPACE.to_owned()).or_default();

        for (namespace, event, handler) in config.entries {
            let namespace = resolve(&namespace);
            let event = if is_root(&namespace) && !is_reserved(&event) {
                resolve(&event)
            } else {
                event
            };
            let events = handlers.entry(namespace.clone()).or_default();
            if events.insert(event.clone(), handler).is_some() {
                warn!(namespace, event, "duplicate handler registration replaced");
            }
        }
        Self { handlers }
    }

    /// Handler for `event` in canonical `namespace`.
    pub fn lookup(&self, namespace: &str, event: &str) -> Option<&Arc<dyn EventHandler>> {
        self.handlers.get(namespace)?.get(event)
    }

    /// Canonical namespaces declared through root event keys, sorted.
    pub fn declared_namespaces(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .handlers
            .get(ROOT_NAMESPACE)
            .map(|events| {
                events
                    .keys()
                    .filter(|k| !is_reserved(k))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

impl fmt::Debug for EventTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (ns, events) in &self.handlers {
            let mut keys: Vec<&String> = events.keys().collect();
            keys.sort();
            let _ = map.entry(ns, &keys);
        }
        map.finish()
    }
}
