//! Namespace → subscriber set mapping.
//!
//! Every mutation takes the write lock over the whole map; snapshots take
//! the read lock and return an owned copy so that sends happen after the
//! lock is released.

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;
use tracing::debug;

use crate::connection::ConnectionId;
use crate::namespace::ROOT_NAMESPACE;

/// Lock-guarded subscription store.
///
/// Namespace entries are created once at construction and never removed;
/// only their subscriber sets change.
pub struct SubscriptionRegistry {
    /// Canonical namespace key → subscribed connections.
    namespaces: RwLock<HashMap<String, HashSet<ConnectionId>>>,
    /// Namespaces declared in configuration. Only these accept subscribers.
    declared: HashSet<String>,
}

impl SubscriptionRegistry {
    /// Create a registry seeded with the root namespace and each declared key.
    ///
    /// Keys must already be canonical.
    pub fn new(declared: impl IntoIterator<Item = String>) -> Self {
        let declared: HashSet<String> = declared.into_iter().collect();
        let mut namespaces: HashMap<String, HashSet<ConnectionId>> = declared
            .iter()
            .map(|ns| (ns.clone(), HashSet::new()))
            .collect();
        let _ = namespaces.entry(ROOT_NAMESPACE.to_owned()).or_default();
        Self {
            namespaces: RwLock::new(namespaces),
            declared,
        }
    }

    /// Add `conn` to a declared namespace.
    ///
    /// Undeclared namespaces are silently ignored. Returns `true` only when
    /// the connection was newly added.
    pub fn subscribe(&self, namespace: &str, conn: &ConnectionId) -> bool {
        if !self.is_declared(namespace) {
            debug!(namespace, conn_id = %conn, "subscribe to undeclared namespace ignored");
            return false;
        }
        let mut namespaces = self.namespaces.write();
        let added = namespaces
            .entry(namespace.to_owned())
            .or_default()
            .insert(conn.clone());
        if added {
            debug!(namespace, conn_id = %conn, "subscribed");
        }
        added
    }

    /// Remove `conn` from a namespace. Returns `true` if it was a member.
    pub fn unsubscribe(&self, namespace: &str, conn: &ConnectionId) -> bool {
        let mut namespaces = self.namespaces.write();
        let removed = namespaces
            .get_mut(namespace)
            .is_some_and(|subs| subs.remove(conn));
        if removed {
            debug!(namespace, conn_id = %conn, "unsubscribed");
        }
        removed
    }

    /// Remove `conn` from every namespace.
    ///
    /// Any other subscriber for which `is_open` reports `false` is evicted in
    /// the same pass. Returns the number of memberships removed.
    pub fn cleanup_connection(
        &self,
        conn: &ConnectionId,
        is_open: impl Fn(&ConnectionId) -> bool,
    ) -> usize {
        let mut namespaces = self.namespaces.write();
        let mut removed = 0;
        for (namespace, subs) in namespaces.iter_mut() {
            let before = subs.len();
            subs.retain(|c| c != conn && is_open(c));
            let evicted = before - subs.len();
            if evicted > 0 {
                debug!(namespace, conn_id = %conn, evicted, "cleaned up subscriptions");
            }
            removed += evicted;
        }
        removed
    }

    /// Point-in-time copy of a namespace's subscribers.
    ///
    /// `None` if the namespace is not registered.
    pub fn snapshot(&self, namespace: &str) -> Option<Vec<ConnectionId>> {
        self.namespaces
            .read()
            .get(namespace)
            .map(|subs| subs.iter().cloned().collect())
    }

    /// Whether the namespace has a registry entry.
    pub fn contains(&self, namespace: &str) -> bool {
        self.namespaces.read().contains_key(namespace)
    }

    /// Whether the namespace accepts subscribers.
    pub fn is_declared(&self, namespace: &str) -> bool {
        self.declared.contains(namespace)
    }

    /// Whether `conn` is subscribed to `namespace`.
    pub fn is_subscribed(&self, namespace: &str, conn: &ConnectionId) -> bool {
        self.namespaces
            .read()
            .get(namespace)
            .is_some_and(|subs| subs.contains(conn))
    }

    /// Registered namespace keys, sorted.
    pub fn namespaces(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.namespaces.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Namespaces `conn` is currently subscribed to, sorted.
    pub fn subscriptions_of(&self, conn: &ConnectionId) -> Vec<String> {
        let mut keys: Vec<String> = self
            .namespaces
            .read()
            .iter()
            .filter(|(_, subs)| subs.contains(conn))
            .map(|(ns, _)| ns.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Total memberships across all namespaces.
    pub fn subscription_count(&self) -> usize {
        self.namespaces.read().values().map(HashSet::len).sum()
    }
}
