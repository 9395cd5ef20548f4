//! Missed-ping accounting driven by the session writer's ping cadence.

use std::time::Duration;

/// Consecutive ping rounds a peer may stay silent before it is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MissedPings {
    missed: u32,
    limit: u32,
}

impl MissedPings {
    /// Allow `timeout / interval` silent rounds, never fewer than one.
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        let per_round = interval.as_millis().max(1);
        let limit = u32::try_from(timeout.as_millis() / per_round)
            .unwrap_or(u32::MAX)
            .max(1);
        Self { missed: 0, limit }
    }

    /// Silent rounds tolerated.
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Record one ping round. Any inbound traffic since the previous round
    /// resets the count. Returns `true` once the peer has used up its limit.
    pub fn record(&mut self, heard_from_peer: bool) -> bool {
        if heard_from_peer {
            self.missed = 0;
            return false;
        }
        self.missed = self.missed.saturating_add(1);
        self.missed >= self.limit
    }
}
