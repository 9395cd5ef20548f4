//! Metric names recorded by the core.

/// Inbound envelopes routed (counter, labels: kind).
pub const ENVELOPES_TOTAL: &str = "nsmux_envelopes_total";
/// Inbound frames that failed to decode (counter).
pub const DECODE_FAILURES_TOTAL: &str = "nsmux_decode_failures_total";
/// Frames delivered by namespace emits (counter).
pub const EMIT_DELIVERIES_TOTAL: &str = "nsmux_emit_deliveries_total";
/// Per-connection send failures (counter).
pub const SEND_FAILURES_TOTAL: &str = "nsmux_send_failures_total";
