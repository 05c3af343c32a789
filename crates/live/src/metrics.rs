// crates/live/src/metrics.rs
//! Feed metrics, recorded through the `metrics` facade.
//!
//! The library never installs a recorder; without one every call below is a
//! no-op.

use metrics::{counter, describe_counter, describe_gauge, gauge};

/// Register descriptions for all feed metrics. Call once after installing a
/// recorder.
pub fn describe_metrics() {
    describe_counter!("agentwatch_events_total", "Feed events applied, by kind");
    describe_counter!(
        "agentwatch_decode_failures_total",
        "Feed records that did not decode and were kept as raw entries"
    );
    describe_counter!("agentwatch_reconnects_total", "Feed reconnect attempts");
    describe_gauge!("agentwatch_active_sessions", "Sessions with a running supervisor");
}

pub fn record_event(kind: &'static str) {
    counter!("agentwatch_events_total", "kind" => kind).increment(1);
    if kind == "unknown" {
        counter!("agentwatch_decode_failures_total").increment(1);
    }
}

pub fn record_reconnect() {
    counter!("agentwatch_reconnects_total").increment(1);
}

pub fn session_opened() {
    gauge!("agentwatch_active_sessions").increment(1.0);
}

pub fn session_closed() {
    gauge!("agentwatch_active_sessions").decrement(1.0);
}
