// Path: crates/telemetry/src/sinks.rs
//! Defines abstract traits for metrics reporting, decoupling core logic from the backend.

/// A no-op sink for use in tests where metrics are not needed.
#[derive(Debug, Clone, Copy)]
pub struct NopSink;

// --- Trait Definitions ---

pub trait AttestationMetricsSink: Send + Sync + std::fmt::Debug {
    /// Counts a finished attestation request by outcome
    /// (`issued`, `invalid`, `rate_limited`, `error`).
    fn inc_attestations(&self, outcome: &'static str);
    /// Counts an issued nonce by the source that seeded it.
    fn inc_nonces_issued(&self, source: &'static str);
    /// Counts a chain read that failed and fell back to the local floor.
    fn inc_nonce_upstream_fallback(&self);
    /// Sets the number of players with a live submission record.
    fn set_tracked_players(&self, count: f64);
}
impl AttestationMetricsSink for NopSink {
    fn inc_attestations(&self, _outcome: &'static str) {}
    fn inc_nonces_issued(&self, _source: &'static str) {}
    fn inc_nonce_upstream_fallback(&self) {}
    fn set_tracked_players(&self, _count: f64) {}
}

pub trait HttpMetricsSink: Send + Sync + std::fmt::Debug {
    fn observe_request_duration(&self, route: &str, duration_secs: f64);
    fn inc_requests_total(&self, route: &str, status_code: u16);
}
impl HttpMetricsSink for NopSink {
    fn observe_request_duration(&self, _route: &str, _duration_secs: f64) {}
    fn inc_requests_total(&self, _route: &str, _status_code: u16) {}
}
