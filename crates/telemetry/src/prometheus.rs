// Path: crates/telemetry/src/prometheus.rs
//! A concrete implementation of the metrics sinks using the Prometheus crate.

use crate::sinks::*;
use anyhow::Result;
use once_cell::sync::Lazy;
use prometheus::{
    exponential_buckets, register_gauge, register_histogram_vec, register_int_counter,
    register_int_counter_vec, Encoder, Gauge, HistogramVec, IntCounter, IntCounterVec,
    TextEncoder,
};

// --- Metric Definitions ---

// GAUGE (no _total suffix)
static LEDGER_TRACKED_PLAYERS: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "whack_ledger_tracked_players",
        "Players with a live submission record in the ledger."
    )
    .unwrap()
});

// COUNTER (correctly uses _total suffix)
static ATTESTATIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "whack_attestations_total",
        "Attestation requests by outcome.",
        &["outcome"]
    )
    .unwrap()
});
static NONCES_ISSUED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "whack_nonces_issued_total",
        "Nonces issued, by seeding source.",
        &["source"]
    )
    .unwrap()
});
static NONCE_UPSTREAM_FALLBACK_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "whack_nonce_upstream_fallback_total",
        "On-chain nonce reads that failed and fell back to a local floor."
    )
    .unwrap()
});
static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "whack_http_requests_total",
        "Total HTTP requests.",
        &["route", "status"]
    )
    .unwrap()
});

// HISTOGRAM (uses unit suffix like _seconds)
static HTTP_REQUEST_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "whack_http_request_duration_seconds",
        "Latency of HTTP requests.",
        &["route"],
        exponential_buckets(0.001, 2.0, 15).unwrap()
    )
    .unwrap()
});

#[derive(Debug, Clone, Copy)]
pub struct PrometheusSink;

impl AttestationMetricsSink for PrometheusSink {
    fn inc_attestations(&self, outcome: &'static str) {
        ATTESTATIONS_TOTAL.with_label_values(&[outcome]).inc();
    }
    fn inc_nonces_issued(&self, source: &'static str) {
        NONCES_ISSUED_TOTAL.with_label_values(&[source]).inc();
    }
    fn inc_nonce_upstream_fallback(&self) {
        NONCE_UPSTREAM_FALLBACK_TOTAL.inc();
    }
    fn set_tracked_players(&self, count: f64) {
        LEDGER_TRACKED_PLAYERS.set(count);
    }
}
impl HttpMetricsSink for PrometheusSink {
    fn observe_request_duration(&self, route: &str, duration_secs: f64) {
        HTTP_REQUEST_DURATION_SECONDS
            .with_label_values(&[route])
            .observe(duration_secs);
    }
    fn inc_requests_total(&self, route: &str, status_code: u16) {
        HTTP_REQUESTS_TOTAL
            .with_label_values(&[route, &status_code.to_string()])
            .inc();
    }
}

/// The process-wide sink. Coerces to any of the `*MetricsSink` trait objects.
pub fn install() -> &'static PrometheusSink {
    static SINK: PrometheusSink = PrometheusSink;
    &SINK
}

/// Renders every registered metric in the Prometheus text exposition format.
pub fn render() -> Result<String> {
    let mut buf = Vec::new();
    TextEncoder::new().encode(&prometheus::gather(), &mut buf)?;
    Ok(String::from_utf8(buf)?)
}
