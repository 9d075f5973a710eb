// Path: crates/attestation/src/metrics.rs
use once_cell::sync::OnceCell;
use whack_telemetry::sinks::{AttestationMetricsSink, NopSink};

static NOP_SINK: NopSink = NopSink;
pub static ATTESTATION_SINK: OnceCell<&'static dyn AttestationMetricsSink> = OnceCell::new();

pub fn attestation_metrics() -> &'static dyn AttestationMetricsSink {
    ATTESTATION_SINK.get().copied().unwrap_or(&NOP_SINK)
}
