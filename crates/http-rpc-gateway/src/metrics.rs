// Path: crates/http-rpc-gateway/src/metrics.rs
use once_cell::sync::OnceCell;
use whack_telemetry::sinks::{HttpMetricsSink, NopSink};

static NOP_SINK: NopSink = NopSink;
pub static HTTP_SINK: OnceCell<&'static dyn HttpMetricsSink> = OnceCell::new();

pub fn http_metrics() -> &'static dyn HttpMetricsSink {
    HTTP_SINK.get().copied().unwrap_or(&NOP_SINK)
}
