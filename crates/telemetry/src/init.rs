// Path: crates/telemetry/src/init.rs
use anyhow::{anyhow, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

/// Initializes the global `tracing` subscriber for structured JSON logging.
///
/// The filter is read from `RUST_LOG` and defaults to `info`.
pub fn init_tracing() -> Result<()> {
    let fmt_layer = fmt::layer()
        .json()
        .with_target(true)
        .with_timer(fmt::time::UtcTime::rfc_3339());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = Registry::default().with(filter).with(fmt_layer);
    tracing_log::LogTracer::init().map_err(|e| anyhow!("failed to set `log` to `tracing` bridge: {e}"))?;
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow!("failed to set global subscriber: {e}"))?;
    Ok(())
}
