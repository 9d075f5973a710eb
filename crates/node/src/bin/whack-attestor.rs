// Path: crates/node/src/bin/whack-attestor.rs
#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use whack_attestation::{
    AttestationService, JsonRpcNonceOracle, MemoryLedgerStore, NonceSeeding, ScoreSigner,
};
use whack_gateway::GatewayConfig;
use whack_storage::RedbLedgerStore;
use whack_types::app::PlayerAddress;
use whack_types::config::{AttestorConfig, NonceConfig, NonceSourceKind, SIGNING_KEY_ENV};
use whack_types::error::ConfigError;
use whack_types::store::LedgerStore;
use zeroize::Zeroizing;

#[derive(Parser, Debug)]
#[clap(name = "whack-attestor", about = "Signs whack-a-mole scores for on-chain submission")]
struct AttestorOpts {
    #[clap(long, env = "ATTESTOR_CONFIG", help = "Path to attestor.toml")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    whack_telemetry::init::init_tracing()?;
    let opts = AttestorOpts::parse();

    let mut config = AttestorConfig::load(opts.config.as_deref())?;
    config.apply_env(|k| std::env::var(k).ok())?;
    config.validate()?;

    // Fail fast: without a key no request could ever succeed.
    let signer = load_signer()?;
    tracing::info!(target: "attestor", signer = %signer.address(), "signing key loaded");

    let sink = whack_telemetry::prometheus::install();
    whack_attestation::metrics::ATTESTATION_SINK
        .set(sink)
        .map_err(|_| anyhow::anyhow!("attestation metrics sink already set"))?;
    whack_gateway::metrics::HTTP_SINK
        .set(sink)
        .map_err(|_| anyhow::anyhow!("http metrics sink already set"))?;

    let store = open_store(&config)?;
    let seeding = build_seeding(&config.nonce)?;
    tracing::info!(
        target: "attestor",
        nonce_source = seeding.label(),
        max_score = config.max_score,
        min_interval_secs = config.min_submission_interval_secs,
        origins = ?config.allowed_origins,
        "attestor configured"
    );
    let service = Arc::new(AttestationService::from_config(&config, store, seeding, signer));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let server = tokio::spawn(whack_gateway::run_server(
        GatewayConfig::from(&config),
        service,
        shutdown_rx,
    ));

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!(target: "attestor", "Ctrl-C received, initiating shutdown.");
        }
    }
    shutdown_tx.send(true).ok();
    server.await??;
    Ok(())
}

fn load_signer() -> Result<ScoreSigner> {
    let key = Zeroizing::new(
        std::env::var(SIGNING_KEY_ENV)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or(ConfigError::MissingSigningKey(SIGNING_KEY_ENV))?,
    );
    ScoreSigner::from_hex(&key).with_context(|| format!("{SIGNING_KEY_ENV} is not a usable key"))
}

fn open_store(config: &AttestorConfig) -> Result<Box<dyn LedgerStore>> {
    Ok(match &config.ledger_path {
        Some(path) => Box::new(
            RedbLedgerStore::open(path)
                .with_context(|| format!("opening ledger at {}", path.display()))?,
        ),
        None => {
            tracing::info!(target: "attestor", "using in-memory ledger; state is lost on restart");
            Box::new(MemoryLedgerStore::new())
        }
    })
}

fn build_seeding(config: &NonceConfig) -> Result<NonceSeeding> {
    Ok(match config.source {
        NonceSourceKind::Counter => NonceSeeding::Counter,
        NonceSourceKind::TimeSeeded => NonceSeeding::TimeSeeded,
        NonceSourceKind::Chain => {
            let timeout = Duration::from_millis(config.rpc_timeout_ms);
            let rpc_url = config
                .chain_rpc_url
                .clone()
                .ok_or_else(|| ConfigError::Invalid("CHAIN_RPC_URL is required".into()))?;
            let contract = config
                .contract_address
                .as_deref()
                .ok_or_else(|| ConfigError::Invalid("SCORE_CONTRACT is required".into()))
                .and_then(|raw| {
                    PlayerAddress::parse(raw.trim()).map_err(|_| {
                        ConfigError::Invalid(format!("SCORE_CONTRACT {raw:?} is not an address"))
                    })
                })?;
            let oracle =
                JsonRpcNonceOracle::new(rpc_url, contract.address(), &config.view_signature, timeout)?;
            NonceSeeding::Chain {
                oracle: Arc::new(oracle),
                timeout,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_local_seedings() {
        let mut cfg = NonceConfig::default();
        assert_eq!(build_seeding(&cfg).unwrap().label(), "counter");
        cfg.source = NonceSourceKind::TimeSeeded;
        assert_eq!(build_seeding(&cfg).unwrap().label(), "time_seeded");
    }

    #[test]
    fn chain_seeding_needs_a_valid_contract() {
        let mut cfg = NonceConfig {
            source: NonceSourceKind::Chain,
            chain_rpc_url: Some("http://127.0.0.1:8545".into()),
            contract_address: Some("0x1234".into()),
            ..NonceConfig::default()
        };
        assert!(build_seeding(&cfg).is_err());

        cfg.contract_address = Some(format!("0x{}", "ab".repeat(20)));
        assert_eq!(build_seeding(&cfg).unwrap().label(), "chain");
    }

    #[test]
    fn ledger_path_selects_redb() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = AttestorConfig {
            ledger_path: Some(dir.path().join("ledger.redb")),
            ..AttestorConfig::default()
        };
        let store = open_store(&cfg).unwrap();
        assert_eq!(store.tracked_players().unwrap(), 0);
        assert!(dir.path().join("ledger.redb").exists());
    }
}
