// Path: crates/types/src/config/mod.rs

//! Shared configuration structures for the score attestation service.
//!
//! Configuration is layered: every field has a default, an optional TOML file
//! overrides the defaults, and environment variables override the file. The
//! signing key is absent from these structures; it is read from
//! [`SIGNING_KEY_ENV`] by the binary and handed straight to the signer.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The environment variable holding the hex-encoded secp256k1 signing key.
pub const SIGNING_KEY_ENV: &str = "SIGNER_PRIVATE_KEY";

/// The origin allowed in production deployments when none is configured.
pub const PRODUCTION_ORIGIN: &str = "https://whack.mistermonkee.com";
/// The origin allowed in development when none is configured.
pub const DEVELOPMENT_ORIGIN: &str = "http://localhost:3000";

/// Where the first nonce for a player comes from.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum NonceSourceKind {
    /// A plain per-player counter starting at 1.
    #[default]
    Counter,
    /// The counter is seeded from `now * 1_000_000 + random` on first use, so a
    /// restarted process issues nonces above anything it issued before.
    TimeSeeded,
    /// The counter is seeded from the contract's last-used nonce plus a random
    /// increment, falling back to the time-seeded floor if the node is unreachable.
    Chain,
}

impl std::str::FromStr for NonceSourceKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "counter" => Ok(Self::Counter),
            "time-seeded" | "time_seeded" | "timeseeded" => Ok(Self::TimeSeeded),
            "chain" => Ok(Self::Chain),
            other => Err(ConfigError::Invalid(format!("unknown nonce source '{other}'"))),
        }
    }
}

/// Nonce issuance configuration.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct NonceConfig {
    /// Which seeding strategy to use.
    #[serde(default)]
    pub source: NonceSourceKind,
    /// JSON-RPC endpoint of a chain node, required by the `chain` source.
    #[serde(default)]
    pub chain_rpc_url: Option<String>,
    /// Address of the score contract, required by the `chain` source.
    #[serde(default)]
    pub contract_address: Option<String>,
    /// Solidity signature of the last-used-nonce view function.
    #[serde(default = "default_view_signature")]
    pub view_signature: String,
    /// Upper bound on the on-chain read, in milliseconds.
    #[serde(default = "default_rpc_timeout_ms")]
    pub rpc_timeout_ms: u64,
}

fn default_view_signature() -> String {
    "nonces(address)".to_string()
}
fn default_rpc_timeout_ms() -> u64 {
    5_000
}

impl Default for NonceConfig {
    fn default() -> Self {
        Self {
            source: NonceSourceKind::default(),
            chain_rpc_url: None,
            contract_address: None,
            view_signature: default_view_signature(),
            rpc_timeout_ms: default_rpc_timeout_ms(),
        }
    }
}

/// Hardening and abuse protection for the HTTP surface.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct HardeningConfig {
    /// Enables the per-IP limiter. Defaults to `true`.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Per-IP token refill rate (requests per second).
    #[serde(default = "default_ip_rps")]
    pub ip_rps: u32,
    /// Per-IP burst allowance.
    #[serde(default = "default_ip_burst")]
    pub ip_burst: u32,
    /// Maximum request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Timeout for a single request in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Trusted proxy CIDRs. Requests from these peers are keyed by the first
    /// `X-Forwarded-For` entry instead of the socket address.
    /// e.g. ["127.0.0.1/32","10.0.0.0/8"]
    #[serde(default)]
    pub trusted_proxy_cidrs: Vec<String>,
}

fn default_true() -> bool {
    true
}
fn default_ip_rps() -> u32 {
    5
}
fn default_ip_burst() -> u32 {
    20
}
fn default_max_body_bytes() -> usize {
    16 * 1024
}
fn default_request_timeout_ms() -> u64 {
    10_000
}

impl Default for HardeningConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            ip_rps: default_ip_rps(),
            ip_burst: default_ip_burst(),
            max_body_bytes: default_max_body_bytes(),
            request_timeout_ms: default_request_timeout_ms(),
            trusted_proxy_cidrs: Vec::new(),
        }
    }
}

/// Configuration for the attestation service (`attestor.toml`).
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AttestorConfig {
    /// The socket address the HTTP server binds to.
    #[serde(default = "default_listen_address")]
    pub listen_address: String,
    /// The highest score that will be attested.
    #[serde(default = "default_max_score")]
    pub max_score: u64,
    /// Minimum number of seconds between two accepted requests of one player.
    #[serde(default = "default_min_submission_interval_secs")]
    pub min_submission_interval_secs: u64,
    /// Submission records older than this many seconds are swept.
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,
    /// Origins allowed by CORS. Empty means "derive from the deployment environment".
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    /// When set, the ledger is persisted in a redb file at this path.
    #[serde(default)]
    pub ledger_path: Option<PathBuf>,
    /// Nonce issuance settings.
    #[serde(default)]
    pub nonce: NonceConfig,
    /// HTTP hardening settings.
    #[serde(default)]
    pub hardening: HardeningConfig,
}

fn default_listen_address() -> String {
    "0.0.0.0:3000".to_string()
}
fn default_max_score() -> u64 {
    2000
}
fn default_min_submission_interval_secs() -> u64 {
    10
}
fn default_retention_secs() -> u64 {
    3600
}

impl Default for AttestorConfig {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            max_score: default_max_score(),
            min_submission_interval_secs: default_min_submission_interval_secs(),
            retention_secs: default_retention_secs(),
            allowed_origins: Vec::new(),
            ledger_path: None,
            nonce: NonceConfig::default(),
            hardening: HardeningConfig::default(),
        }
    }
}

impl AttestorConfig {
    /// Parses a TOML document, filling omitted fields with defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Loads the TOML file at `path`, or the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::from_toml_str(&std::fs::read_to_string(p)?),
            None => Ok(Self::default()),
        }
    }

    /// Applies environment overrides through `lookup` (normally `std::env::var`).
    ///
    /// Recognised variables: `LISTEN_ADDR`, `PORT`, `MAX_SCORE`,
    /// `MIN_SUBMISSION_INTERVAL`, `ALLOWED_ORIGINS`, `APP_ENV`, `LEDGER_PATH`,
    /// `NONCE_SOURCE`, `CHAIN_RPC_URL`, `SCORE_CONTRACT`, `NONCE_VIEW_SIGNATURE`,
    /// `CHAIN_RPC_TIMEOUT_MS`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup("LISTEN_ADDR") {
            self.listen_address = addr;
        } else if let Some(port) = lookup("PORT") {
            let port: u16 = parse_var("PORT", &port)?;
            self.listen_address = format!("0.0.0.0:{port}");
        }
        if let Some(v) = lookup("MAX_SCORE") {
            self.max_score = parse_var("MAX_SCORE", &v)?;
        }
        if let Some(v) = lookup("MIN_SUBMISSION_INTERVAL") {
            self.min_submission_interval_secs = parse_var("MIN_SUBMISSION_INTERVAL", &v)?;
        }
        if let Some(v) = lookup("ALLOWED_ORIGINS") {
            self.allowed_origins = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        if self.allowed_origins.is_empty() {
            let production = lookup("APP_ENV")
                .map(|e| e.eq_ignore_ascii_case("production"))
                .unwrap_or(false);
            self.allowed_origins = vec![if production {
                PRODUCTION_ORIGIN.to_string()
            } else {
                DEVELOPMENT_ORIGIN.to_string()
            }];
        }
        if let Some(v) = lookup("LEDGER_PATH") {
            self.ledger_path = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("NONCE_SOURCE") {
            self.nonce.source = v.parse()?;
        }
        if let Some(v) = lookup("CHAIN_RPC_URL") {
            self.nonce.chain_rpc_url = Some(v);
        }
        if let Some(v) = lookup("SCORE_CONTRACT") {
            self.nonce.contract_address = Some(v);
        }
        if let Some(v) = lookup("NONCE_VIEW_SIGNATURE") {
            self.nonce.view_signature = v;
        }
        if let Some(v) = lookup("CHAIN_RPC_TIMEOUT_MS") {
            self.nonce.rpc_timeout_ms = parse_var("CHAIN_RPC_TIMEOUT_MS", &v)?;
        }
        Ok(())
    }

    /// Rejects configurations the service cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_score == 0 {
            return Err(ConfigError::Invalid("max_score must be positive".into()));
        }
        if self.retention_secs < self.min_submission_interval_secs {
            return Err(ConfigError::Invalid(
                "retention_secs must not be shorter than min_submission_interval_secs".into(),
            ));
        }
        if self.nonce.source == NonceSourceKind::Chain {
            if self.nonce.chain_rpc_url.is_none() {
                return Err(ConfigError::Invalid(
                    "nonce source 'chain' requires CHAIN_RPC_URL".into(),
                ));
            }
            if self.nonce.contract_address.is_none() {
                return Err(ConfigError::Invalid(
                    "nonce source 'chain' requires SCORE_CONTRACT".into(),
                ));
            }
            if self.nonce.rpc_timeout_ms == 0 {
                return Err(ConfigError::Invalid(
                    "rpc_timeout_ms must be positive".into(),
                ));
            }
            // The chain read happens after admission and must finish inside
            // the request deadline.
            if self.nonce.rpc_timeout_ms >= self.hardening.request_timeout_ms {
                return Err(ConfigError::Invalid(format!(
                    "rpc_timeout_ms ({}) must be shorter than request_timeout_ms ({})",
                    self.nonce.rpc_timeout_ms, self.hardening.request_timeout_ms
                )));
            }
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("{name}={value:?} is not a valid value")))
}
