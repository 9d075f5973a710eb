// Path: crates/attestation/src/nonce.rs
//! Seeding strategies for the first nonce a player receives.
//!
//! The ledger counter is the single source of uniqueness: every nonce is one
//! above the larger of the stored counter and the floor computed here. The
//! floor only matters when the player has no counter yet (a fresh process, or
//! a swept record), and exists so that a restarted service does not hand out
//! nonces the contract has already consumed.

use crate::metrics::attestation_metrics as metrics;
use alloy_primitives::{keccak256, Address, U256};
use async_trait::async_trait;
use rand::Rng;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use whack_types::app::PlayerAddress;
use whack_types::error::UpstreamError;

/// Scale applied to the Unix time in the time-seeded floor, leaving room for a
/// million nonces per second of wall clock.
const TIME_SCALE: u64 = 1_000_000;
/// Upper bound of the random increment added to an on-chain nonce.
const CHAIN_JITTER_MAX: u64 = 1_000;

/// Reads the last nonce the contract accepted for a player.
#[async_trait]
pub trait NonceOracle: Send + Sync {
    async fn last_used_nonce(&self, player: &PlayerAddress) -> Result<u64, UpstreamError>;
}

pub enum NonceSeeding {
    /// No floor: nonces start at 1.
    Counter,
    /// Floor of `now * 1_000_000 + rand(0..1_000_000)`.
    TimeSeeded,
    /// Floor of the contract's last-used nonce plus `rand(1..=1000)`, with the
    /// time-seeded floor as fallback when the read fails or exceeds `timeout`.
    Chain {
        oracle: Arc<dyn NonceOracle>,
        timeout: Duration,
    },
}

impl std::fmt::Debug for NonceSeeding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Counter => f.write_str("Counter"),
            Self::TimeSeeded => f.write_str("TimeSeeded"),
            Self::Chain { timeout, .. } => f
                .debug_struct("Chain")
                .field("timeout", timeout)
                .finish_non_exhaustive(),
        }
    }
}

impl NonceSeeding {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Counter => "counter",
            Self::TimeSeeded => "time_seeded",
            Self::Chain { .. } => "chain",
        }
    }

    /// Seeded sources re-seed above any earlier counter, so the ledger may drop
    /// counters together with expired submission records.
    pub fn prunes_counters(&self) -> bool {
        !matches!(self, Self::Counter)
    }

    /// The floor for a player's first nonce. Never fails: an unreachable chain
    /// degrades to the time-seeded floor.
    pub async fn floor(&self, player: &PlayerAddress, now: u64) -> Option<u64> {
        match self {
            Self::Counter => None,
            Self::TimeSeeded => Some(time_seeded_floor(now)),
            Self::Chain { oracle, timeout } => {
                let outcome = match tokio::time::timeout(*timeout, oracle.last_used_nonce(player)).await
                {
                    Ok(result) => result,
                    Err(_) => Err(UpstreamError::Timeout(*timeout)),
                };
                match outcome {
                    Ok(last) => {
                        let jitter = rand::thread_rng().gen_range(1..=CHAIN_JITTER_MAX);
                        tracing::debug!(target: "nonce", %player, last, jitter, "seeded from chain");
                        Some(last.saturating_add(jitter))
                    }
                    Err(e) => {
                        tracing::warn!(
                            target: "nonce",
                            %player,
                            error = %e,
                            "on-chain nonce read failed; falling back to time-seeded floor"
                        );
                        metrics().inc_nonce_upstream_fallback();
                        Some(time_seeded_floor(now))
                    }
                }
            }
        }
    }
}

/// `now * 1_000_000 + rand(0..1_000_000)`.
pub fn time_seeded_floor(now: u64) -> u64 {
    now.saturating_mul(TIME_SCALE)
        .saturating_add(rand::thread_rng().gen_range(0..TIME_SCALE))
}

/// Computes the 4-byte selector of a Solidity function signature.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// A [`NonceOracle`] that calls a `view` function through JSON-RPC `eth_call`.
#[derive(Debug, Clone)]
pub struct JsonRpcNonceOracle {
    client: reqwest::Client,
    rpc_url: String,
    contract: Address,
    selector: [u8; 4],
    timeout: Duration,
}

impl JsonRpcNonceOracle {
    /// `view_signature` is the Solidity signature of a function taking the
    /// player address and returning a `uint256`, e.g. `nonces(address)`.
    pub fn new(
        rpc_url: impl Into<String>,
        contract: Address,
        view_signature: &str,
        timeout: Duration,
    ) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            rpc_url: rpc_url.into(),
            contract,
            selector: selector(view_signature),
            timeout,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// `selector || abi.encode(player)`.
    pub fn call_data(&self, player: &PlayerAddress) -> Vec<u8> {
        let mut data = Vec::with_capacity(4 + 32);
        data.extend_from_slice(&self.selector);
        data.extend_from_slice(&[0u8; 12]);
        data.extend_from_slice(player.as_bytes());
        data
    }
}

#[async_trait]
impl NonceOracle for JsonRpcNonceOracle {
    async fn last_used_nonce(&self, player: &PlayerAddress) -> Result<u64, UpstreamError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_call",
            "params": [
                {
                    "to": format!("{:#x}", self.contract),
                    "data": format!("0x{}", hex::encode(self.call_data(player))),
                },
                "latest"
            ],
        });
        let response = self
            .client
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    UpstreamError::Timeout(self.timeout)
                } else {
                    UpstreamError::Transport(e.to_string())
                }
            })?
            .error_for_status()
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;
        let payload: Value = response
            .json()
            .await
            .map_err(|e| UpstreamError::Malformed(e.to_string()))?;
        decode_call_result(&payload)
    }
}

/// Decodes a JSON-RPC `eth_call` response carrying a single `uint256`.
pub fn decode_call_result(payload: &Value) -> Result<u64, UpstreamError> {
    if let Some(err) = payload.get("error") {
        return Err(UpstreamError::Rpc {
            code: err.get("code").and_then(Value::as_i64).unwrap_or(0),
            message: err
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string(),
        });
    }
    let result = payload
        .get("result")
        .and_then(Value::as_str)
        .ok_or_else(|| UpstreamError::Malformed("missing result".into()))?;
    let bytes = hex::decode(result.trim_start_matches("0x"))
        .map_err(|e| UpstreamError::Malformed(e.to_string()))?;
    if bytes.len() < 32 {
        return Err(UpstreamError::Malformed(format!(
            "expected a 32-byte word, got {} bytes",
            bytes.len()
        )));
    }
    let value = U256::from_be_slice(&bytes[..32]);
    u64::try_from(value).map_err(|_| UpstreamError::Malformed(format!("nonce {value} exceeds u64")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedOracle(u64);

    #[async_trait]
    impl NonceOracle for FixedOracle {
        async fn last_used_nonce(&self, _player: &PlayerAddress) -> Result<u64, UpstreamError> {
            Ok(self.0)
        }
    }

    struct FailingOracle(AtomicUsize);

    #[async_trait]
    impl NonceOracle for FailingOracle {
        async fn last_used_nonce(&self, _player: &PlayerAddress) -> Result<u64, UpstreamError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(UpstreamError::Transport("connection refused".into()))
        }
    }

    struct SlowOracle;

    #[async_trait]
    impl NonceOracle for SlowOracle {
        async fn last_used_nonce(&self, _player: &PlayerAddress) -> Result<u64, UpstreamError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(1)
        }
    }

    fn player() -> PlayerAddress {
        PlayerAddress::new(Address::repeat_byte(0x11))
    }

    #[tokio::test]
    async fn counter_has_no_floor() {
        assert_eq!(NonceSeeding::Counter.floor(&player(), 1_700_000_000).await, None);
    }

    #[tokio::test]
    async fn time_seeded_floor_is_scaled_clock() {
        let now = 1_700_000_000;
        let floor = NonceSeeding::TimeSeeded.floor(&player(), now).await.unwrap();
        assert!(floor >= now * TIME_SCALE);
        assert!(floor < (now + 1) * TIME_SCALE);
    }

    #[tokio::test]
    async fn chain_floor_adds_jitter_to_last_used() {
        let seeding = NonceSeeding::Chain {
            oracle: Arc::new(FixedOracle(41)),
            timeout: Duration::from_secs(5),
        };
        let floor = seeding.floor(&player(), 1_700_000_000).await.unwrap();
        assert!((42..=41 + CHAIN_JITTER_MAX).contains(&floor));
    }

    #[tokio::test]
    async fn chain_failure_falls_back_to_time_floor() {
        let oracle = Arc::new(FailingOracle(AtomicUsize::new(0)));
        let seeding = NonceSeeding::Chain {
            oracle: oracle.clone(),
            timeout: Duration::from_secs(5),
        };
        let now = 1_700_000_000;
        let floor = seeding.floor(&player(), now).await.unwrap();
        assert!(floor >= now * TIME_SCALE);
        assert_eq!(oracle.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn chain_timeout_falls_back_to_time_floor() {
        let seeding = NonceSeeding::Chain {
            oracle: Arc::new(SlowOracle),
            timeout: Duration::from_millis(50),
        };
        let now = 1_700_000_000;
        let floor = seeding.floor(&player(), now).await.unwrap();
        assert!(floor >= now * TIME_SCALE);
    }

    #[test]
    fn selector_matches_known_value() {
        // ERC-2612 `nonces(address)`.
        assert_eq!(selector("nonces(address)"), [0x7e, 0xce, 0xbe, 0x00]);
    }

    #[test]
    fn call_data_left_pads_player() {
        let oracle = JsonRpcNonceOracle::new(
            "http://127.0.0.1:8545",
            Address::repeat_byte(0x22),
            "nonces(address)",
            Duration::from_secs(1),
        )
        .unwrap();
        let data = oracle.call_data(&player());
        assert_eq!(data.len(), 36);
        assert_eq!(&data[..4], &[0x7e, 0xce, 0xbe, 0x00]);
        assert!(data[4..16].iter().all(|b| *b == 0));
        assert_eq!(&data[16..], player().as_bytes());
    }

    #[tokio::test]
    async fn stalled_endpoint_reports_configured_timeout() {
        // Accepts the connection and never answers.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _server = tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let timeout = Duration::from_millis(150);
        let oracle = JsonRpcNonceOracle::new(
            format!("http://{addr}"),
            Address::repeat_byte(0x22),
            "nonces(address)",
            timeout,
        )
        .unwrap();
        assert_eq!(oracle.timeout(), timeout);
        match oracle.last_used_nonce(&player()).await {
            Err(UpstreamError::Timeout(reported)) => assert_eq!(reported, timeout),
            other => panic!("expected a timeout, got {other:?}"),
        }
    }

    #[test]
    fn decodes_uint256_result() {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": "0x000000000000000000000000000000000000000000000000000000000000002a"
        });
        assert_eq!(decode_call_result(&payload).unwrap(), 42);
    }

    #[test]
    fn surfaces_rpc_errors_and_garbage() {
        let err = decode_call_result(&json!({"error": {"code": -32000, "message": "execution reverted"}}))
            .unwrap_err();
        assert!(matches!(err, UpstreamError::Rpc { code: -32000, .. }));

        assert!(matches!(
            decode_call_result(&json!({"result": "0x01"})),
            Err(UpstreamError::Malformed(_))
        ));
        assert!(matches!(
            decode_call_result(&json!({"result": format!("0x{}", "ff".repeat(32))})),
            Err(UpstreamError::Malformed(_))
        ));
        assert!(matches!(
            decode_call_result(&json!({})),
            Err(UpstreamError::Malformed(_))
        ));
    }
}
