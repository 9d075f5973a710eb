// Path: crates/attestation/src/ledger.rs
//! The per-player attestation ledger: rate limiting and nonce counters.
//!
//! Both operations are read-modify-write sequences on shared per-player
//! state. Every sequence runs while holding the single store lock, so two
//! concurrent requests for the same player can neither both pass the rate
//! check nor both receive the same nonce. Store calls run on the blocking
//! pool while the lock is held.

use crate::metrics::attestation_metrics as metrics;
use std::sync::Arc;
use tokio::sync::Mutex;
use whack_types::app::PlayerAddress;
use whack_types::error::{AttestError, StoreError};
use whack_types::store::LedgerStore;

/// Timing rules applied by the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerPolicy {
    /// Minimum seconds between two accepted requests of one player.
    pub min_interval_secs: u64,
    /// Submission records older than this are swept.
    pub retention_secs: u64,
    /// Whether sweeping a player's submission record also drops its nonce
    /// counter. Only safe when the first nonce is seeded above any value a
    /// previous counter could have reached.
    pub prune_nonces: bool,
}

impl Default for LedgerPolicy {
    fn default() -> Self {
        Self {
            min_interval_secs: 10,
            retention_secs: 3600,
            prune_nonces: false,
        }
    }
}

/// The result of a successful rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    /// Unix time recorded as the player's last submission.
    pub accepted_at: u64,
    /// The player has no nonce counter yet, so the next nonce may be seeded.
    pub first_nonce: bool,
}

pub struct AttestationLedger {
    store: Arc<Mutex<Box<dyn LedgerStore>>>,
    policy: LedgerPolicy,
}

impl std::fmt::Debug for AttestationLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttestationLedger")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl AttestationLedger {
    pub fn new(store: Box<dyn LedgerStore>, policy: LedgerPolicy) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            policy,
        }
    }

    pub fn in_memory(policy: LedgerPolicy) -> Self {
        Self::new(Box::new(crate::MemoryLedgerStore::new()), policy)
    }

    pub fn policy(&self) -> LedgerPolicy {
        self.policy
    }

    /// Runs `op` against the store under the ledger lock, on the blocking pool.
    /// Store calls may fsync.
    async fn with_store<T, E, F>(&self, op: F) -> Result<T, E>
    where
        T: Send + 'static,
        E: From<StoreError> + Send + 'static,
        F: FnOnce(&mut dyn LedgerStore) -> Result<T, E> + Send + 'static,
    {
        let mut store = self.store.clone().lock_owned().await;
        tokio::task::spawn_blocking(move || op(&mut **store))
            .await
            .map_err(|e| StoreError::Backend(format!("ledger task join error: {e}")))?
    }

    /// Checks the player's rate limit at `now` and, if the request is allowed,
    /// records it before returning. Records past retention are swept in the
    /// same store write; if that write fails the request is not admitted.
    pub async fn admit(&self, player: &PlayerAddress, now: u64) -> Result<Admission, AttestError> {
        let player = *player;
        let policy = self.policy;
        self.with_store(move |store| -> Result<Admission, AttestError> {
            if let Some(last) = store.last_submission(&player)? {
                // A clock that went backwards counts as "no time elapsed".
                let elapsed = now.saturating_sub(last);
                if elapsed < policy.min_interval_secs {
                    let retry_after = policy.min_interval_secs - elapsed;
                    tracing::debug!(target: "ledger", %player, retry_after, "rate limited");
                    return Err(AttestError::RateLimited { retry_after });
                }
            }

            let first_nonce = store.last_nonce(&player)?.is_none();
            let cutoff = now.saturating_sub(policy.retention_secs);
            let expired = store.record_submission(&player, now, cutoff, policy.prune_nonces)?;
            if !expired.is_empty() {
                tracing::debug!(target: "ledger", swept = expired.len(), "expired submission records");
            }
            match store.tracked_players() {
                Ok(n) => metrics().set_tracked_players(n as f64),
                Err(e) => tracing::warn!(target: "ledger", error = %e, "could not count tracked players"),
            }

            Ok(Admission {
                accepted_at: now,
                first_nonce,
            })
        })
        .await
    }

    /// Issues the next nonce for `player`: one above the larger of the stored
    /// counter and `floor`. Strictly increasing for as long as the store keeps
    /// the counter.
    pub async fn issue_nonce(
        &self,
        player: &PlayerAddress,
        floor: Option<u64>,
    ) -> Result<u64, StoreError> {
        let player = *player;
        self.with_store(move |store| -> Result<u64, StoreError> {
            let last = store.last_nonce(&player)?.unwrap_or(0);
            let base = floor.map_or(last, |f| f.max(last));
            let next = base
                .checked_add(1)
                .ok_or_else(|| StoreError::Backend(format!("nonce space exhausted for {player}")))?;
            store.set_last_nonce(&player, next)?;
            tracing::debug!(target: "ledger", %player, nonce = next, "nonce issued");
            Ok(next)
        })
        .await
    }

    pub async fn last_nonce(&self, player: &PlayerAddress) -> Result<Option<u64>, StoreError> {
        let player = *player;
        self.with_store(move |store| store.last_nonce(&player)).await
    }

    pub async fn last_submission(&self, player: &PlayerAddress) -> Result<Option<u64>, StoreError> {
        let player = *player;
        self.with_store(move |store| store.last_submission(&player)).await
    }

    pub async fn tracked_players(&self) -> Result<usize, StoreError> {
        self.with_store(|store| store.tracked_players()).await
    }
}
