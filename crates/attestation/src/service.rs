// Path: crates/attestation/src/service.rs
//! The request orchestrator: validate, rate-check, issue a nonce, sign.
//!
//! Each request walks `Received -> Validated -> RateChecked -> NonceIssued ->
//! Signed -> Responded`; a validation or rate-limit failure jumps straight to
//! `Responded`. There is no retry loop here, retries belong to the caller.

use crate::clock::{Clock, SystemClock};
use crate::ledger::{AttestationLedger, LedgerPolicy};
use crate::metrics::attestation_metrics as metrics;
use crate::nonce::NonceSeeding;
use crate::signer::ScoreSigner;
use crate::validator::ScoreValidator;
use alloy_primitives::Address;
use std::sync::Arc;
use whack_types::app::Attestation;
use whack_types::config::AttestorConfig;
use whack_types::error::AttestError;
use whack_types::store::LedgerStore;
use whack_types::wire::SignScoreRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Validated,
    RateChecked,
    NonceIssued,
    Signed,
}

pub struct AttestationService {
    validator: ScoreValidator,
    ledger: AttestationLedger,
    seeding: NonceSeeding,
    signer: ScoreSigner,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for AttestationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttestationService")
            .field("validator", &self.validator)
            .field("ledger", &self.ledger)
            .field("seeding", &self.seeding)
            .field("signer", &self.signer)
            .finish_non_exhaustive()
    }
}

impl AttestationService {
    pub fn new(
        validator: ScoreValidator,
        ledger: AttestationLedger,
        seeding: NonceSeeding,
        signer: ScoreSigner,
    ) -> Self {
        Self {
            validator,
            ledger,
            seeding,
            signer,
            clock: Arc::new(SystemClock),
        }
    }

    /// Wires a service from configuration. Counters are pruned along with
    /// expired submissions only when the seeding strategy allows it.
    pub fn from_config(
        config: &AttestorConfig,
        store: Box<dyn LedgerStore>,
        seeding: NonceSeeding,
        signer: ScoreSigner,
    ) -> Self {
        let policy = LedgerPolicy {
            min_interval_secs: config.min_submission_interval_secs,
            retention_secs: config.retention_secs,
            prune_nonces: seeding.prunes_counters(),
        };
        Self::new(
            ScoreValidator::new(config.max_score),
            AttestationLedger::new(store, policy),
            seeding,
            signer,
        )
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn signer_address(&self) -> Address {
        self.signer.address()
    }

    pub fn ledger(&self) -> &AttestationLedger {
        &self.ledger
    }

    pub fn max_score(&self) -> u64 {
        self.validator.max_score()
    }

    /// Handles one sign-score request end to end.
    pub async fn attest(&self, request: &SignScoreRequest) -> Result<Attestation, AttestError> {
        let result = self.run(request).await;
        let outcome = match &result {
            Ok(_) => "issued",
            Err(AttestError::Invalid(_)) => "invalid",
            Err(AttestError::RateLimited { .. }) => "rate_limited",
            Err(_) => "error",
        };
        metrics().inc_attestations(outcome);
        result
    }

    async fn run(&self, request: &SignScoreRequest) -> Result<Attestation, AttestError> {
        let claim = self.validator.validate(request)?;
        trace_stage(Stage::Validated, &claim.player.key());
        if request.nonce.is_some() {
            tracing::debug!(
                target: "attestor",
                player = %claim.player,
                "ignoring client-supplied nonce; issuing one server-side"
            );
        }

        let now = self.clock.now_secs();
        let admission = self.ledger.admit(&claim.player, now).await?;
        trace_stage(Stage::RateChecked, &claim.player.key());

        let floor = if admission.first_nonce {
            self.seeding.floor(&claim.player, now).await
        } else {
            None
        };
        let nonce = self.ledger.issue_nonce(&claim.player, floor).await?;
        metrics().inc_nonces_issued(self.seeding.label());
        trace_stage(Stage::NonceIssued, &claim.player.key());

        let (signature, message_hash) = self
            .signer
            .sign(&claim.player, claim.score, nonce)
            .map_err(|e| {
                tracing::error!(target: "attestor", error = %e, "signing failed");
                e
            })?;
        trace_stage(Stage::Signed, &claim.player.key());

        tracing::info!(
            target: "attestor",
            player = %claim.player,
            score = claim.score,
            nonce,
            "score signed"
        );

        Ok(Attestation {
            player: claim.player,
            score: claim.score,
            nonce,
            signature,
            message_hash,
            timestamp: admission.accepted_at,
        })
    }
}

fn trace_stage(stage: Stage, player: &str) {
    tracing::trace!(target: "attestor", ?stage, player, "stage reached");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::nonce::NonceOracle;
    use crate::signer::{recover_signer, score_digest};
    use async_trait::async_trait;
    use serde_json::json;
    use whack_types::app::PlayerAddress;
    use whack_types::error::{UpstreamError, ValidationError};

    const PLAYER: &str = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";
    const T0: u64 = 1_700_000_000;

    fn request(player: &str, score: u64) -> SignScoreRequest {
        serde_json::from_value(json!({"player": player, "score": score})).unwrap()
    }

    fn service(seeding: NonceSeeding) -> (AttestationService, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(T0));
        let config = AttestorConfig::default();
        let svc = AttestationService::from_config(
            &config,
            Box::new(crate::MemoryLedgerStore::new()),
            seeding,
            ScoreSigner::random(),
        )
        .with_clock(clock.clone());
        (svc, clock)
    }

    #[tokio::test]
    async fn end_to_end_scenario() {
        let (svc, clock) = service(NonceSeeding::Counter);

        let first = svc.attest(&request(PLAYER, 42)).await.unwrap();
        assert_eq!(first.nonce, 1);
        assert_eq!(first.timestamp, T0);
        assert_eq!(first.message_hash, score_digest(&first.player, 42, 1));

        clock.advance(3);
        match svc.attest(&request(PLAYER, 50)).await {
            Err(AttestError::RateLimited { retry_after }) => assert_eq!(retry_after, 7),
            other => panic!("expected 429, got {other:?}"),
        }

        clock.advance(7);
        let third = svc.attest(&request(PLAYER, 50)).await.unwrap();
        assert_eq!(third.nonce, 2);
        assert_eq!(third.score, 50);
    }

    #[tokio::test]
    async fn attestation_recovers_to_signer() {
        let (svc, _) = service(NonceSeeding::Counter);
        let a = svc.attest(&request(PLAYER, 1234)).await.unwrap();
        let recovered = recover_signer(&a.player, a.score, a.nonce, &a.signature).unwrap();
        assert_eq!(recovered, svc.signer_address());
    }

    #[tokio::test]
    async fn nonces_strictly_increase_over_accepted_requests() {
        let (svc, clock) = service(NonceSeeding::Counter);
        let mut last = 0;
        for _ in 0..10 {
            let a = svc.attest(&request(PLAYER, 10)).await.unwrap();
            assert!(a.nonce > last);
            last = a.nonce;
            clock.advance(10);
        }
        assert_eq!(last, 10);
    }

    #[tokio::test]
    async fn invalid_request_does_not_touch_ledger() {
        let (svc, _) = service(NonceSeeding::Counter);
        let player = PlayerAddress::parse(PLAYER).unwrap();
        let err = svc.attest(&request(PLAYER, 0)).await.unwrap_err();
        assert!(matches!(err, AttestError::Invalid(ValidationError::InvalidScore)));
        let err = svc.attest(&request(PLAYER, 2001)).await.unwrap_err();
        assert!(matches!(err, AttestError::Invalid(ValidationError::InvalidScore)));
        assert_eq!(svc.ledger().last_submission(&player).await.unwrap(), None);

        // The player is not rate limited by the rejected attempts.
        assert_eq!(svc.attest(&request(PLAYER, 2000)).await.unwrap().nonce, 1);
    }

    #[tokio::test]
    async fn case_variants_share_one_ledger_entry() {
        let (svc, _) = service(NonceSeeding::Counter);
        svc.attest(&request(PLAYER, 5)).await.unwrap();
        let err = svc
            .attest(&request(&PLAYER.to_lowercase(), 5))
            .await
            .unwrap_err();
        assert!(matches!(err, AttestError::RateLimited { .. }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_same_player_yields_one_attestation() {
        let (svc, _) = service(NonceSeeding::Counter);
        let svc = Arc::new(svc);
        let (a, b) = tokio::join!(
            {
                let svc = svc.clone();
                async move { svc.attest(&request(PLAYER, 42)).await }
            },
            {
                let svc = svc.clone();
                async move { svc.attest(&request(PLAYER, 42)).await }
            }
        );
        let oks = [&a, &b].iter().filter(|r| r.is_ok()).count();
        let limited = [&a, &b]
            .iter()
            .filter(|r| matches!(r, Err(AttestError::RateLimited { .. })))
            .count();
        assert_eq!((oks, limited), (1, 1));
    }

    #[tokio::test]
    async fn players_are_independent() {
        let (svc, clock) = service(NonceSeeding::Counter);
        let other = "0x00000000000000000000000000000000000000b0";
        assert_eq!(svc.attest(&request(PLAYER, 1)).await.unwrap().nonce, 1);
        assert_eq!(svc.attest(&request(other, 1)).await.unwrap().nonce, 1);
        clock.advance(10);
        assert_eq!(svc.attest(&request(other, 1)).await.unwrap().nonce, 2);
        assert_eq!(svc.attest(&request(PLAYER, 1)).await.unwrap().nonce, 2);
    }

    #[tokio::test]
    async fn time_seeded_first_nonce_is_above_clock_floor() {
        let (svc, clock) = service(NonceSeeding::TimeSeeded);
        let first = svc.attest(&request(PLAYER, 1)).await.unwrap();
        assert!(first.nonce > T0 * 1_000_000);
        clock.advance(10);
        let second = svc.attest(&request(PLAYER, 1)).await.unwrap();
        assert_eq!(second.nonce, first.nonce + 1);
    }

    struct StubOracle;

    #[async_trait]
    impl NonceOracle for StubOracle {
        async fn last_used_nonce(&self, _player: &PlayerAddress) -> Result<u64, UpstreamError> {
            Ok(500)
        }
    }

    #[tokio::test]
    async fn chain_seeded_first_nonce_exceeds_on_chain_value() {
        let (svc, _) = service(NonceSeeding::Chain {
            oracle: Arc::new(StubOracle),
            timeout: std::time::Duration::from_secs(5),
        });
        let first = svc.attest(&request(PLAYER, 1)).await.unwrap();
        assert!(first.nonce > 501 && first.nonce <= 1_501);
    }
}
