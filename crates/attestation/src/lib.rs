// Path: crates/attestation/src/lib.rs
#![forbid(unsafe_code)]

//! # Whack Attestation
//!
//! The trust boundary between an untrusted game client and the on-chain
//! prize payout. A request flows through four stages:
//!
//! 1. [`validator`]: strict parsing of `{player, score[, nonce]}`.
//! 2. [`ledger`]: per-player rate limiting, serialised with
//! 3. nonce issuance (seeded by a [`nonce::NonceSeeding`] strategy).
//! 4. [`signer`]: an EIP-191 personal-message signature over
//!    `keccak256(abi.encodePacked(player, score, nonce))`.
//!
//! [`service::AttestationService`] sequences the stages.

pub mod clock;
pub mod ledger;
pub mod memory_store;
pub mod metrics;
pub mod nonce;
pub mod service;
pub mod signer;
pub mod validator;

pub use clock::{Clock, ManualClock, SystemClock};
pub use ledger::{Admission, AttestationLedger, LedgerPolicy};
pub use memory_store::MemoryLedgerStore;
pub use nonce::{JsonRpcNonceOracle, NonceOracle, NonceSeeding};
pub use service::AttestationService;
pub use signer::{score_digest, ScoreSigner};
pub use validator::ScoreValidator;
