// Path: crates/types/src/lib.rs
#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! # Whack Types
//!
//! Foundational types for the score attestation service: the canonical
//! `PlayerAddress`, the HTTP wire bodies, configuration objects, the error
//! taxonomy and the `LedgerStore` abstraction.
//!
//! ## Architectural Role
//!
//! Every other crate in the workspace depends on this one. Keeping the shared
//! definitions here lets the persistent store, the attestation core and the
//! HTTP gateway agree on one set of types without depending on each other.

/// Domain types: `PlayerAddress`, `ScoreClaim` and the issued `Attestation`.
pub mod app;
/// Service configuration (`AttestorConfig`) and its environment overrides.
pub mod config;
/// The unified set of error types used across the service.
pub mod error;
/// The pluggable per-player ledger storage abstraction.
pub mod store;
/// Request and response bodies for the HTTP surface.
pub mod wire;
