// Path: crates/types/src/error/mod.rs
//! Core error types for the score attestation service.

use std::time::Duration;
use thiserror::Error;

/// A request that failed input validation. No state is mutated when one of
/// these is returned.
///
/// The `Display` strings are the stable `error` values of the HTTP surface.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    /// The `player` field is missing or is not a valid chain address.
    #[error("Invalid player address")]
    InvalidPlayer,
    /// The `score` field is missing, not an integer, zero, or above the ceiling.
    #[error("Invalid score")]
    InvalidScore,
    /// A client-supplied `nonce` field is not a non-negative integer.
    #[error("Invalid nonce")]
    InvalidNonce,
}

/// Errors related to the persistent or in-memory ledger store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A generic error originating from the underlying store backend.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Errors raised while reading the last-used nonce from the chain.
#[derive(Error, Debug)]
pub enum UpstreamError {
    /// The JSON-RPC transport failed (connection refused, TLS, HTTP status).
    #[error("transport error: {0}")]
    Transport(String),
    /// The node did not answer within the configured bound.
    #[error("upstream timed out after {0:?}")]
    Timeout(Duration),
    /// The node answered with a JSON-RPC error object.
    #[error("rpc error {code}: {message}")]
    Rpc {
        /// The JSON-RPC error code.
        code: i64,
        /// The JSON-RPC error message.
        message: String,
    },
    /// The response could not be decoded into a nonce.
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Errors raised by the signer. Only catastrophic misconfiguration or a
/// cryptographic primitive failure can produce one.
#[derive(Error, Debug)]
pub enum SignerError {
    /// The configured key is not a valid secp256k1 secret key.
    #[error("invalid signing key")]
    InvalidKey,
    /// The signing primitive failed.
    #[error("signing failed: {0}")]
    Signing(String),
    /// A signature could not be decoded or recovered.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),
}

/// The outcome of a failed attestation request.
#[derive(Error, Debug)]
pub enum AttestError {
    /// The request failed input validation.
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    /// The player asked again before the minimum interval elapsed.
    #[error("Too many submissions")]
    RateLimited {
        /// Seconds until the player may ask again.
        retry_after: u64,
    },
    /// The signer failed.
    #[error("signing failure: {0}")]
    Signing(#[from] SignerError),
    /// The ledger store failed.
    #[error("ledger store failure: {0}")]
    Store(#[from] StoreError),
}

/// Errors raised while loading or validating configuration at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The signing key environment variable is not set.
    #[error("signing key not configured: set {0}")]
    MissingSigningKey(&'static str),
    /// A configuration value is out of range or inconsistent.
    #[error("invalid configuration: {0}")]
    Invalid(String),
    /// The configuration file could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    /// The configuration file is not valid TOML for `AttestorConfig`.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}
