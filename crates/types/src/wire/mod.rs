// Path: crates/types/src/wire/mod.rs

//! Request and response bodies of `POST /api/sign-score`.
//!
//! The request is deserialised loosely (every field is a raw JSON value) so
//! that each malformed field maps to its own stable error string; the strict
//! typing happens in the attestation validator.

use crate::app::Attestation;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The raw body of a sign-score request.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct SignScoreRequest {
    /// The player address, expected to be a string.
    #[serde(default)]
    pub player: Value,
    /// The claimed score, expected to be a positive integer.
    #[serde(default)]
    pub score: Value,
    /// A client-supplied nonce. Accepted for compatibility and validated, but
    /// the issued nonce is always generated by the service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<Value>,
}

/// The body of a successful sign-score response.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SignScoreResponse {
    /// `0x`-hex 65-byte signature.
    pub signature: String,
    /// The server-issued nonce to pass to `submitScore`.
    pub nonce: u64,
    /// Unix time (seconds) at which the request was accepted.
    pub timestamp: u64,
    /// `0x`-hex keccak256 digest that was signed.
    pub message_hash: String,
}

impl From<&Attestation> for SignScoreResponse {
    fn from(a: &Attestation) -> Self {
        Self {
            signature: a.signature.clone(),
            nonce: a.nonce,
            timestamp: a.timestamp,
            message_hash: format!("{:#x}", a.message_hash),
        }
    }
}

/// The body of every error response.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    /// A stable, human-readable error kind.
    pub error: String,
    /// Seconds until a rate-limited caller may retry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
    /// Additional detail for server-side failures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorResponse {
    /// An error body carrying only the `error` field.
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            retry_after: None,
            message: None,
        }
    }
}
