// Path: crates/types/src/app/mod.rs
//! Core domain types: players, score claims and issued attestations.

use crate::error::ValidationError;
use alloy_primitives::{Address, B256};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// The number of hex characters in a 20-byte chain address.
const ADDRESS_HEX_LEN: usize = 40;

/// A 20-byte chain address identifying a player across all service state.
///
/// Parsing accepts an optional lower-case `0x` prefix and exactly 40 hex
/// characters, with no surrounding whitespace. All-lower and
/// all-upper case inputs are accepted as-is; mixed-case inputs must carry a
/// valid EIP-55 checksum. Two addresses compare equal regardless of the case
/// they were written in, and the canonical textual form is lower-case.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlayerAddress(Address);

impl PlayerAddress {
    /// Wraps an already-decoded address.
    pub fn new(address: Address) -> Self {
        Self(address)
    }

    /// Parses a textual address, enforcing the checksum rule for mixed-case input.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let hex_part = input.strip_prefix("0x").unwrap_or(input);
        if hex_part.len() != ADDRESS_HEX_LEN || !hex_part.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ValidationError::InvalidPlayer);
        }
        let bytes = hex::decode(hex_part).map_err(|_| ValidationError::InvalidPlayer)?;
        let address = Address::from_slice(&bytes);

        let has_lower = hex_part.bytes().any(|b| b.is_ascii_lowercase());
        let has_upper = hex_part.bytes().any(|b| b.is_ascii_uppercase());
        if has_lower && has_upper {
            let checksummed = address.to_checksum(None);
            if checksummed[2..] != *hex_part {
                return Err(ValidationError::InvalidPlayer);
            }
        }
        Ok(Self(address))
    }

    /// The underlying 20-byte address.
    pub fn address(&self) -> Address {
        self.0
    }

    /// The raw address bytes, as packed into the signed digest.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_slice()
    }

    /// The canonical lower-case `0x`-prefixed key used by ledger stores.
    pub fn key(&self) -> String {
        format!("0x{}", hex::encode(self.0.as_slice()))
    }

    /// The EIP-55 checksummed form, for display to humans.
    pub fn checksummed(&self) -> String {
        self.0.to_checksum(None)
    }
}

impl fmt::Display for PlayerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

impl fmt::Debug for PlayerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PlayerAddress({})", self.key())
    }
}

impl FromStr for PlayerAddress {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<Address> for PlayerAddress {
    fn from(address: Address) -> Self {
        Self(address)
    }
}

impl Serialize for PlayerAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.key())
    }
}

impl<'de> Deserialize<'de> for PlayerAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// A validated request to attest a score for a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreClaim {
    /// The player the score belongs to.
    pub player: PlayerAddress,
    /// The claimed score, within `1..=max_score`.
    pub score: u64,
}

/// A signed statement binding a player, a score and a single-use nonce.
///
/// Never persisted: it is handed back to the caller exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attestation {
    /// The player the attestation was issued to.
    pub player: PlayerAddress,
    /// The attested score.
    pub score: u64,
    /// The nonce the contract will consume when redeeming this attestation.
    pub nonce: u64,
    /// The 65-byte `r || s || v` personal-message signature, `0x`-hex encoded.
    pub signature: String,
    /// keccak256 over the tightly packed `(address, uint256, uint256)` tuple.
    pub message_hash: B256,
    /// Unix time (seconds) at which the request was accepted.
    pub timestamp: u64,
}
