// Path: crates/attestation/src/signer.rs
//! Score digest construction and EIP-191 signing.
//!
//! The digest is `keccak256(abi.encodePacked(address player, uint256 score,
//! uint256 nonce))`: 20 address bytes followed by two 32-byte big-endian
//! words. The signature is a personal-message signature over the 32 digest
//! bytes, i.e. over `keccak256("\x19Ethereum Signed Message:\n32" || digest)`,
//! which is what `ECDSA.toEthSignedMessageHash` + `ecrecover` verify on chain.

use alloy_primitives::{keccak256, Address, PrimitiveSignature, B256, U256};
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use whack_types::app::PlayerAddress;
use whack_types::error::SignerError;
use zeroize::Zeroizing;

/// Length of the packed `(address, uint256, uint256)` encoding.
const PACKED_LEN: usize = 20 + 32 + 32;

/// The tightly packed encoding of `(player, score, nonce)`.
pub fn packed_encoding(player: &PlayerAddress, score: u64, nonce: u64) -> [u8; PACKED_LEN] {
    let mut out = [0u8; PACKED_LEN];
    out[..20].copy_from_slice(player.as_bytes());
    out[20..52].copy_from_slice(&U256::from(score).to_be_bytes::<32>());
    out[52..].copy_from_slice(&U256::from(nonce).to_be_bytes::<32>());
    out
}

/// The message hash the contract recomputes for `submitScore(score, nonce, sig)`.
pub fn score_digest(player: &PlayerAddress, score: u64, nonce: u64) -> B256 {
    keccak256(packed_encoding(player, score, nonce))
}

/// Holds the process-wide signing key. The key never leaves this type.
#[derive(Clone)]
pub struct ScoreSigner {
    inner: PrivateKeySigner,
}

impl std::fmt::Debug for ScoreSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScoreSigner")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

impl ScoreSigner {
    /// Loads a 32-byte secp256k1 key from hex, with or without `0x`.
    pub fn from_hex(key: &str) -> Result<Self, SignerError> {
        let trimmed = key.trim();
        let hex_part = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let bytes = Zeroizing::new(hex::decode(hex_part).map_err(|_| SignerError::InvalidKey)?);
        if bytes.len() != 32 {
            return Err(SignerError::InvalidKey);
        }
        let inner = PrivateKeySigner::from_bytes(&B256::from_slice(&bytes))
            .map_err(|_| SignerError::InvalidKey)?;
        Ok(Self { inner })
    }

    /// A throwaway signer with a freshly generated key.
    pub fn random() -> Self {
        Self {
            inner: PrivateKeySigner::random(),
        }
    }

    /// The trusted-signer address the contract must be configured with.
    pub fn address(&self) -> Address {
        self.inner.address()
    }

    /// Signs `(player, score, nonce)`, returning the `0x`-hex 65-byte
    /// `r || s || v` signature (v = 27/28) and the digest that was signed.
    pub fn sign(
        &self,
        player: &PlayerAddress,
        score: u64,
        nonce: u64,
    ) -> Result<(String, B256), SignerError> {
        let digest = score_digest(player, score, nonce);
        let signature = self
            .inner
            .sign_message_sync(digest.as_slice())
            .map_err(|e| SignerError::Signing(e.to_string()))?;
        Ok((format!("0x{}", hex::encode(signature.as_bytes())), digest))
    }
}

/// Recovers the address that signed `(player, score, nonce)`.
pub fn recover_signer(
    player: &PlayerAddress,
    score: u64,
    nonce: u64,
    signature: &str,
) -> Result<Address, SignerError> {
    let raw = hex::decode(signature.trim().trim_start_matches("0x"))
        .map_err(|e| SignerError::InvalidSignature(e.to_string()))?;
    if raw.len() != 65 {
        return Err(SignerError::InvalidSignature(format!(
            "expected 65 bytes, got {}",
            raw.len()
        )));
    }
    let y_parity = match raw[64] {
        0 | 27 => false,
        1 | 28 => true,
        v => return Err(SignerError::InvalidSignature(format!("bad recovery id {v}"))),
    };
    let sig = PrimitiveSignature::new(
        U256::from_be_slice(&raw[..32]),
        U256::from_be_slice(&raw[32..64]),
        y_parity,
    );
    let digest = score_digest(player, score, nonce);
    sig.recover_address_from_msg(digest.as_slice())
        .map_err(|e| SignerError::InvalidSignature(e.to_string()))
}

/// Whether `signature` over `(player, score, nonce)` was produced by `trusted`.
pub fn verify(
    player: &PlayerAddress,
    score: u64,
    nonce: u64,
    signature: &str,
    trusted: Address,
) -> bool {
    recover_signer(player, score, nonce, signature)
        .map(|recovered| recovered == trusted)
        .unwrap_or(false)
}
