// Path: crates/attestation/src/validator.rs
//! Strict validation of raw sign-score request bodies.
//!
//! Validation happens before any ledger access, so a rejected request never
//! mutates state.

use serde_json::Value;
use whack_types::app::{PlayerAddress, ScoreClaim};
use whack_types::error::ValidationError;
use whack_types::wire::SignScoreRequest;

#[derive(Debug, Clone, Copy)]
pub struct ScoreValidator {
    max_score: u64,
}

impl ScoreValidator {
    pub fn new(max_score: u64) -> Self {
        Self { max_score }
    }

    pub fn max_score(&self) -> u64 {
        self.max_score
    }

    /// Checks `player`, then `score`, then the optional `nonce`, reporting the
    /// first failure.
    pub fn validate(&self, request: &SignScoreRequest) -> Result<ScoreClaim, ValidationError> {
        let player = match &request.player {
            Value::String(s) => PlayerAddress::parse(s)?,
            _ => return Err(ValidationError::InvalidPlayer),
        };

        // A zero-point attestation has no reason to exist.
        let score = integer(&request.score).ok_or(ValidationError::InvalidScore)?;
        if score == 0 || score > self.max_score {
            return Err(ValidationError::InvalidScore);
        }

        if let Some(nonce) = &request.nonce {
            if integer(nonce).is_none() {
                return Err(ValidationError::InvalidNonce);
            }
        }

        Ok(ScoreClaim { player, score })
    }
}

/// A JSON number that is a non-negative integer representable as `u64`.
/// Floats with an integral value (`42.0`) are accepted; strings are not.
fn integer(value: &Value) -> Option<u64> {
    let Value::Number(n) = value else {
        return None;
    };
    if let Some(v) = n.as_u64() {
        return Some(v);
    }
    let f = n.as_f64()?;
    if f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 {
        Some(f as u64)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PLAYER: &str = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";

    fn request(body: Value) -> SignScoreRequest {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn score_boundaries() {
        let v = ScoreValidator::new(2000);
        assert_eq!(
            v.validate(&request(json!({"player": PLAYER, "score": 0}))),
            Err(ValidationError::InvalidScore)
        );
        assert_eq!(
            v.validate(&request(json!({"player": PLAYER, "score": 1})))
                .unwrap()
                .score,
            1
        );
        assert_eq!(
            v.validate(&request(json!({"player": PLAYER, "score": 2000})))
                .unwrap()
                .score,
            2000
        );
        assert_eq!(
            v.validate(&request(json!({"player": PLAYER, "score": 2001}))),
            Err(ValidationError::InvalidScore)
        );
    }

    #[test]
    fn non_integer_scores_are_rejected() {
        let v = ScoreValidator::new(2000);
        for score in [json!(-1), json!(12.5), json!("42"), json!(null), json!(true)] {
            assert_eq!(
                v.validate(&request(json!({"player": PLAYER, "score": score}))),
                Err(ValidationError::InvalidScore),
                "score {score} accepted"
            );
        }
        assert_eq!(
            v.validate(&request(json!({"player": PLAYER}))),
            Err(ValidationError::InvalidScore)
        );
    }

    #[test]
    fn integral_float_score_is_accepted() {
        let v = ScoreValidator::new(2000);
        let claim = v
            .validate(&request(json!({"player": PLAYER, "score": 42.0})))
            .unwrap();
        assert_eq!(claim.score, 42);
    }

    #[test]
    fn player_is_checked_first() {
        let v = ScoreValidator::new(2000);
        assert_eq!(
            v.validate(&request(json!({"player": "0x123", "score": 0}))),
            Err(ValidationError::InvalidPlayer)
        );
        assert_eq!(
            v.validate(&request(json!({"player": 42, "score": 10}))),
            Err(ValidationError::InvalidPlayer)
        );
        assert_eq!(
            v.validate(&request(json!({"score": 10}))),
            Err(ValidationError::InvalidPlayer)
        );
    }

    #[test]
    fn client_nonce_must_be_non_negative_integer() {
        let v = ScoreValidator::new(2000);
        assert!(v
            .validate(&request(json!({"player": PLAYER, "score": 5, "nonce": 0})))
            .is_ok());
        assert!(v
            .validate(&request(json!({"player": PLAYER, "score": 5, "nonce": 1700000000123u64})))
            .is_ok());
        for nonce in [json!(-3), json!("7"), json!(1.5)] {
            assert_eq!(
                v.validate(&request(json!({"player": PLAYER, "score": 5, "nonce": nonce}))),
                Err(ValidationError::InvalidNonce)
            );
        }
    }

    #[test]
    fn player_is_canonicalised() {
        let v = ScoreValidator::new(2000);
        let claim = v
            .validate(&request(json!({"player": PLAYER, "score": 5})))
            .unwrap();
        assert_eq!(claim.player.key(), PLAYER.to_lowercase());
    }
}
