// Path: crates/types/src/store/mod.rs

//! API for the per-player ledger store backing rate limiting and nonce issuance.
//!
//! Implementations are plain key-value maps keyed by [`PlayerAddress`]. They
//! are not required to be internally synchronised for read-modify-write
//! sequences: the attestation ledger serialises every check-and-update behind
//! a single lock, and only calls a store while holding it.

use crate::app::PlayerAddress;
use crate::error::StoreError;

/// Storage for submission timestamps and nonce counters.
pub trait LedgerStore: Send + Sync {
    /// Unix time (seconds) of the player's last accepted request, if any.
    fn last_submission(&self, player: &PlayerAddress) -> Result<Option<u64>, StoreError>;

    /// Records an accepted request at `at` (Unix seconds).
    fn set_last_submission(&mut self, player: &PlayerAddress, at: u64) -> Result<(), StoreError>;

    /// The last nonce issued to the player, if any.
    fn last_nonce(&self, player: &PlayerAddress) -> Result<Option<u64>, StoreError>;

    /// Persists the last nonce issued to the player.
    fn set_last_nonce(&mut self, player: &PlayerAddress, nonce: u64) -> Result<(), StoreError>;

    /// Forgets the player's nonce counter.
    fn remove_nonce(&mut self, player: &PlayerAddress) -> Result<(), StoreError>;

    /// Removes every submission record strictly older than `cutoff` and returns
    /// the players whose records were removed.
    fn sweep_submissions(&mut self, cutoff: u64) -> Result<Vec<PlayerAddress>, StoreError>;

    /// Records an accepted request at `at` and, as one unit, removes every
    /// submission record strictly older than `cutoff`. With `prune_nonces` the
    /// swept players' nonce counters go too. Returns the swept players.
    ///
    /// `cutoff` must not exceed `at`. Persistent stores should override this
    /// to commit everything in a single transaction.
    fn record_submission(
        &mut self,
        player: &PlayerAddress,
        at: u64,
        cutoff: u64,
        prune_nonces: bool,
    ) -> Result<Vec<PlayerAddress>, StoreError> {
        self.set_last_submission(player, at)?;
        let expired = self.sweep_submissions(cutoff)?;
        if prune_nonces {
            for swept in &expired {
                self.remove_nonce(swept)?;
            }
        }
        Ok(expired)
    }

    /// The number of players with a live submission record.
    fn tracked_players(&self) -> Result<usize, StoreError>;
}
