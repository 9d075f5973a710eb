// Path: crates/attestation/src/memory_store.rs
//! The default, process-local ledger store.

use std::collections::HashMap;
use whack_types::app::PlayerAddress;
use whack_types::error::StoreError;
use whack_types::store::LedgerStore;

/// Two plain maps. State is lost on restart; the contract remains the final
/// authority on nonce reuse.
#[derive(Debug, Default)]
pub struct MemoryLedgerStore {
    submissions: HashMap<PlayerAddress, u64>,
    nonces: HashMap<PlayerAddress, u64>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerStore for MemoryLedgerStore {
    fn last_submission(&self, player: &PlayerAddress) -> Result<Option<u64>, StoreError> {
        Ok(self.submissions.get(player).copied())
    }

    fn set_last_submission(&mut self, player: &PlayerAddress, at: u64) -> Result<(), StoreError> {
        self.submissions.insert(*player, at);
        Ok(())
    }

    fn last_nonce(&self, player: &PlayerAddress) -> Result<Option<u64>, StoreError> {
        Ok(self.nonces.get(player).copied())
    }

    fn set_last_nonce(&mut self, player: &PlayerAddress, nonce: u64) -> Result<(), StoreError> {
        self.nonces.insert(*player, nonce);
        Ok(())
    }

    fn remove_nonce(&mut self, player: &PlayerAddress) -> Result<(), StoreError> {
        self.nonces.remove(player);
        Ok(())
    }

    fn sweep_submissions(&mut self, cutoff: u64) -> Result<Vec<PlayerAddress>, StoreError> {
        let expired: Vec<PlayerAddress> = self
            .submissions
            .iter()
            .filter(|(_, &at)| at < cutoff)
            .map(|(player, _)| *player)
            .collect();
        for player in &expired {
            self.submissions.remove(player);
        }
        Ok(expired)
    }

    fn tracked_players(&self) -> Result<usize, StoreError> {
        Ok(self.submissions.len())
    }
}
