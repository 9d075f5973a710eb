// Path: crates/storage/src/redb_ledger_store.rs

use redb::{
    Database, ReadTransaction, ReadableTable, ReadableTableMetadata, Table, TableDefinition,
};
use std::path::Path;
use whack_types::app::PlayerAddress;
use whack_types::error::StoreError;
use whack_types::store::LedgerStore;

/// ---- Table definitions (key = lowercase 0x-hex player address) ----
const SUBMISSIONS: TableDefinition<&str, u64> = TableDefinition::new("SUBMISSIONS"); // value = unix secs
const NONCES: TableDefinition<&str, u64> = TableDefinition::new("NONCES"); // value = last issued nonce

fn backend(e: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(e.to_string())
}

/// A [`LedgerStore`] that survives restarts. Every mutation is its own
/// committed write transaction; an admission and its sweep share one.
pub struct RedbLedgerStore {
    db: Database,
}

impl std::fmt::Debug for RedbLedgerStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbLedgerStore").finish_non_exhaustive()
    }
}

impl RedbLedgerStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = Database::create(path.as_ref()).map_err(backend)?;
        // Ensure tables exist
        {
            let w = db.begin_write().map_err(backend)?;
            {
                w.open_table(SUBMISSIONS).map_err(backend)?;
                w.open_table(NONCES).map_err(backend)?;
            }
            w.commit().map_err(backend)?;
        }
        tracing::info!(target: "ledger", path = %path.as_ref().display(), "opened redb ledger store");
        Ok(Self { db })
    }

    fn read_txn(&self) -> Result<ReadTransaction, StoreError> {
        self.db.begin_read().map_err(backend)
    }

    fn read_u64(
        &self,
        table: TableDefinition<&str, u64>,
        player: &PlayerAddress,
    ) -> Result<Option<u64>, StoreError> {
        let r = self.read_txn()?;
        let t = r.open_table(table).map_err(backend)?;
        let value = t
            .get(player.key().as_str())
            .map_err(backend)?
            .map(|v| v.value());
        Ok(value)
    }

    fn write_u64(
        &self,
        table: TableDefinition<&str, u64>,
        player: &PlayerAddress,
        value: u64,
    ) -> Result<(), StoreError> {
        let w = self.db.begin_write().map_err(backend)?;
        {
            let mut t = w.open_table(table).map_err(backend)?;
            t.insert(player.key().as_str(), value).map_err(backend)?;
        }
        w.commit().map_err(backend)
    }
}

impl LedgerStore for RedbLedgerStore {
    fn last_submission(&self, player: &PlayerAddress) -> Result<Option<u64>, StoreError> {
        self.read_u64(SUBMISSIONS, player)
    }

    fn set_last_submission(&mut self, player: &PlayerAddress, at: u64) -> Result<(), StoreError> {
        self.write_u64(SUBMISSIONS, player, at)
    }

    fn last_nonce(&self, player: &PlayerAddress) -> Result<Option<u64>, StoreError> {
        self.read_u64(NONCES, player)
    }

    fn set_last_nonce(&mut self, player: &PlayerAddress, nonce: u64) -> Result<(), StoreError> {
        self.write_u64(NONCES, player, nonce)
    }

    fn remove_nonce(&mut self, player: &PlayerAddress) -> Result<(), StoreError> {
        let w = self.db.begin_write().map_err(backend)?;
        {
            let mut t = w.open_table(NONCES).map_err(backend)?;
            t.remove(player.key().as_str()).map_err(backend)?;
        }
        w.commit().map_err(backend)
    }

    fn sweep_submissions(&mut self, cutoff: u64) -> Result<Vec<PlayerAddress>, StoreError> {
        let w = self.db.begin_write().map_err(backend)?;
        let expired = {
            let mut t = w.open_table(SUBMISSIONS).map_err(backend)?;
            remove_older_than(&mut t, cutoff)?
        };
        w.commit().map_err(backend)?;
        Ok(expired)
    }

    fn record_submission(
        &mut self,
        player: &PlayerAddress,
        at: u64,
        cutoff: u64,
        prune_nonces: bool,
    ) -> Result<Vec<PlayerAddress>, StoreError> {
        let w = self.db.begin_write().map_err(backend)?;
        let expired = {
            let mut t = w.open_table(SUBMISSIONS).map_err(backend)?;
            t.insert(player.key().as_str(), at).map_err(backend)?;
            remove_older_than(&mut t, cutoff)?
        };
        if prune_nonces && !expired.is_empty() {
            let mut t = w.open_table(NONCES).map_err(backend)?;
            for swept in &expired {
                t.remove(swept.key().as_str()).map_err(backend)?;
            }
        }
        w.commit().map_err(backend)?;
        Ok(expired)
    }

    fn tracked_players(&self) -> Result<usize, StoreError> {
        let r = self.read_txn()?;
        let t = r.open_table(SUBMISSIONS).map_err(backend)?;
        let len = t.len().map_err(backend)?;
        Ok(len as usize)
    }
}

fn remove_older_than(
    t: &mut Table<'_, &'static str, u64>,
    cutoff: u64,
) -> Result<Vec<PlayerAddress>, StoreError> {
    let mut keys = Vec::new();
    for entry in t.iter().map_err(backend)? {
        let (k, v) = entry.map_err(backend)?;
        if v.value() < cutoff {
            keys.push(k.value().to_string());
        }
    }
    let mut expired = Vec::with_capacity(keys.len());
    for key in keys {
        t.remove(key.as_str()).map_err(backend)?;
        match PlayerAddress::parse(&key) {
            Ok(player) => expired.push(player),
            // Dropped either way; only the counter pruning needs the address.
            Err(e) => tracing::warn!(target: "ledger", key = %key, error = %e, "swept undecodable key"),
        }
    }
    Ok(expired)
}
