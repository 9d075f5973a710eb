// Path: crates/storage/src/lib.rs

//! Pure-Rust persistent storage (redb) for the attestation ledger.
//!
//! Submission timestamps and nonce counters live in two tables of a single
//! database file, keyed by the lowercase `0x`-hex player address.

pub mod redb_ledger_store;

pub use redb_ledger_store::RedbLedgerStore;
