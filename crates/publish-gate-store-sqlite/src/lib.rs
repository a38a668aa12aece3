// crates/publish-gate-store-sqlite/src/lib.rs
// ============================================================================
// Module: Publish Gate SQLite Store
// Description: Durable evidence ledger and publish journal.
// Purpose: Expose the SQLite-backed ledger types.
// Dependencies: crate::store
// ============================================================================

//! ## Overview
//! `SQLite` persistence for Publish Gate evidence. Runs are appended to a
//! hash-chained table that refuses updates and deletes; see [`store`].

pub mod store;

pub use store::ChainReport;
pub use store::EvidenceReceipt;
pub use store::GENESIS_HASH;
pub use store::SqliteEvidenceLedger;
pub use store::SqlitePublishJournal;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
