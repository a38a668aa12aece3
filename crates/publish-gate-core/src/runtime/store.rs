// crates/publish-gate-core/src/runtime/store.rs
// ============================================================================
// Module: Publish Gate In-Memory Stores
// Description: In-memory evidence ledger and publish journal.
// Purpose: Provide deterministic, append-only storage for tests and dry runs.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! [`InMemoryEvidenceLedger`] assigns strictly increasing record ids and
//! refuses to overwrite an existing trace id. [`InMemoryPublishJournal`]
//! remembers successful publishes by dedupe key. Neither exposes update or
//! delete operations.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;

use crate::core::PipelineRun;
use crate::core::identifiers::RecordId;
use crate::core::identifiers::TraceId;
use crate::core::publish::DedupeKey;
use crate::core::publish::PublishResult;
use crate::core::time::Timestamp;
use crate::interfaces::EvidenceLedger;
use crate::interfaces::JournalError;
use crate::interfaces::LedgerEntry;
use crate::interfaces::LedgerError;
use crate::interfaces::PublishJournal;

// ============================================================================
// SECTION: In-Memory Ledger
// ============================================================================

/// Ledger contents protected by one mutex.
#[derive(Debug, Default)]
struct LedgerState {
    /// Entries in record id order.
    entries: Vec<LedgerEntry>,
    /// Index from trace id to entry position.
    by_trace: BTreeMap<TraceId, usize>,
}

/// In-memory evidence ledger for tests and dry runs.
#[derive(Debug, Default, Clone)]
pub struct InMemoryEvidenceLedger {
    /// Shared ledger state.
    state: Arc<Mutex<LedgerState>>,
}

impl InMemoryEvidenceLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl EvidenceLedger for InMemoryEvidenceLedger {
    fn append(&self, run: &PipelineRun) -> Result<RecordId, LedgerError> {
        validate_run(run)?;
        let mut state = self
            .state
            .lock()
            .map_err(|_| LedgerError::Ledger("evidence ledger mutex poisoned".to_string()))?;
        if state.by_trace.contains_key(&run.trace_id) {
            return Err(LedgerError::Duplicate(run.trace_id.clone()));
        }
        let next = u64::try_from(state.entries.len())
            .map_err(|_| LedgerError::Ledger("ledger is full".to_string()))?
            .saturating_add(1);
        let record_id =
            RecordId::from_raw(next).map_err(|err| LedgerError::Ledger(err.to_string()))?;
        let position = state.entries.len();
        state.entries.push(LedgerEntry {
            record_id,
            run: run.clone(),
        });
        state.by_trace.insert(run.trace_id.clone(), position);
        Ok(record_id)
    }

    fn get(&self, trace_id: &TraceId) -> Result<Option<LedgerEntry>, LedgerError> {
        let state = self
            .state
            .lock()
            .map_err(|_| LedgerError::Ledger("evidence ledger mutex poisoned".to_string()))?;
        Ok(state.by_trace.get(trace_id).and_then(|position| state.entries.get(*position)).cloned())
    }

    fn list_by_time_range(
        &self,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<Vec<LedgerEntry>, LedgerError> {
        let state = self
            .state
            .lock()
            .map_err(|_| LedgerError::Ledger("evidence ledger mutex poisoned".to_string()))?;
        Ok(state
            .entries
            .iter()
            .filter(|entry| entry.run.started_at >= from && entry.run.started_at <= to)
            .cloned()
            .collect())
    }

    fn count(&self) -> Result<u64, LedgerError> {
        let state = self
            .state
            .lock()
            .map_err(|_| LedgerError::Ledger("evidence ledger mutex poisoned".to_string()))?;
        u64::try_from(state.entries.len())
            .map_err(|_| LedgerError::Ledger("count overflow".to_string()))
    }
}

/// Rejects runs that cannot be persisted.
///
/// # Errors
///
/// Returns [`LedgerError::Invalid`] when the run times are inverted.
pub fn validate_run(run: &PipelineRun) -> Result<(), LedgerError> {
    if run.finished_at < run.started_at {
        return Err(LedgerError::Invalid(format!(
            "run {} finished before it started",
            run.trace_id
        )));
    }
    Ok(())
}

// ============================================================================
// SECTION: In-Memory Journal
// ============================================================================

/// In-memory publish journal.
#[derive(Debug, Default, Clone)]
pub struct InMemoryPublishJournal {
    /// Successful results by dedupe key.
    entries: Arc<Mutex<BTreeMap<DedupeKey, PublishResult>>>,
}

impl InMemoryPublishJournal {
    /// Creates an empty journal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl PublishJournal for InMemoryPublishJournal {
    fn lookup(&self, key: &DedupeKey) -> Result<Option<PublishResult>, JournalError> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| JournalError::Journal("publish journal mutex poisoned".to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn record(&self, result: &PublishResult) -> Result<(), JournalError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| JournalError::Journal("publish journal mutex poisoned".to_string()))?;
        entries.entry(result.dedupe_key.clone()).or_insert_with(|| result.clone());
        Ok(())
    }
}
