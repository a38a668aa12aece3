// crates/publish-gate-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Evidence Ledger
// Description: Durable EvidenceLedger and PublishJournal backed by SQLite.
// Purpose: Persist finalized runs append-only with a verifiable hash chain.
// Dependencies: publish-gate-core, rusqlite, serde, serde_json, thiserror, tracing
// ============================================================================

//! ## Overview
//! This module implements a durable [`EvidenceLedger`] using `SQLite`. Each
//! appended run is stored as canonical JSON and chained to its predecessor by
//! hashing the previous record hash together with the run bytes. Triggers
//! refuse `UPDATE` and `DELETE` on the runs table, and loads recompute the
//! record hash and fail closed on mismatch. [`SqliteEvidenceLedger::receipt`]
//! hands out a record's hash, its predecessor link, and the chain head so a
//! holder can later show the record was in the chain. [`SqlitePublishJournal`]
//! keeps successful publishes in the same database.
//! Security posture: database contents are untrusted and verified on read.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use publish_gate_core::DedupeKey;
use publish_gate_core::EvidenceLedger;
use publish_gate_core::HashAlgorithm;
use publish_gate_core::JournalError;
use publish_gate_core::LedgerEntry;
use publish_gate_core::LedgerError;
use publish_gate_core::PipelineRun;
use publish_gate_core::PublishJournal;
use publish_gate_core::PublishResult;
use publish_gate_core::RecordId;
use publish_gate_core::Timestamp;
use publish_gate_core::TraceId;
use publish_gate_core::hashing::DEFAULT_HASH_ALGORITHM;
use publish_gate_core::hashing::canonical_json_bytes;
use publish_gate_core::hashing::hash_chained;
use publish_gate_core::runtime::store::validate_run;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use tracing::info;
use tracing::warn;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Schema version stored in `store_meta`.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout in milliseconds.
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length for a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Previous-hash value recorded for the first run in the chain.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode.
    #[default]
    Wal,
    /// Delete journal mode.
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode.
    #[default]
    Full,
    /// Normal synchronous mode.
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` evidence ledger.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl SqliteStoreConfig {
    /// Creates a configuration with default pragmas.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
///
/// # Invariants
/// - Error messages avoid embedding raw run payloads.
#[derive(Debug, Error, Clone)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Store corruption or hash mismatch.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store data or configuration.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
    /// The trace identifier is already recorded.
    #[error("trace id already recorded: {0}")]
    Duplicate(TraceId),
}

impl From<SqliteStoreError> for LedgerError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Duplicate(trace_id) => Self::Duplicate(trace_id),
            SqliteStoreError::Corrupt(message) => Self::Corrupt(message),
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
            other => Self::Ledger(other.to_string()),
        }
    }
}

impl From<SqliteStoreError> for JournalError {
    fn from(error: SqliteStoreError) -> Self {
        Self::Journal(error.to_string())
    }
}

/// Maps a rusqlite error into a store error.
fn db_error(err: &rusqlite::Error) -> SqliteStoreError {
    SqliteStoreError::Db(err.to_string())
}

// ============================================================================
// SECTION: Chain Report
// ============================================================================

/// Result of recomputing the ledger hash chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainReport {
    /// Number of records checked.
    pub checked: u64,
    /// Record hash of the last record, when any exist.
    pub head_hash: Option<String>,
    /// Integrity failures in record order.
    pub errors: Vec<String>,
}

impl ChainReport {
    /// Returns true when every record and link verified.
    #[must_use]
    pub fn is_intact(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Inclusion receipt for one stored run.
///
/// # Invariants
/// - `prev_hash` is [`GENESIS_HASH`] exactly when `position` is 1.
/// - `chain_head` is the record hash of the newest run at issue time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceReceipt {
    /// Ledger record identifier.
    pub record_id: RecordId,
    /// Trace identifier of the run.
    pub trace_id: TraceId,
    /// Hash algorithm label used for the record hash.
    pub hash_algorithm: String,
    /// Chained hash of this record.
    pub record_hash: String,
    /// Record hash of the predecessor.
    pub prev_hash: String,
    /// One-based position in the chain.
    pub position: u64,
    /// Number of records in the chain.
    pub total_records: u64,
    /// Record hash of the newest record.
    pub chain_head: String,
    /// True when the whole chain verified at issue time.
    pub chain_intact: bool,
}

// ============================================================================
// SECTION: Ledger
// ============================================================================

/// One stored run row.
#[derive(Debug)]
struct StoredRun {
    /// Record identifier.
    record_id: i64,
    /// Trace identifier column.
    trace_id: String,
    /// Canonical run JSON.
    run_json: Vec<u8>,
    /// Stored record hash.
    record_hash: String,
    /// Stored predecessor hash.
    prev_hash: String,
    /// Stored hash algorithm label.
    hash_algorithm: String,
}

/// Column list shared by run queries.
const RUN_COLUMNS: &str = "record_id, trace_id, run_json, record_hash, prev_hash, hash_algorithm";

/// `SQLite`-backed evidence ledger.
///
/// # Invariants
/// - Record ids come from `AUTOINCREMENT` and are never reused.
/// - Runs are never updated or deleted through this type or the schema.
/// - `SQLite` connection access is serialized through a mutex.
#[derive(Debug, Clone)]
pub struct SqliteEvidenceLedger {
    /// Shared connection.
    connection: Arc<Mutex<Connection>>,
    /// Hash algorithm for new records.
    algorithm: HashAlgorithm,
}

impl SqliteEvidenceLedger {
    /// Opens or creates the ledger database.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// carries an unsupported schema version.
    pub fn open(config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(config)?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
            algorithm: DEFAULT_HASH_ALGORITHM,
        })
    }

    /// Returns a publish journal sharing this database.
    #[must_use]
    pub fn journal(&self) -> SqlitePublishJournal {
        SqlitePublishJournal {
            connection: Arc::clone(&self.connection),
        }
    }

    /// Locks the connection.
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, SqliteStoreError> {
        self.connection
            .lock()
            .map_err(|_| SqliteStoreError::Io("sqlite mutex poisoned".to_string()))
    }

    /// Appends a run and returns its record id.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Duplicate`] when the trace id exists and
    /// other variants when the write fails.
    pub fn append_run(&self, run: &PipelineRun) -> Result<RecordId, SqliteStoreError> {
        validate_run(run).map_err(|err| match err {
            LedgerError::Invalid(message) => SqliteStoreError::Invalid(message),
            other => SqliteStoreError::Invalid(other.to_string()),
        })?;
        let run_json =
            canonical_json_bytes(run).map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(|err| db_error(&err))?;
        let exists: Option<i64> = tx
            .query_row(
                "SELECT record_id FROM runs WHERE trace_id = ?1",
                params![run.trace_id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| db_error(&err))?;
        if exists.is_some() {
            return Err(SqliteStoreError::Duplicate(run.trace_id.clone()));
        }
        let prev_hash: String = tx
            .query_row("SELECT record_hash FROM runs ORDER BY record_id DESC LIMIT 1", [], |row| {
                row.get(0)
            })
            .optional()
            .map_err(|err| db_error(&err))?
            .unwrap_or_else(|| GENESIS_HASH.to_string());
        let record_hash = chain_hash(self.algorithm, &prev_hash, &run_json);
        tx.execute(
            "INSERT INTO runs (trace_id, start_ms, end_ms, run_json, record_hash, prev_hash, \
             hash_algorithm) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                run.trace_id.as_str(),
                run.started_at.as_unix_millis(),
                run.finished_at.as_unix_millis(),
                run_json,
                record_hash,
                prev_hash,
                self.algorithm.as_str(),
            ],
        )
        .map_err(|err| db_error(&err))?;
        let raw_id = tx.last_insert_rowid();
        tx.commit().map_err(|err| db_error(&err))?;
        let record_id = to_record_id(raw_id)?;
        info!(record_id = record_id.get(), trace_id = %run.trace_id, "evidence record appended");
        Ok(record_id)
    }

    /// Loads the entry for a trace id, verifying its record hash.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Corrupt`] when the stored record fails
    /// verification.
    pub fn load(&self, trace_id: &TraceId) -> Result<Option<LedgerEntry>, SqliteStoreError> {
        let guard = self.lock()?;
        let row = guard
            .query_row(
                &format!("SELECT {RUN_COLUMNS} FROM runs WHERE trace_id = ?1"),
                params![trace_id.as_str()],
                map_run_row,
            )
            .optional()
            .map_err(|err| db_error(&err))?;
        drop(guard);
        row.map(decode_entry).transpose()
    }

    /// Lists entries whose start time falls in `[from, to]`, by record id.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when a row cannot be read or verified.
    pub fn list_range(
        &self,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<Vec<LedgerEntry>, SqliteStoreError> {
        let rows = {
            let guard = self.lock()?;
            let mut stmt = guard
                .prepare(&format!(
                    "SELECT {RUN_COLUMNS} FROM runs WHERE start_ms >= ?1 AND start_ms <= ?2 \
                     ORDER BY record_id ASC"
                ))
                .map_err(|err| db_error(&err))?;
            let mapped = stmt
                .query_map(params![from.as_unix_millis(), to.as_unix_millis()], map_run_row)
                .map_err(|err| db_error(&err))?;
            mapped.collect::<Result<Vec<_>, _>>().map_err(|err| db_error(&err))?
        };
        rows.into_iter().map(decode_entry).collect()
    }

    /// Returns the number of stored runs.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the count query fails.
    pub fn record_count(&self) -> Result<u64, SqliteStoreError> {
        let guard = self.lock()?;
        let count: i64 = guard
            .query_row("SELECT COUNT(1) FROM runs", [], |row| row.get(0))
            .map_err(|err| db_error(&err))?;
        u64::try_from(count)
            .map_err(|_| SqliteStoreError::Corrupt("negative run count".to_string()))
    }

    /// Recomputes every record hash and predecessor link in order.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the rows cannot be read; integrity
    /// failures are reported in the [`ChainReport`] instead.
    pub fn verify_chain(&self) -> Result<ChainReport, SqliteStoreError> {
        let rows = self.chain_rows()?;
        Ok(check_chain(&rows))
    }

    /// Issues an inclusion receipt for a trace id: the record's own hash, its
    /// predecessor link, and the current chain head.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Corrupt`] when the record itself fails
    /// verification; a broken link elsewhere only clears `chain_intact`.
    pub fn receipt(
        &self,
        trace_id: &TraceId,
    ) -> Result<Option<EvidenceReceipt>, SqliteStoreError> {
        let mut rows = self.chain_rows()?;
        let Some(index) = rows.iter().position(|row| row.trace_id == trace_id.as_str()) else {
            return Ok(None);
        };
        let report = check_chain(&rows);
        let chain_intact = report.is_intact();
        let row = rows.swap_remove(index);
        let record_hash = row.record_hash.clone();
        let prev_hash = row.prev_hash.clone();
        let hash_algorithm = row.hash_algorithm.clone();
        let entry = decode_entry(row)?;
        Ok(Some(EvidenceReceipt {
            record_id: entry.record_id,
            trace_id: entry.run.trace_id,
            hash_algorithm,
            record_hash,
            prev_hash,
            position: u64::try_from(index + 1).unwrap_or(u64::MAX),
            total_records: report.checked,
            chain_head: report.head_hash.unwrap_or_default(),
            chain_intact,
        }))
    }

    /// Reads every run row in record order.
    fn chain_rows(&self) -> Result<Vec<StoredRun>, SqliteStoreError> {
        let guard = self.lock()?;
        let mut stmt = guard
            .prepare(&format!("SELECT {RUN_COLUMNS} FROM runs ORDER BY record_id ASC"))
            .map_err(|err| db_error(&err))?;
        let mapped = stmt.query_map([], map_run_row).map_err(|err| db_error(&err))?;
        mapped.collect::<Result<Vec<_>, _>>().map_err(|err| db_error(&err))
    }
}

impl EvidenceLedger for SqliteEvidenceLedger {
    fn append(&self, run: &PipelineRun) -> Result<RecordId, LedgerError> {
        self.append_run(run).map_err(LedgerError::from)
    }

    fn get(&self, trace_id: &TraceId) -> Result<Option<LedgerEntry>, LedgerError> {
        self.load(trace_id).map_err(LedgerError::from)
    }

    fn list_by_time_range(
        &self,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<Vec<LedgerEntry>, LedgerError> {
        self.list_range(from, to).map_err(LedgerError::from)
    }

    fn count(&self) -> Result<u64, LedgerError> {
        self.record_count().map_err(LedgerError::from)
    }
}

// ============================================================================
// SECTION: Publish Journal
// ============================================================================

/// Publish journal stored alongside the ledger.
///
/// # Invariants
/// - The first recorded result for a dedupe key wins.
#[derive(Debug, Clone)]
pub struct SqlitePublishJournal {
    /// Shared connection.
    connection: Arc<Mutex<Connection>>,
}

impl SqlitePublishJournal {
    /// Locks the connection.
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, SqliteStoreError> {
        self.connection
            .lock()
            .map_err(|_| SqliteStoreError::Io("sqlite mutex poisoned".to_string()))
    }
}

impl PublishJournal for SqlitePublishJournal {
    fn lookup(&self, key: &DedupeKey) -> Result<Option<PublishResult>, JournalError> {
        let guard = self.lock()?;
        let bytes: Option<Vec<u8>> = guard
            .query_row(
                "SELECT result_json FROM publish_journal WHERE dedupe_key = ?1",
                params![key.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| db_error(&err))?;
        drop(guard);
        bytes
            .map(|bytes| {
                serde_json::from_slice(&bytes).map_err(|err| {
                    JournalError::Journal(format!("corrupt journal entry for {key}: {err}"))
                })
            })
            .transpose()
    }

    fn record(&self, result: &PublishResult) -> Result<(), JournalError> {
        let bytes = canonical_json_bytes(result)
            .map_err(|err| JournalError::Journal(err.to_string()))?;
        let guard = self.lock()?;
        guard
            .execute(
                "INSERT OR IGNORE INTO publish_journal (dedupe_key, target, result_json, \
                 recorded_at_ms) VALUES (?1, ?2, ?3, ?4)",
                params![result.dedupe_key.as_str(), result.target.as_str(), bytes, unix_millis()],
            )
            .map_err(|err| db_error(&err))?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Computes the chained record hash.
fn chain_hash(algorithm: HashAlgorithm, prev_hash: &str, run_json: &[u8]) -> String {
    hash_chained(algorithm, &[prev_hash.as_bytes(), run_json]).value
}

/// Recomputes record hashes and predecessor links over ordered rows.
fn check_chain(rows: &[StoredRun]) -> ChainReport {
    let mut errors = Vec::new();
    let mut expected_prev = GENESIS_HASH.to_string();
    for row in rows {
        if row.prev_hash != expected_prev {
            errors.push(format!("record {}: predecessor link broken", row.record_id));
        }
        match HashAlgorithm::from_label(&row.hash_algorithm) {
            Some(algorithm) => {
                if chain_hash(algorithm, &row.prev_hash, &row.run_json) != row.record_hash {
                    errors.push(format!("record {}: record hash mismatch", row.record_id));
                }
            }
            None => errors.push(format!(
                "record {}: unsupported hash algorithm {}",
                row.record_id, row.hash_algorithm
            )),
        }
        expected_prev.clone_from(&row.record_hash);
    }
    if !errors.is_empty() {
        warn!(errors = errors.len(), "evidence ledger chain verification failed");
    }
    ChainReport {
        checked: u64::try_from(rows.len()).unwrap_or(u64::MAX),
        head_hash: rows.last().map(|row| row.record_hash.clone()),
        errors,
    }
}

/// Converts a row id into a record id.
fn to_record_id(raw: i64) -> Result<RecordId, SqliteStoreError> {
    let raw = u64::try_from(raw)
        .map_err(|_| SqliteStoreError::Corrupt(format!("negative record id {raw}")))?;
    RecordId::from_raw(raw).map_err(|err| SqliteStoreError::Corrupt(err.to_string()))
}

/// Maps a result row into a stored run.
fn map_run_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredRun> {
    Ok(StoredRun {
        record_id: row.get(0)?,
        trace_id: row.get(1)?,
        run_json: row.get(2)?,
        record_hash: row.get(3)?,
        prev_hash: row.get(4)?,
        hash_algorithm: row.get(5)?,
    })
}

/// Verifies and decodes a stored run.
fn decode_entry(row: StoredRun) -> Result<LedgerEntry, SqliteStoreError> {
    let algorithm = HashAlgorithm::from_label(&row.hash_algorithm).ok_or_else(|| {
        SqliteStoreError::Corrupt(format!("unsupported hash algorithm {}", row.hash_algorithm))
    })?;
    if chain_hash(algorithm, &row.prev_hash, &row.run_json) != row.record_hash {
        warn!(record_id = row.record_id, "evidence record hash mismatch");
        return Err(SqliteStoreError::Corrupt(format!(
            "record {} hash mismatch",
            row.record_id
        )));
    }
    let run: PipelineRun = serde_json::from_slice(&row.run_json)
        .map_err(|err| SqliteStoreError::Corrupt(format!("record {}: {err}", row.record_id)))?;
    if run.trace_id.as_str() != row.trace_id {
        return Err(SqliteStoreError::Corrupt(format!(
            "record {} trace id column disagrees with payload",
            row.record_id
        )));
    }
    Ok(LedgerEntry {
        record_id: to_record_id(row.record_id)?,
        run,
    })
}

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    if path.as_os_str().is_empty() {
        return Err(SqliteStoreError::Invalid("store path must not be empty".to_string()));
    }
    if path.display().to_string().len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    let overlong = path
        .components()
        .any(|component| component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH);
    if overlong {
        return Err(SqliteStoreError::Invalid(
            "store path contains an overlong component".to_string(),
        ));
    }
    if path.is_dir() {
        return Err(SqliteStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens an `SQLite` connection and applies pragmas.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection =
        Connection::open_with_flags(&config.path, flags).map_err(|err| db_error(&err))?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(|err| db_error(&err))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(|err| db_error(&err))?;
    connection
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| db_error(&err))?;
    Ok(connection)
}

/// Initializes the schema or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction().map_err(|err| db_error(&err))?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(|err| db_error(&err))?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", [], |row| row.get(0))
        .optional()
        .map_err(|err| db_error(&err))?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(|err| db_error(&err))?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS runs (
                    record_id INTEGER PRIMARY KEY AUTOINCREMENT,
                    trace_id TEXT NOT NULL UNIQUE,
                    start_ms INTEGER NOT NULL,
                    end_ms INTEGER NOT NULL,
                    run_json BLOB NOT NULL,
                    record_hash TEXT NOT NULL,
                    prev_hash TEXT NOT NULL,
                    hash_algorithm TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_runs_start_ms ON runs (start_ms);
                CREATE TRIGGER IF NOT EXISTS runs_no_update BEFORE UPDATE ON runs
                BEGIN
                    SELECT RAISE(ABORT, 'evidence records are immutable');
                END;
                CREATE TRIGGER IF NOT EXISTS runs_no_delete BEFORE DELETE ON runs
                BEGIN
                    SELECT RAISE(ABORT, 'evidence records are immutable');
                END;
                CREATE TABLE IF NOT EXISTS publish_journal (
                    dedupe_key TEXT PRIMARY KEY,
                    target TEXT NOT NULL,
                    result_json BLOB NOT NULL,
                    recorded_at_ms INTEGER NOT NULL
                );",
            )
            .map_err(|err| db_error(&err))?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit().map_err(|err| db_error(&err))
}

/// Returns the current unix epoch in milliseconds.
fn unix_millis() -> i64 {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    i64::try_from(now.as_millis()).unwrap_or(i64::MAX)
}
