// crates/publish-gate-core/src/interfaces/mod.rs
// ============================================================================
// Module: Publish Gate Interfaces
// Description: Capability interfaces for sources, signing, checks, gate, publishers, and storage.
// Purpose: Define the contract surfaces the pipeline runtime depends on.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! Interfaces decouple the pipeline from concrete filesystems, key stores,
//! network services, and databases. Implementations must fail closed: an
//! error is reported as an error, never replaced by an optimistic default.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use thiserror::Error;

use crate::core::ArtifactSnapshot;
use crate::core::EvidenceRecord;
use crate::core::GateRequest;
use crate::core::GateResponse;
use crate::core::PipelineRun;
use crate::core::artifact::Artifact;
use crate::core::identifiers::CheckName;
use crate::core::identifiers::RecordId;
use crate::core::identifiers::SignerId;
use crate::core::identifiers::TargetName;
use crate::core::identifiers::TraceId;
use crate::core::manifest::Manifest;
use crate::core::manifest::SignatureScheme;
use crate::core::publish::DedupeKey;
use crate::core::publish::PublishResult;
use crate::core::report::CheckOutcome;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Artifact Source
// ============================================================================

/// Artifact source errors.
#[derive(Debug, Error)]
pub enum ArtifactSourceError {
    /// An artifact could not be read.
    #[error("artifact unreadable: {0}")]
    Unreadable(String),
    /// An artifact violated source limits or path rules.
    #[error("artifact rejected: {0}")]
    Rejected(String),
}

/// Supplies the artifacts for one run.
pub trait ArtifactSource {
    /// Reads every artifact into memory.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactSourceError`] when any artifact cannot be collected.
    fn collect(&self) -> Result<Vec<Artifact>, ArtifactSourceError>;
}

// ============================================================================
// SECTION: Signing
// ============================================================================

/// Signing errors.
#[derive(Debug, Error)]
pub enum SigningError {
    /// Signing key is not available.
    #[error("signing key unavailable: {0}")]
    KeyUnavailable(String),
    /// Signing operation failed.
    #[error("signing failed: {0}")]
    Failed(String),
}

/// Signs manifest payloads.
///
/// # Invariants
/// - Key material never leaves the implementation.
pub trait ManifestSigner: Send + Sync {
    /// Returns the signature scheme.
    fn scheme(&self) -> SignatureScheme;

    /// Returns the signer identifier recorded in manifests.
    fn signer_id(&self) -> SignerId;

    /// Signs canonical payload bytes and returns the encoded signature.
    ///
    /// # Errors
    ///
    /// Returns [`SigningError`] when signing fails.
    fn sign(&self, payload: &[u8]) -> Result<String, SigningError>;
}

/// Signature verification errors.
#[derive(Debug, Error)]
pub enum SignatureError {
    /// Signature text could not be decoded.
    #[error("malformed signature: {0}")]
    Malformed(String),
    /// Signature does not match the payload.
    #[error("signature mismatch")]
    Mismatch,
}

/// Verifies signatures with a public key.
pub trait SignatureVerifier: Send + Sync {
    /// Returns the signature scheme.
    fn scheme(&self) -> SignatureScheme;

    /// Verifies an encoded signature over payload bytes.
    ///
    /// # Errors
    ///
    /// Returns [`SignatureError`] when verification fails.
    fn verify(&self, payload: &[u8], signature: &str) -> Result<(), SignatureError>;
}

// ============================================================================
// SECTION: Validation Checks
// ============================================================================

/// Black-box validation check.
///
/// # Invariants
/// - Checks only read the snapshot; they never modify artifacts.
pub trait ValidationCheck: Send + Sync {
    /// Returns the check name.
    fn name(&self) -> &CheckName;

    /// Runs the check against the snapshot.
    fn run(&self, snapshot: &ArtifactSnapshot) -> CheckOutcome;
}

// ============================================================================
// SECTION: Gate Service
// ============================================================================

/// Gate service errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateServiceError {
    /// Retryable failure (network, timeout, overload).
    #[error("transient gate failure: {0}")]
    Transient(String),
    /// Non-retryable failure (malformed response, refused request).
    #[error("permanent gate failure: {0}")]
    Permanent(String),
}

/// External admissibility decision service.
pub trait GateService: Send + Sync {
    /// Submits a gate request and returns the service response.
    ///
    /// # Errors
    ///
    /// Returns [`GateServiceError`] when no response was obtained.
    fn decide(&self, request: &GateRequest) -> Result<GateResponse, GateServiceError>;
}

// ============================================================================
// SECTION: Publishers
// ============================================================================

/// Inputs handed to one publisher.
#[derive(Debug, Clone, Copy)]
pub struct PublishRequest<'a> {
    /// Signed manifest.
    pub manifest: &'a Manifest,
    /// Read-only artifact snapshot.
    pub artifacts: &'a ArtifactSnapshot,
    /// Idempotency key for this target.
    pub dedupe_key: &'a DedupeKey,
    /// External identifiers produced by this target's dependencies.
    pub upstream: &'a BTreeMap<TargetName, String>,
}

/// Receipt returned by a successful publish.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReceipt {
    /// External resource identifier, when the target issues one.
    pub external_id: Option<String>,
}

/// Publisher errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublisherError {
    /// The target rejected or failed the publish.
    #[error("publish failed: {0}")]
    Failed(String),
    /// The publisher is misconfigured.
    #[error("publisher misconfigured: {0}")]
    Config(String),
}

/// One publish destination.
///
/// # Invariants
/// - Repeated calls with the same dedupe key must not create duplicate
///   externally visible resources.
pub trait Publisher: Send + Sync {
    /// Returns the target name.
    fn target(&self) -> &TargetName;

    /// Publishes the manifest and artifacts.
    ///
    /// # Errors
    ///
    /// Returns [`PublisherError`] when the publish did not succeed.
    fn publish(&self, request: &PublishRequest<'_>) -> Result<PublishReceipt, PublisherError>;
}

/// Publish journal errors.
#[derive(Debug, Error)]
pub enum JournalError {
    /// Journal backend failure.
    #[error("publish journal error: {0}")]
    Journal(String),
}

/// Durable record of successful publishes keyed by dedupe key.
pub trait PublishJournal: Send + Sync {
    /// Returns the recorded result for a dedupe key.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError`] when the journal cannot be read.
    fn lookup(&self, key: &DedupeKey) -> Result<Option<PublishResult>, JournalError>;

    /// Records a successful result.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError`] when the journal cannot be written.
    fn record(&self, result: &PublishResult) -> Result<(), JournalError>;
}

// ============================================================================
// SECTION: Evidence Ledger
// ============================================================================

/// Ledger errors.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A record with this trace identifier already exists.
    #[error("trace id already recorded: {0}")]
    Duplicate(TraceId),
    /// The run is not finalized or otherwise invalid for persistence.
    #[error("invalid ledger record: {0}")]
    Invalid(String),
    /// Backend failure.
    #[error("ledger error: {0}")]
    Ledger(String),
    /// Persisted data failed an integrity check.
    #[error("ledger corruption: {0}")]
    Corrupt(String),
}

/// Persisted ledger entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    /// Assigned record identifier.
    pub record_id: RecordId,
    /// Finalized run.
    pub run: PipelineRun,
}

/// Append-only store of finalized runs.
///
/// # Invariants
/// - No update or delete operation exists.
/// - Record identifiers increase strictly with each append.
pub trait EvidenceLedger: Send + Sync {
    /// Persists a finalized run and assigns its record identifier.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Duplicate`] when the trace id is already recorded.
    fn append(&self, run: &PipelineRun) -> Result<RecordId, LedgerError>;

    /// Loads the entry for a trace identifier.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] when the ledger cannot be read.
    fn get(&self, trace_id: &TraceId) -> Result<Option<LedgerEntry>, LedgerError>;

    /// Lists entries whose start time falls within `[from, to]`, by record id.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] when the ledger cannot be read.
    fn list_by_time_range(
        &self,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<Vec<LedgerEntry>, LedgerError>;

    /// Returns the number of recorded entries.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] when the ledger cannot be read.
    fn count(&self) -> Result<u64, LedgerError>;
}

// ============================================================================
// SECTION: Fallback Sink
// ============================================================================

/// Fallback sink errors.
#[derive(Debug, Error)]
pub enum FallbackError {
    /// Fallback write failed.
    #[error("fallback write failed: {0}")]
    Write(String),
}

/// Local destination for evidence when the ledger cannot be written.
pub trait FallbackSink: Send + Sync {
    /// Writes the record and returns a human-readable location.
    ///
    /// # Errors
    ///
    /// Returns [`FallbackError`] when the record cannot be written.
    fn write(&self, record: &EvidenceRecord) -> Result<String, FallbackError>;
}
