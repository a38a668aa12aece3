// crates/publish-gate-core/src/core/manifest.rs
// ============================================================================
// Module: Publish Gate Manifest Model
// Description: Signed, deterministic description of an artifact set.
// Purpose: Define manifest records, aggregate digest payloads, and signatures.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A [`Manifest`] lists artifact records sorted by path, an aggregate digest
//! over the ordered `(path, hash)` pairs, and a signature over the canonical
//! signing payload. Manifests are produced by the manifest builder and are
//! never mutated after signing; fields are only readable.
//!
//! Security posture: manifests loaded from disk are untrusted until verified.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::hashing::HashDigest;
use crate::core::identifiers::SignerId;
use crate::core::identifiers::TraceId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Records
// ============================================================================

/// One artifact entry in a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestRecord {
    /// Relative artifact path.
    pub path: String,
    /// Artifact size in bytes.
    pub size: u64,
    /// Artifact content hash.
    pub hash: HashDigest,
}

/// Entry hashed into the aggregate digest.
#[derive(Debug, Serialize)]
pub struct AggregateEntry<'a> {
    /// Relative artifact path.
    pub path: &'a str,
    /// Artifact content hash.
    pub hash: &'a HashDigest,
}

/// Payload whose canonical JSON is signed.
///
/// # Invariants
/// - Binds the aggregate digest to the run that produced it.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SigningPayload<'a> {
    /// Aggregate digest over the ordered records.
    pub aggregate_digest: &'a HashDigest,
    /// Trace identifier of the producing run.
    pub trace_id: &'a TraceId,
}

// ============================================================================
// SECTION: Signature
// ============================================================================

/// Signature schemes understood by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureScheme {
    /// Ed25519 signatures over canonical JSON bytes.
    Ed25519,
}

/// Manifest signature envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestSignature {
    /// Signature scheme.
    pub scheme: SignatureScheme,
    /// Identifier of the signing key holder.
    pub signer_id: SignerId,
    /// Encoded signature bytes (encoding chosen by the signer).
    pub value: String,
}

// ============================================================================
// SECTION: Manifest
// ============================================================================

/// Signed description of an artifact set.
///
/// # Invariants
/// - `records` are sorted by path with unique paths.
/// - `aggregate_digest` is the canonical hash of the ordered `(path, hash)` pairs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Trace identifier of the producing run.
    trace_id: TraceId,
    /// Signing timestamp.
    created_at: Timestamp,
    /// Sorted artifact records.
    records: Vec<ManifestRecord>,
    /// Aggregate digest over the ordered records.
    aggregate_digest: HashDigest,
    /// Signature over the signing payload.
    signature: ManifestSignature,
}

impl Manifest {
    /// Assembles a manifest from already-signed parts.
    pub(crate) const fn from_parts(
        trace_id: TraceId,
        created_at: Timestamp,
        records: Vec<ManifestRecord>,
        aggregate_digest: HashDigest,
        signature: ManifestSignature,
    ) -> Self {
        Self {
            trace_id,
            created_at,
            records,
            aggregate_digest,
            signature,
        }
    }

    /// Returns the producing run's trace identifier.
    #[must_use]
    pub const fn trace_id(&self) -> &TraceId {
        &self.trace_id
    }

    /// Returns the signing timestamp.
    #[must_use]
    pub const fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// Returns the sorted artifact records.
    #[must_use]
    pub fn records(&self) -> &[ManifestRecord] {
        &self.records
    }

    /// Returns the aggregate digest.
    #[must_use]
    pub const fn aggregate_digest(&self) -> &HashDigest {
        &self.aggregate_digest
    }

    /// Returns the signature envelope.
    #[must_use]
    pub const fn signature(&self) -> &ManifestSignature {
        &self.signature
    }

    /// Returns the signer identifier.
    #[must_use]
    pub const fn signer_id(&self) -> &SignerId {
        &self.signature.signer_id
    }

    /// Returns a compact reference suitable for evidence records.
    #[must_use]
    pub fn reference(&self) -> ManifestRef {
        ManifestRef {
            aggregate_digest: self.aggregate_digest.clone(),
            signer_id: self.signature.signer_id.clone(),
            artifact_count: self.records.len(),
        }
    }
}

/// Reference to a manifest stored alongside a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestRef {
    /// Aggregate digest of the manifest.
    pub aggregate_digest: HashDigest,
    /// Signer identifier.
    pub signer_id: SignerId,
    /// Number of artifact records.
    pub artifact_count: usize,
}
