// crates/publish-gate-core/src/runtime/manifest_builder.rs
// ============================================================================
// Module: Publish Gate Manifest Builder
// Description: Deterministic manifest construction, signing, and verification.
// Purpose: Bind an artifact set to a signed aggregate digest.
// Dependencies: crate::{core, interfaces}, serde, tracing
// ============================================================================

//! ## Overview
//! [`ManifestBuilder::build`] sorts artifacts by path, re-hashes every
//! artifact against the hash recorded at collection, computes the aggregate
//! digest over the ordered `(path, hash)` pairs, and signs the canonical
//! signing payload. The input order never affects the digest.
//!
//! [`ManifestVerifier`] recomputes the digest from a manifest's records and
//! checks the signature with a public key; auditors use it offline.
//!
//! Security posture: nothing is signed unless every artifact hash checks out.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::core::ArtifactSnapshot;
use crate::core::artifact::Artifact;
use crate::core::hashing::HashAlgorithm;
use crate::core::hashing::HashDigest;
use crate::core::hashing::HashError;
use crate::core::hashing::canonical_json_bytes;
use crate::core::hashing::hash_bytes;
use crate::core::hashing::hash_canonical_json;
use crate::core::identifiers::TraceId;
use crate::core::manifest::AggregateEntry;
use crate::core::manifest::Manifest;
use crate::core::manifest::ManifestRecord;
use crate::core::manifest::ManifestSignature;
use crate::core::manifest::SigningPayload;
use crate::core::time::Timestamp;
use crate::interfaces::ManifestSigner;
use crate::interfaces::SignatureVerifier;
use crate::interfaces::SigningError;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Manifest construction errors.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// An artifact is malformed, duplicated, or changed after collection.
    #[error("integrity error: {0}")]
    Integrity(String),
    /// The signing key is unavailable or signing failed.
    #[error("signing error: {0}")]
    Signing(String),
    /// Canonical hashing failed.
    #[error(transparent)]
    Hash(#[from] HashError),
}

impl From<SigningError> for ManifestError {
    fn from(err: SigningError) -> Self {
        Self::Signing(err.to_string())
    }
}

// ============================================================================
// SECTION: Builder
// ============================================================================

/// Builds signed manifests.
pub struct ManifestBuilder {
    /// Signing capability.
    signer: Arc<dyn ManifestSigner>,
    /// Hash algorithm for content and aggregate digests.
    algorithm: HashAlgorithm,
}

impl ManifestBuilder {
    /// Creates a builder using the given signer and hash algorithm.
    #[must_use]
    pub fn new(signer: Arc<dyn ManifestSigner>, algorithm: HashAlgorithm) -> Self {
        Self {
            signer,
            algorithm,
        }
    }

    /// Returns the configured hash algorithm.
    #[must_use]
    pub const fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Builds and signs a manifest for the artifacts.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Integrity`] when an artifact path repeats or
    /// its bytes no longer match the recorded hash, and
    /// [`ManifestError::Signing`] when signing fails.
    pub fn build(
        &self,
        trace_id: &TraceId,
        created_at: Timestamp,
        artifacts: &[Artifact],
    ) -> Result<Manifest, ManifestError> {
        let mut ordered: Vec<&Artifact> = artifacts.iter().collect();
        ordered.sort_by(|left, right| left.path().cmp(right.path()));
        if let Some(pair) = ordered.windows(2).find(|pair| pair[0].path() == pair[1].path()) {
            return Err(ManifestError::Integrity(format!(
                "duplicate artifact path {}",
                pair[0].path()
            )));
        }

        let mut records = Vec::with_capacity(ordered.len());
        for artifact in ordered {
            let actual = hash_bytes(self.algorithm, artifact.bytes());
            if &actual != artifact.content_hash() {
                return Err(ManifestError::Integrity(format!(
                    "artifact {} changed after collection",
                    artifact.path()
                )));
            }
            records.push(ManifestRecord {
                path: artifact.path().to_string(),
                size: artifact.size(),
                hash: actual,
            });
        }

        let aggregate_digest = aggregate_digest(self.algorithm, &records)?;
        let payload = canonical_json_bytes(&SigningPayload {
            aggregate_digest: &aggregate_digest,
            trace_id,
        })?;
        let value = self.signer.sign(&payload)?;
        debug!(
            trace_id = %trace_id,
            digest = %aggregate_digest,
            records = records.len(),
            "manifest signed"
        );
        let signature = ManifestSignature {
            scheme: self.signer.scheme(),
            signer_id: self.signer.signer_id(),
            value,
        };
        Ok(Manifest::from_parts(trace_id.clone(), created_at, records, aggregate_digest, signature))
    }

    /// Builds a manifest for a frozen snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError`] under the same conditions as [`Self::build`].
    pub fn build_snapshot(
        &self,
        trace_id: &TraceId,
        created_at: Timestamp,
        snapshot: &ArtifactSnapshot,
    ) -> Result<Manifest, ManifestError> {
        self.build(trace_id, created_at, snapshot.artifacts())
    }
}

/// Computes the aggregate digest over ordered manifest records.
///
/// # Errors
///
/// Returns [`HashError`] when canonicalization fails.
pub fn aggregate_digest(
    algorithm: HashAlgorithm,
    records: &[ManifestRecord],
) -> Result<HashDigest, HashError> {
    let entries: Vec<AggregateEntry<'_>> = records
        .iter()
        .map(|record| AggregateEntry {
            path: &record.path,
            hash: &record.hash,
        })
        .collect();
    hash_canonical_json(algorithm, &entries)
}

// ============================================================================
// SECTION: Verifier
// ============================================================================

/// Verification status for manifests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    /// Digest and signature verified.
    Pass,
    /// At least one check failed.
    Fail,
}

/// Offline verification report for manifests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    /// Verification status.
    pub status: VerificationStatus,
    /// Count of checked records.
    pub checked_records: usize,
    /// Error messages, if any.
    pub errors: Vec<String>,
}

impl VerificationReport {
    /// Returns true when verification passed.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.status == VerificationStatus::Pass
    }
}

/// Verifies manifests against a public key.
pub struct ManifestVerifier<'a> {
    /// Signature verification capability.
    verifier: &'a dyn SignatureVerifier,
}

impl<'a> ManifestVerifier<'a> {
    /// Creates a verifier for the given public key capability.
    #[must_use]
    pub const fn new(verifier: &'a dyn SignatureVerifier) -> Self {
        Self {
            verifier,
        }
    }

    /// Recomputes the aggregate digest and checks the signature.
    #[must_use]
    pub fn verify(&self, manifest: &Manifest) -> VerificationReport {
        let mut errors = Vec::new();
        let records = manifest.records();
        let algorithm = manifest.aggregate_digest().algorithm;

        if records.windows(2).any(|pair| pair[0].path >= pair[1].path) {
            errors.push("records are not strictly sorted by path".to_string());
        }
        if records.iter().any(|record| record.hash.algorithm != algorithm) {
            errors.push("record hash algorithm mismatch".to_string());
        }

        match aggregate_digest(algorithm, records) {
            Ok(digest) if &digest == manifest.aggregate_digest() => {}
            Ok(_) => errors.push("aggregate digest mismatch".to_string()),
            Err(err) => errors.push(format!("failed to compute aggregate digest: {err}")),
        }

        if manifest.signature().scheme != self.verifier.scheme() {
            errors.push("signature scheme mismatch".to_string());
        } else {
            match canonical_json_bytes(&SigningPayload {
                aggregate_digest: manifest.aggregate_digest(),
                trace_id: manifest.trace_id(),
            }) {
                Ok(payload) => {
                    if let Err(err) = self.verifier.verify(&payload, &manifest.signature().value) {
                        errors.push(format!("signature verification failed: {err}"));
                    }
                }
                Err(err) => errors.push(format!("failed to build signing payload: {err}")),
            }
        }

        let status =
            if errors.is_empty() { VerificationStatus::Pass } else { VerificationStatus::Fail };
        VerificationReport {
            status,
            checked_records: records.len(),
            errors,
        }
    }

    /// Verifies the manifest and additionally checks every artifact's bytes
    /// against its manifest record.
    #[must_use]
    pub fn verify_with_artifacts(
        &self,
        manifest: &Manifest,
        snapshot: &ArtifactSnapshot,
    ) -> VerificationReport {
        let mut report = self.verify(manifest);
        for record in manifest.records() {
            match snapshot.get(&record.path) {
                Some(artifact) => {
                    if hash_bytes(record.hash.algorithm, artifact.bytes()) != record.hash {
                        report.errors.push(format!("hash mismatch for {}", record.path));
                    }
                }
                None => report.errors.push(format!("missing artifact {}", record.path)),
            }
        }
        if snapshot.len() != manifest.records().len() {
            report.errors.push("artifact count differs from manifest".to_string());
        }
        if !report.errors.is_empty() {
            report.status = VerificationStatus::Fail;
        }
        report
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
