// crates/publish-gate-core/src/core/artifact.rs
// ============================================================================
// Module: Publish Gate Artifacts
// Description: Immutable artifact snapshots collected for a pipeline run.
// Purpose: Freeze artifact bytes and content hashes at collection time.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! An [`Artifact`] owns a copy of one file's bytes together with the content
//! hash recorded when it was collected. Fields are private so nothing can
//! mutate an artifact after collection. An [`ArtifactSnapshot`] is the
//! path-sorted, shared, read-only set handed to checks and publishers.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use thiserror::Error;

use crate::core::hashing::HashAlgorithm;
use crate::core::hashing::HashDigest;
use crate::core::hashing::hash_bytes;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised when constructing artifacts or snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArtifactError {
    /// Artifact path is not a normalized relative path.
    #[error("invalid artifact path: {0}")]
    InvalidPath(String),
    /// Two artifacts share the same path.
    #[error("duplicate artifact path: {0}")]
    DuplicatePath(String),
}

// ============================================================================
// SECTION: Artifact
// ============================================================================

/// One file snapshot for a run.
///
/// # Invariants
/// - `path` is relative, `/`-separated, and has no empty, `.` or `..` segments.
/// - Bytes and hash never change after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Normalized relative path.
    path: String,
    /// Shared immutable content.
    bytes: Arc<[u8]>,
    /// Content hash recorded at collection.
    content_hash: HashDigest,
}

impl Artifact {
    /// Creates an artifact and hashes its bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError::InvalidPath`] when the path is not normalized.
    pub fn new(
        path: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
        algorithm: HashAlgorithm,
    ) -> Result<Self, ArtifactError> {
        let path = path.into();
        validate_artifact_path(&path)?;
        let bytes: Arc<[u8]> = Arc::from(bytes.into());
        let content_hash = hash_bytes(algorithm, &bytes);
        Ok(Self {
            path,
            bytes,
            content_hash,
        })
    }

    /// Creates an artifact whose content hash was recorded upstream (for
    /// example, a reviewed hash pinned in configuration).
    ///
    /// The recorded hash is trusted as-is here; the manifest builder re-hashes
    /// the bytes and refuses to sign when they disagree.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError::InvalidPath`] when the path is not normalized.
    pub fn with_recorded_hash(
        path: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
        recorded: HashDigest,
    ) -> Result<Self, ArtifactError> {
        let path = path.into();
        validate_artifact_path(&path)?;
        Ok(Self {
            path,
            bytes: Arc::from(bytes.into()),
            content_hash: recorded,
        })
    }

    /// Returns the artifact path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the artifact bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns the artifact size in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        u64::try_from(self.bytes.len()).unwrap_or(u64::MAX)
    }

    /// Returns the content hash recorded at collection.
    #[must_use]
    pub const fn content_hash(&self) -> &HashDigest {
        &self.content_hash
    }

    /// Returns true when the bytes still hash to the recorded content hash.
    #[must_use]
    pub fn is_intact(&self) -> bool {
        hash_bytes(self.content_hash.algorithm, &self.bytes) == self.content_hash
    }
}

// ============================================================================
// SECTION: Snapshot
// ============================================================================

/// Read-only, path-sorted artifact set shared across a run.
///
/// # Invariants
/// - Artifacts are sorted by path and paths are unique.
/// - Cloning shares the same underlying artifacts.
#[derive(Debug, Clone, Default)]
pub struct ArtifactSnapshot {
    /// Sorted artifacts.
    artifacts: Arc<[Artifact]>,
}

impl ArtifactSnapshot {
    /// Freezes a collection of artifacts into a sorted snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError::DuplicatePath`] when two artifacts share a path.
    pub fn new(mut artifacts: Vec<Artifact>) -> Result<Self, ArtifactError> {
        artifacts.sort_by(|left, right| left.path.cmp(&right.path));
        if let Some(pair) = artifacts.windows(2).find(|pair| pair[0].path == pair[1].path) {
            return Err(ArtifactError::DuplicatePath(pair[0].path.clone()));
        }
        Ok(Self {
            artifacts: Arc::from(artifacts),
        })
    }

    /// Returns the artifacts in path order.
    #[must_use]
    pub fn artifacts(&self) -> &[Artifact] {
        &self.artifacts
    }

    /// Looks up an artifact by path.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&Artifact> {
        self.artifacts
            .binary_search_by(|artifact| artifact.path.as_str().cmp(path))
            .ok()
            .map(|index| &self.artifacts[index])
    }

    /// Returns the number of artifacts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    /// Returns true when the snapshot holds no artifacts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    /// Returns the total byte size of all artifacts.
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.artifacts.iter().map(Artifact::size).fold(0u64, u64::saturating_add)
    }
}

// ============================================================================
// SECTION: Path Validation
// ============================================================================

/// Validates an artifact path is relative and normalized.
fn validate_artifact_path(path: &str) -> Result<(), ArtifactError> {
    if path.is_empty() || path.starts_with('/') || path.contains('\\') {
        return Err(ArtifactError::InvalidPath(path.to_string()));
    }
    let bad_segment =
        path.split('/').any(|segment| segment.is_empty() || segment == "." || segment == "..");
    if bad_segment {
        return Err(ArtifactError::InvalidPath(path.to_string()));
    }
    Ok(())
}
