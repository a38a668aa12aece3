// crates/publish-gate-core/src/core/publish.rs
// ============================================================================
// Module: Publish Gate Publish Results
// Description: Per-target publish outcomes and idempotency keys.
// Purpose: Record every attempted publish, successful or not.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A [`PublishResult`] is recorded for every declared target, including
//! targets that failed or were skipped. The [`DedupeKey`] binds a manifest
//! digest to a target name so repeated publishes of the same manifest to the
//! same target can be recognized.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::core::hashing::HashDigest;
use crate::core::identifiers::TargetName;

// ============================================================================
// SECTION: Dedupe Key
// ============================================================================

/// Idempotency key derived from a manifest digest and a target name.
///
/// # Invariants
/// - Format is `<algorithm>:<digest-hex>/<target>`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DedupeKey(String);

impl DedupeKey {
    /// Derives the key for a digest and target.
    #[must_use]
    pub fn derive(digest: &HashDigest, target: &TargetName) -> Self {
        Self(format!("{digest}/{target}"))
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DedupeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// SECTION: Results
// ============================================================================

/// Publish outcome classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PublishStatus {
    /// The target accepted the publish.
    Success,
    /// The target returned an error.
    Failed,
    /// The target was never contacted.
    Skipped,
}

impl PublishStatus {
    /// Returns the stable wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
            Self::Skipped => "SKIPPED",
        }
    }
}

/// Outcome of one publish target.
///
/// # Invariants
/// - `external_id` is only set for [`PublishStatus::Success`].
/// - `error` is set for [`PublishStatus::Failed`] and [`PublishStatus::Skipped`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishResult {
    /// Target name.
    pub target: TargetName,
    /// Outcome status.
    pub status: PublishStatus,
    /// External resource identifier returned by the target.
    pub external_id: Option<String>,
    /// Error text for failed or skipped targets.
    pub error: Option<String>,
    /// Idempotency key used for this publish.
    pub dedupe_key: DedupeKey,
    /// True when the result was replayed from the publish journal.
    #[serde(default)]
    pub replayed: bool,
}

impl PublishResult {
    /// Builds a successful result.
    #[must_use]
    pub const fn success(
        target: TargetName,
        dedupe_key: DedupeKey,
        external_id: Option<String>,
    ) -> Self {
        Self {
            target,
            status: PublishStatus::Success,
            external_id,
            error: None,
            dedupe_key,
            replayed: false,
        }
    }

    /// Builds a failed result.
    #[must_use]
    pub fn failed(target: TargetName, dedupe_key: DedupeKey, error: impl Into<String>) -> Self {
        Self {
            target,
            status: PublishStatus::Failed,
            external_id: None,
            error: Some(error.into()),
            dedupe_key,
            replayed: false,
        }
    }

    /// Builds a skipped result.
    #[must_use]
    pub fn skipped(target: TargetName, dedupe_key: DedupeKey, reason: impl Into<String>) -> Self {
        Self {
            target,
            status: PublishStatus::Skipped,
            external_id: None,
            error: Some(reason.into()),
            dedupe_key,
            replayed: false,
        }
    }

    /// Returns true when the publish succeeded.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.status == PublishStatus::Success
    }
}
