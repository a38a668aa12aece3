// crates/publish-gate-core/src/core/identifiers.rs
// ============================================================================
// Module: Publish Gate Identifiers
// Description: Strongly typed identifiers for runs, records, checks, and targets.
// Purpose: Provide serializable IDs with stable string forms.
// Dependencies: rand, serde
// ============================================================================

//! ## Overview
//! Trace identifiers correlate every record of a single pipeline execution and
//! are validated on parse: 32 lowercase hex characters. Record identifiers are
//! assigned by the evidence ledger and are always non-zero. Check, target, and
//! signer names are opaque strings.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::num::NonZeroU64;

use rand::RngCore;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Number of hex characters in a trace identifier.
pub const TRACE_ID_LENGTH: usize = 32;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised when parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    /// Trace identifier text is malformed.
    #[error("invalid trace id: {0}")]
    InvalidTraceId(String),
    /// Record identifier was zero.
    #[error("record id must be non-zero")]
    ZeroRecordId,
}

// ============================================================================
// SECTION: Trace Identifier
// ============================================================================

/// Unique identifier of one pipeline execution.
///
/// # Invariants
/// - Always exactly [`TRACE_ID_LENGTH`] lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TraceId(String);

impl TraceId {
    /// Generates a fresh random trace identifier.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; TRACE_ID_LENGTH / 2];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(crate::core::hashing::hex_encode(&bytes))
    }

    /// Parses and validates a trace identifier.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError::InvalidTraceId`] when the text is not
    /// 32 lowercase hex characters.
    pub fn parse(value: &str) -> Result<Self, IdentifierError> {
        let valid = value.len() == TRACE_ID_LENGTH
            && value.bytes().all(|byte| byte.is_ascii_digit() || (b'a' ..= b'f').contains(&byte));
        if !valid {
            return Err(IdentifierError::InvalidTraceId(value.to_string()));
        }
        Ok(Self(value.to_string()))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl TryFrom<String> for TraceId {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TraceId> for String {
    fn from(value: TraceId) -> Self {
        value.0
    }
}

// ============================================================================
// SECTION: Record Identifier
// ============================================================================

/// Ledger-assigned identifier of a persisted pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(NonZeroU64);

impl RecordId {
    /// Creates a record identifier from a non-zero value.
    #[must_use]
    pub const fn new(value: NonZeroU64) -> Self {
        Self(value)
    }

    /// Creates a record identifier from a raw value.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError::ZeroRecordId`] when `value` is zero.
    pub fn from_raw(value: u64) -> Result<Self, IdentifierError> {
        NonZeroU64::new(value).map(Self).ok_or(IdentifierError::ZeroRecordId)
    }

    /// Returns the raw numeric value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// SECTION: Named Identifiers
// ============================================================================

/// Name of a validation check.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckName(String);

impl CheckName {
    /// Creates a new check name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CheckName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for CheckName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Name of a publish target.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetName(String);

impl TargetName {
    /// Creates a new target name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for TargetName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for TargetName {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Identifier of the key holder that signed a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignerId(String);

impl SignerId {
    /// Creates a new signer identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SignerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for SignerId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
