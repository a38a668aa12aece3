// crates/publish-gate-core/src/core/hashing.rs
// ============================================================================
// Module: Publish Gate Canonical Hashing
// Description: RFC 8785 JSON canonicalization and artifact content hashing.
// Purpose: Provide deterministic digests for artifacts, manifests, and ledger chains.
// Dependencies: serde, serde_jcs, sha2
// ============================================================================

//! ## Overview
//! Structured values (aggregate manifest entries, signing payloads, evidence
//! records) are hashed over their RFC 8785 canonical JSON form so the same
//! logical value always produces the same digest. Artifact content is hashed
//! directly over raw bytes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

// ============================================================================
// SECTION: Hash Algorithm
// ============================================================================

/// Supported hash algorithms for artifacts and manifests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashAlgorithm {
    /// SHA-256 hashing.
    Sha256,
}

impl HashAlgorithm {
    /// Returns the stable label used in persisted records.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
        }
    }

    /// Parses a persisted algorithm label.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "sha256" => Some(Self::Sha256),
            _ => None,
        }
    }

    /// Returns the expected hex length of digests for this algorithm.
    #[must_use]
    pub const fn hex_len(self) -> usize {
        match self {
            Self::Sha256 => 64,
        }
    }
}

/// Default hash algorithm for the publish pipeline.
pub const DEFAULT_HASH_ALGORITHM: HashAlgorithm = HashAlgorithm::Sha256;

// ============================================================================
// SECTION: Hash Digest
// ============================================================================

/// Deterministic content hash representation.
///
/// # Invariants
/// - `value` is lowercase hex when produced by [`hash_bytes`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HashDigest {
    /// Hash algorithm identifier.
    pub algorithm: HashAlgorithm,
    /// Lowercase hex-encoded digest bytes.
    pub value: String,
}

impl HashDigest {
    /// Creates a new digest from raw bytes.
    #[must_use]
    pub fn new(algorithm: HashAlgorithm, bytes: &[u8]) -> Self {
        Self {
            algorithm,
            value: hex_encode(bytes),
        }
    }

    /// Creates a digest from an already hex-encoded value.
    ///
    /// # Errors
    ///
    /// Returns [`HashError::InvalidDigest`] when the value is not lowercase
    /// hex of the algorithm's length.
    pub fn from_hex(algorithm: HashAlgorithm, value: &str) -> Result<Self, HashError> {
        let normalized = value.trim().to_ascii_lowercase();
        if normalized.len() != algorithm.hex_len()
            || !normalized.bytes().all(|byte| byte.is_ascii_hexdigit())
        {
            return Err(HashError::InvalidDigest(value.to_string()));
        }
        Ok(Self {
            algorithm,
            value: normalized,
        })
    }
}

impl fmt::Display for HashDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm.as_str(), self.value)
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised when computing canonical hashes.
#[derive(Debug, Error)]
pub enum HashError {
    /// JSON canonicalization failed.
    #[error("failed to canonicalize json: {0}")]
    Canonicalization(String),
    /// Digest text is not valid for the algorithm.
    #[error("invalid digest value: {0}")]
    InvalidDigest(String),
}

// ============================================================================
// SECTION: Hashing Helpers
// ============================================================================

/// Returns canonical JSON bytes for a serializable value using RFC 8785.
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] when serialization fails.
pub fn canonical_json_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, HashError> {
    serde_jcs::to_vec(value).map_err(|err| HashError::Canonicalization(err.to_string()))
}

/// Hashes canonical JSON using the provided algorithm.
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] when serialization fails.
pub fn hash_canonical_json<T: Serialize + ?Sized>(
    algorithm: HashAlgorithm,
    value: &T,
) -> Result<HashDigest, HashError> {
    let bytes = canonical_json_bytes(value)?;
    Ok(hash_bytes(algorithm, &bytes))
}

/// Hashes raw bytes using the provided algorithm.
#[must_use]
pub fn hash_bytes(algorithm: HashAlgorithm, bytes: &[u8]) -> HashDigest {
    match algorithm {
        HashAlgorithm::Sha256 => {
            let mut hasher = Sha256::new();
            hasher.update(bytes);
            HashDigest::new(HashAlgorithm::Sha256, &hasher.finalize())
        }
    }
}

/// Hashes a sequence of byte slices as one contiguous input.
#[must_use]
pub fn hash_chained(algorithm: HashAlgorithm, parts: &[&[u8]]) -> HashDigest {
    match algorithm {
        HashAlgorithm::Sha256 => {
            let mut hasher = Sha256::new();
            for part in parts {
                hasher.update(part);
            }
            HashDigest::new(HashAlgorithm::Sha256, &hasher.finalize())
        }
    }
}

// ============================================================================
// SECTION: Hex Encoding
// ============================================================================

/// Encodes bytes as a lowercase hex string.
#[must_use]
pub fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(HEX[(byte >> 4) as usize] as char);
        out.push(HEX[(byte & 0x0f) as usize] as char);
    }
    out
}
