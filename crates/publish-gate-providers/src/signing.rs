// crates/publish-gate-providers/src/signing.rs
// ============================================================================
// Module: Ed25519 Signing
// Description: Ed25519 manifest signer and signature verifier.
// Purpose: Bind manifests and gate verdicts to long-lived key pairs.
// Dependencies: publish-gate-core, ed25519-dalek, base64
// ============================================================================

//! ## Overview
//! Keys are read from files holding either 32 raw bytes or base64 text.
//! Signatures are base64 encoded. The signing key stays inside
//! [`Ed25519Signer`]; only the signer id and public key are exposed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use ed25519_dalek::Signature;
use ed25519_dalek::Signer;
use ed25519_dalek::SigningKey;
use ed25519_dalek::VerifyingKey;
use publish_gate_core::ManifestSigner;
use publish_gate_core::SignatureError;
use publish_gate_core::SignatureScheme;
use publish_gate_core::SignatureVerifier;
use publish_gate_core::SignerId;
use publish_gate_core::SigningError;
use publish_gate_core::hashing::DEFAULT_HASH_ALGORITHM;
use publish_gate_core::hashing::hash_bytes;
use thiserror::Error;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum accepted key file size in bytes.
pub const MAX_KEY_FILE_BYTES: u64 = 4 * 1024;

/// Number of hex characters of the public key hash used as a default signer id.
const SIGNER_ID_HEX_LEN: usize = 16;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Key loading errors.
#[derive(Debug, Error)]
pub enum KeyError {
    /// Key file could not be read.
    #[error("unable to read key file {path}: {message}")]
    Io {
        /// Key file path.
        path: String,
        /// Underlying error text.
        message: String,
    },
    /// Key material is malformed.
    #[error("invalid ed25519 key in {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Key Loading
// ============================================================================

/// Reads 32 bytes of key material from raw or base64 file content.
fn read_key_bytes(path: &Path) -> Result<[u8; 32], KeyError> {
    let display = path.display().to_string();
    let metadata = fs::metadata(path).map_err(|err| KeyError::Io {
        path: display.clone(),
        message: err.to_string(),
    })?;
    if metadata.len() > MAX_KEY_FILE_BYTES {
        return Err(KeyError::Invalid(display));
    }
    let bytes = fs::read(path).map_err(|err| KeyError::Io {
        path: display.clone(),
        message: err.to_string(),
    })?;
    let key_bytes = if bytes.len() == 32 {
        bytes
    } else {
        let text = std::str::from_utf8(&bytes).map_err(|_| KeyError::Invalid(display.clone()))?;
        BASE64.decode(text.trim()).map_err(|_| KeyError::Invalid(display.clone()))?
    };
    key_bytes.as_slice().try_into().map_err(|_| KeyError::Invalid(display))
}

/// Loads an Ed25519 signing key from disk.
///
/// # Errors
///
/// Returns [`KeyError`] when the file is unreadable or malformed.
pub fn load_signing_key(path: &Path) -> Result<SigningKey, KeyError> {
    read_key_bytes(path).map(|key| SigningKey::from_bytes(&key))
}

/// Loads an Ed25519 public key from disk.
///
/// # Errors
///
/// Returns [`KeyError`] when the file is unreadable or not a valid point.
pub fn load_verifying_key(path: &Path) -> Result<VerifyingKey, KeyError> {
    let key = read_key_bytes(path)?;
    VerifyingKey::from_bytes(&key).map_err(|_| KeyError::Invalid(path.display().to_string()))
}

/// Derives a stable signer id from a public key.
#[must_use]
pub fn derive_signer_id(key: &VerifyingKey) -> SignerId {
    let digest = hash_bytes(DEFAULT_HASH_ALGORITHM, key.as_bytes());
    SignerId::new(format!("ed25519:{}", &digest.value[.. SIGNER_ID_HEX_LEN]))
}

// ============================================================================
// SECTION: Signer
// ============================================================================

/// Ed25519 manifest signer.
pub struct Ed25519Signer {
    /// Private key.
    key: SigningKey,
    /// Signer identifier recorded in manifests.
    signer_id: SignerId,
}

impl Ed25519Signer {
    /// Creates a signer; the id defaults to a hash of the public key.
    #[must_use]
    pub fn new(key: SigningKey, signer_id: Option<SignerId>) -> Self {
        let signer_id = signer_id.unwrap_or_else(|| derive_signer_id(&key.verifying_key()));
        Self {
            key,
            signer_id,
        }
    }

    /// Loads the signing key from a file.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError`] when the key cannot be loaded.
    pub fn from_file(path: &Path, signer_id: Option<SignerId>) -> Result<Self, KeyError> {
        Ok(Self::new(load_signing_key(path)?, signer_id))
    }

    /// Returns the matching public key.
    #[must_use]
    pub fn verifying_key(&self) -> VerifyingKey {
        self.key.verifying_key()
    }
}

impl ManifestSigner for Ed25519Signer {
    fn scheme(&self) -> SignatureScheme {
        SignatureScheme::Ed25519
    }

    fn signer_id(&self) -> SignerId {
        self.signer_id.clone()
    }

    fn sign(&self, payload: &[u8]) -> Result<String, SigningError> {
        Ok(BASE64.encode(self.key.sign(payload).to_bytes()))
    }
}

/// Signer used when the configured key could not be loaded.
///
/// Every signing attempt fails with [`SigningError::KeyUnavailable`], so the
/// run is recorded as a signing failure instead of aborting before any
/// evidence exists.
pub struct UnavailableSigner {
    /// Load failure description.
    reason: String,
}

impl UnavailableSigner {
    /// Creates a signer that always reports the given reason.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl ManifestSigner for UnavailableSigner {
    fn scheme(&self) -> SignatureScheme {
        SignatureScheme::Ed25519
    }

    fn signer_id(&self) -> SignerId {
        SignerId::new("unavailable")
    }

    fn sign(&self, _payload: &[u8]) -> Result<String, SigningError> {
        Err(SigningError::KeyUnavailable(self.reason.clone()))
    }
}

// ============================================================================
// SECTION: Verifier
// ============================================================================

/// Ed25519 signature verifier.
#[derive(Debug, Clone)]
pub struct Ed25519Verifier {
    /// Public key.
    key: VerifyingKey,
}

impl Ed25519Verifier {
    /// Creates a verifier for a public key.
    #[must_use]
    pub const fn new(key: VerifyingKey) -> Self {
        Self {
            key,
        }
    }

    /// Loads the public key from a file.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError`] when the key cannot be loaded.
    pub fn from_file(path: &Path) -> Result<Self, KeyError> {
        Ok(Self::new(load_verifying_key(path)?))
    }
}

impl SignatureVerifier for Ed25519Verifier {
    fn scheme(&self) -> SignatureScheme {
        SignatureScheme::Ed25519
    }

    fn verify(&self, payload: &[u8], signature: &str) -> Result<(), SignatureError> {
        let bytes = BASE64
            .decode(signature.trim())
            .map_err(|err| SignatureError::Malformed(err.to_string()))?;
        let signature = Signature::try_from(bytes.as_slice())
            .map_err(|err| SignatureError::Malformed(err.to_string()))?;
        self.key.verify_strict(payload, &signature).map_err(|_| SignatureError::Mismatch)
    }
}
