// crates/publish-gate-providers/tests/common/mod.rs
// =============================================================================
// Module: Provider Test Helpers
// Description: Shared fixtures for provider integration tests.
// Purpose: Build keys, snapshots, and signed manifests without duplication.
// =============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]

use std::sync::Arc;

use ed25519_dalek::SigningKey;
use publish_gate_core::Artifact;
use publish_gate_core::ArtifactSnapshot;
use publish_gate_core::Manifest;
use publish_gate_core::ManifestBuilder;
use publish_gate_core::Timestamp;
use publish_gate_core::TraceId;
use publish_gate_core::hashing::DEFAULT_HASH_ALGORITHM;
use publish_gate_providers::Ed25519Signer;
use publish_gate_providers::HttpClientConfig;

/// Trace id used by signed test manifests.
pub const TRACE_ID: &str = "0123456789abcdef0123456789abcdef";

/// Deterministic signing key.
pub fn signing_key() -> SigningKey {
    SigningKey::from_bytes(&[7u8; 32])
}

/// Signer over the deterministic key.
pub fn signer() -> Ed25519Signer {
    Ed25519Signer::new(signing_key(), None)
}

/// Builds a snapshot from path/content pairs.
pub fn snapshot(entries: &[(&str, &[u8])]) -> ArtifactSnapshot {
    let artifacts = entries
        .iter()
        .map(|(path, bytes)| Artifact::new(*path, bytes.to_vec(), DEFAULT_HASH_ALGORITHM).unwrap())
        .collect();
    ArtifactSnapshot::new(artifacts).unwrap()
}

/// Signs a manifest for the snapshot under a fixed trace id.
pub fn manifest(snapshot: &ArtifactSnapshot) -> Manifest {
    let builder = ManifestBuilder::new(Arc::new(signer()), DEFAULT_HASH_ALGORITHM);
    let trace_id = TraceId::parse(TRACE_ID).unwrap();
    let created_at = Timestamp::from_unix_millis(1_700_000_000_000);
    builder.build_snapshot(&trace_id, created_at, snapshot).unwrap()
}

/// HTTP settings that permit the loopback test server.
pub fn local_http() -> HttpClientConfig {
    HttpClientConfig {
        allow_http: true,
        timeout_ms: 5_000,
        ..HttpClientConfig::default()
    }
}
