// crates/publish-gate-core/tests/manifest.rs
// ============================================================================
// Module: Manifest Builder Tests
// Description: Determinism and verification tests for signed manifests.
// Purpose: Ensure digests ignore input order and tampering is always detected.
// Dependencies: publish-gate-core, proptest, serde_json
// ============================================================================
//! ## Overview
//! Property tests exercise the aggregate digest across arbitrary artifact
//! sets; example tests cover tampered manifests and artifacts.
//!
//! Security posture: any post-signing change must fail verification.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

mod common;

use std::collections::BTreeMap;

use common::KeyedVerifier;
use common::SIGNING_KEY;
use common::builder;
use proptest::prelude::*;
use publish_gate_core::Artifact;
use publish_gate_core::ArtifactSnapshot;
use publish_gate_core::Manifest;
use publish_gate_core::ManifestVerifier;
use publish_gate_core::Timestamp;
use publish_gate_core::TraceId;
use publish_gate_core::VerificationStatus;
use publish_gate_core::hashing::DEFAULT_HASH_ALGORITHM;
use serde_json::Value;

const TRACE: &str = "0123456789abcdef0123456789abcdef";

fn artifacts(files: &BTreeMap<String, Vec<u8>>) -> Vec<Artifact> {
    files
        .iter()
        .map(|(path, bytes)| {
            Artifact::new(path.clone(), bytes.clone(), DEFAULT_HASH_ALGORITHM).unwrap()
        })
        .collect()
}

fn sign(artifacts: &[Artifact]) -> Manifest {
    builder()
        .build(&TraceId::parse(TRACE).unwrap(), Timestamp::from_unix_millis(0), artifacts)
        .expect("manifest")
}

fn verifier() -> KeyedVerifier {
    KeyedVerifier {
        key: SIGNING_KEY.to_vec(),
    }
}

fn file_set() -> impl Strategy<Value = BTreeMap<String, Vec<u8>>> {
    prop::collection::btree_map(
        "[a-z]{1,6}(/[a-z]{1,6}){0,2}\\.[a-z]{1,3}",
        prop::collection::vec(any::<u8>(), 0 .. 64),
        1 .. 8,
    )
}

proptest! {
    #[test]
    fn aggregate_digest_ignores_input_order(files in file_set(), seed in any::<u64>()) {
        let ordered = artifacts(&files);
        let mut shuffled = ordered.clone();
        let len = u64::try_from(shuffled.len()).unwrap();
        shuffled.rotate_left(usize::try_from(seed % len).unwrap());
        shuffled.reverse();
        let first = sign(&ordered);
        let second = sign(&shuffled);
        prop_assert_eq!(first.aggregate_digest(), second.aggregate_digest());
        prop_assert_eq!(first.records(), second.records());
        prop_assert_eq!(&first.signature().value, &second.signature().value);
    }

    #[test]
    fn single_byte_change_alters_digest(files in file_set(), flip in any::<u8>()) {
        let original = sign(&artifacts(&files));
        let mut changed = files.clone();
        let first_key = changed.keys().next().cloned().unwrap();
        let bytes = changed.get_mut(&first_key).unwrap();
        if bytes.is_empty() {
            bytes.push(flip);
        } else {
            bytes[0] = bytes[0].wrapping_add(flip.max(1));
        }
        let altered = sign(&artifacts(&changed));
        prop_assert_ne!(original.aggregate_digest(), altered.aggregate_digest());
    }

    #[test]
    fn signed_manifests_verify(files in file_set()) {
        let manifest = sign(&artifacts(&files));
        let key = verifier();
        let report = ManifestVerifier::new(&key).verify(&manifest);
        prop_assert_eq!(report.status, VerificationStatus::Pass);
    }
}

/// Verifies editing a record hash after signing fails verification.
#[test]
fn edited_record_hash_fails_verification() {
    let files: BTreeMap<String, Vec<u8>> =
        [("a.txt".to_string(), b"alpha".to_vec()), ("b.txt".to_string(), b"beta".to_vec())]
            .into_iter()
            .collect();
    let manifest = sign(&artifacts(&files));
    let mut json = serde_json::to_value(&manifest).unwrap();
    json["records"][1]["hash"]["value"] = Value::String("0".repeat(64));
    let tampered: Manifest = serde_json::from_value(json).unwrap();

    let key = verifier();
    let report = ManifestVerifier::new(&key).verify(&tampered);
    assert_eq!(report.status, VerificationStatus::Fail);
    assert!(report.errors.iter().any(|error| error.contains("aggregate digest")));
}

/// Verifies a signature does not carry over to a different trace id.
#[test]
fn moved_trace_id_fails_verification() {
    let files: BTreeMap<String, Vec<u8>> =
        [("a.txt".to_string(), b"alpha".to_vec())].into_iter().collect();
    let manifest = sign(&artifacts(&files));
    let mut json = serde_json::to_value(&manifest).unwrap();
    json["traceId"] = Value::String("f".repeat(32));
    let replayed: Manifest = serde_json::from_value(json).unwrap();

    let key = verifier();
    let report = ManifestVerifier::new(&key).verify(&replayed);
    assert_eq!(report.status, VerificationStatus::Fail);
    assert!(report.errors.iter().any(|error| error.contains("signature verification failed")));
    assert!(!report.errors.iter().any(|error| error.contains("aggregate digest")));
}

/// Verifies a manifest signed by another key fails verification.
#[test]
fn foreign_key_fails_verification() {
    let files: BTreeMap<String, Vec<u8>> =
        [("a.txt".to_string(), b"alpha".to_vec())].into_iter().collect();
    let manifest = sign(&artifacts(&files));
    let other = KeyedVerifier {
        key: b"someone else".to_vec(),
    };
    let report = ManifestVerifier::new(&other).verify(&manifest);
    assert!(!report.is_valid());
    assert!(report.errors.iter().any(|error| error.contains("signature")));
}

/// Verifies artifact bytes are compared against manifest records.
#[test]
fn verify_with_artifacts_detects_changed_bytes() {
    let files: BTreeMap<String, Vec<u8>> =
        [("a.txt".to_string(), b"alpha".to_vec()), ("b.txt".to_string(), b"beta".to_vec())]
            .into_iter()
            .collect();
    let manifest = sign(&artifacts(&files));
    let key = verifier();

    let same = ArtifactSnapshot::new(artifacts(&files)).unwrap();
    assert!(ManifestVerifier::new(&key).verify_with_artifacts(&manifest, &same).is_valid());

    let mut changed = files;
    changed.insert("b.txt".to_string(), b"BETA".to_vec());
    let snapshot = ArtifactSnapshot::new(artifacts(&changed)).unwrap();
    let report = ManifestVerifier::new(&key).verify_with_artifacts(&manifest, &snapshot);
    assert_eq!(report.status, VerificationStatus::Fail);
    assert!(report.errors.contains(&"hash mismatch for b.txt".to_string()));
}
