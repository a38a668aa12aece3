// crates/publish-gate-cli/tests/cli_commands.rs
// ============================================================================
// Module: CLI Command Tests
// Description: End-to-end runs of the publish-gate binary.
// Purpose: Ensure runs are recorded, reported, and mapped to exit codes.
// Dependencies: publish-gate-cli binary
// ============================================================================

//! ## Overview
//! Drives the binary against a temporary workspace and a local gate:
//! - A permitted run publishes, writes reports and provenance, and verifies offline
//! - A rejected run is recorded without publishing
//! - A run the ledger refuses is still printed before exiting with code 2
//! - Pre-flight and configuration errors exit with code 2

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

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;

use publish_gate_core::hashing::DEFAULT_HASH_ALGORITHM;
use publish_gate_core::hashing::hash_bytes;
use publish_gate_store_sqlite::GENESIS_HASH;
use serde_json::Value;

use crate::common::SBOM_JSON;
use crate::common::Workspace;
use crate::common::run_cli;
use crate::common::serve_gate;

// ============================================================================
// SECTION: Helpers
// ============================================================================

const TRACE: &str = "00000000000000000000000000000abc";

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).unwrap_or_else(|err| {
        panic!("stdout was not json ({err}): {}", String::from_utf8_lossy(&output.stdout))
    })
}

// ============================================================================
// SECTION: Run
// ============================================================================

#[test]
fn permitted_run_publishes_reports_and_verifies() {
    let (url, gate) = serve_gate(1, r#"{"verdict":"PASS","reason":"all clear"}"#);
    let workspace = Workspace::new(&url);
    let config = workspace.config_arg();

    let output = run_cli(&["run", "--config", &config, "--trace-id", TRACE]);
    gate.join().unwrap();
    assert_eq!(output.status.code(), Some(0), "{}", String::from_utf8_lossy(&output.stderr));
    let evidence = stdout_json(&output);
    assert_eq!(evidence["traceId"], TRACE);
    assert_eq!(evidence["success"], true);
    assert_eq!(workspace.archive_count(), 1);

    let reports = workspace.root().join("reports");
    let deploy: Value =
        serde_json::from_slice(&fs::read(reports.join(format!("deploy_{TRACE}.json"))).unwrap())
            .unwrap();
    assert_eq!(deploy["terminal"], "success");
    assert_eq!(deploy["artifactCount"], 2);

    let manifest = reports.join(format!("manifest_{TRACE}.json"));
    let signed: Value = serde_json::from_slice(&fs::read(&manifest).unwrap()).unwrap();
    let provenance: Value = serde_json::from_slice(
        &fs::read(reports.join(format!("provenance_{TRACE}.json"))).unwrap(),
    )
    .unwrap();
    assert_eq!(provenance["traceId"], TRACE);
    assert_eq!(provenance["slsaLevel"], 2);
    assert_eq!(provenance["manifestDigest"], signed["aggregateDigest"]);
    assert_eq!(provenance["materials"], signed["records"]);
    assert_eq!(provenance["materials"].as_array().map(Vec::len), Some(2));
    let sbom_hash = hash_bytes(DEFAULT_HASH_ALGORITHM, SBOM_JSON.as_bytes());
    assert_eq!(provenance["sbom"]["hash"], serde_json::to_value(&sbom_hash).unwrap());

    let public_key = workspace.root().join("release.pub");
    let verified = run_cli(&[
        "verify",
        "--manifest",
        manifest.to_str().unwrap(),
        "--public-key",
        public_key.to_str().unwrap(),
    ]);
    assert_eq!(verified.status.code(), Some(0));
    assert_eq!(stdout_json(&verified)["status"], "pass");

    let shown = run_cli(&["ledger", "show", "--config", &config, "--trace-id", TRACE]);
    assert_eq!(shown.status.code(), Some(0));
    assert_eq!(stdout_json(&shown)["traceId"], TRACE);

    let listed = run_cli(&["ledger", "list", "--config", &config]);
    assert_eq!(stdout_json(&listed).as_array().map(Vec::len), Some(1));

    let chain = run_cli(&["ledger", "verify", "--config", &config]);
    assert_eq!(chain.status.code(), Some(0));
    assert_eq!(stdout_json(&chain)["checked"], 1);

    let receipt = run_cli(&["ledger", "receipt", "--config", &config, "--trace-id", TRACE]);
    assert_eq!(receipt.status.code(), Some(0));
    let receipt = stdout_json(&receipt);
    assert_eq!(receipt["position"], 1);
    assert_eq!(receipt["prevHash"], GENESIS_HASH);
    assert_eq!(receipt["chainHead"], receipt["recordHash"]);
    assert_eq!(receipt["chainIntact"], true);
}

#[test]
fn rejected_run_is_recorded_without_publishing() {
    let (url, gate) = serve_gate(1, r#"{"verdict":"REJECT","reason":"policy says no"}"#);
    let workspace = Workspace::new(&url);
    let config = workspace.config_arg();

    let output = run_cli(&["run", "--config", &config, "--trace-id", TRACE]);
    gate.join().unwrap();
    assert_eq!(output.status.code(), Some(1));
    let evidence = stdout_json(&output);
    assert_eq!(evidence["success"], false);
    assert_eq!(evidence["failureReason"]["kind"], "gate_rejected");
    assert_eq!(workspace.archive_count(), 0);

    let reports = workspace.root().join("reports");
    assert!(reports.join(format!("deploy_{TRACE}.json")).exists());
    assert!(!reports.join(format!("provenance_{TRACE}.json")).exists());

    let shown = run_cli(&["ledger", "show", "--config", &config, "--trace-id", TRACE]);
    assert_eq!(stdout_json(&shown)["terminal"], "failed");
}

#[test]
fn missing_signing_key_records_a_signing_failure() {
    let workspace = Workspace::with_key("http://127.0.0.1:9/decide", false);
    let config = workspace.config_arg();

    let output = run_cli(&["run", "--config", &config, "--trace-id", TRACE]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("signing error"));

    let shown = run_cli(&["ledger", "show", "--config", &config, "--trace-id", TRACE]);
    assert_eq!(stdout_json(&shown)["failureReason"]["kind"], "signing");
    assert_eq!(workspace.archive_count(), 0);
}

#[test]
fn ledger_write_failure_still_reports_the_run() {
    let (url, gate) = serve_gate(1, r#"{"verdict":"PASS","reason":"all clear"}"#);
    let workspace = Workspace::new(&url);
    let config = workspace.config_arg();

    let opened = run_cli(&["ledger", "verify", "--config", &config]);
    assert_eq!(opened.status.code(), Some(0));
    let evidence_dir = workspace.root().join("evidence");
    let db = rusqlite::Connection::open(evidence_dir.join("ledger.sqlite")).unwrap();
    db.execute_batch(
        "CREATE TRIGGER runs_sealed BEFORE INSERT ON runs
         BEGIN SELECT RAISE(ABORT, 'ledger sealed'); END;",
    )
    .unwrap();
    drop(db);
    fs::write(evidence_dir.join("fallback"), b"not a directory").unwrap();

    let output = run_cli(&["run", "--config", &config, "--trace-id", TRACE]);
    gate.join().unwrap();
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ledger write failed"), "{stderr}");
    assert!(stderr.contains("fallback: none"), "{stderr}");

    let evidence = stdout_json(&output);
    assert_eq!(evidence["traceId"], TRACE);
    assert_eq!(evidence["recordId"], Value::Null);
    assert_eq!(evidence["terminal"], "success");
    assert_eq!(evidence["publishResults"][0]["target"], "archive");
    assert_eq!(evidence["publishResults"][0]["status"], "SUCCESS");
    assert_eq!(workspace.archive_count(), 1);
}

// ============================================================================
// SECTION: Pre-flight and Config
// ============================================================================

#[test]
fn reused_trace_id_is_a_preflight_error() {
    let (url, gate) = serve_gate(1, r#"{"verdict":"PASS"}"#);
    let workspace = Workspace::new(&url);
    let config = workspace.config_arg();
    assert_eq!(run_cli(&["run", "--config", &config, "--trace-id", TRACE]).status.code(), Some(0));
    gate.join().unwrap();

    let again = run_cli(&["run", "--config", &config, "--trace-id", TRACE]);
    assert_eq!(again.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&again.stderr).contains("already recorded"));
}

#[test]
fn unknown_supersedes_is_a_preflight_error() {
    let workspace = Workspace::new("http://127.0.0.1:9/decide");
    let config = workspace.config_arg();
    let output = run_cli(&["run", "--config", &config, "--supersedes", TRACE]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("superseded trace id not found"));
}

#[test]
fn invalid_config_exits_with_setup_code() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("publish-gate.toml");
    fs::write(&path, "[pipeline]\nworkers = 0\n").unwrap();
    let output = run_cli(&["run", "--config", path.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(2));

    let missing = dir.path().join("absent.toml");
    let output = run_cli(&["config", "validate", "--config", missing.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("config io error"));
}

#[test]
fn unknown_trace_lookup_exits_with_failure() {
    let workspace = Workspace::new("http://127.0.0.1:9/decide");
    let config = workspace.config_arg();
    let output = run_cli(&["ledger", "show", "--config", &config, "--trace-id", TRACE]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("no ledger record"));
}
