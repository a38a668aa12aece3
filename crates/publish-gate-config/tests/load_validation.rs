//! Config load validation tests for publish-gate-config.
// crates/publish-gate-config/tests/load_validation.rs
// =============================================================================
// Module: Config Load Validation Tests
// Description: Validate config loading guards (path, size, encoding).
// Purpose: Ensure config input handling is strict and fail-closed.
// =============================================================================

mod common;

use std::fs;
use std::io::Write;
use std::path::Path;

use publish_gate_config::PipelineConfig;
use publish_gate_config::config_toml_example;
use tempfile::NamedTempFile;

use crate::common::MINIMAL_TOML;
use crate::common::assert_invalid;

type TestResult = Result<(), String>;

#[test]
fn load_rejects_path_too_long() -> TestResult {
    let long_path = "a".repeat(5_000);
    assert_invalid(
        PipelineConfig::load(Some(Path::new(&long_path))),
        "config path exceeds max length",
    )
}

#[test]
fn load_rejects_path_component_too_long() -> TestResult {
    let long_component = "a".repeat(300);
    assert_invalid(
        PipelineConfig::load(Some(Path::new(&long_component))),
        "config path component too long",
    )
}

#[test]
fn load_rejects_missing_file() -> TestResult {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    assert_invalid(PipelineConfig::load(Some(&dir.path().join("absent.toml"))), "config io error")
}

#[test]
fn load_rejects_oversized_file() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    file.write_all(&vec![b'#'; 1_048_577]).map_err(|err| err.to_string())?;
    assert_invalid(PipelineConfig::load(Some(file.path())), "config file exceeds size limit")
}

#[test]
fn load_rejects_non_utf8_file() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    file.write_all(&[0xFF, 0xFE, 0xFF]).map_err(|err| err.to_string())?;
    assert_invalid(PipelineConfig::load(Some(file.path())), "config file must be utf-8")
}

#[test]
fn load_rejects_malformed_toml() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    file.write_all(b"[pipeline\nsigning_key = 1").map_err(|err| err.to_string())?;
    assert_invalid(PipelineConfig::load(Some(file.path())), "config parse error")
}

#[test]
fn load_rejects_unknown_fields() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    let content = format!("{MINIMAL_TOML}\n[telemetry]\nenabled = true\n");
    file.write_all(content.as_bytes()).map_err(|err| err.to_string())?;
    assert_invalid(PipelineConfig::load(Some(file.path())), "config parse error")
}

#[test]
fn load_resolves_relative_paths_against_config_dir() -> TestResult {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let path = dir.path().join("publish-gate.toml");
    fs::write(&path, MINIMAL_TOML).map_err(|err| err.to_string())?;
    let config = PipelineConfig::load(Some(&path)).map_err(|err| err.to_string())?;
    let resolved = config.resolve(&config.artifacts.root);
    if resolved != dir.path().join("dist") {
        return Err(format!("unexpected root {}", resolved.display()));
    }
    let absolute = dir.path().join("elsewhere");
    if config.resolve(&absolute) != absolute {
        return Err("absolute paths must be kept as-is".to_string());
    }
    Ok(())
}

#[test]
fn canonical_example_loads_and_validates() -> TestResult {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let path = dir.path().join("publish-gate.toml");
    fs::write(&path, config_toml_example()).map_err(|err| err.to_string())?;
    let config = PipelineConfig::load(Some(&path)).map_err(|err| err.to_string())?;
    if config.checks.len() != 3 || config.publishers.len() != 2 {
        return Err("example should declare three checks and two publishers".to_string());
    }
    let pinned = config.artifacts.pinned_digests().map_err(|err| err.to_string())?;
    if !pinned.contains_key("app.js") {
        return Err("example pin missing".to_string());
    }
    Ok(())
}
