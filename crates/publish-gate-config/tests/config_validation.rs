//! Section validation tests for publish-gate-config.
// crates/publish-gate-config/tests/config_validation.rs
// =============================================================================
// Module: Config Validation Tests
// Description: Field-level and cross-field validation of pipeline config.
// Purpose: Ensure invalid pipelines are refused before any run starts.
// =============================================================================

mod common;

use publish_gate_config::CheckKind;
use publish_gate_config::PublisherKind;
use publish_gate_core::StagePolicy;
use publish_gate_store_sqlite::SqliteStoreMode;
use publish_gate_store_sqlite::SqliteSyncMode;

use crate::common::MINIMAL_TOML;
use crate::common::assert_invalid;
use crate::common::config_from_toml;
use crate::common::minimal_config;

type TestResult = Result<(), String>;

fn with_extra(extra: &str) -> Result<publish_gate_config::PipelineConfig, String> {
    config_from_toml(&format!("{MINIMAL_TOML}\n{extra}")).map_err(|err| err.to_string())
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

#[test]
fn minimal_config_applies_defaults() -> TestResult {
    let config = minimal_config().map_err(|err| err.to_string())?;
    config.validate().map_err(|err| err.to_string())?;
    if config.pipeline.workers != 4
        || config.pipeline.stage_name != "validation"
        || config.pipeline.stage_policy != StagePolicy::CollectAll
    {
        return Err("unexpected pipeline defaults".to_string());
    }
    if config.gate.max_attempts != 4 || config.gate.timeout_ms != 10_000 || config.gate.allow_http {
        return Err("unexpected gate defaults".to_string());
    }
    if config.ledger.journal_mode != SqliteStoreMode::Wal
        || config.ledger.sync_mode != SqliteSyncMode::Full
    {
        return Err("unexpected ledger defaults".to_string());
    }
    if !config.checks.is_empty() || !config.publishers.is_empty() {
        return Err("checks and publishers default to empty".to_string());
    }
    Ok(())
}

#[test]
fn check_and_publisher_kinds_parse() -> TestResult {
    let config = with_extra(
        r#"
[[checks]]
name = "lint"
type = "command"
command = ["cargo", "clippy"]

[[checks]]
name = "size"
type = "file_size"
max_bytes = 10

[[publishers]]
name = "archive"
type = "local_archive"
dir = "out"

[[publishers]]
name = "registry"
type = "http"
url = "http://127.0.0.1:9000/deposit"
allow_http = true
depends_on = ["archive"]
"#,
    )?;
    config.validate().map_err(|err| err.to_string())?;
    if config.checks[0].kind
        != (CheckKind::Command {
            command: vec!["cargo".to_string(), "clippy".to_string()],
        })
    {
        return Err("command check did not parse".to_string());
    }
    if !matches!(config.publishers[1].kind, PublisherKind::Http { allow_http: true, .. }) {
        return Err("http publisher did not parse".to_string());
    }
    Ok(())
}

// ============================================================================
// SECTION: Pipeline and Artifacts
// ============================================================================

#[test]
fn workers_out_of_range_are_rejected() -> TestResult {
    let mut config = minimal_config().map_err(|err| err.to_string())?;
    config.pipeline.workers = 0;
    assert_invalid(config.validate(), "pipeline.workers must be between 1 and 64")?;
    config.pipeline.workers = 65;
    assert_invalid(config.validate(), "pipeline.workers must be between 1 and 64")
}

#[test]
fn sbom_path_parses_and_must_be_non_empty() -> TestResult {
    let mut config = config_from_toml(&MINIMAL_TOML.replace(
        "signing_key = \"release.key\"",
        "signing_key = \"release.key\"\nsbom = \"sbom.json\"",
    ))
    .map_err(|err| err.to_string())?;
    config.validate().map_err(|err| err.to_string())?;
    if config.pipeline.sbom.as_deref() != Some(std::path::Path::new("sbom.json")) {
        return Err("sbom path did not parse".to_string());
    }
    config.pipeline.sbom = Some(std::path::PathBuf::new());
    assert_invalid(config.validate(), "pipeline.sbom must be non-empty")
}

#[test]
fn empty_include_is_rejected() -> TestResult {
    let mut config = minimal_config().map_err(|err| err.to_string())?;
    config.artifacts.include.clear();
    assert_invalid(config.validate(), "artifacts.include must not be empty")
}

#[test]
fn escaping_include_is_rejected() -> TestResult {
    let mut config = minimal_config().map_err(|err| err.to_string())?;
    config.artifacts.include = vec!["../secrets".to_string()];
    assert_invalid(config.validate(), "must be relative")?;
    config.artifacts.include = vec!["/etc/passwd".to_string()];
    assert_invalid(config.validate(), "must be relative")
}

#[test]
fn malformed_pin_is_rejected() -> TestResult {
    let mut config = minimal_config().map_err(|err| err.to_string())?;
    config.artifacts.pinned.insert("app.js".to_string(), "abc".to_string());
    assert_invalid(config.validate(), "artifacts.pinned.app.js is not a sha256 hex digest")
}

// ============================================================================
// SECTION: Checks
// ============================================================================

#[test]
fn duplicate_check_names_are_rejected() -> TestResult {
    let config = with_extra(
        r#"
[[checks]]
name = "scan"
type = "secret_scan"

[[checks]]
name = "scan"
type = "file_size"
max_bytes = 1
"#,
    )?;
    assert_invalid(config.validate(), "duplicate check name: scan")
}

#[test]
fn empty_command_is_rejected() -> TestResult {
    let config = with_extra(
        r#"
[[checks]]
name = "build"
type = "command"
command = []
"#,
    )?;
    assert_invalid(config.validate(), "checks.build.command must name a program")
}

#[test]
fn check_timeout_bounds_are_enforced() -> TestResult {
    let config = with_extra(
        r#"
[[checks]]
name = "scan"
type = "secret_scan"
timeout_ms = 5
"#,
    )?;
    assert_invalid(config.validate(), "checks.scan.timeout_ms must be between")
}

#[test]
fn zero_size_limit_is_rejected() -> TestResult {
    let config = with_extra(
        r#"
[[checks]]
name = "size"
type = "file_size"
max_bytes = 0
"#,
    )?;
    assert_invalid(config.validate(), "checks.size.max_bytes must be greater than zero")
}

// ============================================================================
// SECTION: Gate
// ============================================================================

#[test]
fn cleartext_gate_requires_opt_in() -> TestResult {
    let mut config = minimal_config().map_err(|err| err.to_string())?;
    config.gate.url = "http://gate.internal/decide".to_string();
    assert_invalid(config.validate(), "gate.url uses http:// without allow_http")?;
    config.gate.allow_http = true;
    config.validate().map_err(|err| err.to_string())
}

#[test]
fn gate_url_requires_scheme() -> TestResult {
    let mut config = minimal_config().map_err(|err| err.to_string())?;
    config.gate.url = "gate.example.com".to_string();
    assert_invalid(config.validate(), "gate.url must include http:// or https://")
}

#[test]
fn gate_attempts_and_backoff_are_bounded() -> TestResult {
    let mut config = minimal_config().map_err(|err| err.to_string())?;
    config.gate.max_attempts = 0;
    assert_invalid(config.validate(), "gate.max_attempts must be between 1 and 10")?;
    config.gate.max_attempts = 3;
    config.gate.initial_backoff_ms = 10_000;
    config.gate.max_backoff_ms = 1_000;
    assert_invalid(config.validate(), "gate.initial_backoff_ms must not exceed")?;
    config.gate.initial_backoff_ms = 100;
    config.gate.timeout_ms = 50;
    assert_invalid(config.validate(), "gate.timeout_ms must be between")
}

// ============================================================================
// SECTION: Publishers
// ============================================================================

#[test]
fn duplicate_publishers_are_rejected() -> TestResult {
    let config = with_extra(
        r#"
[[publishers]]
name = "archive"
type = "local_archive"
dir = "a"

[[publishers]]
name = "archive"
type = "local_archive"
dir = "b"
"#,
    )?;
    assert_invalid(config.validate(), "duplicate publisher name: archive")
}

#[test]
fn dependencies_must_be_declared_earlier() -> TestResult {
    let config = with_extra(
        r#"
[[publishers]]
name = "registry"
type = "http"
url = "https://registry.example.com"
depends_on = ["archive"]

[[publishers]]
name = "archive"
type = "local_archive"
dir = "a"
"#,
    )?;
    assert_invalid(config.validate(), "publisher registry depends on archive")
}

#[test]
fn self_dependency_is_rejected() -> TestResult {
    let config = with_extra(
        r#"
[[publishers]]
name = "archive"
type = "local_archive"
dir = "a"
depends_on = ["archive"]
"#,
    )?;
    assert_invalid(config.validate(), "publisher archive depends on archive")
}

// ============================================================================
// SECTION: Ledger
// ============================================================================

#[test]
fn ledger_modes_parse_and_empty_paths_are_rejected() -> TestResult {
    let mut config = config_from_toml(&MINIMAL_TOML.replace(
        "fallback_dir = \"fallback\"",
        "fallback_dir = \"fallback\"\njournal_mode = \"delete\"\nsync_mode = \"normal\"",
    ))
    .map_err(|err| err.to_string())?;
    if config.ledger.journal_mode != SqliteStoreMode::Delete
        || config.ledger.sync_mode != SqliteSyncMode::Normal
    {
        return Err("ledger modes did not parse".to_string());
    }
    config.ledger.fallback_dir = std::path::PathBuf::new();
    assert_invalid(config.validate(), "ledger.fallback_dir must be non-empty")
}
