// crates/publish-gate-config/src/examples.rs
// ============================================================================
// Module: Config Examples
// Description: Canonical example configuration for the publish pipeline.
// Purpose: Provide a starting template that passes validation.
// Dependencies: none
// ============================================================================

//! ## Overview
//! Canonical example `publish-gate.toml`. Tests keep it parseable and valid.

/// Returns a canonical example `publish-gate.toml` configuration.
#[must_use]
pub fn config_toml_example() -> String {
    String::from(
        r#"[pipeline]
signing_key = "keys/release.key"
signer_id = "release-bot"
workers = 4
stage_name = "validation"
stage_policy = "collect_all"
report_dir = "reports"
sbom = "dist/sbom.json"

[artifacts]
root = "dist"
include = ["app.js", "assets"]
max_file_bytes = 52428800

[artifacts.pinned]
"app.js" = "2c26b46b68ffc68ff99b453c1d30413413422d706483bfa0f98a5e886266e7ae"

[[checks]]
name = "unit-tests"
type = "command"
command = ["npm", "test"]
timeout_ms = 600000

[[checks]]
name = "secret-scan"
type = "secret_scan"
patterns = ["INTERNAL_[A-Z0-9]{16}"]

[[checks]]
name = "bundle-size"
type = "file_size"
max_bytes = 5242880

[gate]
url = "https://gate.example.com/v1/decide"
timeout_ms = 10000
max_attempts = 4
initial_backoff_ms = 200
max_backoff_ms = 5000
verdict_public_key = "keys/gate.pub"

[[publishers]]
name = "archive"
type = "local_archive"
dir = "releases"

[[publishers]]
name = "registry"
type = "http"
url = "https://registry.example.com/deposit"
depends_on = ["archive"]

[ledger]
path = "evidence/ledger.sqlite"
journal_mode = "wal"
sync_mode = "full"
busy_timeout_ms = 5000
fallback_dir = "evidence/fallback"
"#,
    )
}
