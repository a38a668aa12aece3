// crates/publish-gate-config/tests/common/mod.rs
// =============================================================================
// Module: Config Test Helpers
// Description: Shared helpers for config validation tests.
// Purpose: Reduce duplication across integration tests for publish-gate-config.
// =============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]

use publish_gate_config::ConfigError;
use publish_gate_config::PipelineConfig;

/// Smallest config accepted by validation.
pub const MINIMAL_TOML: &str = r#"
[pipeline]
signing_key = "release.key"

[artifacts]
root = "dist"
include = ["app.js"]

[gate]
url = "https://gate.example.com/decide"

[ledger]
path = "ledger.sqlite"
fallback_dir = "fallback"
"#;

/// Parses a TOML string into a `PipelineConfig` for tests.
pub fn config_from_toml(toml_str: &str) -> Result<PipelineConfig, toml::de::Error> {
    toml::from_str(toml_str)
}

/// Returns a minimal config with all defaults applied.
pub fn minimal_config() -> Result<PipelineConfig, toml::de::Error> {
    config_from_toml(MINIMAL_TOML)
}

/// Asserts that `result` failed with a message containing `needle`.
pub fn assert_invalid<T>(result: Result<T, ConfigError>, needle: &str) -> Result<(), String> {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(_) => Err("expected invalid config".to_string()),
    }
}
