// crates/publish-gate-config/src/config.rs
// ============================================================================
// Module: Publish Gate Configuration
// Description: Configuration loading and validation for the publish pipeline.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: publish-gate-core, publish-gate-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! The file is resolved from an explicit path, the `PUBLISH_GATE_CONFIG`
//! environment variable, or `publish-gate.toml` in the working directory.
//! Relative paths inside the file resolve against the file's directory.
//! Missing or invalid configuration fails closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use publish_gate_core::HashDigest;
use publish_gate_core::StagePolicy;
use publish_gate_core::hashing::DEFAULT_HASH_ALGORITHM;
use publish_gate_store_sqlite::SqliteStoreMode;
use publish_gate_store_sqlite::SqliteSyncMode;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "publish-gate.toml";
/// Environment variable naming the config path.
pub(crate) const CONFIG_ENV_VAR: &str = "PUBLISH_GATE_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length for a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum number of validation workers.
pub(crate) const MAX_WORKERS: usize = 64;
/// Maximum number of declared checks.
pub(crate) const MAX_CHECKS: usize = 128;
/// Maximum number of declared publishers.
pub(crate) const MAX_PUBLISHERS: usize = 32;
/// Minimum per-check timeout.
pub(crate) const MIN_CHECK_TIMEOUT_MS: u64 = 100;
/// Maximum per-check timeout.
pub(crate) const MAX_CHECK_TIMEOUT_MS: u64 = 6 * 60 * 60 * 1000;
/// Minimum HTTP timeout.
pub(crate) const MIN_HTTP_TIMEOUT_MS: u64 = 100;
/// Maximum HTTP timeout.
pub(crate) const MAX_HTTP_TIMEOUT_MS: u64 = 120_000;
/// Maximum gate attempts.
pub(crate) const MAX_GATE_ATTEMPTS: u32 = 10;
/// Default per-check timeout.
const DEFAULT_CHECK_TIMEOUT_MS: u64 = 5 * 60 * 1000;

// ============================================================================
// SECTION: Root Config
// ============================================================================

/// Publish pipeline configuration.
///
/// # Invariants
/// - [`PipelineConfig::validate`] has passed before the config drives a run.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Pipeline settings.
    pub pipeline: PipelineSection,
    /// Artifact collection settings.
    pub artifacts: ArtifactsConfig,
    /// Validation checks in declared order.
    #[serde(default)]
    pub checks: Vec<CheckConfig>,
    /// Gate service settings.
    pub gate: GateConfig,
    /// Publishers in declared order.
    #[serde(default)]
    pub publishers: Vec<PublisherConfig>,
    /// Ledger settings.
    pub ledger: LedgerConfig,
    /// Directory of the loaded file (not serialized).
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

impl PipelineConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved)
            .map_err(|err| ConfigError::Io(format!("{}: {err}", resolved.display())))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let mut config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.base_dir = resolved.parent().map(Path::to_path_buf);
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pipeline.validate()?;
        self.artifacts.validate()?;
        validate_checks(&self.checks)?;
        self.gate.validate()?;
        validate_publishers(&self.publishers)?;
        self.ledger.validate()
    }

    /// Resolves a configured path against the config file directory.
    #[must_use]
    pub fn resolve(&self, path: &Path) -> PathBuf {
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

// ============================================================================
// SECTION: Pipeline
// ============================================================================

/// `[pipeline]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineSection {
    /// Path to the Ed25519 signing key.
    pub signing_key: PathBuf,
    /// Signer identifier recorded in manifests; derived from the key when unset.
    #[serde(default)]
    pub signer_id: Option<String>,
    /// Maximum concurrent validation checks.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Validation stage name.
    #[serde(default = "default_stage_name")]
    pub stage_name: String,
    /// Behavior after a failing check.
    #[serde(default)]
    pub stage_policy: StagePolicy,
    /// Directory receiving the signed manifest and deploy report.
    #[serde(default)]
    pub report_dir: Option<PathBuf>,
    /// Software bill of materials hashed into provenance statements.
    #[serde(default)]
    pub sbom: Option<PathBuf>,
}

/// Returns the default worker count.
const fn default_workers() -> usize {
    4
}

/// Returns the default stage name.
fn default_stage_name() -> String {
    "validation".to_string()
}

impl PipelineSection {
    /// Validates pipeline settings.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_path_field("pipeline.signing_key", &self.signing_key)?;
        if let Some(signer_id) = &self.signer_id
            && signer_id.trim().is_empty()
        {
            return Err(ConfigError::Invalid("pipeline.signer_id must be non-empty".to_string()));
        }
        if self.workers == 0 || self.workers > MAX_WORKERS {
            return Err(ConfigError::Invalid(format!(
                "pipeline.workers must be between 1 and {MAX_WORKERS}"
            )));
        }
        if self.stage_name.trim().is_empty() {
            return Err(ConfigError::Invalid("pipeline.stage_name must be non-empty".to_string()));
        }
        if let Some(dir) = &self.report_dir {
            validate_path_field("pipeline.report_dir", dir)?;
        }
        if let Some(sbom) = &self.sbom {
            validate_path_field("pipeline.sbom", sbom)?;
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Artifacts
// ============================================================================

/// `[artifacts]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArtifactsConfig {
    /// Artifact root directory.
    pub root: PathBuf,
    /// Files or directories to include, relative to `root`.
    pub include: Vec<String>,
    /// Reviewed `sha256` hex digests pinned per artifact path.
    #[serde(default)]
    pub pinned: BTreeMap<String, String>,
    /// Per-file size limit in bytes.
    #[serde(default)]
    pub max_file_bytes: Option<u64>,
    /// Total snapshot size limit in bytes.
    #[serde(default)]
    pub max_total_bytes: Option<u64>,
}

impl ArtifactsConfig {
    /// Validates artifact settings.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_path_field("artifacts.root", &self.root)?;
        if self.include.is_empty() {
            return Err(ConfigError::Invalid("artifacts.include must not be empty".to_string()));
        }
        for entry in &self.include {
            validate_relative("artifacts.include", entry)?;
        }
        for (path, digest) in &self.pinned {
            validate_relative("artifacts.pinned", path)?;
            HashDigest::from_hex(DEFAULT_HASH_ALGORITHM, digest).map_err(|_| {
                ConfigError::Invalid(format!("artifacts.pinned.{path} is not a sha256 hex digest"))
            })?;
        }
        if self.max_file_bytes == Some(0) || self.max_total_bytes == Some(0) {
            return Err(ConfigError::Invalid(
                "artifacts size limits must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns pinned digests parsed into hash digests.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a digest is malformed.
    pub fn pinned_digests(&self) -> Result<BTreeMap<String, HashDigest>, ConfigError> {
        self.pinned
            .iter()
            .map(|(path, digest)| {
                HashDigest::from_hex(DEFAULT_HASH_ALGORITHM, digest)
                    .map(|digest| (path.clone(), digest))
                    .map_err(|err| ConfigError::Invalid(err.to_string()))
            })
            .collect()
    }
}

// ============================================================================
// SECTION: Checks
// ============================================================================

/// One `[[checks]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckConfig {
    /// Check name, unique within the stage.
    pub name: String,
    /// Per-check timeout in milliseconds.
    #[serde(default = "default_check_timeout_ms")]
    pub timeout_ms: u64,
    /// Check kind and parameters.
    #[serde(flatten)]
    pub kind: CheckKind,
}

/// Returns the default per-check timeout.
const fn default_check_timeout_ms() -> u64 {
    DEFAULT_CHECK_TIMEOUT_MS
}

/// Built-in check kinds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CheckKind {
    /// External command run against a scratch copy of the snapshot.
    Command {
        /// Program and arguments.
        command: Vec<String>,
    },
    /// Credential pattern scan over text artifacts.
    SecretScan {
        /// Additional regex patterns.
        #[serde(default)]
        patterns: Vec<String>,
    },
    /// Per-artifact size limit.
    FileSize {
        /// Maximum artifact size in bytes.
        max_bytes: u64,
    },
}

/// Validates the declared checks.
fn validate_checks(checks: &[CheckConfig]) -> Result<(), ConfigError> {
    if checks.len() > MAX_CHECKS {
        return Err(ConfigError::Invalid(format!("too many checks (max {MAX_CHECKS})")));
    }
    let mut names = BTreeSet::new();
    for check in checks {
        if check.name.trim().is_empty() {
            return Err(ConfigError::Invalid("checks.name must be non-empty".to_string()));
        }
        if !names.insert(check.name.as_str()) {
            return Err(ConfigError::Invalid(format!("duplicate check name: {}", check.name)));
        }
        if !(MIN_CHECK_TIMEOUT_MS ..= MAX_CHECK_TIMEOUT_MS).contains(&check.timeout_ms) {
            return Err(ConfigError::Invalid(format!(
                "checks.{}.timeout_ms must be between {MIN_CHECK_TIMEOUT_MS} and \
                 {MAX_CHECK_TIMEOUT_MS}",
                check.name
            )));
        }
        match &check.kind {
            CheckKind::Command {
                command,
            } if command.first().is_none_or(|program| program.trim().is_empty()) => {
                return Err(ConfigError::Invalid(format!(
                    "checks.{}.command must name a program",
                    check.name
                )));
            }
            CheckKind::FileSize {
                max_bytes: 0,
            } => {
                return Err(ConfigError::Invalid(format!(
                    "checks.{}.max_bytes must be greater than zero",
                    check.name
                )));
            }
            _ => {}
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Gate
// ============================================================================

/// `[gate]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GateConfig {
    /// Decision endpoint URL.
    pub url: String,
    /// Allow cleartext HTTP (explicit opt-in).
    #[serde(default)]
    pub allow_http: bool,
    /// Per-request timeout in milliseconds.
    #[serde(default = "default_http_timeout_ms")]
    pub timeout_ms: u64,
    /// Maximum attempts including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry in milliseconds.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// Upper bound on any retry delay in milliseconds.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// Public key used to verify signed verdicts.
    #[serde(default)]
    pub verdict_public_key: Option<PathBuf>,
}

/// Returns the default HTTP timeout.
const fn default_http_timeout_ms() -> u64 {
    10_000
}

/// Returns the default gate attempt count.
const fn default_max_attempts() -> u32 {
    4
}

/// Returns the default initial backoff.
const fn default_initial_backoff_ms() -> u64 {
    200
}

/// Returns the default backoff cap.
const fn default_max_backoff_ms() -> u64 {
    5_000
}

impl GateConfig {
    /// Validates gate settings.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_url("gate.url", &self.url, self.allow_http)?;
        validate_http_timeout("gate.timeout_ms", self.timeout_ms)?;
        if self.max_attempts == 0 || self.max_attempts > MAX_GATE_ATTEMPTS {
            return Err(ConfigError::Invalid(format!(
                "gate.max_attempts must be between 1 and {MAX_GATE_ATTEMPTS}"
            )));
        }
        if self.initial_backoff_ms > self.max_backoff_ms {
            return Err(ConfigError::Invalid(
                "gate.initial_backoff_ms must not exceed gate.max_backoff_ms".to_string(),
            ));
        }
        if let Some(key) = &self.verdict_public_key {
            validate_path_field("gate.verdict_public_key", key)?;
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Publishers
// ============================================================================

/// One `[[publishers]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct PublisherConfig {
    /// Target name.
    pub name: String,
    /// Targets that must succeed first.
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Publisher kind and parameters.
    #[serde(flatten)]
    pub kind: PublisherKind,
}

/// Built-in publisher kinds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PublisherKind {
    /// Tar archive in a local directory.
    LocalArchive {
        /// Archive directory.
        dir: PathBuf,
    },
    /// HTTP deposit endpoint.
    Http {
        /// Deposit endpoint URL.
        url: String,
        /// Allow cleartext HTTP (explicit opt-in).
        #[serde(default)]
        allow_http: bool,
        /// Per-request timeout in milliseconds.
        #[serde(default = "default_http_timeout_ms")]
        timeout_ms: u64,
    },
}

/// Validates publishers and their dependency order.
fn validate_publishers(publishers: &[PublisherConfig]) -> Result<(), ConfigError> {
    if publishers.len() > MAX_PUBLISHERS {
        return Err(ConfigError::Invalid(format!("too many publishers (max {MAX_PUBLISHERS})")));
    }
    let mut declared = BTreeSet::new();
    for publisher in publishers {
        let name = publisher.name.as_str();
        if name.trim().is_empty() {
            return Err(ConfigError::Invalid("publishers.name must be non-empty".to_string()));
        }
        for dependency in &publisher.depends_on {
            if !declared.contains(dependency.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "publisher {name} depends on {dependency}, which is not declared before it"
                )));
            }
        }
        if !declared.insert(name) {
            return Err(ConfigError::Invalid(format!("duplicate publisher name: {name}")));
        }
        match &publisher.kind {
            PublisherKind::LocalArchive {
                dir,
            } => validate_path_field(&format!("publishers.{name}.dir"), dir)?,
            PublisherKind::Http {
                url,
                allow_http,
                timeout_ms,
            } => {
                validate_url(&format!("publishers.{name}.url"), url, *allow_http)?;
                validate_http_timeout(&format!("publishers.{name}.timeout_ms"), *timeout_ms)?;
            }
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Ledger
// ============================================================================

/// `[ledger]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LedgerConfig {
    /// `SQLite` database path.
    pub path: PathBuf,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// Directory for fallback evidence records.
    pub fallback_dir: PathBuf,
}

/// Returns the default busy timeout.
const fn default_busy_timeout_ms() -> u64 {
    5_000
}

impl LedgerConfig {
    /// Validates ledger settings.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_path_field("ledger.path", &self.path)?;
        validate_path_field("ledger.fallback_dir", &self.fallback_dir)
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    if path.to_string_lossy().len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        if component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a configured path against length constraints.
fn validate_path_field(field: &str, path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in path.components() {
        if component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Validates a path that must stay relative to the artifact root.
fn validate_relative(field: &str, value: &str) -> Result<(), ConfigError> {
    let path = Path::new(value);
    validate_path_field(field, path)?;
    let escapes = path.components().any(|component| {
        matches!(component, Component::ParentDir | Component::RootDir | Component::Prefix(_))
    });
    if escapes {
        return Err(ConfigError::Invalid(format!("{field} entry {value} must be relative")));
    }
    Ok(())
}

/// Validates an endpoint URL scheme.
fn validate_url(field: &str, url: &str, allow_http: bool) -> Result<(), ConfigError> {
    let trimmed = url.trim();
    if trimmed.starts_with("https://") {
        return Ok(());
    }
    if trimmed.starts_with("http://") {
        if allow_http {
            return Ok(());
        }
        return Err(ConfigError::Invalid(format!("{field} uses http:// without allow_http")));
    }
    Err(ConfigError::Invalid(format!("{field} must include http:// or https://")))
}

/// Validates an HTTP timeout range.
fn validate_http_timeout(field: &str, timeout_ms: u64) -> Result<(), ConfigError> {
    if !(MIN_HTTP_TIMEOUT_MS ..= MAX_HTTP_TIMEOUT_MS).contains(&timeout_ms) {
        return Err(ConfigError::Invalid(format!(
            "{field} must be between {MIN_HTTP_TIMEOUT_MS} and {MAX_HTTP_TIMEOUT_MS}"
        )));
    }
    Ok(())
}
