// crates/publish-gate-cli/src/wiring.rs
// ============================================================================
// Module: Pipeline Wiring
// Description: Builds a runnable pipeline from validated configuration.
// Purpose: Translate config sections into concrete adapters.
// Dependencies: publish-gate-config, publish-gate-core, publish-gate-providers,
//               publish-gate-store-sqlite, tracing
// ============================================================================

//! ## Overview
//! [`build_pipeline`] turns a [`PipelineConfig`] into a [`Pipeline`] backed by
//! files, HTTP, and `SQLite`. A signing key that cannot be loaded does not
//! abort wiring; the run records a signing failure instead.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use publish_gate_config::CheckConfig;
use publish_gate_config::CheckKind;
use publish_gate_config::PipelineConfig;
use publish_gate_config::PublisherKind;
use publish_gate_core::CheckName;
use publish_gate_core::CheckSpec;
use publish_gate_core::GateClient;
use publish_gate_core::ManifestBuilder;
use publish_gate_core::ManifestSigner;
use publish_gate_core::Pipeline;
use publish_gate_core::PipelineComponents;
use publish_gate_core::Publisher;
use publish_gate_core::PublisherSet;
use publish_gate_core::RetryPolicy;
use publish_gate_core::SignerId;
use publish_gate_core::StageSpec;
use publish_gate_core::TargetName;
use publish_gate_core::TestRunner;
use publish_gate_core::ValidationCheck;
use publish_gate_core::hashing::DEFAULT_HASH_ALGORITHM;
use publish_gate_providers::CommandCheck;
use publish_gate_providers::Ed25519Signer;
use publish_gate_providers::Ed25519Verifier;
use publish_gate_providers::FileArtifactSource;
use publish_gate_providers::FileFallbackSink;
use publish_gate_providers::FileSizeCheck;
use publish_gate_providers::FileSourceConfig;
use publish_gate_providers::HttpClientConfig;
use publish_gate_providers::HttpGateService;
use publish_gate_providers::HttpPublisher;
use publish_gate_providers::LocalArchivePublisher;
use publish_gate_providers::SecretScanCheck;
use publish_gate_providers::UnavailableSigner;
use publish_gate_store_sqlite::SqliteEvidenceLedger;
use publish_gate_store_sqlite::SqliteStoreConfig;
use thiserror::Error;
use tracing::warn;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Pipeline assembled from file, HTTP, and `SQLite` adapters.
pub type ConfiguredPipeline = Pipeline<FileArtifactSource, HttpGateService, SqliteEvidenceLedger>;

/// Errors raised while assembling a pipeline.
#[derive(Debug, Error)]
pub enum WiringError {
    /// A config value could not be turned into an adapter.
    #[error("invalid pipeline setup: {0}")]
    Setup(String),
    /// The evidence ledger could not be opened.
    #[error("ledger unavailable: {0}")]
    Ledger(String),
}

// ============================================================================
// SECTION: Wiring
// ============================================================================

/// Opens the configured evidence ledger.
///
/// # Errors
///
/// Returns [`WiringError::Ledger`] when the database cannot be opened.
pub fn open_ledger(config: &PipelineConfig) -> Result<SqliteEvidenceLedger, WiringError> {
    let store = SqliteStoreConfig {
        path: config.resolve(&config.ledger.path),
        busy_timeout_ms: config.ledger.busy_timeout_ms,
        journal_mode: config.ledger.journal_mode,
        sync_mode: config.ledger.sync_mode,
    };
    SqliteEvidenceLedger::open(&store).map_err(|err| WiringError::Ledger(err.to_string()))
}

/// Builds a pipeline from validated configuration.
///
/// # Errors
///
/// Returns [`WiringError`] when an adapter cannot be constructed or the
/// ledger cannot be opened.
pub fn build_pipeline(config: &PipelineConfig) -> Result<ConfiguredPipeline, WiringError> {
    let root = config.resolve(&config.artifacts.root);
    let mut source_config = FileSourceConfig::new(&root, config.artifacts.include.clone());
    source_config.pinned =
        config.artifacts.pinned_digests().map_err(|err| WiringError::Setup(err.to_string()))?;
    if let Some(limit) = config.artifacts.max_file_bytes {
        source_config.max_file_bytes = limit;
    }
    if let Some(limit) = config.artifacts.max_total_bytes {
        source_config.max_total_bytes = limit;
    }

    let workers = NonZeroUsize::new(config.pipeline.workers)
        .ok_or_else(|| WiringError::Setup("pipeline.workers must be non-zero".to_string()))?;
    let mut stage =
        StageSpec::new(config.pipeline.stage_name.clone()).policy(config.pipeline.stage_policy);
    for check in &config.checks {
        stage = stage.check(build_check(check)?);
    }

    let ledger = open_ledger(config)?;
    let publishers = build_publishers(config, &ledger)?;
    let fallback = FileFallbackSink::new(config.resolve(&config.ledger.fallback_dir));

    Ok(Pipeline::new(PipelineComponents {
        source: FileArtifactSource::new(source_config),
        builder: ManifestBuilder::new(load_signer(config), DEFAULT_HASH_ALGORITHM),
        runner: TestRunner::new(workers),
        stage,
        gate: build_gate(config)?,
        publishers,
        ledger,
    })
    .with_fallback(Arc::new(fallback)))
}

/// Loads the manifest signer, substituting an unavailable signer on failure.
fn load_signer(config: &PipelineConfig) -> Arc<dyn ManifestSigner> {
    let path = config.resolve(&config.pipeline.signing_key);
    let signer_id = config.pipeline.signer_id.clone().map(SignerId::new);
    match Ed25519Signer::from_file(&path, signer_id) {
        Ok(signer) => Arc::new(signer),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "signing key unavailable");
            Arc::new(UnavailableSigner::new(err.to_string()))
        }
    }
}

/// Builds one validation check.
fn build_check(check: &CheckConfig) -> Result<CheckSpec, WiringError> {
    let name = CheckName::new(check.name.clone());
    let timeout = Duration::from_millis(check.timeout_ms);
    let built: Arc<dyn ValidationCheck> = match &check.kind {
        CheckKind::Command {
            command,
        } => Arc::new(
            CommandCheck::new(name, command, timeout)
                .map_err(|err| WiringError::Setup(err.to_string()))?,
        ),
        CheckKind::SecretScan {
            patterns,
        } => Arc::new(
            SecretScanCheck::new(name, patterns)
                .map_err(|err| WiringError::Setup(err.to_string()))?,
        ),
        CheckKind::FileSize {
            max_bytes,
        } => Arc::new(FileSizeCheck::new(name, *max_bytes)),
    };
    Ok(CheckSpec::new(built).with_timeout(timeout))
}

/// Builds the gate client with retry policy and optional verdict verifier.
fn build_gate(config: &PipelineConfig) -> Result<GateClient<HttpGateService>, WiringError> {
    let gate = &config.gate;
    let http = HttpClientConfig {
        allow_http: gate.allow_http,
        timeout_ms: gate.timeout_ms,
        ..HttpClientConfig::default()
    };
    let service =
        HttpGateService::new(&gate.url, http).map_err(|err| WiringError::Setup(err.to_string()))?;
    let retry = RetryPolicy {
        max_attempts: gate.max_attempts,
        initial_backoff: Duration::from_millis(gate.initial_backoff_ms),
        max_backoff: Duration::from_millis(gate.max_backoff_ms),
        ..RetryPolicy::default()
    };
    let mut client = GateClient::new(service).with_retry(retry);
    if let Some(key) = &gate.verdict_public_key {
        let verifier = Ed25519Verifier::from_file(&config.resolve(key))
            .map_err(|err| WiringError::Setup(err.to_string()))?;
        client = client.with_verdict_verifier(Arc::new(verifier));
    }
    Ok(client)
}

/// Builds the publisher set backed by the ledger's publish journal.
fn build_publishers(
    config: &PipelineConfig,
    ledger: &SqliteEvidenceLedger,
) -> Result<PublisherSet, WiringError> {
    let mut builder = PublisherSet::builder().journal(Arc::new(ledger.journal()));
    for entry in &config.publishers {
        let target = TargetName::new(entry.name.clone());
        let publisher: Arc<dyn Publisher> = match &entry.kind {
            PublisherKind::LocalArchive {
                dir,
            } => Arc::new(LocalArchivePublisher::new(target, config.resolve(dir))),
            PublisherKind::Http {
                url,
                allow_http,
                timeout_ms,
            } => {
                let http = HttpClientConfig {
                    allow_http: *allow_http,
                    timeout_ms: *timeout_ms,
                    ..HttpClientConfig::default()
                };
                Arc::new(
                    HttpPublisher::new(target, url, http)
                        .map_err(|err| WiringError::Setup(err.to_string()))?,
                )
            }
        };
        let depends_on = entry.depends_on.iter().cloned().map(TargetName::new);
        builder = builder.publisher_after(publisher, depends_on);
    }
    builder.build().map_err(|err| WiringError::Setup(err.to_string()))
}
