// crates/publish-gate-providers/src/publishers.rs
// ============================================================================
// Module: Publishers
// Description: Local tar archive publisher and HTTP deposit publisher.
// Purpose: Deliver signed artifact sets to their destinations idempotently.
// Dependencies: publish-gate-core, tar, reqwest, serde_json, tracing
// ============================================================================

//! ## Overview
//! [`LocalArchivePublisher`] writes `<digest>.tar` and
//! `<digest>.metadata.json` into an archive directory; an archive already
//! present for the digest is reused. [`HttpPublisher`] POSTs the manifest to a
//! deposit endpoint with the dedupe key as its idempotency key.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fs;
use std::fs::File;
use std::path::Path;
use std::path::PathBuf;

use publish_gate_core::Manifest;
use publish_gate_core::PublishReceipt;
use publish_gate_core::PublishRequest;
use publish_gate_core::Publisher;
use publish_gate_core::PublisherError;
use publish_gate_core::TargetName;
use reqwest::Url;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use serde::Serialize;
use tar::Builder;
use tar::Header;
use tracing::info;

use crate::gate::IDEMPOTENCY_HEADER;
use crate::http::HttpClientConfig;
use crate::http::build_client;
use crate::http::parse_endpoint;
use crate::http::read_response_limited;

// ============================================================================
// SECTION: Wire Types
// ============================================================================

/// Name of the manifest entry inside archives.
pub const ARCHIVE_MANIFEST_ENTRY: &str = "manifest.json";

/// Metadata written next to each archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveMetadata {
    /// Trace identifier of the publishing run.
    pub trace_id: String,
    /// Manifest aggregate digest.
    pub aggregate_digest: String,
    /// Signer identifier.
    pub signer_id: String,
    /// Dedupe key for this target.
    pub dedupe_key: String,
    /// Number of artifacts in the archive.
    pub artifact_count: usize,
    /// External identifiers from upstream targets.
    pub upstream: BTreeMap<String, String>,
}

/// Body POSTed to deposit endpoints.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DepositBody<'a> {
    /// Signed manifest.
    manifest: &'a Manifest,
    /// Dedupe key.
    dedupe_key: &'a str,
    /// External identifiers from upstream targets.
    upstream: BTreeMap<String, String>,
}

/// Deposit endpoint response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DepositReceipt {
    /// Identifier assigned by the endpoint.
    #[serde(default)]
    external_id: Option<String>,
}

/// Converts upstream ids to plain string keys.
fn upstream_map(request: &PublishRequest<'_>) -> BTreeMap<String, String> {
    request.upstream.iter().map(|(target, id)| (target.to_string(), id.clone())).collect()
}

// ============================================================================
// SECTION: Local Archive
// ============================================================================

/// Publishes artifact sets as tar archives in a local directory.
#[derive(Debug, Clone)]
pub struct LocalArchivePublisher {
    /// Target name.
    target: TargetName,
    /// Archive directory.
    dir: PathBuf,
}

impl LocalArchivePublisher {
    /// Creates an archive publisher.
    #[must_use]
    pub fn new(target: TargetName, dir: impl Into<PathBuf>) -> Self {
        Self {
            target,
            dir: dir.into(),
        }
    }

    /// Returns the archive path for a digest value.
    #[must_use]
    pub fn archive_path(&self, digest_hex: &str) -> PathBuf {
        self.dir.join(format!("{digest_hex}.tar"))
    }

    /// Returns the metadata path for a digest value.
    #[must_use]
    pub fn metadata_path(&self, digest_hex: &str) -> PathBuf {
        self.dir.join(format!("{digest_hex}.metadata.json"))
    }

    /// Writes the archive through a partial file and renames it into place.
    fn write_archive(
        &self,
        request: &PublishRequest<'_>,
        path: &Path,
    ) -> Result<(), PublisherError> {
        let partial = path.with_extension("tar.partial");
        let file = File::create(&partial).map_err(|err| io_error(&partial, &err))?;
        let mut builder = Builder::new(file);
        let manifest_bytes = serde_json::to_vec_pretty(request.manifest)
            .map_err(|err| PublisherError::Failed(err.to_string()))?;
        append_entry(&mut builder, ARCHIVE_MANIFEST_ENTRY, &manifest_bytes)?;
        for artifact in request.artifacts.artifacts() {
            append_entry(&mut builder, artifact.path(), artifact.bytes())?;
        }
        let file = builder.into_inner().map_err(|err| io_error(&partial, &err))?;
        file.sync_all().map_err(|err| io_error(&partial, &err))?;
        fs::rename(&partial, path).map_err(|err| io_error(path, &err))
    }
}

impl Publisher for LocalArchivePublisher {
    fn target(&self) -> &TargetName {
        &self.target
    }

    fn publish(&self, request: &PublishRequest<'_>) -> Result<PublishReceipt, PublisherError> {
        let digest = &request.manifest.aggregate_digest().value;
        let archive = self.archive_path(digest);
        let metadata = self.metadata_path(digest);
        fs::create_dir_all(&self.dir).map_err(|err| io_error(&self.dir, &err))?;

        if archive.is_file() && metadata.is_file() {
            info!(target = %self.target, path = %archive.display(), "archive already present");
            return Ok(PublishReceipt {
                external_id: Some(archive.display().to_string()),
            });
        }
        if !archive.is_file() {
            self.write_archive(request, &archive)?;
        }
        let record = ArchiveMetadata {
            trace_id: request.manifest.trace_id().to_string(),
            aggregate_digest: request.manifest.aggregate_digest().to_string(),
            signer_id: request.manifest.signer_id().to_string(),
            dedupe_key: request.dedupe_key.to_string(),
            artifact_count: request.manifest.records().len(),
            upstream: upstream_map(request),
        };
        let bytes = serde_json::to_vec_pretty(&record)
            .map_err(|err| PublisherError::Failed(err.to_string()))?;
        fs::write(&metadata, bytes).map_err(|err| io_error(&metadata, &err))?;
        Ok(PublishReceipt {
            external_id: Some(archive.display().to_string()),
        })
    }
}

/// Appends one regular-file entry with fixed metadata.
fn append_entry(
    builder: &mut Builder<File>,
    path: &str,
    bytes: &[u8],
) -> Result<(), PublisherError> {
    let mut header = Header::new_gnu();
    let size = u64::try_from(bytes.len()).map_err(|err| PublisherError::Failed(err.to_string()))?;
    header.set_size(size);
    header.set_mode(0o644);
    header.set_mtime(0);
    header.set_cksum();
    builder
        .append_data(&mut header, path, bytes)
        .map_err(|err| PublisherError::Failed(format!("failed to append {path}: {err}")))
}

/// Maps an I/O error to a publisher failure.
fn io_error(path: &Path, err: &std::io::Error) -> PublisherError {
    PublisherError::Failed(format!("{}: {err}", path.display()))
}

// ============================================================================
// SECTION: HTTP Deposit
// ============================================================================

/// Publishes manifests to an HTTP deposit endpoint.
pub struct HttpPublisher {
    /// Target name.
    target: TargetName,
    /// Deposit endpoint.
    endpoint: Url,
    /// Client settings.
    config: HttpClientConfig,
    /// Blocking client.
    client: Client,
}

impl HttpPublisher {
    /// Creates an HTTP publisher.
    ///
    /// # Errors
    ///
    /// Returns [`PublisherError::Config`] when the endpoint or client is invalid.
    pub fn new(
        target: TargetName,
        endpoint: &str,
        config: HttpClientConfig,
    ) -> Result<Self, PublisherError> {
        let endpoint = parse_endpoint(endpoint, &config).map_err(PublisherError::Config)?;
        let client = build_client(&config).map_err(PublisherError::Config)?;
        Ok(Self {
            target,
            endpoint,
            config,
            client,
        })
    }
}

impl Publisher for HttpPublisher {
    fn target(&self) -> &TargetName {
        &self.target
    }

    fn publish(&self, request: &PublishRequest<'_>) -> Result<PublishReceipt, PublisherError> {
        let body = DepositBody {
            manifest: request.manifest,
            dedupe_key: request.dedupe_key.as_str(),
            upstream: upstream_map(request),
        };
        let bytes =
            serde_json::to_vec(&body).map_err(|err| PublisherError::Failed(err.to_string()))?;
        let mut response = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(IDEMPOTENCY_HEADER, request.dedupe_key.as_str())
            .body(bytes)
            .send()
            .map_err(|err| PublisherError::Failed(format!("deposit request failed: {err}")))?;
        let status = response.status();
        if !status.is_success() {
            let message = format!("deposit returned HTTP {}", status.as_u16());
            return Err(PublisherError::Failed(message));
        }
        let body = read_response_limited(&mut response, self.config.max_response_bytes)
            .map_err(PublisherError::Failed)?;
        if body.is_empty() {
            return Ok(PublishReceipt::default());
        }
        let receipt: DepositReceipt = serde_json::from_slice(&body)
            .map_err(|err| PublisherError::Failed(format!("malformed deposit response: {err}")))?;
        Ok(PublishReceipt {
            external_id: receipt.external_id,
        })
    }
}
