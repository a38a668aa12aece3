// crates/publish-gate-cli/src/report.rs
// ============================================================================
// Module: Deploy Reports
// Description: Writes the signed manifest, deploy report, and provenance for a run.
// Purpose: Leave operator-facing artifacts next to the ledger record.
// Dependencies: publish-gate-core, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! After a run is recorded, the CLI writes `manifest_<traceId>.json` (when a
//! manifest was signed) and `deploy_<traceId>.json` into the report
//! directory. Successful runs with a manifest also get
//! `provenance_<traceId>.json`, a build provenance statement that lists the
//! manifest records as materials and, when configured, the hash of the
//! software bill of materials. Existing files are never overwritten.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use publish_gate_core::EvidenceRecord;
use publish_gate_core::HashDigest;
use publish_gate_core::ManifestRecord;
use publish_gate_core::RunOutcome;
use publish_gate_core::SignerId;
use publish_gate_core::TraceId;
use publish_gate_core::hashing::DEFAULT_HASH_ALGORITHM;
use publish_gate_core::hashing::hash_bytes;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Deploy report written for each recorded run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployReport {
    /// Evidence record as stored in the ledger.
    #[serde(flatten)]
    pub evidence: EvidenceRecord,
    /// Wall-clock duration of the run in milliseconds.
    pub duration_ms: i64,
    /// Number of artifacts in the signed manifest.
    pub artifact_count: Option<usize>,
}

/// SLSA build level claimed by provenance statements.
pub const PROVENANCE_SLSA_LEVEL: u8 = 2;

/// Software bill of materials referenced by a provenance statement.
#[derive(Debug, Clone, Serialize)]
pub struct SbomReference {
    /// SBOM file path as configured.
    pub path: String,
    /// Content hash of the SBOM file.
    pub hash: HashDigest,
}

/// Build provenance statement for a successful run.
///
/// # Invariants
/// - `manifest_digest` and `materials` come from the same signed manifest.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvenanceStatement {
    /// Claimed SLSA build level.
    pub slsa_level: u8,
    /// Run completion time (RFC 3339).
    pub generated_at: String,
    /// Trace identifier of the producing run.
    pub trace_id: TraceId,
    /// Builder identity.
    pub builder: String,
    /// Aggregate digest of the signed manifest.
    pub manifest_digest: HashDigest,
    /// Identifier of the manifest signer.
    pub signer_id: SignerId,
    /// Software bill of materials, when configured.
    pub sbom: Option<SbomReference>,
    /// Artifacts covered by the manifest.
    pub materials: Vec<ManifestRecord>,
}

/// Report writing errors.
#[derive(Debug, Error)]
pub enum ReportError {
    /// The run could not be projected into a report.
    #[error("report build failed: {0}")]
    Build(String),
    /// The SBOM file could not be read.
    #[error("sbom read failed for {path}: {message}")]
    Sbom {
        /// SBOM path.
        path: String,
        /// Underlying error text.
        message: String,
    },
    /// The report could not be written.
    #[error("report write failed for {path}: {message}")]
    Write {
        /// Target path.
        path: String,
        /// Underlying error text.
        message: String,
    },
}

/// Paths of the files written for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenReports {
    /// Signed manifest path, when a manifest was built.
    pub manifest: Option<PathBuf>,
    /// Deploy report path.
    pub deploy: PathBuf,
    /// Provenance statement path, written for successful runs only.
    pub provenance: Option<PathBuf>,
}

// ============================================================================
// SECTION: Writing
// ============================================================================

impl DeployReport {
    /// Builds a report from a recorded run.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Build`] when a timestamp cannot be rendered.
    pub fn from_outcome(outcome: &RunOutcome) -> Result<Self, ReportError> {
        let evidence = EvidenceRecord::from_run(Some(outcome.record_id), &outcome.run)
            .map_err(|err| ReportError::Build(err.to_string()))?;
        let duration_ms = outcome
            .run
            .finished_at
            .as_unix_millis()
            .saturating_sub(outcome.run.started_at.as_unix_millis());
        Ok(Self {
            evidence,
            duration_ms,
            artifact_count: outcome.manifest.as_ref().map(|manifest| manifest.records().len()),
        })
    }
}

impl ProvenanceStatement {
    /// Builds a statement for a successful run, or `None` when the run did not
    /// succeed or produced no manifest.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError`] when the timestamp cannot be rendered or the
    /// SBOM cannot be read.
    pub fn from_outcome(
        outcome: &RunOutcome,
        sbom: Option<&Path>,
    ) -> Result<Option<Self>, ReportError> {
        let Some(manifest) = outcome.manifest.as_ref().filter(|_| outcome.run.success()) else {
            return Ok(None);
        };
        let generated_at = outcome
            .run
            .finished_at
            .to_rfc3339()
            .map_err(|err| ReportError::Build(err.to_string()))?;
        let sbom = sbom.map(hash_sbom).transpose()?;
        Ok(Some(Self {
            slsa_level: PROVENANCE_SLSA_LEVEL,
            generated_at,
            trace_id: outcome.run.trace_id.clone(),
            builder: format!("publish-gate/{}", env!("CARGO_PKG_VERSION")),
            manifest_digest: manifest.aggregate_digest().clone(),
            signer_id: manifest.signer_id().clone(),
            sbom,
            materials: manifest.records().to_vec(),
        }))
    }
}

/// Hashes the SBOM file at `path`.
fn hash_sbom(path: &Path) -> Result<SbomReference, ReportError> {
    let bytes = fs::read(path).map_err(|err| ReportError::Sbom {
        path: path.display().to_string(),
        message: err.to_string(),
    })?;
    Ok(SbomReference {
        path: path.display().to_string(),
        hash: hash_bytes(DEFAULT_HASH_ALGORITHM, &bytes),
    })
}

/// Writes the manifest, deploy report, and provenance for `outcome` into `dir`.
///
/// # Errors
///
/// Returns [`ReportError`] when serialization, SBOM hashing, or file creation
/// fails.
pub fn write_reports(
    dir: &Path,
    outcome: &RunOutcome,
    sbom: Option<&Path>,
) -> Result<WrittenReports, ReportError> {
    fs::create_dir_all(dir).map_err(|err| ReportError::Write {
        path: dir.display().to_string(),
        message: err.to_string(),
    })?;
    let trace_id = outcome.run.trace_id.as_str();
    let manifest = match &outcome.manifest {
        Some(manifest) => {
            let path = dir.join(format!("manifest_{trace_id}.json"));
            write_json(&path, manifest)?;
            Some(path)
        }
        None => None,
    };
    let deploy = dir.join(format!("deploy_{trace_id}.json"));
    write_json(&deploy, &DeployReport::from_outcome(outcome)?)?;
    let provenance = match ProvenanceStatement::from_outcome(outcome, sbom)? {
        Some(statement) => {
            let path = dir.join(format!("provenance_{trace_id}.json"));
            write_json(&path, &statement)?;
            Some(path)
        }
        None => None,
    };
    Ok(WrittenReports {
        manifest,
        deploy,
        provenance,
    })
}

/// Writes pretty JSON to a new file.
fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ReportError> {
    let write_err = |message: String| ReportError::Write {
        path: path.display().to_string(),
        message,
    };
    let mut bytes =
        serde_json::to_vec_pretty(value).map_err(|err| ReportError::Build(err.to_string()))?;
    bytes.push(b'\n');
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|err| write_err(err.to_string()))?;
    file.write_all(&bytes).map_err(|err| write_err(err.to_string()))?;
    file.sync_all().map_err(|err| write_err(err.to_string()))
}
