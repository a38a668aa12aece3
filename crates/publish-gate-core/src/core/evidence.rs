// crates/publish-gate-core/src/core/evidence.rs
// ============================================================================
// Module: Publish Gate Evidence Records
// Description: Externally parseable audit record for one pipeline run.
// Purpose: Project a finalized run into the stable evidence wire format.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! [`EvidenceRecord`] is the audit artifact consumed outside the pipeline.
//! Its field names and shapes are stable: `traceId`, RFC 3339 `startTime` and
//! `endTime`, one `stages` entry per phase reached, `gateVerdict`,
//! `publishResults`, and `success`. Only the testing stage carries checks.
//!
//! Security posture: evidence never contains key material or artifact bytes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::hashing::HashDigest;
use crate::core::identifiers::RecordId;
use crate::core::identifiers::TraceId;
use crate::core::publish::PublishStatus;
use crate::core::report::CheckStatus;
use crate::core::run::FailureReason;
use crate::core::run::PipelineRun;
use crate::core::run::RunTerminal;
use crate::core::time::TimeError;
use crate::core::verdict::GateDecision;

// ============================================================================
// SECTION: Stage Names
// ============================================================================

/// Stage entry name for manifest construction.
pub const MANIFEST_STAGE: &str = "manifest";
/// Stage entry name for the admissibility gate.
pub const GATE_STAGE: &str = "gate";
/// Stage entry name for publishing.
pub const PUBLISH_STAGE: &str = "publish";

// ============================================================================
// SECTION: Wire Types
// ============================================================================

/// One check entry in an evidence stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceCheck {
    /// Check name.
    pub name: String,
    /// Check status.
    pub status: CheckStatus,
    /// Check message.
    pub message: String,
    /// Check duration in milliseconds.
    pub duration_ms: u64,
}

/// One phase entry in an evidence record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceStage {
    /// Phase name.
    pub name: String,
    /// Phase status.
    pub status: CheckStatus,
    /// Checks executed within the phase.
    pub checks: Vec<EvidenceCheck>,
}

/// Gate verdict summary in an evidence record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceVerdict {
    /// Recorded decision.
    pub decision: GateDecision,
    /// Reason text.
    pub reason: String,
}

/// Publish outcome entry in an evidence record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidencePublish {
    /// Target name.
    pub target: String,
    /// Outcome status.
    pub status: PublishStatus,
    /// External identifier.
    pub external_id: Option<String>,
    /// Error text.
    pub error: Option<String>,
}

/// Audit record for one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceRecord {
    /// Ledger record identifier; absent for fallback records.
    pub record_id: Option<RecordId>,
    /// Trace identifier.
    pub trace_id: TraceId,
    /// Trace identifier of the superseded attempt.
    pub supersedes: Option<TraceId>,
    /// RFC 3339 start time.
    pub start_time: String,
    /// RFC 3339 end time.
    pub end_time: String,
    /// Manifest aggregate digest when one was signed.
    pub manifest_digest: Option<HashDigest>,
    /// Phase entries in execution order.
    pub stages: Vec<EvidenceStage>,
    /// Gate verdict when consulted.
    pub gate_verdict: Option<EvidenceVerdict>,
    /// Publish outcomes.
    pub publish_results: Vec<EvidencePublish>,
    /// Terminal outcome.
    pub terminal: RunTerminal,
    /// Failure reason.
    pub failure_reason: Option<FailureReason>,
    /// Overall success flag.
    pub success: bool,
}

impl EvidenceRecord {
    /// Projects a finalized run into the evidence format.
    ///
    /// # Errors
    ///
    /// Returns [`TimeError`] when a run timestamp cannot be rendered.
    pub fn from_run(record_id: Option<RecordId>, run: &PipelineRun) -> Result<Self, TimeError> {
        Ok(Self {
            record_id,
            trace_id: run.trace_id.clone(),
            supersedes: run.supersedes.clone(),
            start_time: run.started_at.to_rfc3339()?,
            end_time: run.finished_at.to_rfc3339()?,
            manifest_digest: run
                .manifest
                .as_ref()
                .map(|manifest| manifest.aggregate_digest.clone()),
            stages: stage_entries(run),
            gate_verdict: run.gate_verdict.as_ref().map(|verdict| EvidenceVerdict {
                decision: verdict.decision,
                reason: verdict.reason.clone(),
            }),
            publish_results: run
                .publish_results
                .iter()
                .map(|result| EvidencePublish {
                    target: result.target.to_string(),
                    status: result.status,
                    external_id: result.external_id.clone(),
                    error: result.error.clone(),
                })
                .collect(),
            terminal: run.terminal,
            failure_reason: run.failure.clone(),
            success: run.success(),
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds phase entries for every phase the run reached.
fn stage_entries(run: &PipelineRun) -> Vec<EvidenceStage> {
    let mut stages = Vec::new();
    let manifest_failed =
        matches!(run.failure, Some(FailureReason::Integrity(_) | FailureReason::Signing(_)));
    if run.manifest.is_some() || manifest_failed {
        stages.push(EvidenceStage {
            name: MANIFEST_STAGE.to_string(),
            status: if run.manifest.is_some() { CheckStatus::Pass } else { CheckStatus::Fail },
            checks: Vec::new(),
        });
    }
    if let Some(report) = &run.stage_report {
        stages.push(EvidenceStage {
            name: report.stage.clone(),
            status: report.overall,
            checks: report
                .results
                .iter()
                .map(|result| EvidenceCheck {
                    name: result.name.to_string(),
                    status: result.status,
                    message: result.message.clone(),
                    duration_ms: result.duration_ms,
                })
                .collect(),
        });
    }
    if let Some(verdict) = &run.gate_verdict {
        stages.push(EvidenceStage {
            name: GATE_STAGE.to_string(),
            status: if verdict.decision.permits_publish() {
                CheckStatus::Pass
            } else {
                CheckStatus::Fail
            },
            checks: Vec::new(),
        });
    }
    if !run.publish_results.is_empty() {
        let all_succeeded = run.publish_results.iter().all(|result| result.succeeded());
        stages.push(EvidenceStage {
            name: PUBLISH_STAGE.to_string(),
            status: if all_succeeded { CheckStatus::Pass } else { CheckStatus::Fail },
            checks: Vec::new(),
        });
    }
    stages
}
