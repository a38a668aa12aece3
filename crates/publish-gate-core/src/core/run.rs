// crates/publish-gate-core/src/core/run.rs
// ============================================================================
// Module: Publish Gate Pipeline Runs
// Description: Pipeline states, terminal outcomes, and the run record.
// Purpose: Encode the strictly forward state machine and the ledger payload.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A [`PipelineRun`] is owned by the orchestrator while in progress and
//! handed to the evidence ledger once finalized. [`PipelineState`] encodes
//! the legal forward transitions:
//! `COLLECTING → MANIFESTING → TESTING → GATING → PUBLISHING → FINALIZED`,
//! where any non-terminal state may jump straight to `FINALIZED`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::TargetName;
use crate::core::identifiers::TraceId;
use crate::core::manifest::ManifestRef;
use crate::core::publish::PublishResult;
use crate::core::report::StageReport;
use crate::core::time::Timestamp;
use crate::core::verdict::GateVerdict;

// ============================================================================
// SECTION: Terminal Outcomes
// ============================================================================

/// Terminal outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunTerminal {
    /// Every stage passed and every publisher succeeded.
    Success,
    /// Some stage failed or the gate did not permit publishing.
    Failed,
    /// Cancelled before any external side effect.
    Cancelled,
}

impl RunTerminal {
    /// Returns the stable label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

// ============================================================================
// SECTION: Pipeline State
// ============================================================================

/// Orchestrator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "terminal", rename_all = "snake_case")]
pub enum PipelineState {
    /// Snapshotting artifacts.
    Collecting,
    /// Building and signing the manifest.
    Manifesting,
    /// Running validation checks.
    Testing,
    /// Awaiting the admissibility verdict.
    Gating,
    /// Dispatching publishers.
    Publishing,
    /// Terminal state.
    Finalized(RunTerminal),
}

impl PipelineState {
    /// Returns the ordinal position of the state in the forward chain.
    const fn ordinal(self) -> u8 {
        match self {
            Self::Collecting => 0,
            Self::Manifesting => 1,
            Self::Testing => 2,
            Self::Gating => 3,
            Self::Publishing => 4,
            Self::Finalized(_) => 5,
        }
    }

    /// Returns true when `next` is a legal successor of this state.
    ///
    /// Non-terminal states advance to the immediate successor or jump to
    /// `Finalized`; `Finalized` has no successors. A run can only finalize
    /// as a success from `Publishing`.
    #[must_use]
    pub const fn can_advance_to(self, next: Self) -> bool {
        match (self, next) {
            (Self::Finalized(_), _) => false,
            (Self::Publishing, Self::Finalized(_)) => true,
            (_, Self::Finalized(RunTerminal::Success)) => false,
            (_, Self::Finalized(_)) => true,
            (current, next) => next.ordinal() == current.ordinal() + 1,
        }
    }

    /// Returns true for the terminal state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Finalized(_))
    }

    /// Returns the stable label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Collecting => "collecting",
            Self::Manifesting => "manifesting",
            Self::Testing => "testing",
            Self::Gating => "gating",
            Self::Publishing => "publishing",
            Self::Finalized(_) => "finalized",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Finalized(terminal) => write!(f, "finalized({})", terminal.as_str()),
            other => f.write_str(other.as_str()),
        }
    }
}

// ============================================================================
// SECTION: Failure Reasons
// ============================================================================

/// Reason a run did not finalize as a success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    /// An artifact was unreadable, malformed, or changed after collection.
    Integrity(String),
    /// The signing key was unavailable or signing failed.
    Signing(String),
    /// One or more validation checks failed.
    TestsFailed(Vec<String>),
    /// The gate answered `SILENCE`.
    GateSilence(String),
    /// The gate answered `REJECT`.
    GateRejected(String),
    /// No definitive gate verdict was obtained.
    GateUnavailable(String),
    /// One or more publishers did not succeed.
    PublishIncomplete(Vec<TargetName>),
    /// Cancellation was requested before any external side effect.
    Cancelled(String),
}

// ============================================================================
// SECTION: Pipeline Run
// ============================================================================

/// One full pipeline execution.
///
/// # Invariants
/// - Written exactly once to the evidence ledger and never edited afterward.
/// - `publish_results` is empty unless the gate returned `PASS`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRun {
    /// Unique trace identifier.
    pub trace_id: TraceId,
    /// Trace identifier of a prior attempt this run supersedes.
    pub supersedes: Option<TraceId>,
    /// Run start time.
    pub started_at: Timestamp,
    /// Run finish time (equal to `started_at` until finalized).
    pub finished_at: Timestamp,
    /// Manifest reference when a manifest was signed.
    pub manifest: Option<ManifestRef>,
    /// Stage report when testing completed.
    pub stage_report: Option<StageReport>,
    /// Gate verdict when the gate was consulted.
    pub gate_verdict: Option<GateVerdict>,
    /// Publish outcomes in declared target order.
    pub publish_results: Vec<PublishResult>,
    /// Terminal outcome.
    pub terminal: RunTerminal,
    /// Failure reason for non-successful runs.
    pub failure: Option<FailureReason>,
}

impl PipelineRun {
    /// Creates an in-progress run record.
    #[must_use]
    pub const fn begin(
        trace_id: TraceId,
        supersedes: Option<TraceId>,
        started_at: Timestamp,
    ) -> Self {
        Self {
            trace_id,
            supersedes,
            started_at,
            finished_at: started_at,
            manifest: None,
            stage_report: None,
            gate_verdict: None,
            publish_results: Vec::new(),
            terminal: RunTerminal::Failed,
            failure: None,
        }
    }

    /// Returns true when the run finalized as a success.
    #[must_use]
    pub fn success(&self) -> bool {
        self.terminal == RunTerminal::Success
    }
}
