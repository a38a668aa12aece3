// crates/publish-gate-core/src/core/verdict.rs
// ============================================================================
// Module: Publish Gate Verdicts
// Description: Admissibility gate request, response, and verdict types.
// Purpose: Model the external decision contract with fail-closed semantics.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! The gate service answers `PASS`, `SILENCE`, or `REJECT`. The client adds a
//! fourth, locally produced decision, `GATE_UNAVAILABLE`, when no definitive
//! answer could be obtained. Only `PASS` permits publishing.
//!
//! The service response type cannot express `GATE_UNAVAILABLE`, so a remote
//! service can never claim the client's own fail-closed outcome.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::hashing::HashDigest;
use crate::core::identifiers::TraceId;
use crate::core::report::StageReport;

// ============================================================================
// SECTION: Decisions
// ============================================================================

/// Decision recorded for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateDecision {
    /// Publishing is permitted.
    Pass,
    /// Indeterminate; no publish, not a rejection.
    Silence,
    /// Publishing is prohibited.
    Reject,
    /// No definitive verdict could be obtained.
    GateUnavailable,
}

impl GateDecision {
    /// Returns the stable wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Silence => "SILENCE",
            Self::Reject => "REJECT",
            Self::GateUnavailable => "GATE_UNAVAILABLE",
        }
    }

    /// Returns true only for [`GateDecision::Pass`].
    #[must_use]
    pub const fn permits_publish(self) -> bool {
        matches!(self, Self::Pass)
    }
}

/// Decision values a gate service may return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceDecision {
    /// Publishing is permitted.
    Pass,
    /// Indeterminate.
    Silence,
    /// Publishing is prohibited.
    Reject,
}

impl From<ServiceDecision> for GateDecision {
    fn from(value: ServiceDecision) -> Self {
        match value {
            ServiceDecision::Pass => Self::Pass,
            ServiceDecision::Silence => Self::Silence,
            ServiceDecision::Reject => Self::Reject,
        }
    }
}

// ============================================================================
// SECTION: Wire Types
// ============================================================================

/// Request body submitted to the gate service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateRequest {
    /// Trace identifier; doubles as the idempotency key.
    pub trace_id: TraceId,
    /// Manifest aggregate digest.
    pub manifest_digest: HashDigest,
    /// Encoded manifest signature.
    pub signature: String,
    /// Aggregated stage report.
    pub stage_report: StageReport,
}

/// Response body returned by the gate service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateResponse {
    /// Service decision.
    pub verdict: ServiceDecision,
    /// Human-readable reason.
    #[serde(default)]
    pub reason: String,
    /// Encoded verdict signature, when the service signs verdicts.
    #[serde(default)]
    pub verdict_signature: Option<String>,
}

/// Payload whose canonical JSON a gate service signs.
///
/// # Invariants
/// - Binds the decision to the specific run and manifest digest.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerdictPayload<'a> {
    /// Trace identifier.
    pub trace_id: &'a TraceId,
    /// Manifest aggregate digest.
    pub manifest_digest: &'a HashDigest,
    /// Service decision.
    pub verdict: ServiceDecision,
    /// Reason text.
    pub reason: &'a str,
}

// ============================================================================
// SECTION: Verdict
// ============================================================================

/// Admissibility decision recorded for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateVerdict {
    /// Recorded decision.
    pub decision: GateDecision,
    /// Reason text.
    pub reason: String,
    /// Encoded verdict signature, when present.
    pub verdict_signature: Option<String>,
}

impl GateVerdict {
    /// Builds a verdict from a service response.
    #[must_use]
    pub fn from_response(response: GateResponse) -> Self {
        Self {
            decision: response.verdict.into(),
            reason: response.reason,
            verdict_signature: response.verdict_signature,
        }
    }

    /// Builds the fail-closed unavailable verdict.
    #[must_use]
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            decision: GateDecision::GateUnavailable,
            reason: reason.into(),
            verdict_signature: None,
        }
    }
}
