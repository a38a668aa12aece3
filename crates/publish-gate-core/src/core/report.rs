// crates/publish-gate-core/src/core/report.rs
// ============================================================================
// Module: Publish Gate Stage Reports
// Description: Validation check outcomes and aggregated stage reports.
// Purpose: Capture check results as data, never as raised faults.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Each validation check yields a [`TestResult`]; the test runner assembles
//! them, in declared order, into a [`StageReport`] whose overall status is
//! `FAIL` whenever any check failed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::CheckName;

// ============================================================================
// SECTION: Status
// ============================================================================

/// Outcome status of one check or one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckStatus {
    /// Check passed.
    Pass,
    /// Check failed or timed out.
    Fail,
    /// Check did not run or was not applicable.
    Skip,
}

impl CheckStatus {
    /// Returns the stable wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
            Self::Skip => "SKIP",
        }
    }
}

/// Raw verdict returned by a validation check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// Check passed with an informational message.
    Pass(String),
    /// Check failed with a diagnostic message.
    Fail(String),
    /// Check was not applicable to this artifact set.
    Skip(String),
}

impl CheckOutcome {
    /// Splits the outcome into status and message.
    #[must_use]
    pub fn into_parts(self) -> (CheckStatus, String) {
        match self {
            Self::Pass(message) => (CheckStatus::Pass, message),
            Self::Fail(message) => (CheckStatus::Fail, message),
            Self::Skip(message) => (CheckStatus::Skip, message),
        }
    }
}

// ============================================================================
// SECTION: Results
// ============================================================================

/// Outcome of one validation check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    /// Check name.
    pub name: CheckName,
    /// Check status.
    pub status: CheckStatus,
    /// Diagnostic or informational message.
    pub message: String,
    /// Wall duration of the check in milliseconds.
    pub duration_ms: u64,
}

impl TestResult {
    /// Builds a skipped result for a check that never ran.
    #[must_use]
    pub fn skipped(name: CheckName, message: impl Into<String>) -> Self {
        Self {
            name,
            status: CheckStatus::Skip,
            message: message.into(),
            duration_ms: 0,
        }
    }
}

/// Policy controlling what happens after a failing check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StagePolicy {
    /// Run every check and report all outcomes.
    #[default]
    CollectAll,
    /// Stop launching checks after the first failure.
    FailFast,
}

/// Aggregated outcomes of one validation stage.
///
/// # Invariants
/// - `results` follow the declared check order.
/// - `overall` is `FAIL` if and only if some result is `FAIL`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageReport {
    /// Stage name.
    pub stage: String,
    /// Ordered check results.
    pub results: Vec<TestResult>,
    /// Overall stage status.
    pub overall: CheckStatus,
}

impl StageReport {
    /// Builds a report and derives its overall status.
    #[must_use]
    pub fn from_results(stage: impl Into<String>, results: Vec<TestResult>) -> Self {
        let overall = if results.iter().any(|result| result.status == CheckStatus::Fail) {
            CheckStatus::Fail
        } else {
            CheckStatus::Pass
        };
        Self {
            stage: stage.into(),
            results,
            overall,
        }
    }

    /// Returns true when the stage passed.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.overall == CheckStatus::Pass
    }

    /// Returns the names of failed checks in declared order.
    #[must_use]
    pub fn failed_checks(&self) -> Vec<&CheckName> {
        self.results
            .iter()
            .filter(|result| result.status == CheckStatus::Fail)
            .map(|result| &result.name)
            .collect()
    }
}
