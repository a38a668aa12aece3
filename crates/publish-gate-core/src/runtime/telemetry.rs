// crates/publish-gate-core/src/runtime/telemetry.rs
// ============================================================================
// Module: Publish Gate Telemetry
// Description: Metric hooks for pipeline stages.
// Purpose: Provide stage counters and latency events without hard deps.
// Dependencies: std
// ============================================================================

//! ## Overview
//! The orchestrator emits one [`StageMetricEvent`] per stage it completes.
//! Deployments plug in a concrete exporter by implementing
//! [`PipelineMetrics`]; the default sink discards events.
//! Labels never carry artifact content or key material.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default latency buckets in milliseconds for stage histograms.
pub const STAGE_LATENCY_BUCKETS_MS: &[u64] =
    &[1, 5, 10, 50, 100, 500, 1_000, 5_000, 30_000, 120_000, 600_000];

// ============================================================================
// SECTION: Metric Labels
// ============================================================================

/// Pipeline stage classification.
///
/// # Invariants
/// - Variants are stable for telemetry labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    /// Artifact collection.
    Collect,
    /// Manifest construction and signing.
    Manifest,
    /// Validation checks.
    Test,
    /// Admissibility gate.
    Gate,
    /// Publishing.
    Publish,
    /// Ledger append.
    Ledger,
}

impl PipelineStage {
    /// Returns a stable label for the stage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Collect => "collect",
            Self::Manifest => "manifest",
            Self::Test => "test",
            Self::Gate => "gate",
            Self::Publish => "publish",
            Self::Ledger => "ledger",
        }
    }
}

/// Stage outcome classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    /// Stage completed and the run may continue.
    Ok,
    /// Stage ended the run.
    Error,
}

impl StageOutcome {
    /// Returns a stable label for the outcome.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Error => "error",
        }
    }
}

/// Stage metric event payload.
#[derive(Debug, Clone, Copy)]
pub struct StageMetricEvent {
    /// Stage classification.
    pub stage: PipelineStage,
    /// Stage outcome.
    pub outcome: StageOutcome,
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Metrics sink for pipeline stages.
pub trait PipelineMetrics: Send + Sync {
    /// Records a stage counter event.
    fn record_stage(&self, event: StageMetricEvent);
    /// Records a stage latency observation.
    fn record_latency(&self, event: StageMetricEvent, latency: Duration);
}

/// No-op metrics sink.
pub struct NoopMetrics;

impl PipelineMetrics for NoopMetrics {
    fn record_stage(&self, _event: StageMetricEvent) {}

    fn record_latency(&self, _event: StageMetricEvent, _latency: Duration) {}
}
