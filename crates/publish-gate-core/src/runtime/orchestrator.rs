// crates/publish-gate-core/src/runtime/orchestrator.rs
// ============================================================================
// Module: Publish Gate Pipeline Orchestrator
// Description: Strict forward state machine sequencing one pipeline run.
// Purpose: Collect, sign, test, gate, publish, and record exactly one ledger entry.
// Dependencies: crate::{core, interfaces, runtime}, tracing
// ============================================================================

//! ## Overview
//! [`Pipeline::run`] drives one run through
//! `COLLECTING → MANIFESTING → TESTING → GATING → PUBLISHING → FINALIZED`.
//! The gate is consulted only after every check passed, and publishers run
//! only after a `PASS` verdict. Every terminal state appends exactly one
//! [`PipelineRun`] to the evidence ledger.
//!
//! Stage-local failures are recorded as data. Integrity and signing failures
//! are recorded too and then returned as hard errors; a ledger failure writes
//! the evidence to the fallback sink and returns the computed run to the
//! caller.
//!
//! Security posture: fail closed; nothing is published without a verified
//! manifest, passing checks, and an explicit `PASS`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::core::ArtifactSnapshot;
use crate::core::EvidenceRecord;
use crate::core::identifiers::RecordId;
use crate::core::identifiers::TraceId;
use crate::core::manifest::Manifest;
use crate::core::run::FailureReason;
use crate::core::run::PipelineRun;
use crate::core::run::PipelineState;
use crate::core::run::RunTerminal;
use crate::core::time::Clock;
use crate::core::time::SystemClock;
use crate::core::verdict::GateDecision;
use crate::interfaces::ArtifactSource;
use crate::interfaces::EvidenceLedger;
use crate::interfaces::FallbackSink;
use crate::interfaces::GateService;
use crate::interfaces::LedgerError;
use crate::runtime::cancel::CancellationToken;
use crate::runtime::gate_client::GateClient;
use crate::runtime::manifest_builder::ManifestBuilder;
use crate::runtime::manifest_builder::ManifestError;
use crate::runtime::publisher_set::PublisherSet;
use crate::runtime::telemetry::NoopMetrics;
use crate::runtime::telemetry::PipelineMetrics;
use crate::runtime::telemetry::PipelineStage;
use crate::runtime::telemetry::StageMetricEvent;
use crate::runtime::telemetry::StageOutcome;
use crate::runtime::test_runner::StageSpec;
use crate::runtime::test_runner::TestRunner;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Hard errors returned to the pipeline caller.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The trace id already has a ledger record.
    #[error("trace id already recorded: {0}")]
    DuplicateTrace(TraceId),
    /// The superseded trace id has no ledger record.
    #[error("superseded trace id not found: {0}")]
    UnknownSupersedes(TraceId),
    /// An artifact was unreadable or changed; the failed run was recorded.
    #[error("integrity error (record {record_id}): {message}")]
    Integrity {
        /// Ledger record of the failed run.
        record_id: RecordId,
        /// Failure detail.
        message: String,
    },
    /// The signing key was unavailable; the failed run was recorded.
    #[error("signing error (record {record_id}): {message}")]
    Signing {
        /// Ledger record of the failed run.
        record_id: RecordId,
        /// Failure detail.
        message: String,
    },
    /// The ledger could not persist the run.
    #[error("ledger write failed for {}: {message}", .run.trace_id)]
    LedgerWrite {
        /// Underlying ledger error text.
        message: String,
        /// The computed run that could not be persisted.
        run: Box<PipelineRun>,
        /// Location of the fallback record, when one was written.
        fallback: Option<String>,
    },
    /// The ledger could not be read during pre-flight.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    /// An internal state transition was illegal.
    #[error("illegal state transition from {from} to {to}")]
    InvalidTransition {
        /// Current state.
        from: PipelineState,
        /// Requested state.
        to: PipelineState,
    },
}

// ============================================================================
// SECTION: Requests and Outcomes
// ============================================================================

/// Parameters for one run.
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    /// Explicit trace id; generated when absent.
    pub trace_id: Option<TraceId>,
    /// Trace id of a prior attempt this run supersedes.
    pub supersedes: Option<TraceId>,
}

/// Result of a finalized and recorded run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Ledger record identifier.
    pub record_id: RecordId,
    /// Finalized run.
    pub run: PipelineRun,
    /// Signed manifest, when one was built.
    pub manifest: Option<Manifest>,
}

// ============================================================================
// SECTION: Components
// ============================================================================

/// Collaborators required to build a [`Pipeline`].
pub struct PipelineComponents<S, G, L> {
    /// Artifact source.
    pub source: S,
    /// Manifest builder.
    pub builder: ManifestBuilder,
    /// Test runner.
    pub runner: TestRunner,
    /// Validation stage.
    pub stage: StageSpec,
    /// Gate client.
    pub gate: GateClient<G>,
    /// Publishers.
    pub publishers: PublisherSet,
    /// Evidence ledger.
    pub ledger: L,
}

// ============================================================================
// SECTION: Pipeline
// ============================================================================

/// Publish pipeline orchestrator.
pub struct Pipeline<S, G, L> {
    /// Artifact source.
    source: S,
    /// Manifest builder.
    builder: ManifestBuilder,
    /// Test runner.
    runner: TestRunner,
    /// Validation stage.
    stage: StageSpec,
    /// Gate client.
    gate: GateClient<G>,
    /// Publishers.
    publishers: PublisherSet,
    /// Evidence ledger.
    ledger: L,
    /// Fallback evidence sink.
    fallback: Option<Arc<dyn FallbackSink>>,
    /// Time source.
    clock: Arc<dyn Clock>,
    /// Metrics sink.
    metrics: Arc<dyn PipelineMetrics>,
}

impl<S, G, L> Pipeline<S, G, L>
where
    S: ArtifactSource,
    G: GateService,
    L: EvidenceLedger,
{
    /// Creates a pipeline from its components.
    #[must_use]
    pub fn new(components: PipelineComponents<S, G, L>) -> Self {
        Self {
            source: components.source,
            builder: components.builder,
            runner: components.runner,
            stage: components.stage,
            gate: components.gate,
            publishers: components.publishers,
            ledger: components.ledger,
            fallback: None,
            clock: Arc::new(SystemClock),
            metrics: Arc::new(NoopMetrics),
        }
    }

    /// Sets the fallback sink used when the ledger cannot be written.
    #[must_use]
    pub fn with_fallback(mut self, fallback: Arc<dyn FallbackSink>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Overrides the time source.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Overrides the metrics sink.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<dyn PipelineMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Returns the evidence ledger.
    #[must_use]
    pub const fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Returns the gate client.
    #[must_use]
    pub const fn gate(&self) -> &GateClient<G> {
        &self.gate
    }

    /// Executes one run to a terminal state and records it.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] for pre-flight failures, integrity or
    /// signing failures (after recording them), and ledger write failures.
    pub fn run(
        &self,
        request: RunRequest,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, PipelineError> {
        let trace_id = request.trace_id.unwrap_or_else(TraceId::generate);
        if self.ledger.get(&trace_id)?.is_some() {
            return Err(PipelineError::DuplicateTrace(trace_id));
        }
        if let Some(prior) = &request.supersedes
            && self.ledger.get(prior)?.is_none()
        {
            return Err(PipelineError::UnknownSupersedes(prior.clone()));
        }

        let mut ctx = RunContext {
            state: PipelineState::Collecting,
            run: PipelineRun::begin(trace_id, request.supersedes, self.clock.now()),
            manifest: None,
        };
        info!(trace_id = %ctx.run.trace_id, "pipeline run started");

        if cancel.is_cancelled() {
            return self.cancelled(ctx, "cancelled before collection");
        }
        let started = Instant::now();
        let snapshot = match self
            .source
            .collect()
            .map_err(|err| err.to_string())
            .and_then(|artifacts| ArtifactSnapshot::new(artifacts).map_err(|err| err.to_string()))
        {
            Ok(snapshot) => snapshot,
            Err(message) => {
                self.observe(PipelineStage::Collect, StageOutcome::Error, started);
                return self.abort(ctx, FailureReason::Integrity(message));
            }
        };
        self.observe(PipelineStage::Collect, StageOutcome::Ok, started);

        ctx.advance(PipelineState::Manifesting)?;
        if cancel.is_cancelled() {
            return self.cancelled(ctx, "cancelled before manifest signing");
        }
        let started = Instant::now();
        let manifest =
            match self.builder.build_snapshot(&ctx.run.trace_id, self.clock.now(), &snapshot) {
                Ok(manifest) => manifest,
                Err(err) => {
                    self.observe(PipelineStage::Manifest, StageOutcome::Error, started);
                    let reason = match err {
                        ManifestError::Signing(message) => FailureReason::Signing(message),
                        ManifestError::Integrity(message) => FailureReason::Integrity(message),
                        ManifestError::Hash(hash) => FailureReason::Integrity(hash.to_string()),
                    };
                    return self.abort(ctx, reason);
                }
            };
        self.observe(PipelineStage::Manifest, StageOutcome::Ok, started);
        ctx.run.manifest = Some(manifest.reference());
        ctx.manifest = Some(manifest.clone());

        ctx.advance(PipelineState::Testing)?;
        if cancel.is_cancelled() {
            return self.cancelled(ctx, "cancelled before testing");
        }
        let started = Instant::now();
        let report = self.runner.run(&self.stage, &snapshot, cancel);
        ctx.run.stage_report = Some(report.clone());
        if !report.passed() {
            self.observe(PipelineStage::Test, StageOutcome::Error, started);
            let failed_checks =
                report.failed_checks().iter().map(|name| name.to_string()).collect();
            return self.finalize(
                ctx,
                RunTerminal::Failed,
                Some(FailureReason::TestsFailed(failed_checks)),
            );
        }
        self.observe(PipelineStage::Test, StageOutcome::Ok, started);
        if cancel.is_cancelled() {
            return self.cancelled(ctx, "cancelled before gating");
        }

        ctx.advance(PipelineState::Gating)?;
        let started = Instant::now();
        let verdict = self.gate.submit(&manifest, &report);
        let decision = verdict.decision;
        let reason = verdict.reason.clone();
        ctx.run.gate_verdict = Some(verdict);
        let gate_failure = match decision {
            GateDecision::Pass => None,
            GateDecision::Silence => Some(FailureReason::GateSilence(reason)),
            GateDecision::Reject => Some(FailureReason::GateRejected(reason)),
            GateDecision::GateUnavailable => Some(FailureReason::GateUnavailable(reason)),
        };
        if let Some(failure) = gate_failure {
            self.observe(PipelineStage::Gate, StageOutcome::Error, started);
            return self.finalize(ctx, RunTerminal::Failed, Some(failure));
        }
        self.observe(PipelineStage::Gate, StageOutcome::Ok, started);
        if cancel.is_cancelled() {
            return self.cancelled(ctx, "cancelled before publishing");
        }

        ctx.advance(PipelineState::Publishing)?;
        let started = Instant::now();
        let results = self.publishers.publish_all(&manifest, &snapshot, cancel);
        let incomplete: Vec<_> = results
            .iter()
            .filter(|result| !result.succeeded())
            .map(|result| result.target.clone())
            .collect();
        ctx.run.publish_results = results;
        if incomplete.is_empty() {
            self.observe(PipelineStage::Publish, StageOutcome::Ok, started);
            self.finalize(ctx, RunTerminal::Success, None)
        } else {
            self.observe(PipelineStage::Publish, StageOutcome::Error, started);
            self.finalize(
                ctx,
                RunTerminal::Failed,
                Some(FailureReason::PublishIncomplete(incomplete)),
            )
        }
    }

    /// Finalizes a run cancelled before any external side effect.
    fn cancelled(&self, ctx: RunContext, detail: &str) -> Result<RunOutcome, PipelineError> {
        warn!(trace_id = %ctx.run.trace_id, state = %ctx.state, "{detail}");
        self.finalize(
            ctx,
            RunTerminal::Cancelled,
            Some(FailureReason::Cancelled(detail.to_string())),
        )
    }

    /// Records an integrity or signing failure and converts it to a hard error.
    fn abort(&self, ctx: RunContext, reason: FailureReason) -> Result<RunOutcome, PipelineError> {
        let outcome = self.finalize(ctx, RunTerminal::Failed, Some(reason.clone()))?;
        let record_id = outcome.record_id;
        match reason {
            FailureReason::Signing(message) => Err(PipelineError::Signing {
                record_id,
                message,
            }),
            FailureReason::Integrity(message) => Err(PipelineError::Integrity {
                record_id,
                message,
            }),
            _ => Ok(outcome),
        }
    }

    /// Moves the run to its terminal state and appends it to the ledger.
    fn finalize(
        &self,
        mut ctx: RunContext,
        terminal: RunTerminal,
        failure: Option<FailureReason>,
    ) -> Result<RunOutcome, PipelineError> {
        ctx.advance(PipelineState::Finalized(terminal))?;
        ctx.run.terminal = terminal;
        ctx.run.failure = failure;
        ctx.run.finished_at = self.clock.now().max(ctx.run.started_at);

        let started = Instant::now();
        match self.ledger.append(&ctx.run) {
            Ok(record_id) => {
                self.observe(PipelineStage::Ledger, StageOutcome::Ok, started);
                info!(
                    trace_id = %ctx.run.trace_id,
                    record_id = record_id.get(),
                    terminal = terminal.as_str(),
                    "pipeline run recorded"
                );
                Ok(RunOutcome {
                    record_id,
                    run: ctx.run,
                    manifest: ctx.manifest,
                })
            }
            Err(err) => {
                self.observe(PipelineStage::Ledger, StageOutcome::Error, started);
                error!(trace_id = %ctx.run.trace_id, error = %err, "ledger write failed");
                let fallback = self.write_fallback(&ctx.run);
                Err(PipelineError::LedgerWrite {
                    message: err.to_string(),
                    run: Box::new(ctx.run),
                    fallback,
                })
            }
        }
    }

    /// Writes evidence to the fallback sink, returning its location.
    fn write_fallback(&self, run: &PipelineRun) -> Option<String> {
        let sink = self.fallback.as_ref()?;
        let record = match EvidenceRecord::from_run(None, run) {
            Ok(record) => record,
            Err(err) => {
                error!(trace_id = %run.trace_id, error = %err, "fallback evidence render failed");
                return None;
            }
        };
        match sink.write(&record) {
            Ok(location) => {
                warn!(trace_id = %run.trace_id, location = %location, "fallback evidence written");
                Some(location)
            }
            Err(err) => {
                error!(trace_id = %run.trace_id, error = %err, "fallback evidence write failed");
                None
            }
        }
    }

    /// Emits stage metrics.
    fn observe(&self, stage: PipelineStage, outcome: StageOutcome, started: Instant) {
        let event = StageMetricEvent {
            stage,
            outcome,
        };
        self.metrics.record_stage(event);
        self.metrics.record_latency(event, started.elapsed());
    }
}

// ============================================================================
// SECTION: Run Context
// ============================================================================

/// In-progress run exclusively owned by the orchestrator.
struct RunContext {
    /// Current state.
    state: PipelineState,
    /// Run record under construction.
    run: PipelineRun,
    /// Signed manifest, once built.
    manifest: Option<Manifest>,
}

impl RunContext {
    /// Advances to `next`, rejecting backward or skipping transitions.
    fn advance(&mut self, next: PipelineState) -> Result<(), PipelineError> {
        if !self.state.can_advance_to(next) {
            return Err(PipelineError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        info!(
            trace_id = %self.run.trace_id,
            from = %self.state,
            to = %next,
            "pipeline state advanced"
        );
        self.state = next;
        Ok(())
    }
}
