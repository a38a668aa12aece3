// crates/publish-gate-core/src/runtime/mod.rs
// ============================================================================
// Module: Publish Gate Runtime
// Description: Manifest building, test running, gating, publishing, and orchestration.
// Purpose: Execute pipeline runs against the capability interfaces.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! Runtime modules implement each pipeline component and the orchestrator
//! that sequences them. Adapters plug in through [`crate::interfaces`].

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod cancel;
pub mod gate_client;
pub mod manifest_builder;
pub mod orchestrator;
pub mod publisher_set;
pub mod store;
pub mod telemetry;
pub mod test_runner;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use cancel::CancellationToken;
pub use gate_client::GateClient;
pub use gate_client::RetryPolicy;
pub use gate_client::Sleeper;
pub use gate_client::ThreadSleeper;
pub use manifest_builder::ManifestBuilder;
pub use manifest_builder::ManifestError;
pub use manifest_builder::ManifestVerifier;
pub use manifest_builder::VerificationReport;
pub use manifest_builder::VerificationStatus;
pub use manifest_builder::aggregate_digest;
pub use orchestrator::Pipeline;
pub use orchestrator::PipelineComponents;
pub use orchestrator::PipelineError;
pub use orchestrator::RunOutcome;
pub use orchestrator::RunRequest;
pub use publisher_set::PublisherSet;
pub use publisher_set::PublisherSetBuilder;
pub use publisher_set::PublisherSetError;
pub use store::InMemoryEvidenceLedger;
pub use store::InMemoryPublishJournal;
pub use telemetry::NoopMetrics;
pub use telemetry::PipelineMetrics;
pub use telemetry::PipelineStage;
pub use telemetry::StageMetricEvent;
pub use telemetry::StageOutcome;
pub use test_runner::CheckSpec;
pub use test_runner::StageSpec;
pub use test_runner::TestRunner;
