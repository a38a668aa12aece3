// crates/publish-gate-core/src/lib.rs
// ============================================================================
// Module: Publish Gate Core Library
// Description: Public API surface for the Publish Gate core.
// Purpose: Expose core types, interfaces, and runtime components.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Publish Gate core turns a set of artifacts into a signed manifest, runs
//! validation checks, asks an external admissibility gate for a verdict, and
//! publishes to declared targets only on an explicit `PASS`. Every run leaves
//! exactly one append-only evidence record. The core performs no direct I/O;
//! filesystems, keys, networks, and databases plug in through
//! [`interfaces`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use crate::core::*;

pub use interfaces::ArtifactSource;
pub use interfaces::ArtifactSourceError;
pub use interfaces::EvidenceLedger;
pub use interfaces::FallbackError;
pub use interfaces::FallbackSink;
pub use interfaces::GateService;
pub use interfaces::GateServiceError;
pub use interfaces::JournalError;
pub use interfaces::LedgerEntry;
pub use interfaces::LedgerError;
pub use interfaces::ManifestSigner;
pub use interfaces::PublishJournal;
pub use interfaces::PublishReceipt;
pub use interfaces::PublishRequest;
pub use interfaces::Publisher;
pub use interfaces::PublisherError;
pub use interfaces::SignatureError;
pub use interfaces::SignatureVerifier;
pub use interfaces::SigningError;
pub use interfaces::ValidationCheck;
pub use runtime::CancellationToken;
pub use runtime::CheckSpec;
pub use runtime::GateClient;
pub use runtime::InMemoryEvidenceLedger;
pub use runtime::InMemoryPublishJournal;
pub use runtime::ManifestBuilder;
pub use runtime::ManifestError;
pub use runtime::ManifestVerifier;
pub use runtime::Pipeline;
pub use runtime::PipelineComponents;
pub use runtime::PipelineError;
pub use runtime::PublisherSet;
pub use runtime::RetryPolicy;
pub use runtime::RunOutcome;
pub use runtime::RunRequest;
pub use runtime::StageSpec;
pub use runtime::TestRunner;
pub use runtime::VerificationReport;
pub use runtime::VerificationStatus;
