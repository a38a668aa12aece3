// crates/publish-gate-cli/src/lib.rs
// ============================================================================
// Module: Publish Gate CLI Library
// Description: Shared helpers for the Publish Gate command-line interface.
// Purpose: Provide pipeline wiring and report writing for the binary and tests.
// Dependencies: publish-gate-config, publish-gate-core, publish-gate-providers
// ============================================================================

//! ## Overview
//! The binary entry point (`src/main.rs`) parses arguments and dispatches.
//! This library turns configuration into a runnable pipeline and writes the
//! per-run report files.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod report;
pub mod wiring;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use report::DeployReport;
pub use report::ProvenanceStatement;
pub use report::ReportError;
pub use report::SbomReference;
pub use report::WrittenReports;
pub use report::write_reports;
pub use wiring::ConfiguredPipeline;
pub use wiring::WiringError;
pub use wiring::build_pipeline;
pub use wiring::open_ledger;
