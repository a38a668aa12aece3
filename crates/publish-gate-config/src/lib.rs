// crates/publish-gate-config/src/lib.rs
// ============================================================================
// Module: Publish Gate Config Library
// Description: Pipeline config model, loading, and validation.
// Purpose: Single source of truth for publish-gate.toml semantics.
// Dependencies: publish-gate-core, publish-gate-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! `publish-gate-config` defines the configuration model for the publish
//! pipeline. Loading is strict and fail-closed; see [`PipelineConfig::load`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod examples;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
pub use examples::config_toml_example;
