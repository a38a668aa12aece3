// crates/publish-gate-core/src/core/mod.rs
// ============================================================================
// Module: Publish Gate Core Types
// Description: Data model for artifacts, manifests, reports, verdicts, and runs.
// Purpose: Provide serializable, deterministic types shared by all components.
// Dependencies: serde, serde_jcs, sha2, time
// ============================================================================

//! ## Overview
//! The core module defines the pipeline data model. Types here carry no I/O;
//! runtime components and adapters operate on them.

pub mod artifact;
pub mod evidence;
pub mod hashing;
pub mod identifiers;
pub mod manifest;
pub mod publish;
pub mod report;
pub mod run;
pub mod time;
pub mod verdict;

pub use artifact::*;
pub use evidence::*;
pub use hashing::HashAlgorithm;
pub use hashing::HashDigest;
pub use hashing::HashError;
pub use identifiers::*;
pub use manifest::*;
pub use publish::*;
pub use report::*;
pub use run::*;
pub use self::time::*;
pub use verdict::*;
