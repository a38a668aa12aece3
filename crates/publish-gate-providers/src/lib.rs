// crates/publish-gate-providers/src/lib.rs
// ============================================================================
// Module: Publish Gate Providers
// Description: Concrete adapters for the Publish Gate capability interfaces.
// Purpose: Provide signing, artifact, check, gate, publisher, and fallback adapters.
// Dependencies: publish-gate-core, ed25519-dalek, regex, reqwest, tar
// ============================================================================

//! ## Overview
//! This crate binds the core interfaces to real systems: Ed25519 keys on
//! disk, files under an artifact root, external commands, an HTTPS gate, tar
//! archives, and HTTP deposit endpoints.
//! Invariants:
//! - Outbound HTTP never follows redirects and reads bounded bodies.
//! - Adapters report failures as errors; none substitutes a default outcome.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod checks;
pub mod fallback;
pub mod gate;
pub mod http;
pub mod publishers;
pub mod signing;
pub mod source;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use checks::CheckBuildError;
pub use checks::CommandCheck;
pub use checks::FileSizeCheck;
pub use checks::SecretScanCheck;
pub use fallback::FileFallbackSink;
pub use gate::HttpGateService;
pub use http::HttpClientConfig;
pub use publishers::ArchiveMetadata;
pub use publishers::HttpPublisher;
pub use publishers::LocalArchivePublisher;
pub use signing::Ed25519Signer;
pub use signing::Ed25519Verifier;
pub use signing::KeyError;
pub use signing::UnavailableSigner;
pub use source::FileArtifactSource;
pub use source::FileSourceConfig;
