// crates/publish-gate-providers/src/source.rs
// ============================================================================
// Module: File Artifact Source
// Description: Reads configured files and directories under an artifact root.
// Purpose: Snapshot build outputs into memory with strict path and size limits.
// Dependencies: publish-gate-core, tracing
// ============================================================================

//! ## Overview
//! [`FileArtifactSource`] expands its include list (files or directories,
//! relative to the root) into artifacts with normalized `/`-separated paths.
//! Paths that escape the root, symlinks that resolve outside it, and files
//! over the configured limits are rejected. A reviewed hash can be pinned per
//! path; the manifest builder then refuses to sign if the bytes changed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fs;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use publish_gate_core::Artifact;
use publish_gate_core::ArtifactSource;
use publish_gate_core::ArtifactSourceError;
use publish_gate_core::HashAlgorithm;
use publish_gate_core::HashDigest;
use publish_gate_core::hashing::DEFAULT_HASH_ALGORITHM;
use tracing::debug;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Default per-file size limit (256 MiB).
pub const DEFAULT_MAX_FILE_BYTES: u64 = 256 * 1024 * 1024;
/// Default total snapshot size limit (1 GiB).
pub const DEFAULT_MAX_TOTAL_BYTES: u64 = 1024 * 1024 * 1024;

/// File source configuration.
///
/// # Invariants
/// - `include` entries are relative to `root` and never contain `..`.
#[derive(Debug, Clone)]
pub struct FileSourceConfig {
    /// Artifact root directory.
    pub root: PathBuf,
    /// Files or directories to include, relative to `root`.
    pub include: Vec<String>,
    /// Reviewed hashes pinned per artifact path.
    pub pinned: BTreeMap<String, HashDigest>,
    /// Per-file size limit.
    pub max_file_bytes: u64,
    /// Total snapshot size limit.
    pub max_total_bytes: u64,
    /// Hash algorithm for unpinned artifacts.
    pub algorithm: HashAlgorithm,
}

impl FileSourceConfig {
    /// Creates a configuration with default limits.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, include: Vec<String>) -> Self {
        Self {
            root: root.into(),
            include,
            pinned: BTreeMap::new(),
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            max_total_bytes: DEFAULT_MAX_TOTAL_BYTES,
            algorithm: DEFAULT_HASH_ALGORITHM,
        }
    }
}

// ============================================================================
// SECTION: Source
// ============================================================================

/// Filesystem-backed artifact source.
#[derive(Debug, Clone)]
pub struct FileArtifactSource {
    /// Source configuration.
    config: FileSourceConfig,
}

impl FileArtifactSource {
    /// Creates a source over the configuration.
    #[must_use]
    pub const fn new(config: FileSourceConfig) -> Self {
        Self {
            config,
        }
    }

    /// Returns the artifact root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.config.root
    }

    /// Expands include entries into sorted relative file paths.
    fn expand(&self, root: &Path) -> Result<Vec<String>, ArtifactSourceError> {
        let mut files = Vec::new();
        for entry in &self.config.include {
            validate_include(entry)?;
            let relative = entry.trim_end_matches('/');
            let full = if relative.is_empty() || relative == "." {
                root.to_path_buf()
            } else {
                root.join(relative)
            };
            walk(root, &full, &mut files)?;
        }
        files.sort();
        files.dedup();
        Ok(files)
    }
}

impl ArtifactSource for FileArtifactSource {
    fn collect(&self) -> Result<Vec<Artifact>, ArtifactSourceError> {
        let root = fs::canonicalize(&self.config.root).map_err(|err| {
            ArtifactSourceError::Unreadable(format!(
                "artifact root {}: {err}",
                self.config.root.display()
            ))
        })?;
        let paths = self.expand(&root)?;
        let mut total: u64 = 0;
        let mut artifacts = Vec::with_capacity(paths.len());
        for relative in paths {
            let full = root.join(&relative);
            let size = fs::metadata(&full)
                .map_err(|err| ArtifactSourceError::Unreadable(format!("{relative}: {err}")))?
                .len();
            if size > self.config.max_file_bytes {
                return Err(ArtifactSourceError::Rejected(format!(
                    "{relative} is {size} bytes, limit {}",
                    self.config.max_file_bytes
                )));
            }
            total = total.saturating_add(size);
            if total > self.config.max_total_bytes {
                return Err(ArtifactSourceError::Rejected(format!(
                    "snapshot exceeds {} bytes",
                    self.config.max_total_bytes
                )));
            }
            let bytes = fs::read(&full)
                .map_err(|err| ArtifactSourceError::Unreadable(format!("{relative}: {err}")))?;
            let artifact = match self.config.pinned.get(&relative) {
                Some(recorded) => {
                    Artifact::with_recorded_hash(relative.clone(), bytes, recorded.clone())
                }
                None => Artifact::new(relative.clone(), bytes, self.config.algorithm),
            }
            .map_err(|err| ArtifactSourceError::Rejected(err.to_string()))?;
            artifacts.push(artifact);
        }
        for pinned in self.config.pinned.keys() {
            if !artifacts.iter().any(|artifact| artifact.path() == pinned) {
                return Err(ArtifactSourceError::Unreadable(format!(
                    "pinned artifact {pinned} was not collected"
                )));
            }
        }
        debug!(artifacts = artifacts.len(), bytes = total, "artifacts collected");
        Ok(artifacts)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Rejects absolute or parent-relative include entries.
fn validate_include(entry: &str) -> Result<(), ArtifactSourceError> {
    let path = Path::new(entry);
    let escapes = path.components().any(|component| {
        matches!(component, Component::ParentDir | Component::RootDir | Component::Prefix(_))
    });
    if escapes {
        return Err(ArtifactSourceError::Rejected(format!(
            "include path {entry} must stay under the artifact root"
        )));
    }
    Ok(())
}

/// Collects files under `path` as root-relative `/`-separated strings.
fn walk(root: &Path, path: &Path, files: &mut Vec<String>) -> Result<(), ArtifactSourceError> {
    let resolved = fs::canonicalize(path).map_err(|err| {
        ArtifactSourceError::Unreadable(format!("{}: {err}", path.display()))
    })?;
    if !resolved.starts_with(root) {
        return Err(ArtifactSourceError::Rejected(format!(
            "{} resolves outside the artifact root",
            path.display()
        )));
    }
    if resolved.is_dir() {
        let entries = fs::read_dir(&resolved).map_err(|err| {
            ArtifactSourceError::Unreadable(format!("{}: {err}", resolved.display()))
        })?;
        for entry in entries {
            let entry = entry.map_err(|err| ArtifactSourceError::Unreadable(err.to_string()))?;
            walk(root, &entry.path(), files)?;
        }
        return Ok(());
    }
    let relative = resolved.strip_prefix(root).map_err(|_| {
        ArtifactSourceError::Rejected(format!("{} is not under the root", resolved.display()))
    })?;
    let mut segments = Vec::new();
    for component in relative.components() {
        let Component::Normal(segment) = component else {
            return Err(ArtifactSourceError::Rejected(format!(
                "unexpected path component in {}",
                relative.display()
            )));
        };
        let segment = segment.to_str().ok_or_else(|| {
            ArtifactSourceError::Rejected(format!("{} is not valid UTF-8", relative.display()))
        })?;
        segments.push(segment);
    }
    files.push(segments.join("/"));
    Ok(())
}
