// crates/publish-gate-providers/src/fallback.rs
// ============================================================================
// Module: File Fallback Sink
// Description: Writes evidence records to local JSON files.
// Purpose: Preserve evidence when the ledger cannot be written.
// Dependencies: publish-gate-core, serde_json, tracing
// ============================================================================

//! ## Overview
//! Records land at `<dir>/<traceId>.json`. Existing files are never
//! overwritten.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use publish_gate_core::EvidenceRecord;
use publish_gate_core::FallbackError;
use publish_gate_core::FallbackSink;
use tracing::warn;

// ============================================================================
// SECTION: Sink
// ============================================================================

/// Directory-backed fallback sink.
#[derive(Debug, Clone)]
pub struct FileFallbackSink {
    /// Output directory.
    dir: PathBuf,
}

impl FileFallbackSink {
    /// Creates a sink writing into `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
        }
    }
}

impl FallbackSink for FileFallbackSink {
    fn write(&self, record: &EvidenceRecord) -> Result<String, FallbackError> {
        fs::create_dir_all(&self.dir).map_err(|err| FallbackError::Write(err.to_string()))?;
        let path = self.dir.join(format!("{}.json", record.trace_id));
        let bytes = serde_json::to_vec_pretty(record)
            .map_err(|err| FallbackError::Write(err.to_string()))?;
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|err| FallbackError::Write(format!("{}: {err}", path.display())))?;
        file.write_all(&bytes)
            .and_then(|()| file.sync_all())
            .map_err(|err| FallbackError::Write(format!("{}: {err}", path.display())))?;
        warn!(path = %path.display(), "evidence written to fallback file");
        Ok(path.display().to_string())
    }
}
