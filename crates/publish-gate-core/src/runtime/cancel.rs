// crates/publish-gate-core/src/runtime/cancel.rs
// ============================================================================
// Module: Publish Gate Cancellation
// Description: Cooperative cancellation flag shared across pipeline stages.
// Purpose: Let callers request cancellation without interrupting in-flight calls.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Cancellation is cooperative. The orchestrator polls the token between
//! stages and the runners poll it before launching new work; calls already
//! issued always run to completion.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

// ============================================================================
// SECTION: Token
// ============================================================================

/// Shared cancellation flag.
///
/// # Invariants
/// - Once cancelled, a token stays cancelled.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    /// Shared flag.
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates a token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Returns true when cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
