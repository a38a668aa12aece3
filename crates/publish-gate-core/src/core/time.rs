// crates/publish-gate-core/src/core/time.rs
// ============================================================================
// Module: Publish Gate Time Model
// Description: Timestamps and clock capability for pipeline records.
// Purpose: Keep run timing injectable and render RFC 3339 evidence times.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! Pipeline components never read wall-clock time directly; the orchestrator
//! obtains timestamps from a [`Clock`]. Timestamps are unix epoch milliseconds
//! internally and render as RFC 3339 UTC strings in evidence records.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised when converting timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeError {
    /// Timestamp is outside the representable calendar range.
    #[error("timestamp out of range: {0}")]
    OutOfRange(i64),
    /// RFC 3339 formatting or parsing failed.
    #[error("rfc3339 conversion failed: {0}")]
    Format(String),
}

// ============================================================================
// SECTION: Timestamp
// ============================================================================

/// Unix epoch milliseconds.
///
/// # Invariants
/// - Values are supplied by a [`Clock`]; monotonicity is the clock's responsibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a timestamp from unix epoch milliseconds.
    #[must_use]
    pub const fn from_unix_millis(value: i64) -> Self {
        Self(value)
    }

    /// Returns the timestamp as unix epoch milliseconds.
    #[must_use]
    pub const fn as_unix_millis(self) -> i64 {
        self.0
    }

    /// Renders the timestamp as an RFC 3339 UTC string.
    ///
    /// # Errors
    ///
    /// Returns [`TimeError`] when the value is out of calendar range.
    pub fn to_rfc3339(self) -> Result<String, TimeError> {
        let nanos = i128::from(self.0) * 1_000_000;
        let datetime = OffsetDateTime::from_unix_timestamp_nanos(nanos)
            .map_err(|_| TimeError::OutOfRange(self.0))?;
        datetime.format(&Rfc3339).map_err(|err| TimeError::Format(err.to_string()))
    }

    /// Parses an RFC 3339 string into a timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`TimeError::Format`] when parsing fails.
    pub fn parse_rfc3339(value: &str) -> Result<Self, TimeError> {
        let datetime = OffsetDateTime::parse(value, &Rfc3339)
            .map_err(|err| TimeError::Format(err.to_string()))?;
        let millis = datetime.unix_timestamp_nanos() / 1_000_000;
        i64::try_from(millis).map(Self).map_err(|_| TimeError::Format(value.to_string()))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// SECTION: Clocks
// ============================================================================

/// Time source for pipeline runs.
pub trait Clock: Send + Sync {
    /// Returns the current timestamp.
    fn now(&self) -> Timestamp;
}

/// Wall-clock time source.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
            .unwrap_or(0);
        Timestamp(millis)
    }
}

/// Deterministic clock that advances by a fixed step on every read.
///
/// # Invariants
/// - Successive reads are strictly increasing when `step` is positive.
#[derive(Debug)]
pub struct SteppingClock {
    /// Next value to hand out.
    next: AtomicI64,
    /// Increment applied after each read.
    step: i64,
}

impl SteppingClock {
    /// Creates a stepping clock starting at `start` milliseconds.
    #[must_use]
    pub const fn new(start: i64, step: i64) -> Self {
        Self {
            next: AtomicI64::new(start),
            step,
        }
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> Timestamp {
        Timestamp(self.next.fetch_add(self.step, Ordering::SeqCst))
    }
}
