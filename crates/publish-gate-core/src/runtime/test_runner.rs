// crates/publish-gate-core/src/runtime/test_runner.rs
// ============================================================================
// Module: Publish Gate Test Runner
// Description: Bounded concurrent execution of validation checks.
// Purpose: Turn black-box checks into an ordered, reproducible stage report.
// Dependencies: crate::{core, interfaces}, tracing
// ============================================================================

//! ## Overview
//! Checks run on a bounded pool of scoped worker threads. Each check itself
//! executes on a dedicated thread so its timeout can be enforced without
//! blocking the worker; a check that exceeds its timeout or panics becomes a
//! `FAIL` result. Results are reassembled in declared order.
//!
//! Under [`StagePolicy::FailFast`] workers stop pulling new checks after the
//! first failure, and checks that never started are recorded as `SKIP`. The
//! same happens when the run is cancelled mid-stage.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::any::Any;
use std::num::NonZeroUsize;
use std::panic::AssertUnwindSafe;
use std::panic::catch_unwind;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use tracing::debug;
use tracing::warn;

use crate::core::ArtifactSnapshot;
use crate::core::report::CheckStatus;
use crate::core::report::StagePolicy;
use crate::core::report::StageReport;
use crate::core::report::TestResult;
use crate::interfaces::ValidationCheck;
use crate::runtime::cancel::CancellationToken;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default per-check timeout.
pub const DEFAULT_CHECK_TIMEOUT: Duration = Duration::from_secs(300);
/// Default worker pool size.
pub const DEFAULT_MAX_WORKERS: usize = 4;

// ============================================================================
// SECTION: Stage Specification
// ============================================================================

/// One declared check with its timeout.
#[derive(Clone)]
pub struct CheckSpec {
    /// Check implementation.
    check: Arc<dyn ValidationCheck>,
    /// Maximum wall time for the check.
    timeout: Duration,
}

impl CheckSpec {
    /// Declares a check with the default timeout.
    #[must_use]
    pub fn new(check: Arc<dyn ValidationCheck>) -> Self {
        Self {
            check,
            timeout: DEFAULT_CHECK_TIMEOUT,
        }
    }

    /// Overrides the check timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Named, ordered list of checks with a stage policy.
#[derive(Clone)]
pub struct StageSpec {
    /// Stage name.
    name: String,
    /// Declared checks.
    checks: Vec<CheckSpec>,
    /// Failure policy.
    policy: StagePolicy,
}

impl StageSpec {
    /// Creates an empty collect-all stage.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            checks: Vec::new(),
            policy: StagePolicy::CollectAll,
        }
    }

    /// Appends a check to the stage.
    #[must_use]
    pub fn check(mut self, check: CheckSpec) -> Self {
        self.checks.push(check);
        self
    }

    /// Sets the stage policy.
    #[must_use]
    pub const fn policy(mut self, policy: StagePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Returns the stage name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of declared checks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.checks.len()
    }

    /// Returns true when no checks are declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }
}

// ============================================================================
// SECTION: Runner
// ============================================================================

/// Executes stage checks under a bounded worker pool.
#[derive(Debug, Clone, Copy)]
pub struct TestRunner {
    /// Maximum concurrent checks.
    max_workers: NonZeroUsize,
}

impl Default for TestRunner {
    fn default() -> Self {
        Self::new(NonZeroUsize::new(DEFAULT_MAX_WORKERS).unwrap_or(NonZeroUsize::MIN))
    }
}

impl TestRunner {
    /// Creates a runner with the given pool size.
    #[must_use]
    pub const fn new(max_workers: NonZeroUsize) -> Self {
        Self {
            max_workers,
        }
    }

    /// Runs every check in the stage and returns the ordered report.
    #[must_use]
    pub fn run(
        &self,
        stage: &StageSpec,
        snapshot: &ArtifactSnapshot,
        cancel: &CancellationToken,
    ) -> StageReport {
        let total = stage.checks.len();
        let slots: Vec<Mutex<Option<TestResult>>> =
            (0 .. total).map(|_| Mutex::new(None)).collect();
        let next = AtomicUsize::new(0);
        let abort = AtomicBool::new(false);
        let workers = self.max_workers.get().min(total);

        thread::scope(|scope| {
            for _ in 0 .. workers {
                scope.spawn(|| {
                    loop {
                        if abort.load(Ordering::SeqCst) || cancel.is_cancelled() {
                            break;
                        }
                        let index = next.fetch_add(1, Ordering::SeqCst);
                        let Some(spec) = stage.checks.get(index) else {
                            break;
                        };
                        let result = execute_check(spec, snapshot);
                        if result.status == CheckStatus::Fail
                            && stage.policy == StagePolicy::FailFast
                        {
                            abort.store(true, Ordering::SeqCst);
                        }
                        if let Ok(mut slot) = slots[index].lock() {
                            *slot = Some(result);
                        }
                    }
                });
            }
        });

        let skip_reason = if cancel.is_cancelled() {
            "not run: cancellation requested"
        } else {
            "not run: fail-fast stopped the stage"
        };
        let results = slots
            .into_iter()
            .zip(&stage.checks)
            .map(|(slot, spec)| {
                slot.into_inner()
                    .ok()
                    .flatten()
                    .unwrap_or_else(|| TestResult::skipped(spec.check.name().clone(), skip_reason))
            })
            .collect();
        let report = StageReport::from_results(stage.name.clone(), results);
        debug!(stage = %report.stage, overall = report.overall.as_str(), "stage completed");
        report
    }
}

// ============================================================================
// SECTION: Check Execution
// ============================================================================

/// Runs one check on its own thread and enforces the timeout.
fn execute_check(spec: &CheckSpec, snapshot: &ArtifactSnapshot) -> TestResult {
    let name = spec.check.name().clone();
    let started = Instant::now();
    let (sender, receiver) = mpsc::channel();
    let check = Arc::clone(&spec.check);
    let check_snapshot = snapshot.clone();
    let spawned = thread::Builder::new().name(format!("check-{name}")).spawn(move || {
        let outcome = catch_unwind(AssertUnwindSafe(|| check.run(&check_snapshot)));
        let _ = sender.send(outcome);
    });

    let (status, message) = match spawned {
        Err(err) => (CheckStatus::Fail, format!("check could not be started: {err}")),
        Ok(_handle) => match receiver.recv_timeout(spec.timeout) {
            Ok(Ok(outcome)) => outcome.into_parts(),
            Ok(Err(payload)) => {
                (CheckStatus::Fail, format!("check panicked: {}", panic_message(&*payload)))
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                warn!(check = %name, timeout_ms = millis(spec.timeout), "check timed out");
                (CheckStatus::Fail, format!("timed out after {} ms", millis(spec.timeout)))
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                (CheckStatus::Fail, "check terminated without a result".to_string())
            }
        },
    };

    TestResult {
        name,
        status,
        message,
        duration_ms: millis(started.elapsed()),
    }
}

/// Extracts a printable panic message.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Converts a duration to whole milliseconds.
fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
