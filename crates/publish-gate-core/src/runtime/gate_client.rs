// crates/publish-gate-core/src/runtime/gate_client.rs
// ============================================================================
// Module: Publish Gate Admissibility Client
// Description: Fail-closed client for the external admissibility gate.
// Purpose: Retry transient failures with bounded backoff and never default to PASS.
// Dependencies: crate::{core, interfaces}, tracing
// ============================================================================

//! ## Overview
//! [`GateClient::submit`] sends the manifest digest, signature, and stage
//! report to a [`GateService`]. Transient failures are retried with bounded
//! exponential backoff. Exhausted retries, permanent failures, and verdict
//! signatures that fail verification all produce `GATE_UNAVAILABLE`.
//!
//! Submissions are idempotent per trace id: the first definitive verdict for
//! a trace id is cached and returned for repeated submissions of the same
//! manifest digest. A repeated trace id with a different digest is refused.
//!
//! Security posture: the absence of a verdict is never permission.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use tracing::info;
use tracing::warn;

use crate::core::hashing::HashDigest;
use crate::core::hashing::canonical_json_bytes;
use crate::core::identifiers::TraceId;
use crate::core::manifest::Manifest;
use crate::core::report::StageReport;
use crate::core::verdict::GateRequest;
use crate::core::verdict::GateResponse;
use crate::core::verdict::GateVerdict;
use crate::core::verdict::VerdictPayload;
use crate::interfaces::GateService;
use crate::interfaces::GateServiceError;
use crate::interfaces::SignatureVerifier;

// ============================================================================
// SECTION: Retry Policy
// ============================================================================

/// Bounded exponential backoff settings.
///
/// # Invariants
/// - At least one attempt is always made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum attempts including the first.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_backoff: Duration,
    /// Upper bound on any single delay.
    pub max_backoff: Duration,
    /// Multiplier applied after each retry.
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(5),
            multiplier: 2,
        }
    }
}

impl RetryPolicy {
    /// Returns the delay to wait after failed attempt `attempt` (1-based).
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let factor = self.multiplier.max(1).saturating_pow(exponent);
        self.initial_backoff.saturating_mul(factor).min(self.max_backoff)
    }

    /// Returns the effective attempt count.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

// ============================================================================
// SECTION: Sleeper
// ============================================================================

/// Blocking delay capability used between retries.
pub trait Sleeper: Send + Sync {
    /// Blocks for the given duration.
    fn sleep(&self, duration: Duration);
}

/// Sleeper backed by [`thread::sleep`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

// ============================================================================
// SECTION: Client
// ============================================================================

/// Cached definitive verdict for a trace id.
#[derive(Debug, Clone)]
struct CachedVerdict {
    /// Digest the verdict was issued for.
    digest: HashDigest,
    /// Verdict returned by the service.
    verdict: GateVerdict,
}

/// Fail-closed admissibility gate client.
pub struct GateClient<G> {
    /// Gate service implementation.
    service: G,
    /// Retry policy.
    retry: RetryPolicy,
    /// Delay capability.
    sleeper: Arc<dyn Sleeper>,
    /// Optional verifier for verdict signatures.
    verdict_verifier: Option<Arc<dyn SignatureVerifier>>,
    /// Definitive verdicts keyed by trace id.
    issued: Mutex<BTreeMap<TraceId, CachedVerdict>>,
}

impl<G: GateService> GateClient<G> {
    /// Creates a client with the default retry policy.
    #[must_use]
    pub fn new(service: G) -> Self {
        Self {
            service,
            retry: RetryPolicy::default(),
            sleeper: Arc::new(ThreadSleeper),
            verdict_verifier: None,
            issued: Mutex::new(BTreeMap::new()),
        }
    }

    /// Overrides the retry policy.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Overrides the delay capability.
    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Requires verdicts to carry a valid signature from this key.
    #[must_use]
    pub fn with_verdict_verifier(mut self, verifier: Arc<dyn SignatureVerifier>) -> Self {
        self.verdict_verifier = Some(verifier);
        self
    }

    /// Returns the wrapped service.
    #[must_use]
    pub const fn service(&self) -> &G {
        &self.service
    }

    /// Submits the manifest and stage report and returns the recorded verdict.
    #[must_use]
    pub fn submit(&self, manifest: &Manifest, report: &StageReport) -> GateVerdict {
        let trace_id = manifest.trace_id();
        match self.cached(trace_id, manifest.aggregate_digest()) {
            CacheLookup::Hit(verdict) => return verdict,
            CacheLookup::Conflict => {
                return GateVerdict::unavailable(format!(
                    "trace id {trace_id} already gated a different manifest"
                ));
            }
            CacheLookup::Miss => {}
        }

        let request = GateRequest {
            trace_id: trace_id.clone(),
            manifest_digest: manifest.aggregate_digest().clone(),
            signature: manifest.signature().value.clone(),
            stage_report: report.clone(),
        };

        let response = match self.call_with_retry(&request) {
            Ok(response) => response,
            Err(reason) => {
                warn!(trace_id = %trace_id, reason = %reason, "gate unavailable");
                return GateVerdict::unavailable(reason);
            }
        };

        if let Err(reason) = self.check_verdict_signature(&request, &response) {
            warn!(trace_id = %trace_id, reason = %reason, "gate verdict signature rejected");
            return GateVerdict::unavailable(reason);
        }

        let verdict = GateVerdict::from_response(response);
        info!(trace_id = %trace_id, decision = verdict.decision.as_str(), "gate verdict received");
        if let Ok(mut issued) = self.issued.lock() {
            issued.insert(
                trace_id.clone(),
                CachedVerdict {
                    digest: request.manifest_digest,
                    verdict: verdict.clone(),
                },
            );
        }
        verdict
    }

    /// Looks up a cached verdict for the trace id.
    fn cached(&self, trace_id: &TraceId, digest: &HashDigest) -> CacheLookup {
        let Ok(issued) = self.issued.lock() else {
            return CacheLookup::Miss;
        };
        match issued.get(trace_id) {
            Some(cached) if &cached.digest == digest => CacheLookup::Hit(cached.verdict.clone()),
            Some(_) => CacheLookup::Conflict,
            None => CacheLookup::Miss,
        }
    }

    /// Calls the service, retrying transient failures.
    fn call_with_retry(&self, request: &GateRequest) -> Result<GateResponse, String> {
        let attempts = self.retry.attempts();
        let mut last_error = String::from("gate not contacted");
        for attempt in 1 ..= attempts {
            match self.service.decide(request) {
                Ok(response) => return Ok(response),
                Err(GateServiceError::Permanent(message)) => {
                    return Err(format!("gate refused request: {message}"));
                }
                Err(GateServiceError::Transient(message)) => {
                    warn!(
                        trace_id = %request.trace_id,
                        attempt,
                        attempts,
                        error = %message,
                        "transient gate failure"
                    );
                    last_error = message;
                    if attempt < attempts {
                        self.sleeper.sleep(self.retry.delay_after(attempt));
                    }
                }
            }
        }
        Err(format!("gate unreachable after {attempts} attempts: {last_error}"))
    }

    /// Verifies the verdict signature when a verifier is configured.
    fn check_verdict_signature(
        &self,
        request: &GateRequest,
        response: &GateResponse,
    ) -> Result<(), String> {
        let Some(verifier) = &self.verdict_verifier else {
            return Ok(());
        };
        let Some(signature) = &response.verdict_signature else {
            return Err("verdict is unsigned".to_string());
        };
        let payload = canonical_json_bytes(&VerdictPayload {
            trace_id: &request.trace_id,
            manifest_digest: &request.manifest_digest,
            verdict: response.verdict,
            reason: &response.reason,
        })
        .map_err(|err| err.to_string())?;
        verifier
            .verify(&payload, signature)
            .map_err(|err| format!("verdict signature invalid: {err}"))
    }
}

/// Result of an idempotency cache lookup.
enum CacheLookup {
    /// A verdict exists for the same digest.
    Hit(GateVerdict),
    /// A verdict exists for a different digest.
    Conflict,
    /// No verdict exists.
    Miss,
}

// ============================================================================
// SECTION: Tests
// ============================================================================
