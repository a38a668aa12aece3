// crates/publish-gate-core/tests/common/mod.rs
// =============================================================================
// Module: Core Test Helpers
// Description: In-memory fakes for sources, signing, checks, gate, and publishers.
// Purpose: Reduce duplication across integration tests for publish-gate-core.
// =============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use publish_gate_core::Artifact;
use publish_gate_core::ArtifactSnapshot;
use publish_gate_core::ArtifactSource;
use publish_gate_core::ArtifactSourceError;
use publish_gate_core::CancellationToken;
use publish_gate_core::CheckName;
use publish_gate_core::CheckOutcome;
use publish_gate_core::CheckSpec;
use publish_gate_core::EvidenceLedger;
use publish_gate_core::EvidenceRecord;
use publish_gate_core::FallbackError;
use publish_gate_core::FallbackSink;
use publish_gate_core::GateClient;
use publish_gate_core::GateRequest;
use publish_gate_core::GateResponse;
use publish_gate_core::GateService;
use publish_gate_core::GateServiceError;
use publish_gate_core::InMemoryEvidenceLedger;
use publish_gate_core::LedgerEntry;
use publish_gate_core::LedgerError;
use publish_gate_core::ManifestBuilder;
use publish_gate_core::ManifestSigner;
use publish_gate_core::Pipeline;
use publish_gate_core::PipelineComponents;
use publish_gate_core::PipelineRun;
use publish_gate_core::PublishReceipt;
use publish_gate_core::PublishRequest;
use publish_gate_core::Publisher;
use publish_gate_core::PublisherError;
use publish_gate_core::PublisherSet;
use publish_gate_core::RecordId;
use publish_gate_core::RetryPolicy;
use publish_gate_core::ServiceDecision;
use publish_gate_core::SignatureError;
use publish_gate_core::SignatureScheme;
use publish_gate_core::SignatureVerifier;
use publish_gate_core::SignerId;
use publish_gate_core::SigningError;
use publish_gate_core::StageSpec;
use publish_gate_core::SteppingClock;
use publish_gate_core::TargetName;
use publish_gate_core::TestRunner;
use publish_gate_core::Timestamp;
use publish_gate_core::TraceId;
use publish_gate_core::ValidationCheck;
use publish_gate_core::hashing::DEFAULT_HASH_ALGORITHM;
use publish_gate_core::hashing::hash_bytes;
use publish_gate_core::runtime::PipelineMetrics;
use publish_gate_core::runtime::PipelineStage;
use publish_gate_core::runtime::Sleeper;
use publish_gate_core::runtime::StageMetricEvent;
use publish_gate_core::runtime::StageOutcome;

// ============================================================================
// SECTION: Signing
// ============================================================================

/// Keyed-hash signer standing in for a real scheme.
pub struct KeyedSigner {
    pub key: Vec<u8>,
}

/// Computes the keyed tag over a payload.
pub fn keyed_tag(key: &[u8], payload: &[u8]) -> String {
    let mut input = key.to_vec();
    input.extend_from_slice(payload);
    hash_bytes(DEFAULT_HASH_ALGORITHM, &input).value
}

impl ManifestSigner for KeyedSigner {
    fn scheme(&self) -> SignatureScheme {
        SignatureScheme::Ed25519
    }

    fn signer_id(&self) -> SignerId {
        SignerId::new("test-signer")
    }

    fn sign(&self, payload: &[u8]) -> Result<String, SigningError> {
        Ok(keyed_tag(&self.key, payload))
    }
}

/// Verifier for [`KeyedSigner`] tags.
pub struct KeyedVerifier {
    pub key: Vec<u8>,
}

impl SignatureVerifier for KeyedVerifier {
    fn scheme(&self) -> SignatureScheme {
        SignatureScheme::Ed25519
    }

    fn verify(&self, payload: &[u8], signature: &str) -> Result<(), SignatureError> {
        if keyed_tag(&self.key, payload) == signature {
            Ok(())
        } else {
            Err(SignatureError::Mismatch)
        }
    }
}

/// Signer whose key is never available.
pub struct MissingKeySigner;

impl ManifestSigner for MissingKeySigner {
    fn scheme(&self) -> SignatureScheme {
        SignatureScheme::Ed25519
    }

    fn signer_id(&self) -> SignerId {
        SignerId::new("missing")
    }

    fn sign(&self, _payload: &[u8]) -> Result<String, SigningError> {
        Err(SigningError::KeyUnavailable("key file not found".to_string()))
    }
}

pub const SIGNING_KEY: &[u8] = b"integration-key";

/// Returns a manifest builder using the shared test key.
pub fn builder() -> ManifestBuilder {
    ManifestBuilder::new(
        Arc::new(KeyedSigner {
            key: SIGNING_KEY.to_vec(),
        }),
        DEFAULT_HASH_ALGORITHM,
    )
}

// ============================================================================
// SECTION: Sources and Checks
// ============================================================================

/// Source returning fixed artifacts.
pub struct StaticSource {
    pub files: Vec<(String, Vec<u8>)>,
}

impl StaticSource {
    pub fn new(files: &[(&str, &[u8])]) -> Self {
        Self {
            files: files
                .iter()
                .map(|(path, bytes)| ((*path).to_string(), bytes.to_vec()))
                .collect(),
        }
    }
}

impl ArtifactSource for StaticSource {
    fn collect(&self) -> Result<Vec<Artifact>, ArtifactSourceError> {
        self.files
            .iter()
            .map(|(path, bytes)| {
                Artifact::new(path.clone(), bytes.clone(), DEFAULT_HASH_ALGORITHM)
                    .map_err(|err| ArtifactSourceError::Rejected(err.to_string()))
            })
            .collect()
    }
}

/// Source whose first artifact changed after its hash was recorded.
pub struct TamperedSource;

impl ArtifactSource for TamperedSource {
    fn collect(&self) -> Result<Vec<Artifact>, ArtifactSourceError> {
        let recorded = hash_bytes(DEFAULT_HASH_ALGORITHM, b"reviewed bytes");
        let artifact = Artifact::with_recorded_hash("model.bin", b"edited bytes".to_vec(), recorded)
            .map_err(|err| ArtifactSourceError::Rejected(err.to_string()))?;
        Ok(vec![artifact])
    }
}

/// Check returning a fixed outcome.
pub struct StaticCheck {
    pub name: CheckName,
    pub outcome: CheckOutcome,
}

impl StaticCheck {
    pub fn pass(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: CheckName::new(name),
            outcome: CheckOutcome::Pass("ok".to_string()),
        })
    }

    pub fn fail(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: CheckName::new(name),
            outcome: CheckOutcome::Fail(format!("{name} found a problem")),
        })
    }
}

impl ValidationCheck for StaticCheck {
    fn name(&self) -> &CheckName {
        &self.name
    }

    fn run(&self, _snapshot: &ArtifactSnapshot) -> CheckOutcome {
        self.outcome.clone()
    }
}

/// Check that requests cancellation while it runs and then passes.
pub struct CancellingCheck {
    pub name: CheckName,
    pub cancel: CancellationToken,
}

impl ValidationCheck for CancellingCheck {
    fn name(&self) -> &CheckName {
        &self.name
    }

    fn run(&self, _snapshot: &ArtifactSnapshot) -> CheckOutcome {
        self.cancel.cancel();
        CheckOutcome::Pass("ok".to_string())
    }
}

/// Builds a stage from checks.
pub fn stage(checks: Vec<Arc<dyn ValidationCheck>>) -> StageSpec {
    checks.into_iter().fold(StageSpec::new("validation"), |stage, check| {
        stage.check(CheckSpec::new(check))
    })
}

// ============================================================================
// SECTION: Gate
// ============================================================================

/// Gate service replaying scripted replies.
pub struct ScriptedGate {
    replies: Mutex<VecDeque<Result<GateResponse, GateServiceError>>>,
    requests: Mutex<Vec<GateRequest>>,
}

impl ScriptedGate {
    pub fn new(replies: Vec<Result<GateResponse, GateServiceError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn always(decision: ServiceDecision) -> Self {
        Self::new((0 .. 8).map(|_| reply(decision)).collect())
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<GateRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl GateService for ScriptedGate {
    fn decide(&self, request: &GateRequest) -> Result<GateResponse, GateServiceError> {
        self.requests.lock().unwrap().push(request.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(GateServiceError::Transient("script exhausted".to_string())))
    }
}

/// Builds a gate reply.
pub fn reply(decision: ServiceDecision) -> Result<GateResponse, GateServiceError> {
    Ok(GateResponse {
        verdict: decision,
        reason: format!("gate said {decision:?}"),
        verdict_signature: None,
    })
}

/// Sleeper that returns immediately.
pub struct NoSleep;

impl Sleeper for NoSleep {
    fn sleep(&self, _duration: Duration) {}
}

/// Builds a gate client with fast retries.
pub fn gate_client(gate: ScriptedGate) -> GateClient<ScriptedGate> {
    GateClient::new(gate)
        .with_retry(RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
            multiplier: 2,
        })
        .with_sleeper(Arc::new(NoSleep))
}

// ============================================================================
// SECTION: Publishers
// ============================================================================

/// Publisher recording every call.
pub struct RecordingPublisher {
    pub target: TargetName,
    pub fail: bool,
    pub calls: Mutex<usize>,
}

impl RecordingPublisher {
    pub fn ok(name: &str) -> Arc<Self> {
        Arc::new(Self {
            target: TargetName::new(name),
            fail: false,
            calls: Mutex::new(0),
        })
    }

    pub fn failing(name: &str) -> Arc<Self> {
        Arc::new(Self {
            target: TargetName::new(name),
            fail: true,
            calls: Mutex::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

impl Publisher for RecordingPublisher {
    fn target(&self) -> &TargetName {
        &self.target
    }

    fn publish(&self, request: &PublishRequest<'_>) -> Result<PublishReceipt, PublisherError> {
        *self.calls.lock().unwrap() += 1;
        if self.fail {
            return Err(PublisherError::Failed(format!("{} unreachable", self.target)));
        }
        Ok(PublishReceipt {
            external_id: Some(format!("{}:{}", self.target, request.manifest.trace_id())),
        })
    }
}

/// Publisher that requests cancellation from inside its own call and succeeds.
pub struct CancellingPublisher {
    pub target: TargetName,
    pub cancel: CancellationToken,
}

impl Publisher for CancellingPublisher {
    fn target(&self) -> &TargetName {
        &self.target
    }

    fn publish(&self, _request: &PublishRequest<'_>) -> Result<PublishReceipt, PublisherError> {
        self.cancel.cancel();
        Ok(PublishReceipt {
            external_id: Some(format!("{}:in-flight", self.target)),
        })
    }
}

// ============================================================================
// SECTION: Metrics
// ============================================================================

/// Metrics sink keeping every stage event.
#[derive(Default)]
pub struct RecordingMetrics {
    pub events: Mutex<Vec<StageMetricEvent>>,
    pub latencies: Mutex<Vec<(StageMetricEvent, Duration)>>,
}

impl RecordingMetrics {
    /// Returns recorded `(stage, outcome)` pairs in emission order.
    pub fn stages(&self) -> Vec<(PipelineStage, StageOutcome)> {
        self.events.lock().unwrap().iter().map(|event| (event.stage, event.outcome)).collect()
    }
}

impl PipelineMetrics for RecordingMetrics {
    fn record_stage(&self, event: StageMetricEvent) {
        self.events.lock().expect("events lock").push(event);
    }

    fn record_latency(&self, event: StageMetricEvent, latency: Duration) {
        self.latencies.lock().expect("latencies lock").push((event, latency));
    }
}

// ============================================================================
// SECTION: Ledger and Fallback
// ============================================================================

/// Ledger that reads as empty and refuses every write.
pub struct BrokenLedger;

impl EvidenceLedger for BrokenLedger {
    fn append(&self, _run: &PipelineRun) -> Result<RecordId, LedgerError> {
        Err(LedgerError::Ledger("disk full".to_string()))
    }

    fn get(&self, _trace_id: &TraceId) -> Result<Option<LedgerEntry>, LedgerError> {
        Ok(None)
    }

    fn list_by_time_range(
        &self,
        _from: Timestamp,
        _to: Timestamp,
    ) -> Result<Vec<LedgerEntry>, LedgerError> {
        Ok(Vec::new())
    }

    fn count(&self) -> Result<u64, LedgerError> {
        Ok(0)
    }
}

/// Fallback sink keeping records in memory.
#[derive(Default)]
pub struct MemoryFallback {
    pub records: Mutex<Vec<EvidenceRecord>>,
}

impl FallbackSink for MemoryFallback {
    fn write(&self, record: &EvidenceRecord) -> Result<String, FallbackError> {
        self.records.lock().unwrap().push(record.clone());
        Ok(format!("memory://{}", record.trace_id))
    }
}

// ============================================================================
// SECTION: Pipeline Assembly
// ============================================================================

/// Default artifacts used by pipeline scenarios.
pub fn default_source() -> StaticSource {
    StaticSource::new(&[("model/weights.bin", b"weights"), ("README.md", b"# readme")])
}

/// Assembles a pipeline over the given collaborators.
pub fn pipeline<S: ArtifactSource, L: EvidenceLedger>(
    source: S,
    checks: Vec<Arc<dyn ValidationCheck>>,
    gate: ScriptedGate,
    publishers: PublisherSet,
    ledger: L,
) -> Pipeline<S, ScriptedGate, L> {
    Pipeline::new(PipelineComponents {
        source,
        builder: builder(),
        runner: TestRunner::default(),
        stage: stage(checks),
        gate: gate_client(gate),
        publishers,
        ledger,
    })
    .with_clock(Arc::new(SteppingClock::new(1_700_000_000_000, 5)))
}

/// Assembles a pipeline with an in-memory ledger.
pub fn memory_pipeline(
    checks: Vec<Arc<dyn ValidationCheck>>,
    gate: ScriptedGate,
    publishers: PublisherSet,
) -> Pipeline<StaticSource, ScriptedGate, InMemoryEvidenceLedger> {
    pipeline(default_source(), checks, gate, publishers, InMemoryEvidenceLedger::new())
}
