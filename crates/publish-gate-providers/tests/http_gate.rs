// crates/publish-gate-providers/tests/http_gate.rs
// ============================================================================
// Module: HTTP Gate Service Tests
// Description: Gate decisions and failure classification against a local server.
// Purpose: Ensure verdicts parse, failures classify, and requests carry the trace id.
// ============================================================================
//! ## Overview
//! Ensure verdicts parse, failures classify, and requests carry the trace id.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

mod common;

use std::thread;
use std::thread::JoinHandle;

use publish_gate_core::GateRequest;
use publish_gate_core::GateService;
use publish_gate_core::GateServiceError;
use publish_gate_core::ServiceDecision;
use publish_gate_core::StageReport;
use publish_gate_core::TraceId;
use publish_gate_core::hashing::DEFAULT_HASH_ALGORITHM;
use publish_gate_core::hashing::hash_bytes;
use publish_gate_providers::HttpClientConfig;
use publish_gate_providers::HttpGateService;
use serde_json::Value;
use tiny_http::Response;
use tiny_http::Server;

use crate::common::TRACE_ID;
use crate::common::local_http;

// ============================================================================
// SECTION: Test Helpers
// ============================================================================

/// Request observed by the test server.
struct Captured {
    idempotency_key: Option<String>,
    body: String,
}

/// Serves one request with the given status and body.
fn serve_once(status: u16, body: &'static str) -> (String, JoinHandle<Captured>) {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    let handle = thread::spawn(move || {
        let mut request = server.recv().unwrap();
        let idempotency_key = request
            .headers()
            .iter()
            .find(|header| header.field.equiv("Idempotency-Key"))
            .map(|header| header.value.as_str().to_string());
        let mut received = String::new();
        request.as_reader().read_to_string(&mut received).unwrap();
        let response = Response::from_string(body).with_status_code(status);
        request.respond(response).unwrap();
        Captured {
            idempotency_key,
            body: received,
        }
    });
    (format!("http://{addr}/decide"), handle)
}

/// Builds a gate request for a fixed trace.
fn gate_request() -> GateRequest {
    GateRequest {
        trace_id: TraceId::parse(TRACE_ID).unwrap(),
        manifest_digest: hash_bytes(DEFAULT_HASH_ALGORITHM, b"manifest"),
        signature: "c2lnbmF0dXJl".to_string(),
        stage_report: StageReport::from_results("validation", Vec::new()),
    }
}

// ============================================================================
// SECTION: Decisions
// ============================================================================

#[test]
fn pass_verdict_parses_and_request_carries_trace_key() {
    let (url, handle) = serve_once(200, r#"{"verdict":"PASS","reason":"all clear"}"#);
    let gate = HttpGateService::new(&url, local_http()).unwrap();
    let response = gate.decide(&gate_request()).unwrap();
    let captured = handle.join().unwrap();

    assert_eq!(response.verdict, ServiceDecision::Pass);
    assert_eq!(response.reason, "all clear");
    assert_eq!(captured.idempotency_key.as_deref(), Some(TRACE_ID));
    let body: Value = serde_json::from_str(&captured.body).unwrap();
    assert_eq!(body["traceId"], TRACE_ID);
    assert_eq!(body["stageReport"]["overall"], "PASS");
}

#[test]
fn silence_verdict_is_returned_verbatim() {
    let (url, handle) = serve_once(200, r#"{"verdict":"SILENCE"}"#);
    let gate = HttpGateService::new(&url, local_http()).unwrap();
    let response = gate.decide(&gate_request()).unwrap();
    handle.join().unwrap();
    assert_eq!(response.verdict, ServiceDecision::Silence);
}

// ============================================================================
// SECTION: Failure Classification
// ============================================================================

#[test]
fn server_errors_are_transient() {
    let (url, handle) = serve_once(503, "busy");
    let gate = HttpGateService::new(&url, local_http()).unwrap();
    let result = gate.decide(&gate_request());
    handle.join().unwrap();
    assert!(matches!(result, Err(GateServiceError::Transient(_))));
}

#[test]
fn client_errors_are_permanent() {
    let (url, handle) = serve_once(400, "bad request");
    let gate = HttpGateService::new(&url, local_http()).unwrap();
    let result = gate.decide(&gate_request());
    handle.join().unwrap();
    assert!(matches!(result, Err(GateServiceError::Permanent(_))));
}

#[test]
fn unknown_verdict_is_permanent_not_a_decision() {
    let (url, handle) = serve_once(200, r#"{"verdict":"MAYBE"}"#);
    let gate = HttpGateService::new(&url, local_http()).unwrap();
    let result = gate.decide(&gate_request());
    handle.join().unwrap();
    assert!(matches!(result, Err(GateServiceError::Permanent(_))));
}

#[test]
fn unreachable_gate_is_transient() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let gate = HttpGateService::new(&format!("http://{addr}/decide"), local_http()).unwrap();
    assert!(matches!(gate.decide(&gate_request()), Err(GateServiceError::Transient(_))));
}

#[test]
fn cleartext_endpoint_requires_opt_in() {
    let result = HttpGateService::new("http://gate.internal/decide", HttpClientConfig::default());
    assert!(matches!(result, Err(GateServiceError::Permanent(_))));
    let result =
        HttpGateService::new("https://user:pw@gate.internal/decide", HttpClientConfig::default());
    assert!(matches!(result, Err(GateServiceError::Permanent(_))));
}
