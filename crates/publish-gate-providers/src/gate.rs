// crates/publish-gate-providers/src/gate.rs
// ============================================================================
// Module: HTTP Gate Service
// Description: Admissibility gate client over HTTPS.
// Purpose: Submit gate requests and classify failures for the retrying client.
// Dependencies: publish-gate-core, reqwest, serde_json, tracing
// ============================================================================

//! ## Overview
//! [`HttpGateService`] POSTs the canonical gate request as JSON with the trace
//! id in an `Idempotency-Key` header. Connection failures, timeouts, `408`,
//! `429`, and `5xx` are transient; other non-success statuses and malformed
//! bodies are permanent. Neither is ever turned into a verdict here.

// ============================================================================
// SECTION: Imports
// ============================================================================

use publish_gate_core::GateRequest;
use publish_gate_core::GateResponse;
use publish_gate_core::GateService;
use publish_gate_core::GateServiceError;
use publish_gate_core::hashing::canonical_json_bytes;
use reqwest::Url;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use tracing::debug;

use crate::http::HttpClientConfig;
use crate::http::build_client;
use crate::http::is_retryable_status;
use crate::http::parse_endpoint;
use crate::http::read_response_limited;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Header carrying the idempotency key.
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

// ============================================================================
// SECTION: Service
// ============================================================================

/// HTTP-backed admissibility gate.
pub struct HttpGateService {
    /// Decision endpoint.
    endpoint: Url,
    /// Client settings.
    config: HttpClientConfig,
    /// Blocking client.
    client: Client,
}

impl HttpGateService {
    /// Creates a gate service for the endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`GateServiceError::Permanent`] when the endpoint or client is
    /// invalid.
    pub fn new(endpoint: &str, config: HttpClientConfig) -> Result<Self, GateServiceError> {
        let endpoint = parse_endpoint(endpoint, &config).map_err(GateServiceError::Permanent)?;
        let client = build_client(&config).map_err(GateServiceError::Permanent)?;
        Ok(Self {
            endpoint,
            config,
            client,
        })
    }

    /// Returns the decision endpoint.
    #[must_use]
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl GateService for HttpGateService {
    fn decide(&self, request: &GateRequest) -> Result<GateResponse, GateServiceError> {
        let body = canonical_json_bytes(request)
            .map_err(|err| GateServiceError::Permanent(err.to_string()))?;
        let mut response = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(IDEMPOTENCY_HEADER, request.trace_id.as_str())
            .body(body)
            .send()
            .map_err(|err| GateServiceError::Transient(format!("gate request failed: {err}")))?;

        let status = response.status();
        debug!(trace_id = %request.trace_id, status = status.as_u16(), "gate responded");
        if !status.is_success() {
            let message = format!("gate returned HTTP {}", status.as_u16());
            return Err(if is_retryable_status(status) {
                GateServiceError::Transient(message)
            } else {
                GateServiceError::Permanent(message)
            });
        }
        let bytes = read_response_limited(&mut response, self.config.max_response_bytes)
            .map_err(GateServiceError::Transient)?;
        serde_json::from_slice(&bytes)
            .map_err(|err| GateServiceError::Permanent(format!("malformed gate response: {err}")))
    }
}
