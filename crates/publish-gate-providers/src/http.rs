// crates/publish-gate-providers/src/http.rs
// ============================================================================
// Module: HTTP Client Helpers
// Description: Shared blocking HTTP client construction and bounded body reads.
// Purpose: Keep outbound HTTP limits identical across gate and publisher adapters.
// Dependencies: reqwest
// ============================================================================

//! ## Overview
//! Outbound clients never follow redirects, always carry a timeout, and read
//! response bodies through a hard byte limit.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Read;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::Url;
use reqwest::blocking::Client;
use reqwest::blocking::Response;
use reqwest::redirect::Policy;
use serde::Deserialize;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Default request timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
/// Default response size limit in bytes.
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 1024 * 1024;
/// Default user agent.
pub const DEFAULT_USER_AGENT: &str = "publish-gate/0.1";

/// Outbound HTTP settings.
///
/// # Invariants
/// - `allow_http = false` blocks cleartext `http://` URLs.
/// - `max_response_bytes` is a hard upper bound on response bodies.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HttpClientConfig {
    /// Allow cleartext HTTP.
    pub allow_http: bool,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Maximum response size in bytes.
    pub max_response_bytes: usize,
    /// User agent for outbound requests.
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            allow_http: false,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Parses and validates an endpoint URL against the scheme policy.
///
/// # Errors
///
/// Returns a message when the URL is malformed, uses a disallowed scheme, or
/// embeds credentials.
pub fn parse_endpoint(raw: &str, config: &HttpClientConfig) -> Result<Url, String> {
    let url = Url::parse(raw).map_err(|err| format!("invalid url {raw}: {err}"))?;
    match url.scheme() {
        "https" => {}
        "http" if config.allow_http => {}
        scheme => return Err(format!("unsupported url scheme {scheme}")),
    }
    if !url.username().is_empty() || url.password().is_some() {
        return Err("url credentials are not allowed".to_string());
    }
    Ok(url)
}

/// Builds a blocking client with timeout, user agent, and redirects disabled.
///
/// # Errors
///
/// Returns a message when the client cannot be built.
pub fn build_client(config: &HttpClientConfig) -> Result<Client, String> {
    Client::builder()
        .timeout(Duration::from_millis(config.timeout_ms))
        .user_agent(config.user_agent.clone())
        .redirect(Policy::none())
        .build()
        .map_err(|err| format!("http client build failed: {err}"))
}

/// Returns true for statuses worth retrying.
#[must_use]
pub fn is_retryable_status(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
}

/// Reads the response body while enforcing a byte limit.
///
/// # Errors
///
/// Returns a message when the body exceeds the limit, is truncated, or
/// cannot be read.
pub fn read_response_limited(response: &mut Response, max_bytes: usize) -> Result<Vec<u8>, String> {
    let expected_len = response.content_length();
    let max_bytes_u64 =
        u64::try_from(max_bytes).map_err(|_| "response size limit exceeds u64".to_string())?;
    if let Some(expected) = expected_len
        && expected > max_bytes_u64
    {
        return Err("http response exceeds size limit".to_string());
    }
    let mut buf = Vec::new();
    let limit = max_bytes_u64.saturating_add(1);
    let mut handle = response.take(limit);
    handle.read_to_end(&mut buf).map_err(|err| format!("failed to read response: {err}"))?;
    if buf.len() > max_bytes {
        return Err("http response exceeds size limit".to_string());
    }
    if let Some(expected) = expected_len {
        let expected =
            usize::try_from(expected).map_err(|_| "invalid response length".to_string())?;
        if buf.len() < expected {
            return Err("http response truncated".to_string());
        }
    }
    Ok(buf)
}
