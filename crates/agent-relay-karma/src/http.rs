// crates/agent-relay-karma/src/http.rs
// ============================================================================
// Module: HTTP Karma Source
// Description: Bounded HTTP resolver for the external karma service.
// Purpose: Classify HTTP outcomes into typed retry decisions.
// Dependencies: agent-relay-core, reqwest, serde_json
// ============================================================================

//! ## Overview
//! The HTTP source issues one bounded GET per fetch and maps outcomes onto
//! the typed classification: transport errors and 5xx responses are
//! transient, 4xx responses and malformed payloads are permanent. Responses
//! are size-limited and redirects are not followed; the upstream is an
//! external system whose payloads are untrusted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Read;
use std::time::Duration;

use agent_relay_core::AgentId;
use reqwest::blocking::Client;
use reqwest::redirect::Policy;
use serde::Deserialize;

use crate::source::KarmaFetchError;
use crate::source::KarmaSource;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Configuration for the HTTP karma source.
///
/// # Invariants
/// - `timeout_ms` applies to the full request lifecycle.
/// - `max_response_bytes` is a hard upper bound on response bodies.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HttpKarmaConfig {
    /// Base URL of the karma service.
    pub base_url: String,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Maximum response size allowed, in bytes.
    pub max_response_bytes: usize,
    /// User agent string for outbound requests.
    pub user_agent: String,
}

impl Default for HttpKarmaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:9090".to_string(),
            timeout_ms: 2_000,
            max_response_bytes: 64 * 1024,
            user_agent: "agent-relay/0.1".to_string(),
        }
    }
}

// ============================================================================
// SECTION: Wire Shape
// ============================================================================

/// Upstream karma response body.
#[derive(Debug, Deserialize)]
struct KarmaResponse {
    /// Behavioral score in `[0, 1]`.
    score: f64,
}

// ============================================================================
// SECTION: Source Implementation
// ============================================================================

/// HTTP-backed karma source.
///
/// # Invariants
/// - Redirects are not followed.
/// - Responses exceeding the configured limit fail closed as permanent.
pub struct HttpKarmaSource {
    /// Source configuration.
    config: HttpKarmaConfig,
    /// HTTP client used for outbound requests.
    client: Client,
}

impl HttpKarmaSource {
    /// Creates an HTTP karma source.
    ///
    /// # Errors
    ///
    /// Returns [`KarmaFetchError::Permanent`] when the HTTP client cannot be
    /// created.
    pub fn new(config: HttpKarmaConfig) -> Result<Self, KarmaFetchError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .redirect(Policy::none())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|err| KarmaFetchError::Permanent(err.to_string()))?;
        Ok(Self {
            config,
            client,
        })
    }
}

impl KarmaSource for HttpKarmaSource {
    fn fetch(&self, agent_id: &AgentId) -> Result<f64, KarmaFetchError> {
        let url = format!(
            "{}/agents/{}/karma",
            self.config.base_url.trim_end_matches('/'),
            agent_id
        );
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|err| KarmaFetchError::Transient(err.to_string()))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(KarmaFetchError::Transient(format!("upstream returned {status}")));
        }
        if !status.is_success() {
            return Err(KarmaFetchError::Permanent(format!("upstream returned {status}")));
        }

        let body = read_limited(response, self.config.max_response_bytes)?;
        let parsed: KarmaResponse = serde_json::from_slice(&body)
            .map_err(|err| KarmaFetchError::Permanent(format!("malformed karma body: {err}")))?;
        if !parsed.score.is_finite() {
            return Err(KarmaFetchError::Permanent("non-finite karma score".to_string()));
        }
        Ok(parsed.score.clamp(0.0, 1.0))
    }
}

// ============================================================================
// SECTION: Response Limits
// ============================================================================

/// Reads a response body up to the configured byte limit.
fn read_limited(
    response: reqwest::blocking::Response,
    max_bytes: usize,
) -> Result<Vec<u8>, KarmaFetchError> {
    let mut body = Vec::new();
    let limit = u64::try_from(max_bytes).unwrap_or(u64::MAX);
    response
        .take(limit.saturating_add(1))
        .read_to_end(&mut body)
        .map_err(|err| KarmaFetchError::Transient(err.to_string()))?;
    if body.len() > max_bytes {
        return Err(KarmaFetchError::Permanent("karma response exceeds size limit".to_string()));
    }
    Ok(body)
}
