// crates/agent-relay-karma/src/source.rs
// ============================================================================
// Module: Karma Source
// Description: Typed fetch interface for upstream karma services.
// Purpose: Classify upstream failures as transient or permanent.
// Dependencies: agent-relay-core, thiserror
// ============================================================================

//! ## Overview
//! A [`KarmaSource`] resolves one agent's behavioral score. Failures carry
//! their retry classification in the type: [`KarmaFetchError::Transient`]
//! outcomes are retried with backoff, [`KarmaFetchError::Permanent`] outcomes
//! end the attempt immediately. Exceptions-as-control-flow are deliberately
//! absent from this seam.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Mutex;

use agent_relay_core::AgentId;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Typed upstream fetch outcome.
///
/// # Invariants
/// - Variants are stable for programmatic handling; classification decides
///   retry behavior.
#[derive(Debug, Error)]
pub enum KarmaFetchError {
    /// Retryable failure (network, timeout, upstream 5xx).
    #[error("transient karma failure: {0}")]
    Transient(String),
    /// Non-retryable failure (upstream 4xx, malformed payload).
    #[error("permanent karma failure: {0}")]
    Permanent(String),
}

// ============================================================================
// SECTION: Source Trait
// ============================================================================

/// Upstream resolver for per-agent karma scores.
pub trait KarmaSource: Send + Sync {
    /// Fetches the agent's karma score in `[0, 1]`.
    ///
    /// # Errors
    ///
    /// Returns [`KarmaFetchError`] classified for retry handling.
    fn fetch(&self, agent_id: &AgentId) -> Result<f64, KarmaFetchError>;
}

// ============================================================================
// SECTION: Static Source
// ============================================================================

/// Fixed-score source for tests and local wiring.
#[derive(Debug, Default)]
pub struct StaticKarmaSource {
    /// Scores per agent; missing agents fetch as permanent failures.
    scores: Mutex<BTreeMap<AgentId, f64>>,
}

impl StaticKarmaSource {
    /// Creates an empty static source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets one agent's score.
    pub fn set(&self, agent_id: AgentId, score: f64) {
        if let Ok(mut guard) = self.scores.lock() {
            guard.insert(agent_id, score.clamp(0.0, 1.0));
        }
    }

    /// Removes one agent's score.
    pub fn remove(&self, agent_id: &AgentId) {
        if let Ok(mut guard) = self.scores.lock() {
            guard.remove(agent_id);
        }
    }
}

impl KarmaSource for StaticKarmaSource {
    fn fetch(&self, agent_id: &AgentId) -> Result<f64, KarmaFetchError> {
        self.scores
            .lock()
            .map_err(|_| KarmaFetchError::Transient("score table lock poisoned".to_string()))?
            .get(agent_id)
            .copied()
            .ok_or_else(|| KarmaFetchError::Permanent(format!("no karma for {agent_id}")))
    }
}
