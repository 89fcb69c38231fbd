// crates/agent-relay-core/src/core/agent.rs
// ============================================================================
// Module: Agent Relay Agent Model
// Description: Agent identity, lifecycle status, capabilities, and counters.
// Purpose: Define the registry's authoritative agent record and its invariants.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! An [`Agent`] describes one external execution unit: its identity, type tag,
//! lifecycle status, declared capabilities, and running performance counters.
//! Counters are monotone non-decreasing and only the feedback path mutates
//! them; every other consumer works on copies handed out by the registry.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::AgentId;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Smoothing factor for the exponential moving average over latency samples.
pub const LATENCY_EWMA_ALPHA: f64 = 0.1;

/// Default latency normalization reference in milliseconds.
pub const DEFAULT_LATENCY_REFERENCE_MS: f64 = 1_000.0;

// ============================================================================
// SECTION: Agent Type
// ============================================================================

/// Agent type tag from a small open set.
///
/// # Invariants
/// - Known tags serialize as their snake_case labels; unknown tags round-trip
///   through [`AgentType::Other`] without loss.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AgentType {
    /// Natural-language processing agents.
    Nlp,
    /// Text-to-speech agents.
    Tts,
    /// Vision agents.
    Vision,
    /// General-purpose custom agents.
    Custom,
    /// Unrecognized type tag preserved verbatim.
    Other(String),
}

impl AgentType {
    /// Parses a type tag from its wire label.
    ///
    /// Request-side input labels alias onto agent tags: `text` routes to
    /// NLP agents, `speech`/`audio` to TTS, `image` to vision.
    #[must_use]
    pub fn parse(label: &str) -> Self {
        match label {
            "nlp" | "text" => Self::Nlp,
            "tts" | "speech" | "audio" => Self::Tts,
            "vision" | "image" => Self::Vision,
            "custom" => Self::Custom,
            other => Self::Other(other.to_string()),
        }
    }

    /// Returns the stable wire label.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Nlp => "nlp",
            Self::Tts => "tts",
            Self::Vision => "vision",
            Self::Custom => "custom",
            Self::Other(label) => label.as_str(),
        }
    }
}

impl From<String> for AgentType {
    fn from(label: String) -> Self {
        Self::parse(&label)
    }
}

impl From<AgentType> for String {
    fn from(tag: AgentType) -> Self {
        tag.as_str().to_string()
    }
}

// ============================================================================
// SECTION: Agent Status
// ============================================================================

/// Agent lifecycle status.
///
/// # Invariants
/// - Only `Active` agents are visible to candidate selection; all statuses
///   still accept feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    /// Agent accepts routed requests.
    Active,
    /// Agent is administratively disabled.
    Inactive,
    /// Agent is temporarily out of rotation.
    Maintenance,
}

// ============================================================================
// SECTION: Capability
// ============================================================================

/// Declared agent capability with an optional confidence threshold.
///
/// # Invariants
/// - `threshold`, when present, is in `[0, 1]` and gates rule-score matches on
///   the agent's current performance score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capability {
    /// Capability name matched against request requirements.
    pub name: String,
    /// Optional minimum performance score required for the match to count.
    #[serde(default)]
    pub threshold: Option<f64>,
}

impl Capability {
    /// Creates an unconditional capability.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            threshold: None,
        }
    }

    /// Creates a capability gated on a minimum performance score.
    #[must_use]
    pub fn with_threshold(name: impl Into<String>, threshold: f64) -> Self {
        Self {
            name: name.into(),
            threshold: Some(threshold),
        }
    }
}

// ============================================================================
// SECTION: Counters
// ============================================================================

/// Running performance counters for one agent.
///
/// # Invariants
/// - `total_requests >= successful_requests + failed_requests` never fails;
///   the two outcomes partition every counted request.
/// - `success_rate` and `performance_score` stay in `[0, 1]`.
/// - Counters are monotone non-decreasing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct AgentCounters {
    /// Total requests routed to the agent.
    pub total_requests: u64,
    /// Requests that completed successfully.
    pub successful_requests: u64,
    /// Requests that failed.
    pub failed_requests: u64,
    /// Exponential-weighted moving average of observed latency in ms.
    pub average_latency_ms: f64,
    /// Successful fraction of all counted requests.
    pub success_rate: f64,
    /// Blended performance score in `[0, 1]`.
    pub performance_score: f64,
}

impl AgentCounters {
    /// Applies one execution outcome and re-derives the blended score.
    ///
    /// The latency EWMA uses α = [`LATENCY_EWMA_ALPHA`]; the first sample
    /// seeds the average directly.
    pub fn apply(&mut self, outcome: &ExecutionOutcome, latency_reference_ms: f64) {
        self.total_requests = self.total_requests.saturating_add(1);
        if outcome.success {
            self.successful_requests = self.successful_requests.saturating_add(1);
        } else {
            self.failed_requests = self.failed_requests.saturating_add(1);
        }
        let latency = outcome.latency_ms.max(0.0);
        if self.total_requests == 1 {
            self.average_latency_ms = latency;
        } else {
            self.average_latency_ms = LATENCY_EWMA_ALPHA * latency
                + (1.0 - LATENCY_EWMA_ALPHA) * self.average_latency_ms;
        }
        #[allow(clippy::cast_precision_loss, reason = "Counter magnitudes stay far below 2^52.")]
        {
            self.success_rate = self.successful_requests as f64 / self.total_requests as f64;
        }
        self.performance_score = derive_performance_score(
            self.success_rate,
            self.average_latency_ms,
            latency_reference_ms,
        );
    }
}

/// Blends success rate and latency into a bounded performance score.
///
/// The latency factor is `clamp(1 - average / reference, 0, 1)`; the blend
/// weighs rate and latency equally.
#[must_use]
pub fn derive_performance_score(
    success_rate: f64,
    average_latency_ms: f64,
    latency_reference_ms: f64,
) -> f64 {
    let reference = if latency_reference_ms > 0.0 {
        latency_reference_ms
    } else {
        DEFAULT_LATENCY_REFERENCE_MS
    };
    let latency_factor = (1.0 - average_latency_ms / reference).clamp(0.0, 1.0);
    (0.5 * success_rate + 0.5 * latency_factor).clamp(0.0, 1.0)
}

// ============================================================================
// SECTION: Execution Outcome
// ============================================================================

/// Outcome of one dispatched request, as reported by feedback.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    /// Whether the dispatched request succeeded.
    pub success: bool,
    /// Observed end-to-end latency in milliseconds (non-negative).
    pub latency_ms: f64,
}

// ============================================================================
// SECTION: Agent Record
// ============================================================================

/// Authoritative agent record held by the registry.
///
/// # Invariants
/// - Created by administrative action; counters mutated only via feedback.
/// - Never destroyed while referenced by a decision record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    /// Opaque agent identifier.
    pub agent_id: AgentId,
    /// Human-readable agent name.
    pub name: String,
    /// Agent type tag.
    pub agent_type: AgentType,
    /// Lifecycle status.
    pub status: AgentStatus,
    /// Declared capabilities.
    #[serde(default)]
    pub capabilities: Vec<Capability>,
    /// Running performance counters.
    #[serde(default)]
    pub counters: AgentCounters,
}

impl Agent {
    /// Creates an active agent with empty counters.
    #[must_use]
    pub fn new(agent_id: AgentId, name: impl Into<String>, agent_type: AgentType) -> Self {
        Self {
            agent_id,
            name: name.into(),
            agent_type,
            status: AgentStatus::Active,
            capabilities: Vec::new(),
            counters: AgentCounters::default(),
        }
    }

    /// Adds a capability and returns the agent for chained construction.
    #[must_use]
    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capabilities.push(capability);
        self
    }

    /// Returns whether the agent is visible to candidate selection.
    #[must_use]
    pub const fn is_selectable(&self) -> bool {
        matches!(self.status, AgentStatus::Active)
    }
}
