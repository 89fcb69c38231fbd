// crates/agent-relay-core/src/core/decision.rs
// ============================================================================
// Module: Agent Relay Decision Records
// Description: Immutable routing decision artifacts and strategy tags.
// Purpose: Describe one agent selection with its confidence breakdown.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A [`DecisionRecord`] is the immutable, logged artifact describing one
//! selection. It never carries raw request context; context enters the record
//! only as a canonical digest. Alternatives are next-best candidates sorted by
//! confidence and never include the selected agent.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::AgentId;
use crate::core::identifiers::DecisionId;
use crate::core::identifiers::RequestId;

// ============================================================================
// SECTION: Routing Strategy
// ============================================================================

/// Selection strategy applied by the decision engine.
///
/// # Invariants
/// - Labels are stable wire values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RoutingStrategy {
    /// ε-greedy selection over the learned Q-table (default).
    #[default]
    QLearning,
    /// Argmax of the scored confidence.
    PerformanceBased,
    /// Stable per-type rotation.
    RoundRobin,
    /// Uniform random pick.
    Random,
}

impl RoutingStrategy {
    /// Returns the stable wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::QLearning => "q_learning",
            Self::PerformanceBased => "performance_based",
            Self::RoundRobin => "round_robin",
            Self::Random => "random",
        }
    }
}

// ============================================================================
// SECTION: Score Breakdown
// ============================================================================

/// Component scores behind one confidence value.
///
/// # Invariants
/// - Each component is in `[0, 1]` before weighting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct ScoreBreakdown {
    /// Static capability-match score.
    pub rule: f64,
    /// Historical success-rate score.
    pub feedback: f64,
    /// Availability and load score.
    pub availability: f64,
    /// Behavioral karma score (neutral prior when unavailable).
    pub karma: f64,
}

// ============================================================================
// SECTION: Alternatives
// ============================================================================

/// Next-best candidate recorded alongside a decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alternative {
    /// Candidate agent identifier.
    pub agent_id: AgentId,
    /// Candidate confidence in `[0, 1]`.
    pub confidence: f64,
}

// ============================================================================
// SECTION: Decision Record
// ============================================================================

/// Immutable artifact describing one routing selection.
///
/// # Invariants
/// - Exactly one selected agent.
/// - `alternatives` never contains the selected agent and is sorted by
///   descending confidence.
/// - `context_digest` is a canonical hash; raw context is never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    /// Decision identifier.
    pub decision_id: DecisionId,
    /// Request identifier (generated when the caller omitted one).
    pub request_id: RequestId,
    /// RFC 3339 UTC wall timestamp of the decision.
    pub decided_at: String,
    /// Encoded state string fed to the Q-table.
    pub state: String,
    /// Selected agent identifier.
    pub selected_agent: AgentId,
    /// Final bounded confidence in `[0, 1]`.
    pub confidence: f64,
    /// Component breakdown behind the confidence.
    pub breakdown: ScoreBreakdown,
    /// Up to `N_ALTERNATIVES` next-best candidates, confidence-descending.
    pub alternatives: Vec<Alternative>,
    /// Whether this decision took the ε-exploration branch.
    pub exploration: bool,
    /// Strategy that produced the selection.
    pub strategy: RoutingStrategy,
    /// Canonical digest of the request context (never the raw input).
    pub context_digest: String,
}
