// crates/agent-relay-core/src/core/feedback.rs
// ============================================================================
// Module: Agent Relay Feedback Events
// Description: Post-execution outcome reports referencing decision records.
// Purpose: Carry the observed result of one dispatched request to the learner.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A [`FeedbackEvent`] reports what actually happened after a decision was
//! dispatched. Exactly one event per feedback identifier ever reaches the
//! learner; the processor treats duplicates as counted no-ops.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::identifiers::DecisionId;
use crate::core::identifiers::FeedbackId;

// ============================================================================
// SECTION: Feedback Event
// ============================================================================

/// Post-execution feedback for one decision.
///
/// # Invariants
/// - `latency_ms >= 0`.
/// - `accuracy`, when present, is in `[0, 1]`.
/// - `user_satisfaction`, when present, is in `{1..5}`.
/// - At most one event per `feedback_id` is applied to the learner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackEvent {
    /// Feedback identifier used for idempotent application.
    pub feedback_id: FeedbackId,
    /// Referenced decision record.
    pub decision_id: DecisionId,
    /// Whether the dispatched request succeeded.
    pub success: bool,
    /// Observed end-to-end latency in milliseconds.
    pub latency_ms: f64,
    /// Optional task accuracy in `[0, 1]`.
    #[serde(default)]
    pub accuracy: Option<f64>,
    /// Optional user satisfaction rating in `{1..5}`.
    #[serde(default)]
    pub user_satisfaction: Option<u8>,
    /// Optional structured error code for failures.
    #[serde(default)]
    pub error_code: Option<String>,
    /// RFC 3339 UTC wall timestamp of the observation.
    pub observed_at: String,
    /// Optional transition context for the successor state.
    ///
    /// When present, the learner encodes the successor state from this map;
    /// when absent, the decision's own state is reused.
    #[serde(default)]
    pub transition: Option<BTreeMap<String, Value>>,
}
