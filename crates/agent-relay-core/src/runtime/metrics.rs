// crates/agent-relay-core/src/runtime/metrics.rs
// ============================================================================
// Module: Agent Relay Runtime Metrics
// Description: Atomic counters for decisions, feedback, and recovered faults.
// Purpose: Expose a serializable health view without metric dependencies.
// Dependencies: crate::interfaces, serde, std
// ============================================================================

//! ## Overview
//! Every error kind in the relay increments a dedicated counter here; none of
//! the best-effort paths (telemetry, log append, karma) ever fail a decision,
//! so these counters are the only place those faults surface. The snapshot
//! feeds the health packet and the derived failure rate drives the
//! healthy/degraded/unhealthy classification.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use serde::Deserialize;
use serde::Serialize;

use crate::interfaces::RelayHealth;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Failure-rate threshold for the degraded classification.
pub const DEGRADED_FAILURE_RATE: f64 = 0.10;

/// Failure-rate threshold for the unhealthy classification.
pub const UNHEALTHY_FAILURE_RATE: f64 = 0.25;

// ============================================================================
// SECTION: Snapshot
// ============================================================================

/// Serializable point-in-time view of the runtime counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayMetricsSnapshot {
    /// Decisions returned to callers.
    pub decisions_total: u64,
    /// Decisions that took the ε-exploration branch.
    pub explorations: u64,
    /// Requests rejected for lack of eligible agents.
    pub no_eligible_agent: u64,
    /// Decisions aborted on deadline.
    pub decision_timeouts: u64,
    /// Candidates excluded after a scoring panic.
    pub scoring_panics: u64,
    /// Best-effort decision-log appends that failed.
    pub log_append_failures: u64,
    /// Best-effort telemetry publications that failed.
    pub telemetry_publish_failures: u64,
    /// Feedback events applied to the learner.
    pub feedback_applied: u64,
    /// Feedback events rejected as duplicates.
    pub duplicate_feedback: u64,
    /// Feedback events referencing unknown decisions.
    pub feedback_not_found: u64,
    /// Q-table load attempts that fell back to an empty table.
    pub qtable_load_warnings: u64,
    /// Recovered internal faults.
    pub internal_errors: u64,
}

// ============================================================================
// SECTION: Metrics
// ============================================================================

/// Atomic runtime counters shared by the engines.
#[derive(Debug, Default)]
pub struct RelayMetrics {
    /// Decisions returned to callers.
    decisions_total: AtomicU64,
    /// Decisions that took the ε-exploration branch.
    explorations: AtomicU64,
    /// Requests rejected for lack of eligible agents.
    no_eligible_agent: AtomicU64,
    /// Decisions aborted on deadline.
    decision_timeouts: AtomicU64,
    /// Candidates excluded after a scoring panic.
    scoring_panics: AtomicU64,
    /// Best-effort decision-log appends that failed.
    log_append_failures: AtomicU64,
    /// Best-effort telemetry publications that failed.
    telemetry_publish_failures: AtomicU64,
    /// Feedback events applied to the learner.
    feedback_applied: AtomicU64,
    /// Feedback events rejected as duplicates.
    duplicate_feedback: AtomicU64,
    /// Feedback events referencing unknown decisions.
    feedback_not_found: AtomicU64,
    /// Q-table load attempts that fell back to an empty table.
    qtable_load_warnings: AtomicU64,
    /// Recovered internal faults.
    internal_errors: AtomicU64,
}

impl RelayMetrics {
    /// Creates zeroed metrics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a returned decision.
    pub fn record_decision(&self, exploration: bool) {
        self.decisions_total.fetch_add(1, Ordering::Relaxed);
        if exploration {
            self.explorations.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Records an empty candidate set.
    pub fn record_no_eligible_agent(&self) {
        self.no_eligible_agent.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a decision deadline expiry.
    pub fn record_decision_timeout(&self) {
        self.decision_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a candidate excluded by a scoring panic.
    pub fn record_scoring_panic(&self) {
        self.scoring_panics.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a failed best-effort log append.
    pub fn record_log_append_failure(&self) {
        self.log_append_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a failed best-effort telemetry publication.
    pub fn record_publish_failure(&self) {
        self.telemetry_publish_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Records an applied feedback event.
    pub fn record_feedback_applied(&self) {
        self.feedback_applied.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a duplicate feedback no-op.
    pub fn record_duplicate_feedback(&self) {
        self.duplicate_feedback.fetch_add(1, Ordering::Relaxed);
    }

    /// Records feedback referencing an unknown decision.
    pub fn record_feedback_not_found(&self) {
        self.feedback_not_found.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a Q-table load falling back to empty.
    pub fn record_qtable_load_warning(&self) {
        self.qtable_load_warnings.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a recovered internal fault.
    pub fn record_internal_error(&self) {
        self.internal_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a point-in-time snapshot.
    #[must_use]
    pub fn snapshot(&self) -> RelayMetricsSnapshot {
        RelayMetricsSnapshot {
            decisions_total: self.decisions_total.load(Ordering::Relaxed),
            explorations: self.explorations.load(Ordering::Relaxed),
            no_eligible_agent: self.no_eligible_agent.load(Ordering::Relaxed),
            decision_timeouts: self.decision_timeouts.load(Ordering::Relaxed),
            scoring_panics: self.scoring_panics.load(Ordering::Relaxed),
            log_append_failures: self.log_append_failures.load(Ordering::Relaxed),
            telemetry_publish_failures: self.telemetry_publish_failures.load(Ordering::Relaxed),
            feedback_applied: self.feedback_applied.load(Ordering::Relaxed),
            duplicate_feedback: self.duplicate_feedback.load(Ordering::Relaxed),
            feedback_not_found: self.feedback_not_found.load(Ordering::Relaxed),
            qtable_load_warnings: self.qtable_load_warnings.load(Ordering::Relaxed),
            internal_errors: self.internal_errors.load(Ordering::Relaxed),
        }
    }

    /// Returns the operational failure rate over all served operations.
    #[must_use]
    pub fn failure_rate(&self) -> f64 {
        let snapshot = self.snapshot();
        let failures = snapshot.decision_timeouts
            + snapshot.log_append_failures
            + snapshot.telemetry_publish_failures
            + snapshot.internal_errors;
        let total = snapshot.decisions_total + snapshot.feedback_applied + failures;
        if total == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss, reason = "Counter magnitudes stay far below 2^52.")]
        let rate = failures as f64 / total as f64;
        rate
    }

    /// Classifies relay health from the derived failure rate.
    #[must_use]
    pub fn classify(&self) -> RelayHealth {
        let rate = self.failure_rate();
        if rate >= UNHEALTHY_FAILURE_RATE {
            RelayHealth::Unhealthy
        } else if rate >= DEGRADED_FAILURE_RATE {
            RelayHealth::Degraded
        } else {
            RelayHealth::Healthy
        }
    }
}
