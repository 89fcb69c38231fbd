// crates/agent-relay-core/src/runtime/feedback_processor.rs
// ============================================================================
// Module: Agent Relay Feedback Processor
// Description: Feedback intake, reward application, and policy-update emission.
// Purpose: Close the learning loop from observed outcomes to Q-values.
// Dependencies: agent-relay-stp, crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! The feedback processor is the only writer of agent counters and Q-values.
//! For each accepted event it updates the winning agent's counters, applies
//! the shaped (optionally karma-smoothed) reward, feeds the karma drift
//! observer, emits a signed policy-update packet, and decays ε by one step.
//! Application is idempotent per feedback identifier: a duplicate is a counted
//! no-op that mutates nothing and emits nothing.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use agent_relay_stp::PacketType;
use agent_relay_stp::Sealer;
use agent_relay_stp::feedback_priority;
use lru::LruCache;
use serde_json::Value;
use serde_json::json;

use crate::core::agent::ExecutionOutcome;
use crate::core::feedback::FeedbackEvent;
use crate::core::identifiers::FeedbackId;
use crate::core::state::LoadBucket;
use crate::core::state::encode_state;
use crate::core::time::Clock;
use crate::core::time::TimeBucket;
use crate::interfaces::FeedbackError;
use crate::interfaces::KarmaProvider;
use crate::interfaces::QTableStore;
use crate::interfaces::TelemetryPublisher;
use crate::runtime::engine::DecisionIndex;
use crate::runtime::metrics::RelayMetrics;
use crate::runtime::qlearn::QLearningUpdater;
use crate::runtime::qlearn::QUpdate;
use crate::runtime::qlearn::compute_reward;
use crate::runtime::qlearn::smooth_reward;
use crate::runtime::registry::AgentRegistry;

// ============================================================================
// SECTION: Acknowledgement
// ============================================================================

/// Acknowledgement returned to the feedback caller.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackAck {
    /// Referenced decision identifier.
    pub decision_id: crate::core::identifiers::DecisionId,
    /// Applied (possibly smoothed) reward.
    pub reward: f64,
    /// Q-value movement produced by the update.
    pub q_update: QUpdate,
    /// Exploration rate after the decay step.
    pub epsilon: f64,
}

// ============================================================================
// SECTION: Processor
// ============================================================================

/// Closes the feedback loop over injected collaborators.
pub struct FeedbackProcessor {
    /// Agent registry (sole counter writer).
    registry: Arc<AgentRegistry>,
    /// Q-table and exploration schedule.
    updater: Arc<QLearningUpdater>,
    /// Durable Q-table store driven by the save triggers.
    qstore: Arc<dyn QTableStore>,
    /// Karma provider fed with performance observations.
    karma: Arc<dyn KarmaProvider>,
    /// Telemetry publisher (best-effort).
    publisher: Arc<dyn TelemetryPublisher>,
    /// Packet sealer for policy-update packets.
    sealer: Arc<Sealer>,
    /// Injected wall clock.
    clock: Arc<dyn Clock>,
    /// Shared runtime metrics.
    metrics: Arc<RelayMetrics>,
    /// Recent-decision index written by the decision engine.
    index: Arc<DecisionIndex>,
    /// Applied feedback identifiers for idempotence.
    seen: Mutex<LruCache<FeedbackId, ()>>,
    /// Whether karma lookups and smoothing are enabled.
    karma_enabled: Arc<AtomicBool>,
    /// Aggregate in-flight gauge shared with the decision engine.
    in_flight: Arc<AtomicU64>,
}

impl FeedbackProcessor {
    /// Creates a feedback processor.
    #[allow(clippy::too_many_arguments, reason = "Composition root wires every collaborator once.")]
    #[must_use]
    pub fn new(
        registry: Arc<AgentRegistry>,
        updater: Arc<QLearningUpdater>,
        qstore: Arc<dyn QTableStore>,
        karma: Arc<dyn KarmaProvider>,
        publisher: Arc<dyn TelemetryPublisher>,
        sealer: Arc<Sealer>,
        clock: Arc<dyn Clock>,
        metrics: Arc<RelayMetrics>,
        index: Arc<DecisionIndex>,
        karma_enabled: Arc<AtomicBool>,
        in_flight: Arc<AtomicU64>,
        seen_capacity: usize,
    ) -> Self {
        let capacity = NonZeroUsize::new(seen_capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            registry,
            updater,
            qstore,
            karma,
            publisher,
            sealer,
            clock,
            metrics,
            index,
            seen: Mutex::new(LruCache::new(capacity)),
            karma_enabled,
            in_flight,
        }
    }

    /// Applies one feedback event to the learner.
    ///
    /// # Errors
    ///
    /// Returns [`FeedbackError::DuplicateFeedback`] for an already-applied
    /// event (counted no-op) and [`FeedbackError::NotFound`] for an unknown
    /// decision. Karma outages and persistence failures never fail the call.
    pub fn process(&self, event: &FeedbackEvent) -> Result<FeedbackAck, FeedbackError> {
        if self.already_seen(&event.feedback_id) {
            self.metrics.record_duplicate_feedback();
            return Err(FeedbackError::DuplicateFeedback(event.feedback_id.to_string()));
        }
        let Some(decision) = self.index.get(&event.decision_id) else {
            self.metrics.record_feedback_not_found();
            return Err(FeedbackError::NotFound(event.decision_id.to_string()));
        };

        let previous_performance = self
            .registry
            .get(&decision.agent_id)
            .map(|agent| agent.counters.performance_score)?;
        let outcome = ExecutionOutcome {
            success: event.success,
            latency_ms: event.latency_ms.max(0.0),
        };
        let counters = self.registry.update_counters(&decision.agent_id, &outcome)?;

        let karma_on = self.karma_enabled.load(Ordering::Relaxed);
        let cached_karma = if karma_on {
            self.karma.karma(&decision.agent_id)
        } else {
            None
        };
        let raw_reward = compute_reward(event);
        let reward = match cached_karma {
            Some(karma) if self.updater.config().karma_smoothing => {
                smooth_reward(raw_reward, karma)
            }
            _ => raw_reward,
        };

        let next_state = event.transition.as_ref().map(|context| {
            let input_type = input_type_of(&decision.state);
            encode_state(
                input_type,
                context,
                LoadBucket::from_in_flight(self.in_flight.load(Ordering::Relaxed)),
                TimeBucket::from_time(self.clock.now_utc()),
            )
        });
        let q_update = self.updater.apply_reward(
            &decision.state,
            &decision.agent_id,
            reward,
            next_state.as_deref(),
        );

        self.karma.observe_performance(&decision.agent_id, counters.performance_score);
        self.emit_policy_update(
            event,
            &decision.agent_id,
            reward,
            raw_reward,
            q_update,
            counters.performance_score - previous_performance,
        );
        let epsilon = self.updater.decay_epsilon();

        if self.updater.save_if_due(self.qstore.as_ref()).is_err() {
            self.metrics.record_internal_error();
        }

        self.mark_seen(event.feedback_id.clone());
        self.metrics.record_feedback_applied();
        Ok(FeedbackAck {
            decision_id: event.decision_id.clone(),
            reward,
            q_update,
            epsilon,
        })
    }

    /// Best-effort emission of the signed policy-update packet.
    fn emit_policy_update(
        &self,
        event: &FeedbackEvent,
        agent_id: &crate::core::identifiers::AgentId,
        reward: f64,
        raw_reward: f64,
        q_update: QUpdate,
        confidence_delta: f64,
    ) {
        let payload = json!({
            "decision_id": event.decision_id,
            "feedback_id": event.feedback_id,
            "agent_id": agent_id,
            "reward": reward,
            "q_previous": q_update.previous,
            "q_updated": q_update.updated,
            "q_delta": q_update.updated - q_update.previous,
            "confidence_delta": confidence_delta,
            "karma_delta": reward - raw_reward,
            "strategy_change": Value::Null,
        });
        let priority = feedback_priority(event.success, event.latency_ms);
        match self.sealer.wrap(
            PacketType::PolicyUpdate,
            priority,
            false,
            payload,
            self.clock.now_utc(),
        ) {
            Ok(packet) => {
                if self.publisher.publish(packet).is_err() {
                    self.metrics.record_publish_failure();
                }
            }
            Err(_) => self.metrics.record_publish_failure(),
        }
    }

    /// Returns whether the feedback identifier was already applied.
    fn already_seen(&self, feedback_id: &FeedbackId) -> bool {
        self.seen.lock().is_ok_and(|guard| guard.contains(feedback_id))
    }

    /// Marks a feedback identifier as applied.
    fn mark_seen(&self, feedback_id: FeedbackId) {
        if let Ok(mut guard) = self.seen.lock() {
            guard.put(feedback_id, ());
        }
    }
}

// ============================================================================
// SECTION: State Helpers
// ============================================================================

/// Extracts the input-type fragment from an encoded state.
fn input_type_of(state: &str) -> &str {
    state
        .split('|')
        .find_map(|fragment| fragment.strip_prefix("input_type:"))
        .unwrap_or("custom")
}
