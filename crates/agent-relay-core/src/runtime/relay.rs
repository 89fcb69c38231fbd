// crates/agent-relay-core/src/runtime/relay.rs
// ============================================================================
// Module: Agent Relay Composition Root
// Description: Wires registry, scoring, learner, engines, and collaborators.
// Purpose: Expose the decide/feedback/health/admin contract to transports.
// Dependencies: agent-relay-stp, crate::core, crate::interfaces, crate::runtime
// ============================================================================

//! ## Overview
//! [`RelayCore`] is the single composition root: every component receives its
//! collaborators here and nothing reaches for ambient singletons. Transports
//! bind the public operations (`decide`, `apply_feedback`, `health`, admin
//! toggles) without touching component internals; tests swap the injected
//! trait objects for fakes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use agent_relay_stp::EnvelopeMetricsSnapshot;
use agent_relay_stp::HealthStatus;
use agent_relay_stp::PacketType;
use agent_relay_stp::Sealer;
use agent_relay_stp::health_priority;
use serde::Deserialize;
use serde::Serialize;

use crate::core::agent::Agent;
use crate::core::agent::AgentStatus;
use crate::core::decision::DecisionRecord;
use crate::core::feedback::FeedbackEvent;
use crate::core::identifiers::AgentId;
use crate::core::time::Clock;
use crate::core::time::to_rfc3339;
use crate::interfaces::DecisionSink;
use crate::interfaces::EngineError;
use crate::interfaces::FeedbackError;
use crate::interfaces::KarmaProvider;
use crate::interfaces::QTableStore;
use crate::interfaces::RegistryError;
use crate::interfaces::RelayHealth;
use crate::interfaces::StoreError;
use crate::interfaces::TelemetryPublisher;
use crate::runtime::engine::DecisionEngine;
use crate::runtime::engine::DecisionIndex;
use crate::runtime::engine::DecisionRequest;
use crate::runtime::engine::EngineConfig;
use crate::runtime::feedback_processor::FeedbackAck;
use crate::runtime::feedback_processor::FeedbackProcessor;
use crate::runtime::metrics::RelayMetrics;
use crate::runtime::metrics::RelayMetricsSnapshot;
use crate::runtime::qlearn::QLearningConfig;
use crate::runtime::qlearn::QLearningUpdater;
use crate::runtime::registry::AgentRegistry;
use crate::runtime::registry::RegistryConfig;
use crate::runtime::scoring::ScoreWeights;
use crate::runtime::scoring::ScoringConfig;
use crate::runtime::scoring::ScoringEngine;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Aggregate configuration for the composition root.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RelayCoreConfig {
    /// Decision engine configuration.
    pub engine: EngineConfig,
    /// Scoring engine configuration.
    pub scoring: ScoringConfig,
    /// Registry configuration.
    pub registry: RegistryConfig,
    /// Q-learning configuration.
    pub qlearning: QLearningConfig,
    /// Whether karma starts enabled.
    pub karma_enabled: bool,
}

impl RelayCoreConfig {
    /// Returns a default configuration with karma enabled.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self {
            karma_enabled: true,
            ..Self::default()
        }
    }
}

// ============================================================================
// SECTION: Health Report
// ============================================================================

/// Point-in-time health view returned by the health operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    /// Overall classification.
    pub status: RelayHealth,
    /// Runtime counters.
    pub metrics: RelayMetricsSnapshot,
    /// Envelope counters.
    pub envelope: EnvelopeMetricsSnapshot,
    /// Current exploration rate.
    pub epsilon: f64,
    /// Stored state-action entries.
    pub q_entries: usize,
    /// Registered agents.
    pub agents: usize,
    /// RFC 3339 UTC generation timestamp.
    pub generated_at: String,
}

// ============================================================================
// SECTION: Relay Core
// ============================================================================

/// Composition root exposing the relay's public contract.
pub struct RelayCore {
    /// Agent registry.
    registry: Arc<AgentRegistry>,
    /// Confidence scorer.
    scoring: Arc<ScoringEngine>,
    /// Q-table and exploration schedule.
    updater: Arc<QLearningUpdater>,
    /// Durable Q-table store.
    qstore: Arc<dyn QTableStore>,
    /// Decision and alert record sink.
    sink: Arc<dyn DecisionSink>,
    /// Karma provider.
    karma: Arc<dyn KarmaProvider>,
    /// Packet sealer shared by both emission paths.
    sealer: Arc<Sealer>,
    /// Telemetry publisher.
    publisher: Arc<dyn TelemetryPublisher>,
    /// Injected wall clock.
    clock: Arc<dyn Clock>,
    /// Shared runtime metrics.
    metrics: Arc<RelayMetrics>,
    /// Decision pipeline.
    engine: DecisionEngine,
    /// Feedback pipeline.
    processor: FeedbackProcessor,
    /// Karma enablement toggle shared by both pipelines.
    karma_enabled: Arc<AtomicBool>,
}

impl RelayCore {
    /// Wires the relay from its injected collaborators.
    ///
    /// The persisted Q-table is loaded best-effort: an absent or unreadable
    /// file yields an empty table and a counted warning, never an abort.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] when any component configuration is
    /// invalid; configuration never fails later at use.
    #[allow(clippy::too_many_arguments, reason = "Single composition root wires every seam.")]
    pub fn new(
        config: RelayCoreConfig,
        karma: Arc<dyn KarmaProvider>,
        sink: Arc<dyn DecisionSink>,
        publisher: Arc<dyn TelemetryPublisher>,
        sealer: Arc<Sealer>,
        qstore: Arc<dyn QTableStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, EngineError> {
        let registry = Arc::new(AgentRegistry::new(config.registry));
        let scoring = Arc::new(ScoringEngine::new(config.scoring)?);
        let updater = Arc::new(QLearningUpdater::new(config.qlearning)?);
        let metrics = Arc::new(RelayMetrics::new());
        let index = Arc::new(DecisionIndex::new(config.engine.decision_index_capacity));
        let karma_enabled = Arc::new(AtomicBool::new(config.karma_enabled));
        let in_flight = Arc::new(AtomicU64::new(0));

        match updater.load_from(qstore.as_ref()) {
            Ok(_) => {}
            Err(_) => metrics.record_qtable_load_warning(),
        }

        let engine = DecisionEngine::new(
            config.engine,
            Arc::clone(&registry),
            Arc::clone(&scoring),
            Arc::clone(&updater),
            Arc::clone(&karma),
            Arc::clone(&sink),
            Arc::clone(&publisher),
            Arc::clone(&sealer),
            Arc::clone(&clock),
            Arc::clone(&metrics),
            Arc::clone(&index),
            Arc::clone(&karma_enabled),
            Arc::clone(&in_flight),
        )?;
        let processor = FeedbackProcessor::new(
            Arc::clone(&registry),
            Arc::clone(&updater),
            Arc::clone(&qstore),
            Arc::clone(&karma),
            Arc::clone(&publisher),
            Arc::clone(&sealer),
            Arc::clone(&clock),
            Arc::clone(&metrics),
            index,
            Arc::clone(&karma_enabled),
            in_flight,
            config.engine.decision_index_capacity,
        );

        Ok(Self {
            registry,
            scoring,
            updater,
            qstore,
            sink,
            karma,
            sealer,
            publisher,
            clock,
            metrics,
            engine,
            processor,
            karma_enabled,
        })
    }

    // ------------------------------------------------------------------
    // Public contract
    // ------------------------------------------------------------------

    /// Routes one request to an agent.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] as documented on [`DecisionEngine::decide`].
    pub fn decide(&self, request: &DecisionRequest) -> Result<DecisionRecord, EngineError> {
        self.engine.decide(request)
    }

    /// Applies one feedback event.
    ///
    /// # Errors
    ///
    /// Returns [`FeedbackError`] as documented on
    /// [`FeedbackProcessor::process`].
    pub fn apply_feedback(&self, event: &FeedbackEvent) -> Result<FeedbackAck, FeedbackError> {
        self.processor.process(event)
    }

    /// Builds the health report and emits a health packet best-effort.
    ///
    /// When the envelope failure rate has crossed a warning or critical
    /// threshold, the alert record is appended to the decision sink and
    /// published as an escalated health packet; the alert channel is an
    /// ordinary telemetry subscriber.
    #[must_use]
    pub fn health(&self) -> HealthReport {
        self.emit_envelope_alert();
        let status = self.metrics.classify();
        let report = HealthReport {
            status,
            metrics: self.metrics.snapshot(),
            envelope: self.sealer.metrics().snapshot(),
            epsilon: self.updater.epsilon(),
            q_entries: self.updater.len(),
            agents: self.registry.len(),
            generated_at: to_rfc3339(self.clock.now_utc()),
        };
        if let Ok(payload) = serde_json::to_value(&report) {
            let priority = health_priority(match status {
                RelayHealth::Healthy => HealthStatus::Healthy,
                RelayHealth::Degraded => HealthStatus::Degraded,
                RelayHealth::Unhealthy => HealthStatus::Unhealthy,
            });
            match self.sealer.wrap(
                PacketType::Health,
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
        report
    }

    /// Best-effort emission of a crossed envelope alert threshold.
    fn emit_envelope_alert(&self) {
        let Some(alert) = self.sealer.metrics().check_alert() else {
            return;
        };
        let Ok(payload) = serde_json::to_value(&alert) else {
            return;
        };
        if self.sink.append(&payload).is_err() {
            self.metrics.record_log_append_failure();
        }
        let priority = health_priority(match alert.level {
            agent_relay_stp::AlertLevel::Critical => HealthStatus::Unhealthy,
            agent_relay_stp::AlertLevel::Warning => HealthStatus::Degraded,
        });
        match self.sealer.wrap(
            PacketType::Health,
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

    // ------------------------------------------------------------------
    // Administrative operations
    // ------------------------------------------------------------------

    /// Registers or replaces an agent.
    pub fn register_agent(&self, agent: Agent) {
        self.registry.register(agent);
    }

    /// Sets an agent's lifecycle status.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] when the agent does not exist.
    pub fn set_agent_status(
        &self,
        agent_id: &AgentId,
        status: AgentStatus,
    ) -> Result<(), RegistryError> {
        self.registry.set_status(agent_id, status)
    }

    /// Enables or disables karma lookups; returns the new state.
    pub fn toggle_karma(&self, enabled: bool) -> bool {
        self.karma_enabled.store(enabled, Ordering::Relaxed);
        enabled
    }

    /// Enables or disables packet signing.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] when enabling without a secret.
    pub fn toggle_signing(&self, enabled: bool) -> Result<(), EngineError> {
        self.sealer
            .set_signing(enabled)
            .map_err(|err| EngineError::Config(err.to_string()))
    }

    /// Persists the Q-table immediately; invoked at orderly shutdown.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store rejects the snapshot.
    pub fn force_save(&self) -> Result<(), StoreError> {
        self.updater.force_save(self.qstore.as_ref())
    }

    /// Clears karma cache entries for one agent, or all agents.
    pub fn clear_karma_cache(&self, agent_id: Option<&AgentId>) {
        self.karma.clear_cache(agent_id);
    }

    /// Replaces the scoring weights for future decisions.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] when the weights are invalid.
    pub fn set_weights(&self, weights: ScoreWeights) -> Result<(), EngineError> {
        self.scoring.set_weights(weights)
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Returns the agent registry.
    #[must_use]
    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    /// Returns the shared runtime metrics.
    #[must_use]
    pub fn metrics(&self) -> &RelayMetrics {
        &self.metrics
    }

    /// Returns the Q-learning updater.
    #[must_use]
    pub fn updater(&self) -> &QLearningUpdater {
        &self.updater
    }
}
