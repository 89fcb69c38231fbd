// crates/agent-relay-core/src/lib.rs
// ============================================================================
// Module: Agent Relay Core
// Description: Routing decision engine, adaptive learner, and core domain model.
// Purpose: Provide the canonical request-routing and feedback-learning path.
// Dependencies: agent-relay-stp, serde, serde_jcs, sha2, rand, time
// ============================================================================

//! ## Overview
//! Agent Relay routes requests across a fleet of heterogeneous AI agents and
//! learns from post-execution feedback. This crate holds the core domain model
//! (agents, decisions, feedback, state encoding), the scoring and Q-learning
//! machinery, and the runtime engines that tie them together. External
//! collaborators (karma service, telemetry bus, durable stores) are reached
//! through the traits in [`interfaces`]; transports bind on top of
//! [`runtime::RelayCore`] and are out of scope here.

pub mod core;
pub mod interfaces;
pub mod runtime;

pub use crate::core::agent::Agent;
pub use crate::core::agent::AgentCounters;
pub use crate::core::agent::AgentStatus;
pub use crate::core::agent::AgentType;
pub use crate::core::agent::Capability;
pub use crate::core::agent::ExecutionOutcome;
pub use crate::core::decision::Alternative;
pub use crate::core::decision::DecisionRecord;
pub use crate::core::decision::RoutingStrategy;
pub use crate::core::decision::ScoreBreakdown;
pub use crate::core::feedback::FeedbackEvent;
pub use crate::core::identifiers::AgentId;
pub use crate::core::identifiers::DecisionId;
pub use crate::core::identifiers::FeedbackId;
pub use crate::core::identifiers::RequestId;
pub use crate::core::identifiers::SubscriberId;
pub use crate::core::time::Clock;
pub use crate::core::time::FixedClock;
pub use crate::core::time::SystemClock;
pub use crate::interfaces::DecisionSink;
pub use crate::interfaces::EngineError;
pub use crate::interfaces::FeedbackError;
pub use crate::interfaces::InMemoryQTableStore;
pub use crate::interfaces::KarmaProvider;
pub use crate::interfaces::NoKarma;
pub use crate::interfaces::NullDecisionSink;
pub use crate::interfaces::PublishError;
pub use crate::interfaces::QTableStore;
pub use crate::interfaces::RegistryError;
pub use crate::interfaces::RelayHealth;
pub use crate::interfaces::SinkError;
pub use crate::interfaces::StoreError;
pub use crate::interfaces::TelemetryPublisher;
pub use crate::runtime::engine::DecisionEngine;
pub use crate::runtime::engine::DecisionIndex;
pub use crate::runtime::engine::DecisionRequest;
pub use crate::runtime::engine::EngineConfig;
pub use crate::runtime::engine::IndexedDecision;
pub use crate::runtime::engine::RoutePreferences;
pub use crate::runtime::feedback_processor::FeedbackAck;
pub use crate::runtime::feedback_processor::FeedbackProcessor;
pub use crate::runtime::metrics::RelayMetrics;
pub use crate::runtime::metrics::RelayMetricsSnapshot;
pub use crate::runtime::qlearn::QLearningConfig;
pub use crate::runtime::qlearn::QLearningUpdater;
pub use crate::runtime::qlearn::QTableEntry;
pub use crate::runtime::qlearn::QTableSnapshot;
pub use crate::runtime::qlearn::QUpdate;
pub use crate::runtime::qlearn::compute_reward;
pub use crate::runtime::qlearn::smooth_reward;
pub use crate::runtime::registry::AgentRegistry;
pub use crate::runtime::registry::RegistryConfig;
pub use crate::runtime::relay::HealthReport;
pub use crate::runtime::relay::RelayCore;
pub use crate::runtime::relay::RelayCoreConfig;
pub use crate::runtime::scoring::ScoreWeights;
pub use crate::runtime::scoring::ScoringConfig;
pub use crate::runtime::scoring::ScoringEngine;
