// crates/agent-relay-core/src/runtime/mod.rs
// ============================================================================
// Module: Agent Relay Runtime
// Description: Registry, scoring, learning, and engine implementations.
// Purpose: Execute the canonical decide/feedback paths over injected collaborators.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! The runtime is the single canonical execution path for Agent Relay. All
//! transport surfaces must call into [`relay::RelayCore`] (or the individual
//! engines it composes) to preserve the invariants documented on the domain
//! model: bounded confidences, finite Q-values, idempotent feedback, and
//! best-effort emission that never fails a decision.

pub mod engine;
pub mod feedback_processor;
pub mod metrics;
pub mod qlearn;
pub mod registry;
pub mod relay;
pub mod scoring;

pub use engine::DecisionEngine;
pub use feedback_processor::FeedbackProcessor;
pub use metrics::RelayMetrics;
pub use qlearn::QLearningUpdater;
pub use registry::AgentRegistry;
pub use relay::RelayCore;
pub use scoring::ScoringEngine;
