// crates/agent-relay-core/tests/proptest_scoring.rs
// ============================================================================
// Module: Scoring Property-Based Tests
// Description: Bounded-confidence checks under adversarial numeric inputs.
// Purpose: Ensure no input escapes the configured confidence bounds.
// Dependencies: agent-relay-core, proptest
// ============================================================================

//! ## Overview
//! Fuzzes the scoring path with arbitrary agent statistics, karma values,
//! and loads: every returned confidence must be finite and inside the
//! configured bounds, and the normalizer must absorb NaN and infinities.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use agent_relay_core::Agent;
use agent_relay_core::AgentId;
use agent_relay_core::AgentType;
use agent_relay_core::ScoringConfig;
use agent_relay_core::ScoringEngine;
use proptest::prelude::*;

proptest! {
    /// Every confidence stays finite and within the configured bounds.
    #[test]
    fn confidence_is_always_bounded(
        success_rate in proptest::num::f64::ANY,
        performance in proptest::num::f64::ANY,
        latency in proptest::num::f64::ANY,
        karma in proptest::option::of(proptest::num::f64::ANY),
        load in proptest::num::u64::ANY,
    ) {
        let engine = ScoringEngine::new(ScoringConfig::default()).expect("valid config");
        let mut agent = Agent::new(AgentId::new("agent-x"), "x", AgentType::Nlp);
        agent.counters.success_rate = success_rate;
        agent.counters.performance_score = performance;
        agent.counters.average_latency_ms = latency;
        let (confidence, _) = engine.confidence(&agent, &[], karma, load);
        prop_assert!(confidence.is_finite());
        prop_assert!((0.1..=1.0).contains(&confidence));
    }

    /// The normalizer absorbs every representable input.
    #[test]
    fn normalize_absorbs_all_inputs(raw in proptest::num::f64::ANY) {
        let engine = ScoringEngine::new(ScoringConfig::default()).expect("valid config");
        let normalized = engine.normalize(raw);
        prop_assert!(normalized.is_finite());
        prop_assert!((0.1..=1.0).contains(&normalized));
    }
}
