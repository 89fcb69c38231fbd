// crates/agent-relay-core/tests/scoring_unit.rs
// ============================================================================
// Module: Scoring Engine Unit Tests
// Description: Confidence blending, normalization bounds, and config checks.
// Purpose: Validate bounded confidence under nominal and hostile inputs.
// Dependencies: agent-relay-core
// ============================================================================

//! ## Overview
//! Exercises the multi-factor confidence blend: the documented weighted sum,
//! the normalization ladder (NaN, infinities, sigmoid, clamp), availability
//! decay between load caps, partial capability credit, and fail-at-init
//! configuration validation.

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
    clippy::float_cmp,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use agent_relay_core::Agent;
use agent_relay_core::AgentId;
use agent_relay_core::AgentStatus;
use agent_relay_core::AgentType;
use agent_relay_core::Capability;
use agent_relay_core::ScoreWeights;
use agent_relay_core::ScoringConfig;
use agent_relay_core::ScoringEngine;

mod common;
use crate::common::nlp_agent;

// ============================================================================
// SECTION: Blend Tests
// ============================================================================

/// Tests the documented weighted sum for a strong candidate.
#[test]
fn confidence_blends_documented_weights() {
    let engine = ScoringEngine::new(ScoringConfig::default()).expect("valid config");
    let agent = nlp_agent("agent-a", 0.9, 0.5);
    let (confidence, breakdown) = engine.confidence(&agent, &[], Some(0.5), 0);
    assert!((breakdown.rule - 1.0).abs() < 1e-12);
    assert!((breakdown.feedback - 0.9).abs() < 1e-12);
    assert!((breakdown.availability - 1.0).abs() < 1e-12);
    assert!((breakdown.karma - 0.5).abs() < 1e-12);
    assert!((confidence - 0.89).abs() < 1e-9);
}

/// Tests the neutral prior substitutes for unavailable karma.
#[test]
fn unavailable_karma_uses_neutral_prior() {
    let engine = ScoringEngine::new(ScoringConfig::default()).expect("valid config");
    let agent = nlp_agent("agent-a", 0.5, 0.5);
    let (with_prior, breakdown) = engine.confidence(&agent, &[], None, 0);
    assert!((breakdown.karma - 0.5).abs() < 1e-12);
    let (with_explicit, _) = engine.confidence(&agent, &[], Some(0.5), 0);
    assert!((with_prior - with_explicit).abs() < 1e-12);
}

/// Tests partial capability coverage earns proportional credit.
#[test]
fn rule_score_gives_partial_credit() {
    let engine = ScoringEngine::new(ScoringConfig::default()).expect("valid config");
    let agent = Agent::new(AgentId::new("agent-a"), "a", AgentType::Nlp)
        .with_capability(Capability::new("summarize"));
    let required = vec!["summarize".to_string(), "translate".to_string()];
    let (_, breakdown) = engine.confidence(&agent, &required, None, 0);
    assert!((breakdown.rule - 0.5).abs() < 1e-12);
}

/// Tests a capability threshold above current performance does not match.
#[test]
fn capability_threshold_gates_matches() {
    let engine = ScoringEngine::new(ScoringConfig::default()).expect("valid config");
    let mut agent = Agent::new(AgentId::new("agent-a"), "a", AgentType::Nlp)
        .with_capability(Capability::with_threshold("summarize", 0.8));
    agent.counters.performance_score = 0.4;
    let required = vec!["summarize".to_string()];
    let (_, breakdown) = engine.confidence(&agent, &required, None, 0);
    assert!((breakdown.rule - 0.0).abs() < 1e-12);
}

/// Tests availability decays linearly between the load caps.
#[test]
fn availability_decays_between_caps() {
    let engine = ScoringEngine::new(ScoringConfig::default()).expect("valid config");
    let agent = nlp_agent("agent-a", 0.5, 0.5);
    let (_, below) = engine.confidence(&agent, &[], None, 9);
    assert!((below.availability - 1.0).abs() < 1e-12);
    let (_, mid) = engine.confidence(&agent, &[], None, 30);
    assert!((mid.availability - 0.5).abs() < 1e-12);
    let (_, over) = engine.confidence(&agent, &[], None, 50);
    assert!((over.availability - 0.0).abs() < 1e-12);
}

/// Tests inactive agents score zero availability.
#[test]
fn inactive_agents_have_zero_availability() {
    let engine = ScoringEngine::new(ScoringConfig::default()).expect("valid config");
    let mut agent = nlp_agent("agent-a", 1.0, 1.0);
    agent.status = AgentStatus::Maintenance;
    let (_, breakdown) = engine.confidence(&agent, &[], None, 0);
    assert!((breakdown.availability - 0.0).abs() < 1e-12);
}

// ============================================================================
// SECTION: Normalization Tests
// ============================================================================

/// Tests NaN collapses to the minimum confidence.
#[test]
fn normalize_maps_nan_to_minimum() {
    let engine = ScoringEngine::new(ScoringConfig::default()).expect("valid config");
    assert!((engine.normalize(f64::NAN) - 0.1).abs() < 1e-12);
}

/// Tests infinities collapse to the nearest bound.
#[test]
fn normalize_maps_infinities_to_bounds() {
    let engine = ScoringEngine::new(ScoringConfig::default()).expect("valid config");
    assert!((engine.normalize(f64::INFINITY) - 1.0).abs() < 1e-12);
    assert!((engine.normalize(f64::NEG_INFINITY) - 0.1).abs() < 1e-12);
}

/// Tests out-of-range sums squash through the sigmoid and stay bounded.
#[test]
fn normalize_squashes_large_sums() {
    let engine = ScoringEngine::new(ScoringConfig::default()).expect("valid config");
    let squashed = engine.normalize(4.0);
    let expected = 1.0 / (1.0 + (-4.0_f64).exp());
    assert!((squashed - expected).abs() < 1e-12);
    let negative = engine.normalize(-4.0);
    assert!((negative - 0.1).abs() < 1e-12);
}

/// Tests in-range sums clamp to the configured bounds.
#[test]
fn normalize_clamps_in_range_sums() {
    let engine = ScoringEngine::new(ScoringConfig::default()).expect("valid config");
    assert!((engine.normalize(0.05) - 0.1).abs() < 1e-12);
    assert!((engine.normalize(0.75) - 0.75).abs() < 1e-12);
    assert!((engine.normalize(1.4) - 1.0).abs() < 1e-12);
}

// ============================================================================
// SECTION: Configuration Tests
// ============================================================================

/// Tests misordered confidence bounds fail at construction.
#[test]
fn misordered_bounds_fail_at_init() {
    let config = ScoringConfig {
        min_confidence: 0.9,
        max_confidence: 0.5,
        ..ScoringConfig::default()
    };
    assert!(ScoringEngine::new(config).is_err());
}

/// Tests weights that do not sum to one fail at construction.
#[test]
fn unbalanced_weights_fail_at_init() {
    let config = ScoringConfig {
        weights: ScoreWeights {
            rule: 0.5,
            feedback: 0.5,
            availability: 0.5,
            karma: 0.5,
        },
        ..ScoringConfig::default()
    };
    assert!(ScoringEngine::new(config).is_err());
}

/// Tests hot-swapped weights apply to future scores only.
#[test]
fn weight_swap_applies_to_future_scores() {
    let engine = ScoringEngine::new(ScoringConfig::default()).expect("valid config");
    let agent = nlp_agent("agent-a", 1.0, 0.5);
    let (before, _) = engine.confidence(&agent, &[], Some(0.0), 0);
    engine
        .set_weights(ScoreWeights {
            rule: 0.0,
            feedback: 1.0,
            availability: 0.0,
            karma: 0.0,
        })
        .expect("valid weights");
    let (after, _) = engine.confidence(&agent, &[], Some(0.0), 0);
    assert!((after - 1.0).abs() < 1e-12);
    assert!(before < after);
}

/// Tests invalid hot-swap weights are rejected and keep the old weights.
#[test]
fn invalid_weight_swap_is_rejected() {
    let engine = ScoringEngine::new(ScoringConfig::default()).expect("valid config");
    let bad = ScoreWeights {
        rule: f64::NAN,
        feedback: 0.5,
        availability: 0.3,
        karma: 0.2,
    };
    assert!(engine.set_weights(bad).is_err());
    let weights = engine.weights();
    assert!((weights.rule - 0.30).abs() < 1e-12);
}
