// crates/agent-relay-core/tests/feedback_unit.rs
// ============================================================================
// Module: Feedback Processor Unit Tests
// Description: Idempotence, counter updates, ε decay, and policy packets.
// Purpose: Validate the closed learning loop end to end over fakes.
// Dependencies: agent-relay-core, agent-relay-stp
// ============================================================================

//! ## Overview
//! Exercises the feedback path through the composition root: agent counters
//! move exactly once per feedback identifier, Q-values follow the documented
//! arithmetic, ε decays per feedback event, the karma observer is fed, and
//! exactly one policy-update packet is emitted per applied event.

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

use std::sync::Arc;

use agent_relay_core::AgentId;
use agent_relay_core::DecisionId;
use agent_relay_core::DecisionRequest;
use agent_relay_core::FeedbackError;
use agent_relay_core::FeedbackEvent;
use agent_relay_core::FeedbackId;
use agent_relay_core::InMemoryQTableStore;
use agent_relay_core::RelayCore;
use agent_relay_core::RelayCoreConfig;
use agent_relay_stp::PacketType;

mod common;
use crate::common::CapturePublisher;
use crate::common::CaptureSink;
use crate::common::MapKarma;
use crate::common::nlp_agent;
use crate::common::test_clock;
use crate::common::test_sealer;

/// Assembled test fixture around one relay core.
struct Fixture {
    /// Relay under test.
    core: RelayCore,
    /// Captured telemetry packets.
    publisher: Arc<CapturePublisher>,
    /// Karma fake.
    karma: Arc<MapKarma>,
}

/// Builds a relay with karma smoothing controlled by the caller.
fn fixture(karma_smoothing: bool) -> Fixture {
    let mut config = RelayCoreConfig::with_defaults();
    config.engine.deterministic_seeding = true;
    config.qlearning.epsilon_initial = 0.0;
    config.qlearning.epsilon_min = 0.0;
    config.qlearning.karma_smoothing = karma_smoothing;
    let publisher = Arc::new(CapturePublisher::new());
    let karma = Arc::new(MapKarma::new());
    let core = RelayCore::new(
        config,
        Arc::clone(&karma) as Arc<dyn agent_relay_core::KarmaProvider>,
        Arc::new(CaptureSink::new()),
        Arc::clone(&publisher) as Arc<dyn agent_relay_core::TelemetryPublisher>,
        test_sealer(),
        Arc::new(InMemoryQTableStore::new()),
        test_clock(),
    )
    .expect("valid relay config");
    Fixture {
        core,
        publisher,
        karma,
    }
}

/// Builds the documented feedback payload for one decision.
fn feedback(decision_id: &DecisionId, feedback_id: &str) -> FeedbackEvent {
    FeedbackEvent {
        feedback_id: FeedbackId::new(feedback_id),
        decision_id: decision_id.clone(),
        success: true,
        latency_ms: 120.0,
        accuracy: Some(0.9),
        user_satisfaction: Some(4),
        error_code: None,
        observed_at: "2026-03-02T09:00:05Z".to_string(),
        transition: None,
    }
}

// ============================================================================
// SECTION: Application Tests
// ============================================================================

/// Tests the documented positive-feedback Q shift without smoothing.
#[test]
fn positive_feedback_shifts_q_documented_value() {
    let fixture = fixture(false);
    fixture.core.register_agent(nlp_agent("agent-a", 0.5, 0.5));
    let record = fixture.core.decide(&DecisionRequest::new("text")).expect("decision");

    let ack = fixture.core.apply_feedback(&feedback(&record.decision_id, "fb-1")).expect("ack");
    assert!((ack.reward - 1.588).abs() < 1e-9);
    assert!((ack.q_update.updated - 0.1588).abs() < 1e-9);
    assert!(
        (fixture.core.updater().q_value(&record.state, &record.selected_agent) - 0.1588).abs()
            < 1e-9
    );
}

/// Tests karma smoothing blends toward the cached normalized karma.
#[test]
fn karma_smoothing_blends_reward() {
    let fixture = fixture(true);
    fixture.core.register_agent(nlp_agent("agent-a", 0.5, 0.5));
    fixture.karma.set(&AgentId::new("agent-a"), 0.6);
    let record = fixture.core.decide(&DecisionRequest::new("text")).expect("decision");

    let ack = fixture.core.apply_feedback(&feedback(&record.decision_id, "fb-1")).expect("ack");
    assert!((ack.reward - 1.241).abs() < 1e-9);
    assert!((ack.q_update.updated - 0.1241).abs() < 1e-9);
}

/// Tests agent counters move once per applied feedback.
#[test]
fn feedback_updates_agent_counters() {
    let fixture = fixture(false);
    fixture.core.register_agent(nlp_agent("agent-a", 0.0, 0.0));
    let record = fixture.core.decide(&DecisionRequest::new("text")).expect("decision");
    fixture.core.apply_feedback(&feedback(&record.decision_id, "fb-1")).expect("ack");

    let agent = fixture.core.registry().get(&record.selected_agent).expect("agent");
    assert_eq!(agent.counters.total_requests, 1);
    assert_eq!(agent.counters.successful_requests, 1);
    assert!((agent.counters.average_latency_ms - 120.0).abs() < 1e-12);
    assert!((agent.counters.success_rate - 1.0).abs() < 1e-12);
}

/// Tests ε decays by exactly one step per applied feedback.
#[test]
fn epsilon_decays_per_feedback_event() {
    let fixture = {
        let mut config = RelayCoreConfig::with_defaults();
        config.engine.deterministic_seeding = true;
        config.qlearning.epsilon_initial = 0.1;
        let publisher = Arc::new(CapturePublisher::new());
        let karma = Arc::new(MapKarma::new());
        let core = RelayCore::new(
            config,
            Arc::clone(&karma) as Arc<dyn agent_relay_core::KarmaProvider>,
            Arc::new(CaptureSink::new()),
            Arc::clone(&publisher) as Arc<dyn agent_relay_core::TelemetryPublisher>,
            test_sealer(),
            Arc::new(InMemoryQTableStore::new()),
            test_clock(),
        )
        .expect("valid relay config");
        Fixture {
            core,
            publisher,
            karma,
        }
    };
    fixture.core.register_agent(nlp_agent("agent-a", 0.5, 0.5));
    let record = fixture.core.decide(&DecisionRequest::new("text")).expect("decision");

    let before = fixture.core.updater().epsilon();
    let ack = fixture.core.apply_feedback(&feedback(&record.decision_id, "fb-1")).expect("ack");
    assert!((ack.epsilon - before * 0.995).abs() < 1e-12);
}

/// Tests the karma observer receives the refreshed performance score.
#[test]
fn feedback_feeds_karma_observer() {
    let fixture = fixture(false);
    fixture.core.register_agent(nlp_agent("agent-a", 0.5, 0.5));
    let record = fixture.core.decide(&DecisionRequest::new("text")).expect("decision");
    fixture.core.apply_feedback(&feedback(&record.decision_id, "fb-1")).expect("ack");

    let observed = fixture.karma.observed.lock().unwrap();
    assert_eq!(observed.len(), 1);
    assert_eq!(observed[0].0, record.selected_agent);
}

// ============================================================================
// SECTION: Idempotence Tests
// ============================================================================

/// Tests a duplicate feedback identifier is a counted no-op.
#[test]
fn duplicate_feedback_is_counted_noop() {
    let fixture = fixture(false);
    fixture.core.register_agent(nlp_agent("agent-a", 0.5, 0.5));
    let record = fixture.core.decide(&DecisionRequest::new("text")).expect("decision");

    fixture.core.apply_feedback(&feedback(&record.decision_id, "fb-1")).expect("ack");
    let q_after_first = fixture.core.updater().q_value(&record.state, &record.selected_agent);
    let counters_after_first =
        fixture.core.registry().get(&record.selected_agent).expect("agent").counters;
    let packets_after_first = fixture.publisher.len();

    let second = fixture.core.apply_feedback(&feedback(&record.decision_id, "fb-1"));
    assert!(matches!(second, Err(FeedbackError::DuplicateFeedback(_))));
    assert!(
        (fixture.core.updater().q_value(&record.state, &record.selected_agent) - q_after_first)
            .abs()
            < 1e-12
    );
    let counters_after_second =
        fixture.core.registry().get(&record.selected_agent).expect("agent").counters;
    assert_eq!(counters_after_first.total_requests, counters_after_second.total_requests);
    assert_eq!(fixture.publisher.len(), packets_after_first);
    assert_eq!(fixture.core.metrics().snapshot().duplicate_feedback, 1);
}

/// Tests feedback for an unknown decision surfaces `NotFound`.
#[test]
fn unknown_decision_fails_with_not_found() {
    let fixture = fixture(false);
    fixture.core.register_agent(nlp_agent("agent-a", 0.5, 0.5));
    let result = fixture.core.apply_feedback(&feedback(&DecisionId::new("missing"), "fb-1"));
    assert!(matches!(result, Err(FeedbackError::NotFound(_))));
    assert_eq!(fixture.core.metrics().snapshot().feedback_not_found, 1);
}

// ============================================================================
// SECTION: Emission Tests
// ============================================================================

/// Tests one policy-update packet is emitted per applied feedback.
#[test]
fn applied_feedback_emits_one_policy_update() {
    let fixture = fixture(false);
    fixture.core.register_agent(nlp_agent("agent-a", 0.5, 0.5));
    let record = fixture.core.decide(&DecisionRequest::new("text")).expect("decision");
    fixture.core.apply_feedback(&feedback(&record.decision_id, "fb-1")).expect("ack");

    let packets = fixture.publisher.packets.lock().unwrap();
    let policy_updates: Vec<_> =
        packets.iter().filter(|packet| packet.stp_type == PacketType::PolicyUpdate).collect();
    assert_eq!(policy_updates.len(), 1);
    let payload = &policy_updates[0].payload;
    assert!(payload.get("q_delta").is_some());
    assert!(payload.get("strategy_change").is_some_and(serde_json::Value::is_null));
}

/// Tests successor context re-encodes the next state for the update.
#[test]
fn transition_context_encodes_next_state() {
    let fixture = fixture(false);
    fixture.core.register_agent(nlp_agent("agent-a", 0.5, 0.5));
    let record = fixture.core.decide(&DecisionRequest::new("text")).expect("decision");

    let mut event = feedback(&record.decision_id, "fb-1");
    let mut transition = std::collections::BTreeMap::new();
    transition.insert("complexity".to_string(), serde_json::json!("high"));
    event.transition = Some(transition);
    assert!(fixture.core.apply_feedback(&event).is_ok());
}
