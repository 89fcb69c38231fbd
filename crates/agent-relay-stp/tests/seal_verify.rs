// crates/agent-relay-stp/tests/seal_verify.rs
// ============================================================================
// Module: STP Seal and Verify Tests
// Description: Checksum, signature, drift, replay, and mode behavior.
// Purpose: Validate the envelope's verification ladder and counters.
// Dependencies: agent-relay-stp, serde_json, time
// ============================================================================

//! ## Overview
//! Exercises the wire contract: deterministic checksums across processes,
//! signature round-trips, distinct replay and drift rejections, lenient-mode
//! flagging, and the counter accounting behind each outcome.

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
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::sync::Arc;

use agent_relay_stp::EnvelopeMetrics;
use agent_relay_stp::PacketEnvelope;
use agent_relay_stp::PacketPriority;
use agent_relay_stp::PacketType;
use agent_relay_stp::Sealer;
use agent_relay_stp::SealerConfig;
use agent_relay_stp::UnwrapError;
use agent_relay_stp::Verifier;
use agent_relay_stp::VerifierConfig;
use agent_relay_stp::VerifyMode;
use serde_json::json;
use time::OffsetDateTime;
use time::macros::datetime;

/// Fixed issuance instant for deterministic drift checks.
const NOW: OffsetDateTime = datetime!(2026-03-02 09:00:00 UTC);

/// Shared signing secret.
const SECRET: &[u8] = b"relay-shared-secret";

/// Builds an unsigned sealer with shared metrics.
fn unsigned_sealer(metrics: &Arc<EnvelopeMetrics>) -> Sealer {
    Sealer::new(SealerConfig::default(), Arc::clone(metrics)).expect("sealer")
}

/// Builds a signing sealer with shared metrics.
fn signing_sealer(metrics: &Arc<EnvelopeMetrics>) -> Sealer {
    let config = SealerConfig {
        signing_secret: Some(SECRET.to_vec()),
        signing_enabled: true,
        ..SealerConfig::default()
    };
    Sealer::new(config, Arc::clone(metrics)).expect("sealer")
}

/// Builds a strict verifier expecting signatures.
fn signed_verifier(metrics: &Arc<EnvelopeMetrics>) -> Verifier {
    let config = VerifierConfig {
        require_signature: true,
        signing_secret: Some(SECRET.to_vec()),
        ..VerifierConfig::default()
    };
    Verifier::new(config, Arc::clone(metrics))
}

/// Wraps a sample payload at the fixed instant.
fn wrap_sample(sealer: &Sealer) -> PacketEnvelope {
    sealer
        .wrap(
            PacketType::RoutingDecision,
            PacketPriority::Normal,
            false,
            json!({"decision_id": "dec-1", "confidence": 0.89}),
            NOW,
        )
        .expect("wrap")
}

// ============================================================================
// SECTION: Checksum Tests
// ============================================================================

/// Tests an envelope round-trips through serialization and still verifies.
#[test]
fn checksum_is_deterministic_across_processes() {
    let metrics = Arc::new(EnvelopeMetrics::new());
    let sealer = unsigned_sealer(&metrics);
    let envelope = wrap_sample(&sealer);

    // Simulate a second process: serialize, reparse, verify fresh.
    let wire = serde_json::to_string(&envelope).expect("serialize");
    let reparsed: PacketEnvelope = serde_json::from_str(&wire).expect("parse");
    assert_eq!(reparsed.stp_checksum, envelope.stp_checksum);

    let verifier = Verifier::new(VerifierConfig::default(), Arc::clone(&metrics));
    assert!(verifier.unwrap(&reparsed, NOW).is_ok());
}

/// Tests token format is `<prefix>-<32 hex chars>` and checksum is 64 hex.
#[test]
fn envelope_field_formats_are_stable() {
    let metrics = Arc::new(EnvelopeMetrics::new());
    let envelope = wrap_sample(&unsigned_sealer(&metrics));
    let (prefix, body) = envelope.stp_token.split_once('-').expect("token shape");
    assert_eq!(prefix, "stp");
    assert_eq!(body.len(), 32);
    assert_eq!(envelope.stp_checksum.len(), 64);
    assert_eq!(envelope.stp_timestamp, "2026-03-02T09:00:00Z");
}

/// Tests strict mode rejects a tampered payload with an integrity error.
#[test]
fn strict_mode_rejects_tampered_payload() {
    let metrics = Arc::new(EnvelopeMetrics::new());
    let mut envelope = wrap_sample(&unsigned_sealer(&metrics));
    envelope.payload = json!({"decision_id": "dec-1", "confidence": 0.1});

    let verifier = Verifier::new(VerifierConfig::default(), Arc::clone(&metrics));
    assert!(matches!(verifier.unwrap(&envelope, NOW), Err(UnwrapError::Integrity(_))));
    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.checksum_failures, 1);
    assert_eq!(snapshot.unwrap_failures, 1);
}

/// Tests lenient mode flags the payload instead of rejecting it.
#[test]
fn lenient_mode_flags_and_returns_payload() {
    let metrics = Arc::new(EnvelopeMetrics::new());
    let mut envelope = wrap_sample(&unsigned_sealer(&metrics));
    envelope.payload = json!({"decision_id": "dec-1", "confidence": 0.1});

    let verifier = Verifier::new(
        VerifierConfig {
            mode: VerifyMode::Lenient,
            ..VerifierConfig::default()
        },
        Arc::clone(&metrics),
    );
    let verified = verifier.unwrap(&envelope, NOW).expect("lenient unwrap");
    assert!(verified.checksum_failed);
    assert_eq!(verified.payload, envelope.payload);
    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.checksum_failures, 1);
    assert_eq!(snapshot.fallback_responses, 1);
    assert_eq!(snapshot.unwrap_failures, 0);
}

// ============================================================================
// SECTION: Signature Tests
// ============================================================================

/// Tests the signature round-trip: verify(sign(P)) is allowed exactly once.
#[test]
fn signature_round_trip_allows_once() {
    let metrics = Arc::new(EnvelopeMetrics::new());
    let sealer = signing_sealer(&metrics);
    let verifier = signed_verifier(&metrics);
    let envelope = wrap_sample(&sealer);

    assert!(envelope.stp_security.is_some());
    let verified = verifier.unwrap(&envelope, NOW).expect("verify");
    assert_eq!(verified.packet_type, PacketType::RoutingDecision);

    let nonces = verifier.export_replay();
    let nonce = &envelope.stp_security.as_ref().expect("security").nonce;
    assert_eq!(nonces.iter().filter(|seen| *seen == nonce).count(), 1);
}

/// Tests a wrong secret fails with a signature error.
#[test]
fn wrong_secret_fails_signature() {
    let metrics = Arc::new(EnvelopeMetrics::new());
    let envelope = wrap_sample(&signing_sealer(&metrics));
    let verifier = Verifier::new(
        VerifierConfig {
            require_signature: true,
            signing_secret: Some(b"other-secret".to_vec()),
            ..VerifierConfig::default()
        },
        Arc::clone(&metrics),
    );
    assert!(matches!(verifier.unwrap(&envelope, NOW), Err(UnwrapError::Signature(_))));
    assert_eq!(metrics.snapshot().signature_failures, 1);
}

/// Tests a missing security block fails when signatures are required.
#[test]
fn missing_security_block_fails_when_required() {
    let metrics = Arc::new(EnvelopeMetrics::new());
    let envelope = wrap_sample(&unsigned_sealer(&metrics));
    let verifier = signed_verifier(&metrics);
    assert!(matches!(verifier.unwrap(&envelope, NOW), Err(UnwrapError::Signature(_))));
}

/// Tests the runtime signing toggle requires a configured secret.
#[test]
fn signing_toggle_requires_secret() {
    let metrics = Arc::new(EnvelopeMetrics::new());
    let sealer = unsigned_sealer(&metrics);
    assert!(sealer.set_signing(true).is_err());
    assert!(!sealer.signing_enabled());

    let signing = signing_sealer(&metrics);
    signing.set_signing(false).expect("disable");
    let envelope = wrap_sample(&signing);
    assert!(envelope.stp_security.is_none());
}

// ============================================================================
// SECTION: Replay and Drift Tests
// ============================================================================

/// Tests re-presenting a nonce yields `ReplayDetected` and moves only the
/// replay counter.
#[test]
fn replay_rejection_moves_only_replay_counter() {
    let metrics = Arc::new(EnvelopeMetrics::new());
    let sealer = signing_sealer(&metrics);
    let verifier = signed_verifier(&metrics);
    let envelope = wrap_sample(&sealer);

    verifier.unwrap(&envelope, NOW).expect("first unwrap");
    let before = metrics.snapshot();
    let replayed = verifier.unwrap(&envelope, NOW + time::Duration::seconds(2));
    assert!(matches!(replayed, Err(UnwrapError::ReplayDetected(_))));

    let after = metrics.snapshot();
    assert_eq!(after.replays_rejected, before.replays_rejected + 1);
    assert_eq!(after.unwrap_failures, before.unwrap_failures);
    assert_eq!(after.signature_failures, before.signature_failures);
    assert_eq!(after.checksum_failures, before.checksum_failures);
}

/// Tests drift beyond the bound is rejected distinctly from replay.
#[test]
fn drift_beyond_bound_is_rejected() {
    let metrics = Arc::new(EnvelopeMetrics::new());
    let sealer = signing_sealer(&metrics);
    let verifier = signed_verifier(&metrics);
    let envelope = wrap_sample(&sealer);

    let late = NOW + time::Duration::seconds(6);
    assert!(matches!(verifier.unwrap(&envelope, late), Err(UnwrapError::DriftExceeded(_))));
    let early = NOW - time::Duration::seconds(6);
    let envelope = wrap_sample(&sealer);
    assert!(matches!(verifier.unwrap(&envelope, early), Err(UnwrapError::DriftExceeded(_))));
}

/// Tests replay seeding from a journal rejects journaled nonces.
#[test]
fn seeded_replay_window_rejects_journaled_nonces() {
    let metrics = Arc::new(EnvelopeMetrics::new());
    let sealer = signing_sealer(&metrics);
    let envelope = wrap_sample(&sealer);
    let nonce = envelope.stp_security.as_ref().expect("security").nonce.clone();

    let verifier = signed_verifier(&metrics);
    verifier.seed_replay(vec![nonce]);
    assert!(matches!(verifier.unwrap(&envelope, NOW), Err(UnwrapError::ReplayDetected(_))));
}
