// crates/agent-relay-stp/tests/proptest_envelope.rs
// ============================================================================
// Module: STP Property-Based Tests
// Description: Fuzz-like wrap/unwrap checks over arbitrary payloads.
// Purpose: Ensure sealing never panics and always round-trips.
// Dependencies: agent-relay-stp, proptest, serde_json
// ============================================================================

//! ## Overview
//! Fuzzes payload content through a signing sealer and strict verifier: every
//! wrapped packet must verify with the shared secret, and checksum coverage
//! must detect any payload mutation.

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

use std::sync::Arc;

use agent_relay_stp::PacketPriority;
use agent_relay_stp::PacketType;
use agent_relay_stp::Sealer;
use agent_relay_stp::SealerConfig;
use agent_relay_stp::Verifier;
use agent_relay_stp::VerifierConfig;
use proptest::prelude::*;
use serde_json::json;
use time::macros::datetime;

proptest! {
    /// Any string payload wraps and verifies with the shared secret.
    #[test]
    fn wrap_then_verify_round_trips(content in ".{0,256}", latency in 0.0_f64..100_000.0) {
        let now = datetime!(2026-03-02 09:00:00 UTC);
        let sealer = Sealer::new(
            SealerConfig {
                signing_secret: Some(b"proptest-secret".to_vec()),
                signing_enabled: true,
                ..SealerConfig::default()
            },
            Arc::default(),
        )
        .expect("sealer");
        let verifier = Verifier::new(
            VerifierConfig {
                require_signature: true,
                signing_secret: Some(b"proptest-secret".to_vec()),
                ..VerifierConfig::default()
            },
            Arc::default(),
        );

        let payload = json!({"content": content, "latency_ms": latency});
        let envelope = sealer
            .wrap(PacketType::Feedback, PacketPriority::Normal, false, payload.clone(), now)
            .expect("wrap");
        let verified = verifier.unwrap(&envelope, now).expect("verify");
        prop_assert_eq!(verified.payload, payload);
        prop_assert!(!verified.checksum_failed);
    }

    /// Any payload mutation breaks the checksum in strict mode.
    #[test]
    fn payload_mutation_breaks_checksum(content in ".{1,64}") {
        let now = datetime!(2026-03-02 09:00:00 UTC);
        let sealer = Sealer::new(SealerConfig::default(), Arc::default()).expect("sealer");
        let verifier = Verifier::new(VerifierConfig::default(), Arc::default());

        let mut envelope = sealer
            .wrap(
                PacketType::RoutingDecision,
                PacketPriority::Normal,
                false,
                json!({"content": content}),
                now,
            )
            .expect("wrap");
        envelope.payload = json!({"content": format!("{content}-mutated")});
        prop_assert!(verifier.unwrap(&envelope, now).is_err());
    }
}
