// system-tests/tests/telemetry.rs
// ============================================================================
// Module: Telemetry System Tests
// Description: Slow-subscriber isolation under sustained publishing.
// Purpose: Run the documented fan-out scenario against the live bus.
// Dependencies: system-tests helpers, agent-relay-telemetry
// ============================================================================

//! ## Overview
//! Runs the slow-subscriber scenario: a sustained publish stream reaches a
//! fast subscriber nearly completely and in order, the slow subscriber loses
//! packets to its bounded queue without slowing anyone, and per-publish
//! latency stays bounded throughout.

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
use std::time::Duration;
use std::time::Instant;

use agent_relay_stp::PacketPriority;
use agent_relay_stp::PacketType;
use agent_relay_stp::Sealer;
use agent_relay_stp::SealerConfig;
use agent_relay_telemetry::BusConfig;
use agent_relay_telemetry::TelemetryBus;
use time::macros::datetime;

mod helpers;

/// Number of packets published by the scenario.
const PACKETS: u64 = 1_000;

/// Seals a numbered packet.
fn packet(sealer: &Sealer, sequence: u64) -> agent_relay_stp::PacketEnvelope {
    sealer
        .wrap(
            PacketType::RoutingDecision,
            PacketPriority::Normal,
            false,
            serde_json::json!({"sequence": sequence}),
            datetime!(2026-03-02 09:00:00 UTC),
        )
        .expect("wrap")
}

/// A slow subscriber loses packets; the fast one observes the stream in
/// order; the publisher never stalls.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn slow_subscriber_does_not_stall_the_stream() {
    let bus = TelemetryBus::new(BusConfig {
        queue_capacity: 64,
        ..BusConfig::default()
    });
    let sealer = Sealer::new(SealerConfig::default(), Arc::default()).expect("sealer");

    let mut fast = bus.subscribe_with_rate(1_000_000).expect("fast subscribe");
    let slow = bus.subscribe_with_rate(10).expect("slow subscribe");

    // Fast consumer drains concurrently, recording observed order.
    let fast_task = tokio::spawn(async move {
        let mut observed: Vec<u64> = Vec::new();
        while let Some(delivered) = fast.recv().await {
            let sequence = delivered
                .envelope
                .payload
                .get("sequence")
                .and_then(serde_json::Value::as_u64)
                .expect("sequence");
            observed.push(sequence);
            if sequence == PACKETS - 1 {
                break;
            }
        }
        observed
    });

    // Publish the stream over roughly one second.
    let mut worst_publish = Duration::ZERO;
    for sequence in 0..PACKETS {
        let started = Instant::now();
        bus.publish(packet(&sealer, sequence));
        worst_publish = worst_publish.max(started.elapsed());
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    let observed = tokio::time::timeout(Duration::from_secs(10), fast_task)
        .await
        .expect("fast subscriber stalled")
        .expect("fast task");
    assert!(
        observed.len() >= 900,
        "fast subscriber observed only {} packets",
        observed.len()
    );
    assert!(observed.windows(2).all(|pair| pair[0] < pair[1]), "delivery must stay in order");

    assert!(slow.dropped() > 0, "slow subscriber must drop under backpressure");
    assert!(
        worst_publish < Duration::from_millis(5),
        "publish stalled for {worst_publish:?}"
    );

    let metrics = bus.metrics();
    assert_eq!(metrics.published, PACKETS);
    assert!(metrics.dropped >= slow.dropped());
}
