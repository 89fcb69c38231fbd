// crates/agent-relay-telemetry/src/lib.rs
// ============================================================================
// Module: Agent Relay Telemetry
// Description: Single-writer, multi-reader fan-out bus for sealed packets.
// Purpose: Stream signed packets to subscribers under backpressure bounds.
// Dependencies: agent-relay-core, agent-relay-stp, tokio
// ============================================================================

//! ## Overview
//! The telemetry bus broadcasts every sealed packet to its subscribers. The
//! publisher is synchronous and non-blocking: a hand-off is a `try_send` into
//! each subscriber's bounded queue, and a full queue loses the packet for that
//! subscriber only. Each subscriber drains its queue from its own cooperative
//! task under a token-bucket rate cap, so a slow subscriber cannot slow the
//! publisher or any other subscriber. New subscribers first replay the bounded
//! ring of recent packets, then receive live traffic in publish order.

pub mod bus;
pub mod subscriber;

pub use bus::BusConfig;
pub use bus::BusError;
pub use bus::BusMetricsSnapshot;
pub use bus::TelemetryBus;
pub use bus::TelemetryPacket;
pub use subscriber::RateLimiter;
pub use subscriber::Subscription;
