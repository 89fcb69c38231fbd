// crates/agent-relay-telemetry/src/subscriber.rs
// ============================================================================
// Module: Telemetry Subscription
// Description: Subscriber handle with rate-capped, FIFO packet consumption.
// Purpose: Drain the ring backlog then live packets under a token bucket.
// Dependencies: agent-relay-core, tokio
// ============================================================================

//! ## Overview
//! A [`Subscription`] owns a bounded receive queue plus the replayed ring
//! backlog captured at connect time. `recv` consumes the backlog first, then
//! live packets, all under the subscriber's token-bucket rate cap. Dropping
//! the handle unsubscribes; explicit unsubscription through the bus is
//! idempotent.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::Instant;

use agent_relay_core::SubscriberId;
use tokio::sync::mpsc::Receiver;

use crate::bus::TelemetryBus;
use crate::bus::TelemetryPacket;

// ============================================================================
// SECTION: Rate Limiter
// ============================================================================

/// Token bucket limiting packets consumed per second.
///
/// # Invariants
/// - Tokens never exceed the burst capacity (one second of budget).
#[derive(Debug)]
pub struct RateLimiter {
    /// Refill rate in tokens per second.
    rate_per_sec: f64,
    /// Available tokens.
    tokens: f64,
    /// Last refill instant.
    refilled_at: Instant,
}

impl RateLimiter {
    /// Creates a limiter allowing `rate_per_sec` packets per second.
    ///
    /// Non-positive rates are clamped to one packet per second.
    #[must_use]
    pub fn new(rate_per_sec: u32) -> Self {
        let rate = f64::from(rate_per_sec.max(1));
        Self {
            rate_per_sec: rate,
            tokens: rate,
            refilled_at: Instant::now(),
        }
    }

    /// Waits until one token is available and consumes it.
    pub async fn acquire(&mut self) {
        loop {
            self.refill();
            if self.tokens >= 1.0 {
                self.tokens -= 1.0;
                return;
            }
            let deficit = 1.0 - self.tokens;
            let wait = Duration::from_secs_f64(deficit / self.rate_per_sec);
            tokio::time::sleep(wait).await;
        }
    }

    /// Accrues tokens for the elapsed time since the last refill.
    fn refill(&mut self) {
        let elapsed = self.refilled_at.elapsed();
        self.refilled_at = Instant::now();
        self.tokens =
            (self.tokens + elapsed.as_secs_f64() * self.rate_per_sec).min(self.rate_per_sec);
    }
}

// ============================================================================
// SECTION: Subscription
// ============================================================================

/// Handle to one telemetry subscription.
///
/// # Invariants
/// - Packets observed through `recv` are a subsequence of the publish order.
pub struct Subscription {
    /// Subscriber identifier.
    id: SubscriberId,
    /// Ring backlog captured at connect time, oldest first.
    backlog: VecDeque<TelemetryPacket>,
    /// Live packet queue fed by the publisher.
    receiver: Receiver<TelemetryPacket>,
    /// Per-subscriber rate cap.
    limiter: RateLimiter,
    /// Packets lost to queue overflow, shared with the bus.
    dropped: Arc<AtomicU64>,
    /// Packets delivered to this subscriber.
    delivered: u64,
    /// Owning bus, used for drop-time unsubscription.
    bus: Arc<TelemetryBus>,
}

impl Subscription {
    /// Assembles a subscription handle; called by the bus on subscribe.
    pub(crate) fn assemble(
        id: SubscriberId,
        backlog: VecDeque<TelemetryPacket>,
        receiver: Receiver<TelemetryPacket>,
        limiter: RateLimiter,
        dropped: Arc<AtomicU64>,
        bus: Arc<TelemetryBus>,
    ) -> Self {
        Self {
            id,
            backlog,
            receiver,
            limiter,
            dropped,
            delivered: 0,
            bus,
        }
    }

    /// Returns the subscriber identifier.
    #[must_use]
    pub fn id(&self) -> &SubscriberId {
        &self.id
    }

    /// Receives the next packet under the rate cap.
    ///
    /// Returns `None` once the subscription is closed and the queue is
    /// drained. The ring backlog is consumed before any live packet.
    pub async fn recv(&mut self) -> Option<TelemetryPacket> {
        self.limiter.acquire().await;
        if let Some(packet) = self.backlog.pop_front() {
            self.delivered += 1;
            return Some(packet);
        }
        let packet = self.receiver.recv().await?;
        self.delivered += 1;
        Some(packet)
    }

    /// Returns packets lost to this subscriber's queue overflow.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Returns packets delivered through this handle.
    #[must_use]
    pub const fn delivered(&self) -> u64 {
        self.delivered
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.bus.unsubscribe(&self.id);
    }
}
