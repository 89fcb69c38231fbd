// crates/agent-relay-telemetry/src/bus.rs
// ============================================================================
// Module: Telemetry Bus
// Description: Bounded ring plus non-blocking per-subscriber hand-off.
// Purpose: Broadcast sealed packets without ever blocking the publisher.
// Dependencies: agent-relay-core, agent-relay-stp, tokio
// ============================================================================

//! ## Overview
//! The bus owns a bounded ring of the most recent packets and a capped set of
//! subscribers, each with a bounded private queue. `publish` appends to the
//! ring and attempts a `try_send` per subscriber: overflow drops the packet
//! for that subscriber and counts it, staleness skips the hand-off entirely.
//! The ring is retained solely for the replay-on-connect path. Within one
//! subscriber delivery is FIFO; across subscribers there is no ordering
//! guarantee. The bus never reorders.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::Instant;

use agent_relay_core::PublishError;
use agent_relay_core::SubscriberId;
use agent_relay_core::TelemetryPublisher;
use agent_relay_stp::PacketEnvelope;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::subscriber::RateLimiter;
use crate::subscriber::Subscription;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Telemetry bus configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusConfig {
    /// Ring capacity; the newest packet overwrites the oldest once full.
    pub buffer_size: usize,
    /// Per-subscriber private queue capacity.
    pub queue_capacity: usize,
    /// Per-subscriber consumption cap in packets per second.
    pub rate_limit_per_sec: u32,
    /// Age beyond which a packet is stale and never handed off.
    pub max_packet_age: Duration,
    /// Maximum concurrent subscribers.
    pub max_subscribers: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            buffer_size: 1_000,
            queue_capacity: 256,
            rate_limit_per_sec: 200,
            max_packet_age: Duration::from_secs(10),
            max_subscribers: 100,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors surfaced at subscribe time; publish never surfaces errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum BusError {
    /// The subscriber cap was reached.
    #[error("subscriber capacity exceeded: {0}")]
    CapacityExceeded(usize),
}

// ============================================================================
// SECTION: Telemetry Packet
// ============================================================================

/// A sealed packet queued for fan-out.
#[derive(Debug, Clone)]
pub struct TelemetryPacket {
    /// Sealed envelope being broadcast.
    pub envelope: PacketEnvelope,
    /// Monotonic enqueue instant for age-based drop decisions.
    pub enqueued_at: Instant,
}

impl TelemetryPacket {
    /// Wraps an envelope with the current enqueue instant.
    #[must_use]
    pub fn new(envelope: PacketEnvelope) -> Self {
        Self {
            envelope,
            enqueued_at: Instant::now(),
        }
    }
}

// ============================================================================
// SECTION: Metrics
// ============================================================================

/// Serializable point-in-time view of the bus counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusMetricsSnapshot {
    /// Packets published to the ring.
    pub published: u64,
    /// Successful hand-offs across all subscribers.
    pub handed_off: u64,
    /// Packets lost to full subscriber queues.
    pub dropped: u64,
    /// Hand-offs skipped for staleness.
    pub stale_skipped: u64,
    /// Subscribe attempts rejected at the cap.
    pub rejected_subscribes: u64,
    /// Currently live subscribers.
    pub active_subscribers: u64,
}

/// Atomic bus counters.
#[derive(Debug, Default)]
struct BusMetrics {
    /// Packets published to the ring.
    published: AtomicU64,
    /// Successful hand-offs across all subscribers.
    handed_off: AtomicU64,
    /// Packets lost to full subscriber queues.
    dropped: AtomicU64,
    /// Hand-offs skipped for staleness.
    stale_skipped: AtomicU64,
    /// Subscribe attempts rejected at the cap.
    rejected_subscribes: AtomicU64,
}

// ============================================================================
// SECTION: Subscriber Slot
// ============================================================================

/// Bus-side record of one live subscriber.
#[derive(Debug)]
struct SubscriberSlot {
    /// Live packet sender; hand-off is always `try_send`.
    sender: mpsc::Sender<TelemetryPacket>,
    /// Packets lost to queue overflow, shared with the handle.
    dropped: Arc<AtomicU64>,
}

// ============================================================================
// SECTION: Bus
// ============================================================================

/// Process-wide telemetry broadcaster.
///
/// # Invariants
/// - `publish` returns in bounded time regardless of subscriber liveness.
/// - Per-subscriber delivery is FIFO in publish order.
pub struct TelemetryBus {
    /// Bus configuration.
    config: BusConfig,
    /// Bounded ring of recent packets, oldest first.
    ring: Mutex<VecDeque<TelemetryPacket>>,
    /// Live subscribers.
    subscribers: Mutex<BTreeMap<SubscriberId, SubscriberSlot>>,
    /// Monotonic subscriber counter for identifier assignment.
    next_subscriber: AtomicU64,
    /// Bus counters.
    metrics: BusMetrics,
}

impl TelemetryBus {
    /// Creates a bus with the provided configuration.
    #[must_use]
    pub fn new(config: BusConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            ring: Mutex::new(VecDeque::with_capacity(config.buffer_size)),
            subscribers: Mutex::new(BTreeMap::new()),
            next_subscriber: AtomicU64::new(1),
            metrics: BusMetrics::default(),
        })
    }

    /// Publishes a sealed envelope to the ring and all subscribers.
    pub fn publish(&self, envelope: PacketEnvelope) {
        self.publish_packet(TelemetryPacket::new(envelope));
    }

    /// Publishes a pre-stamped packet; stale packets are ringed but not
    /// handed off.
    pub fn publish_packet(&self, packet: TelemetryPacket) {
        self.metrics.published.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut ring) = self.ring.lock() {
            if ring.len() == self.config.buffer_size {
                ring.pop_front();
            }
            ring.push_back(packet.clone());
        }

        let stale = packet.enqueued_at.elapsed() > self.config.max_packet_age;
        if stale {
            self.metrics.stale_skipped.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let Ok(subscribers) = self.subscribers.lock() else {
            return;
        };
        for slot in subscribers.values() {
            match slot.sender.try_send(packet.clone()) {
                Ok(()) => {
                    self.metrics.handed_off.fetch_add(1, Ordering::Relaxed);
                }
                Err(TrySendError::Full(_)) => {
                    slot.dropped.fetch_add(1, Ordering::Relaxed);
                    self.metrics.dropped.fetch_add(1, Ordering::Relaxed);
                }
                Err(TrySendError::Closed(_)) => {}
            }
        }
    }

    /// Registers a subscriber under the configured default rate cap.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::CapacityExceeded`] at the subscriber cap.
    pub fn subscribe(self: &Arc<Self>) -> Result<Subscription, BusError> {
        self.subscribe_with_rate(self.config.rate_limit_per_sec)
    }

    /// Registers a subscriber with its own rate cap and returns its handle.
    ///
    /// The handle first replays the current ring contents, then receives live
    /// packets, all under the rate cap.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::CapacityExceeded`] at the subscriber cap.
    pub fn subscribe_with_rate(
        self: &Arc<Self>,
        rate_limit_per_sec: u32,
    ) -> Result<Subscription, BusError> {
        let mut subscribers = match self.subscribers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if subscribers.len() >= self.config.max_subscribers {
            self.metrics.rejected_subscribes.fetch_add(1, Ordering::Relaxed);
            return Err(BusError::CapacityExceeded(self.config.max_subscribers));
        }
        let id = SubscriberId::new(format!(
            "sub-{}",
            self.next_subscriber.fetch_add(1, Ordering::Relaxed)
        ));
        let (sender, receiver) = mpsc::channel(self.config.queue_capacity);
        let dropped = Arc::new(AtomicU64::new(0));
        subscribers.insert(
            id.clone(),
            SubscriberSlot {
                sender,
                dropped: Arc::clone(&dropped),
            },
        );
        drop(subscribers);

        let backlog = self.ring.lock().map(|ring| ring.clone()).unwrap_or_default();
        Ok(Subscription::assemble(
            id,
            backlog,
            receiver,
            RateLimiter::new(rate_limit_per_sec),
            dropped,
            Arc::clone(self),
        ))
    }

    /// Removes a subscriber and releases its resources; idempotent.
    pub fn unsubscribe(&self, id: &SubscriberId) {
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.remove(id);
        }
    }

    /// Returns the number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().map(|guard| guard.len()).unwrap_or(0)
    }

    /// Returns a point-in-time snapshot of the bus counters.
    #[must_use]
    pub fn metrics(&self) -> BusMetricsSnapshot {
        BusMetricsSnapshot {
            published: self.metrics.published.load(Ordering::Relaxed),
            handed_off: self.metrics.handed_off.load(Ordering::Relaxed),
            dropped: self.metrics.dropped.load(Ordering::Relaxed),
            stale_skipped: self.metrics.stale_skipped.load(Ordering::Relaxed),
            rejected_subscribes: self.metrics.rejected_subscribes.load(Ordering::Relaxed),
            active_subscribers: u64::try_from(self.subscriber_count()).unwrap_or(u64::MAX),
        }
    }
}

impl TelemetryPublisher for TelemetryBus {
    fn publish(&self, packet: PacketEnvelope) -> Result<(), PublishError> {
        Self::publish(self, packet);
        Ok(())
    }
}
