// crates/agent-relay-stp/src/metrics.rs
// ============================================================================
// Module: STP Envelope Metrics
// Description: Wrap/unwrap counters, derived failure rates, and alerts.
// Purpose: Meter envelope health without external metric dependencies.
// Dependencies: serde, std
// ============================================================================

//! ## Overview
//! Envelope metrics are plain atomics exposed as a serializable snapshot, the
//! same dependency-light shape the rest of the relay uses. When the derived
//! failure rate crosses the warning or critical threshold, an alert record is
//! produced; the alert channel is an ordinary telemetry subscriber, not a
//! special path.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Failure-rate threshold that records a warning alert.
pub const WARNING_FAILURE_RATE: f64 = 0.10;

/// Failure-rate threshold that records a critical alert.
pub const CRITICAL_FAILURE_RATE: f64 = 0.25;

// ============================================================================
// SECTION: Alerts
// ============================================================================

/// Severity of an envelope alert.
///
/// # Invariants
/// - Labels are stable wire values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    /// Failure rate at or above the warning threshold.
    Warning,
    /// Failure rate at or above the critical threshold.
    Critical,
}

/// Structured alert record emitted when a threshold is crossed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    /// Alert severity.
    pub level: AlertLevel,
    /// Derived failure rate at the time of the alert.
    pub failure_rate: f64,
    /// Total operations observed at the time of the alert.
    pub observed_operations: u64,
}

// ============================================================================
// SECTION: Snapshot
// ============================================================================

/// Serializable point-in-time view of the envelope counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeMetricsSnapshot {
    /// Packets wrapped.
    pub wrapped: u64,
    /// Packets unwrapped successfully.
    pub unwrapped: u64,
    /// Wrap operations that failed.
    pub wrap_failures: u64,
    /// Unwrap operations that failed.
    pub unwrap_failures: u64,
    /// Checksum mismatches observed.
    pub checksum_failures: u64,
    /// Signature mismatches observed.
    pub signature_failures: u64,
    /// Replayed nonces rejected.
    pub replays_rejected: u64,
    /// Lenient-mode payloads returned despite a failed checksum.
    pub fallback_responses: u64,
}

// ============================================================================
// SECTION: Metrics
// ============================================================================

/// Atomic envelope counters shared across sealer and verifier.
#[derive(Debug, Default)]
pub struct EnvelopeMetrics {
    /// Packets wrapped.
    wrapped: AtomicU64,
    /// Packets unwrapped successfully.
    unwrapped: AtomicU64,
    /// Wrap operations that failed.
    wrap_failures: AtomicU64,
    /// Unwrap operations that failed.
    unwrap_failures: AtomicU64,
    /// Checksum mismatches observed.
    checksum_failures: AtomicU64,
    /// Signature mismatches observed.
    signature_failures: AtomicU64,
    /// Replayed nonces rejected.
    replays_rejected: AtomicU64,
    /// Lenient-mode payloads returned despite a failed checksum.
    fallback_responses: AtomicU64,
}

impl EnvelopeMetrics {
    /// Creates zeroed metrics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a successful wrap.
    pub fn record_wrapped(&self) {
        self.wrapped.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a failed wrap.
    pub fn record_wrap_failure(&self) {
        self.wrap_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a successful unwrap.
    pub fn record_unwrapped(&self) {
        self.unwrapped.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a failed unwrap.
    pub fn record_unwrap_failure(&self) {
        self.unwrap_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a checksum mismatch.
    pub fn record_checksum_failure(&self) {
        self.checksum_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a signature mismatch.
    pub fn record_signature_failure(&self) {
        self.signature_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a rejected replay.
    pub fn record_replay_rejected(&self) {
        self.replays_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a lenient-mode fallback response.
    pub fn record_fallback_response(&self) {
        self.fallback_responses.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a point-in-time snapshot.
    #[must_use]
    pub fn snapshot(&self) -> EnvelopeMetricsSnapshot {
        EnvelopeMetricsSnapshot {
            wrapped: self.wrapped.load(Ordering::Relaxed),
            unwrapped: self.unwrapped.load(Ordering::Relaxed),
            wrap_failures: self.wrap_failures.load(Ordering::Relaxed),
            unwrap_failures: self.unwrap_failures.load(Ordering::Relaxed),
            checksum_failures: self.checksum_failures.load(Ordering::Relaxed),
            signature_failures: self.signature_failures.load(Ordering::Relaxed),
            replays_rejected: self.replays_rejected.load(Ordering::Relaxed),
            fallback_responses: self.fallback_responses.load(Ordering::Relaxed),
        }
    }

    /// Returns the derived failure rate over all wrap and unwrap operations.
    #[must_use]
    pub fn failure_rate(&self) -> f64 {
        let snapshot = self.snapshot();
        let failures = snapshot.wrap_failures + snapshot.unwrap_failures;
        let total = snapshot.wrapped + snapshot.unwrapped + failures;
        if total == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss, reason = "Counter magnitudes stay far below 2^52.")]
        let rate = failures as f64 / total as f64;
        rate
    }

    /// Returns an alert record when a threshold is crossed.
    #[must_use]
    pub fn check_alert(&self) -> Option<AlertRecord> {
        let rate = self.failure_rate();
        let snapshot = self.snapshot();
        let observed =
            snapshot.wrapped + snapshot.unwrapped + snapshot.wrap_failures + snapshot.unwrap_failures;
        if rate >= CRITICAL_FAILURE_RATE {
            Some(AlertRecord {
                level: AlertLevel::Critical,
                failure_rate: rate,
                observed_operations: observed,
            })
        } else if rate >= WARNING_FAILURE_RATE {
            Some(AlertRecord {
                level: AlertLevel::Warning,
                failure_rate: rate,
                observed_operations: observed,
            })
        } else {
            None
        }
    }
}
