// crates/agent-relay-core/src/core/time.rs
// ============================================================================
// Module: Agent Relay Time Model
// Description: Injected wall clock and discretized time-of-day buckets.
// Purpose: Keep decision and feedback paths replayable under a test clock.
// Dependencies: time
// ============================================================================

//! ## Overview
//! Runtime components never read ambient wall-clock time directly; they hold a
//! [`Clock`] and ask it. Production wiring injects [`SystemClock`]; tests
//! inject [`FixedClock`] so state encodings and packet timestamps replay
//! deterministically. Monotonic measurements (latency, persistence intervals)
//! use `std::time::Instant` at the call sites and are not modeled here.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Mutex;

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

// ============================================================================
// SECTION: Clock Trait
// ============================================================================

/// Source of wall-clock time for runtime components.
pub trait Clock: Send + Sync {
    /// Returns the current UTC wall-clock time.
    fn now_utc(&self) -> OffsetDateTime;
}

/// Production clock reading the operating system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Deterministic clock for tests; returns a fixed, settable instant.
#[derive(Debug)]
pub struct FixedClock {
    /// Current fixed time, protected for interior mutability in tests.
    now: Mutex<OffsetDateTime>,
}

impl FixedClock {
    /// Creates a fixed clock at the provided instant.
    #[must_use]
    pub fn new(now: OffsetDateTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Replaces the fixed instant.
    pub fn set(&self, now: OffsetDateTime) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = now;
        }
    }

    /// Advances the fixed instant by the provided duration.
    pub fn advance(&self, by: time::Duration) {
        if let Ok(mut guard) = self.now.lock() {
            *guard += by;
        }
    }
}

impl Clock for FixedClock {
    fn now_utc(&self) -> OffsetDateTime {
        self.now.lock().map_or(OffsetDateTime::UNIX_EPOCH, |guard| *guard)
    }
}

// ============================================================================
// SECTION: Formatting Helpers
// ============================================================================

/// Formats a timestamp as RFC 3339 UTC for wire records.
///
/// Falls back to the unix-epoch rendering when formatting fails, which can
/// only happen for out-of-range years.
#[must_use]
pub fn to_rfc3339(ts: OffsetDateTime) -> String {
    ts.format(&Rfc3339).unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

/// Parses an RFC 3339 timestamp from wire records.
#[must_use]
pub fn from_rfc3339(raw: &str) -> Option<OffsetDateTime> {
    OffsetDateTime::parse(raw, &Rfc3339).ok()
}

// ============================================================================
// SECTION: Time Buckets
// ============================================================================

/// Discretized time-of-day bucket used by the state encoding.
///
/// # Invariants
/// - Derived from the hour of the injected clock; stable label per bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeBucket {
    /// 05:00 through 11:59.
    Morning,
    /// 12:00 through 16:59.
    Afternoon,
    /// 17:00 through 21:59.
    Evening,
    /// 22:00 through 04:59.
    Night,
}

impl TimeBucket {
    /// Derives the bucket from a wall-clock instant.
    #[must_use]
    pub const fn from_time(ts: OffsetDateTime) -> Self {
        match ts.hour() {
            5..=11 => Self::Morning,
            12..=16 => Self::Afternoon,
            17..=21 => Self::Evening,
            _ => Self::Night,
        }
    }

    /// Returns the stable encoding label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Morning => "morning",
            Self::Afternoon => "afternoon",
            Self::Evening => "evening",
            Self::Night => "night",
        }
    }
}
