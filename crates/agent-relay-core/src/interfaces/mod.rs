// crates/agent-relay-core/src/interfaces/mod.rs
// ============================================================================
// Module: Agent Relay Interfaces
// Description: Backend-agnostic interfaces for karma, telemetry, and storage.
// Purpose: Define the contract surfaces used by the relay runtime.
// Dependencies: agent-relay-stp, crate::core, serde, thiserror
// ============================================================================

//! ## Overview
//! Interfaces define how the relay core integrates with external systems
//! without embedding backend-specific details. Each component receives its
//! collaborators at construction; nothing here reaches for ambient singletons.
//! Implementations must fail closed and never block the decision path: karma
//! outages degrade to a neutral prior, telemetry and log failures are counted
//! rather than surfaced.

// ============================================================================
// SECTION: Imports
// ============================================================================

use agent_relay_stp::PacketEnvelope;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::identifiers::AgentId;
use crate::runtime::qlearn::QTableSnapshot;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Registry lookup and update errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The referenced agent does not exist.
    #[error("agent not found: {0}")]
    NotFound(String),
}

/// Decision engine errors surfaced to callers.
///
/// # Invariants
/// - Variants are stable for programmatic handling; downstream telemetry and
///   log failures are never surfaced through this type.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No active agent matched the request.
    #[error("no eligible agent for input type {0}")]
    NoEligibleAgent(String),
    /// The decision deadline expired.
    #[error("decision timed out: {0}")]
    Timeout(String),
    /// Invalid configuration detected at construction.
    #[error("configuration error: {0}")]
    Config(String),
    /// Recovered internal fault (sanitized numeric or panic).
    #[error("internal error: {0}")]
    Internal(String),
}

/// Feedback processing errors surfaced to callers.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum FeedbackError {
    /// The referenced decision is unknown.
    #[error("decision not found: {0}")]
    NotFound(String),
    /// The feedback event was already applied; the call was a no-op.
    #[error("duplicate feedback: {0}")]
    DuplicateFeedback(String),
    /// The feedback deadline expired.
    #[error("feedback timed out: {0}")]
    Timeout(String),
    /// Registry rejected the counter update.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Durable store errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem or backend I/O failed.
    #[error("store i/o error: {0}")]
    Io(String),
    /// Serialization of the persisted value failed.
    #[error("store serialization error: {0}")]
    Serialization(String),
    /// The store deadline expired; partial effects were rolled back.
    #[error("store timed out: {0}")]
    Timeout(String),
}

/// Decision log sink errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Appending the record failed.
    #[error("log append failed: {0}")]
    Append(String),
    /// The append deadline expired; the partial write was rolled back.
    #[error("log append timed out: {0}")]
    Timeout(String),
}

/// Telemetry publication errors.
///
/// # Invariants
/// - Publication is best-effort; the engine counts these and continues.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The bus is shut down or otherwise unreachable.
    #[error("telemetry publish failed: {0}")]
    Closed(String),
}

// ============================================================================
// SECTION: Karma Provider
// ============================================================================

/// Behavioral score provider with cache semantics.
///
/// Implementations own retry and cache policy; the runtime only sees a score
/// or its absence. `None` means unavailable and the scorer substitutes the
/// neutral prior.
pub trait KarmaProvider: Send + Sync {
    /// Returns the agent's karma score in `[0, 1]`, or `None` when
    /// unavailable.
    fn karma(&self, agent_id: &AgentId) -> Option<f64>;

    /// Feeds an observed performance score for drift invalidation.
    fn observe_performance(&self, agent_id: &AgentId, performance: f64);

    /// Clears cached entries for one agent, or all agents when `None`.
    fn clear_cache(&self, agent_id: Option<&AgentId>);
}

/// Karma provider that always reports unavailability.
///
/// # Invariants
/// - Every lookup yields `None`; observations are discarded.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoKarma;

impl KarmaProvider for NoKarma {
    fn karma(&self, _agent_id: &AgentId) -> Option<f64> {
        None
    }

    fn observe_performance(&self, _agent_id: &AgentId, _performance: f64) {}

    fn clear_cache(&self, _agent_id: Option<&AgentId>) {}
}

// ============================================================================
// SECTION: Telemetry Publisher
// ============================================================================

/// Non-blocking fan-out target for sealed packets.
pub trait TelemetryPublisher: Send + Sync {
    /// Publishes a sealed packet; must return in bounded time.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError`] when the bus is unreachable; per-subscriber
    /// overflow is absorbed by the bus and never surfaces here.
    fn publish(&self, packet: PacketEnvelope) -> Result<(), PublishError>;
}

// ============================================================================
// SECTION: Decision Sink
// ============================================================================

/// Append-only structured record sink for decisions and alerts.
pub trait DecisionSink: Send + Sync {
    /// Appends one structured record durably.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] when the append fails or times out.
    fn append(&self, record: &serde_json::Value) -> Result<(), SinkError>;
}

/// Decision sink that discards records.
///
/// # Invariants
/// - Appends always succeed and write nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDecisionSink;

impl DecisionSink for NullDecisionSink {
    fn append(&self, _record: &serde_json::Value) -> Result<(), SinkError> {
        Ok(())
    }
}

// ============================================================================
// SECTION: Q-Table Store
// ============================================================================

/// Durable store for Q-table snapshots.
pub trait QTableStore: Send + Sync {
    /// Loads the last persisted snapshot, or `None` when absent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backing file exists but cannot be
    /// read; callers treat this as an empty table and count the warning.
    fn load(&self) -> Result<Option<QTableSnapshot>, StoreError>;

    /// Persists a snapshot atomically.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write or rename fails.
    fn save(&self, snapshot: &QTableSnapshot) -> Result<(), StoreError>;
}

/// In-memory Q-table store for tests and local runs.
#[derive(Debug, Default)]
pub struct InMemoryQTableStore {
    /// Last saved snapshot protected by a mutex.
    snapshot: std::sync::Mutex<Option<QTableSnapshot>>,
}

impl InMemoryQTableStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl QTableStore for InMemoryQTableStore {
    fn load(&self) -> Result<Option<QTableSnapshot>, StoreError> {
        let guard = self
            .snapshot
            .lock()
            .map_err(|_| StoreError::Io("q-table store mutex poisoned".to_string()))?;
        Ok(guard.clone())
    }

    fn save(&self, snapshot: &QTableSnapshot) -> Result<(), StoreError> {
        self.snapshot
            .lock()
            .map_err(|_| StoreError::Io("q-table store mutex poisoned".to_string()))?
            .replace(snapshot.clone());
        Ok(())
    }
}

// ============================================================================
// SECTION: Health Report
// ============================================================================

/// Health classification carried by health packets.
///
/// # Invariants
/// - Labels are stable wire values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayHealth {
    /// Error rates below the warning threshold.
    Healthy,
    /// Warning threshold crossed.
    Degraded,
    /// Critical threshold crossed.
    Unhealthy,
}

impl RelayHealth {
    /// Returns the stable wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Unhealthy => "unhealthy",
        }
    }
}
