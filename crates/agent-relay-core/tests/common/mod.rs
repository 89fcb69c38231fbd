// crates/agent-relay-core/tests/common/mod.rs
// ============================================================================
// Module: Core Test Helpers
// Description: Shared fakes and fixtures for relay core tests.
// Purpose: Provide registries, karma fakes, and capture sinks for tests.
// Dependencies: agent-relay-core, agent-relay-stp
// ============================================================================

//! ## Overview
//! Test doubles for the injected collaborator seams: a map-backed karma
//! provider, a packet-capturing publisher, a record-capturing sink, and
//! fixture agents with preset counters.

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
    dead_code,
    reason = "Test-only helpers; not every test uses every fixture."
)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;

use agent_relay_core::Agent;
use agent_relay_core::AgentId;
use agent_relay_core::AgentType;
use agent_relay_core::DecisionSink;
use agent_relay_core::FixedClock;
use agent_relay_core::KarmaProvider;
use agent_relay_core::PublishError;
use agent_relay_core::SinkError;
use agent_relay_core::TelemetryPublisher;
use agent_relay_stp::PacketEnvelope;
use agent_relay_stp::Sealer;
use agent_relay_stp::SealerConfig;
use time::OffsetDateTime;
use time::macros::datetime;

/// Fixed test instant: a weekday morning.
pub const TEST_NOW: OffsetDateTime = datetime!(2026-03-02 09:00:00 UTC);

/// Map-backed karma provider fake.
#[derive(Debug, Default)]
pub struct MapKarma {
    /// Scores per agent.
    scores: Mutex<BTreeMap<AgentId, f64>>,
    /// Observed performance samples.
    pub observed: Mutex<Vec<(AgentId, f64)>>,
}

impl MapKarma {
    /// Creates an empty fake.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets one agent's score.
    pub fn set(&self, agent_id: &AgentId, score: f64) {
        self.scores.lock().unwrap().insert(agent_id.clone(), score);
    }
}

impl KarmaProvider for MapKarma {
    fn karma(&self, agent_id: &AgentId) -> Option<f64> {
        self.scores.lock().unwrap().get(agent_id).copied()
    }

    fn observe_performance(&self, agent_id: &AgentId, performance: f64) {
        self.observed.lock().unwrap().push((agent_id.clone(), performance));
    }

    fn clear_cache(&self, agent_id: Option<&AgentId>) {
        match agent_id {
            Some(agent_id) => {
                self.scores.lock().unwrap().remove(agent_id);
            }
            None => self.scores.lock().unwrap().clear(),
        }
    }
}

/// Publisher fake capturing every packet.
#[derive(Debug, Default)]
pub struct CapturePublisher {
    /// Captured packets in publish order.
    pub packets: Mutex<Vec<PacketEnvelope>>,
    /// Whether publish should fail.
    pub fail: std::sync::atomic::AtomicBool,
}

impl CapturePublisher {
    /// Creates a capturing publisher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of captured packets.
    pub fn len(&self) -> usize {
        self.packets.lock().unwrap().len()
    }
}

impl TelemetryPublisher for CapturePublisher {
    fn publish(&self, packet: PacketEnvelope) -> Result<(), PublishError> {
        if self.fail.load(std::sync::atomic::Ordering::Relaxed) {
            return Err(PublishError::Closed("test failure".to_string()));
        }
        self.packets.lock().unwrap().push(packet);
        Ok(())
    }
}

/// Sink fake capturing every appended record.
#[derive(Debug, Default)]
pub struct CaptureSink {
    /// Captured records in append order.
    pub records: Mutex<Vec<serde_json::Value>>,
    /// Whether append should fail.
    pub fail: std::sync::atomic::AtomicBool,
}

impl CaptureSink {
    /// Creates a capturing sink.
    pub fn new() -> Self {
        Self::default()
    }
}

impl DecisionSink for CaptureSink {
    fn append(&self, record: &serde_json::Value) -> Result<(), SinkError> {
        if self.fail.load(std::sync::atomic::Ordering::Relaxed) {
            return Err(SinkError::Append("test failure".to_string()));
        }
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}

/// Builds an active NLP agent with preset rate and performance.
pub fn nlp_agent(id: &str, success_rate: f64, performance: f64) -> Agent {
    let mut agent = Agent::new(AgentId::new(id), format!("agent {id}"), AgentType::Nlp);
    agent.counters.success_rate = success_rate;
    agent.counters.performance_score = performance;
    agent
}

/// Builds an unsigned sealer with default settings.
pub fn test_sealer() -> Arc<Sealer> {
    Arc::new(Sealer::new(SealerConfig::default(), Arc::default()).expect("sealer config"))
}

/// Builds a fixed clock at [`TEST_NOW`].
pub fn test_clock() -> Arc<FixedClock> {
    Arc::new(FixedClock::new(TEST_NOW))
}
