// system-tests/tests/helpers/mod.rs
// ============================================================================
// Module: System Test Helpers
// Description: Full-stack relay fixture over temp-directory stores.
// Purpose: Wire the composition root with real stores and a real bus.
// Dependencies: every agent-relay crate, tempfile
// ============================================================================

//! ## Overview
//! Builds a complete relay: file-backed Q-table and decision log in a temp
//! directory, the real telemetry bus, the karma client over a static source,
//! and a fixed clock for replayable state encodings.

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
    reason = "Test-only helpers; not every suite uses every fixture."
)]

use std::sync::Arc;

use agent_relay_core::Agent;
use agent_relay_core::AgentId;
use agent_relay_core::AgentType;
use agent_relay_core::FixedClock;
use agent_relay_core::RelayCore;
use agent_relay_core::RelayCoreConfig;
use agent_relay_karma::KarmaClient;
use agent_relay_karma::KarmaClientConfig;
use agent_relay_karma::StaticKarmaSource;
use agent_relay_store_file::FileDecisionLog;
use agent_relay_store_file::FileDecisionLogConfig;
use agent_relay_store_file::FileQTableStore;
use agent_relay_stp::Sealer;
use agent_relay_stp::SealerConfig;
use agent_relay_telemetry::BusConfig;
use agent_relay_telemetry::TelemetryBus;
use tempfile::TempDir;
use time::OffsetDateTime;
use time::macros::datetime;

/// Fixed test instant: a weekday morning.
pub const TEST_NOW: OffsetDateTime = datetime!(2026-03-02 09:00:00 UTC);

/// Fully wired relay fixture.
pub struct SystemFixture {
    /// Relay under test.
    pub core: RelayCore,
    /// Live telemetry bus.
    pub bus: Arc<TelemetryBus>,
    /// Static upstream karma scores.
    pub karma_source: Arc<StaticKarmaSource>,
    /// Decision log over the temp directory.
    pub log: Arc<FileDecisionLog>,
    /// Fixed wall clock.
    pub clock: Arc<FixedClock>,
    /// Backing temp directory (kept alive for the fixture's lifetime).
    pub dir: TempDir,
}

/// Builds the full relay stack into a fresh temp directory.
pub fn system_fixture(configure: impl FnOnce(&mut RelayCoreConfig)) -> SystemFixture {
    let dir = TempDir::new().expect("tempdir");
    build_fixture(dir, configure)
}

/// Rebuilds the relay stack over an existing temp directory, simulating a
/// process restart against the same canonical files.
pub fn restart_fixture(
    dir: TempDir,
    configure: impl FnOnce(&mut RelayCoreConfig),
) -> SystemFixture {
    build_fixture(dir, configure)
}

/// Shared fixture assembly.
fn build_fixture(dir: TempDir, configure: impl FnOnce(&mut RelayCoreConfig)) -> SystemFixture {
    let mut config = RelayCoreConfig::with_defaults();
    config.engine.deterministic_seeding = true;
    configure(&mut config);

    let bus = TelemetryBus::new(BusConfig::default());
    let karma_source = Arc::new(StaticKarmaSource::new());
    let karma = Arc::new(KarmaClient::new(
        KarmaClientConfig {
            backoff_base: std::time::Duration::from_millis(1),
            ..KarmaClientConfig::default()
        },
        Arc::clone(&karma_source) as Arc<dyn agent_relay_karma::KarmaSource>,
    ));
    let log = Arc::new(FileDecisionLog::new(FileDecisionLogConfig::new(
        dir.path().join("decisions.jsonl"),
    )));
    let qstore = Arc::new(FileQTableStore::new(dir.path().join("qtable.json")));
    let sealer =
        Arc::new(Sealer::new(SealerConfig::default(), Arc::default()).expect("sealer config"));
    let clock = Arc::new(FixedClock::new(TEST_NOW));

    let core = RelayCore::new(
        config,
        karma,
        Arc::clone(&log) as Arc<dyn agent_relay_core::DecisionSink>,
        Arc::clone(&bus) as Arc<dyn agent_relay_core::TelemetryPublisher>,
        sealer,
        qstore,
        Arc::clone(&clock) as Arc<dyn agent_relay_core::Clock>,
    )
    .expect("valid relay config");

    SystemFixture {
        core,
        bus,
        karma_source,
        log,
        clock,
        dir,
    }
}

/// Builds an active NLP agent with preset rate and performance.
pub fn nlp_agent(id: &str, success_rate: f64, performance: f64) -> Agent {
    let mut agent = Agent::new(AgentId::new(id), format!("agent {id}"), AgentType::Nlp);
    agent.counters.success_rate = success_rate;
    agent.counters.performance_score = performance;
    agent
}
