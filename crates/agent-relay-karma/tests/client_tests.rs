// crates/agent-relay-karma/tests/client_tests.rs
// ============================================================================
// Module: Karma Client Tests
// Description: Cache validity, drift eviction, retry policy, and counters.
// Purpose: Validate the pull-through cache and typed retry loop.
// Dependencies: agent-relay-karma, agent-relay-core
// ============================================================================

//! ## Overview
//! Exercises the karma client against scripted sources: cache hits within
//! TTL, transient retries with exhaustion, permanent failures without
//! retries, drift- and noise-based eviction through performance
//! observations, and the documented counter movements.

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
use std::sync::Mutex;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use agent_relay_core::AgentId;
use agent_relay_core::KarmaProvider;
use agent_relay_karma::KarmaClient;
use agent_relay_karma::KarmaClientConfig;
use agent_relay_karma::KarmaFetchError;
use agent_relay_karma::KarmaSource;
use agent_relay_karma::StaticKarmaSource;

/// Source that counts fetches and replays a scripted outcome sequence.
struct ScriptedSource {
    /// Number of fetches observed.
    fetches: AtomicU64,
    /// Scripted outcomes consumed in order; the last repeats.
    script: Mutex<Vec<Result<f64, KarmaFetchError>>>,
}

impl ScriptedSource {
    /// Creates a source from a script.
    fn new(script: Vec<Result<f64, KarmaFetchError>>) -> Self {
        Self {
            fetches: AtomicU64::new(0),
            script: Mutex::new(script),
        }
    }

    /// Returns the number of fetches observed.
    fn fetches(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }
}

impl KarmaSource for ScriptedSource {
    fn fetch(&self, _agent_id: &AgentId) -> Result<f64, KarmaFetchError> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        let mut script = self.script.lock().unwrap();
        let outcome = if script.len() > 1 {
            script.remove(0)
        } else {
            match script.first().unwrap() {
                Ok(score) => Ok(*score),
                Err(KarmaFetchError::Transient(message)) => {
                    Err(KarmaFetchError::Transient(message.clone()))
                }
                Err(KarmaFetchError::Permanent(message)) => {
                    Err(KarmaFetchError::Permanent(message.clone()))
                }
            }
        };
        outcome
    }
}

/// Fast-backoff configuration for tests.
fn fast_config() -> KarmaClientConfig {
    KarmaClientConfig {
        backoff_base: Duration::from_millis(1),
        ..KarmaClientConfig::default()
    }
}

// ============================================================================
// SECTION: Cache Tests
// ============================================================================

/// Tests a second lookup within TTL hits the cache.
#[test]
fn lookup_within_ttl_hits_cache() {
    let source = Arc::new(ScriptedSource::new(vec![Ok(0.8)]));
    let client = KarmaClient::new(fast_config(), Arc::clone(&source) as Arc<dyn KarmaSource>);
    let agent = AgentId::new("agent-a");

    assert_eq!(client.karma(&agent), Some(0.8));
    assert_eq!(client.karma(&agent), Some(0.8));
    assert_eq!(source.fetches(), 1);

    let metrics = client.metrics();
    assert_eq!(metrics.requests, 2);
    assert_eq!(metrics.cache_hits, 1);
    assert_eq!(metrics.cache_misses, 1);
}

/// Tests an expired entry refetches.
#[test]
fn expired_entry_refetches() {
    let config = KarmaClientConfig {
        cache_ttl: Duration::from_millis(1),
        ..fast_config()
    };
    let source = Arc::new(ScriptedSource::new(vec![Ok(0.8)]));
    let client = KarmaClient::new(config, Arc::clone(&source) as Arc<dyn KarmaSource>);
    let agent = AgentId::new("agent-a");

    assert_eq!(client.karma(&agent), Some(0.8));
    std::thread::sleep(Duration::from_millis(5));
    assert_eq!(client.karma(&agent), Some(0.8));
    assert_eq!(source.fetches(), 2);
}

/// Tests performance drift beyond the threshold evicts the entry.
#[test]
fn performance_drift_evicts_entry() {
    let source = Arc::new(ScriptedSource::new(vec![Ok(0.8)]));
    let client = KarmaClient::new(fast_config(), Arc::clone(&source) as Arc<dyn KarmaSource>);
    let agent = AgentId::new("agent-a");

    client.observe_performance(&agent, 0.5);
    assert_eq!(client.karma(&agent), Some(0.8));
    client.observe_performance(&agent, 0.9);
    assert_eq!(client.karma(&agent), Some(0.8));
    assert_eq!(source.fetches(), 2, "drifted entry must refetch");
}

/// Tests a noisy sample window evicts the entry.
#[test]
fn noisy_window_evicts_entry() {
    let config = KarmaClientConfig {
        stddev_bound: 0.05,
        invalidation_threshold: 1.0,
        ..fast_config()
    };
    let source = Arc::new(ScriptedSource::new(vec![Ok(0.8)]));
    let client = KarmaClient::new(config, Arc::clone(&source) as Arc<dyn KarmaSource>);
    let agent = AgentId::new("agent-a");

    assert_eq!(client.karma(&agent), Some(0.8));
    for sample in [0.1, 0.9, 0.1, 0.9] {
        client.observe_performance(&agent, sample);
    }
    assert_eq!(client.karma(&agent), Some(0.8));
    assert_eq!(source.fetches(), 2, "noisy window must refetch");
}

/// Tests clear_cache evicts one or all agents.
#[test]
fn clear_cache_evicts_entries() {
    let source = Arc::new(ScriptedSource::new(vec![Ok(0.8)]));
    let client = KarmaClient::new(fast_config(), Arc::clone(&source) as Arc<dyn KarmaSource>);
    let agent = AgentId::new("agent-a");

    assert_eq!(client.karma(&agent), Some(0.8));
    client.clear_cache(Some(&agent));
    assert_eq!(client.karma(&agent), Some(0.8));
    assert_eq!(source.fetches(), 2);

    client.clear_cache(None);
    assert_eq!(client.karma(&agent), Some(0.8));
    assert_eq!(source.fetches(), 3);
}

// ============================================================================
// SECTION: Retry Tests
// ============================================================================

/// Tests transient failures retry and then succeed.
#[test]
fn transient_failures_retry_then_succeed() {
    let source = Arc::new(ScriptedSource::new(vec![
        Err(KarmaFetchError::Transient("timeout".to_string())),
        Err(KarmaFetchError::Transient("timeout".to_string())),
        Ok(0.7),
    ]));
    let client = KarmaClient::new(fast_config(), Arc::clone(&source) as Arc<dyn KarmaSource>);

    assert_eq!(client.karma(&AgentId::new("agent-a")), Some(0.7));
    assert_eq!(source.fetches(), 3);
    let metrics = client.metrics();
    assert_eq!(metrics.retries, 2);
    assert_eq!(metrics.errors, 0);
}

/// Tests exhausted transient retries degrade to unavailability.
#[test]
fn exhausted_retries_return_unavailable() {
    let source = Arc::new(ScriptedSource::new(vec![Err(KarmaFetchError::Transient(
        "down".to_string(),
    ))]));
    let client = KarmaClient::new(fast_config(), Arc::clone(&source) as Arc<dyn KarmaSource>);

    assert_eq!(client.karma(&AgentId::new("agent-a")), None);
    assert_eq!(source.fetches(), 3);
    let metrics = client.metrics();
    assert_eq!(metrics.retries, 2);
    assert_eq!(metrics.errors, 1);
}

/// Tests permanent failures never retry.
#[test]
fn permanent_failures_do_not_retry() {
    let source = Arc::new(ScriptedSource::new(vec![Err(KarmaFetchError::Permanent(
        "forbidden".to_string(),
    ))]));
    let client = KarmaClient::new(fast_config(), Arc::clone(&source) as Arc<dyn KarmaSource>);

    assert_eq!(client.karma(&AgentId::new("agent-a")), None);
    assert_eq!(source.fetches(), 1);
    let metrics = client.metrics();
    assert_eq!(metrics.retries, 0);
    assert_eq!(metrics.non_retryable_errors, 1);
    assert_eq!(metrics.errors, 1);
}

// ============================================================================
// SECTION: Static Source Tests
// ============================================================================

/// Tests the static source clamps scores and reports missing agents.
#[test]
fn static_source_clamps_and_reports_missing() {
    let source = StaticKarmaSource::new();
    source.set(AgentId::new("agent-a"), 1.7);
    assert_eq!(source.fetch(&AgentId::new("agent-a")).ok(), Some(1.0));
    assert!(matches!(
        source.fetch(&AgentId::new("ghost")),
        Err(KarmaFetchError::Permanent(_))
    ));
}
