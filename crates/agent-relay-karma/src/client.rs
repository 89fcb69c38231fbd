// crates/agent-relay-karma/src/client.rs
// ============================================================================
// Module: Karma Client
// Description: Pull-through cache with TTL, drift, and retry policy.
// Purpose: Serve cached karma under per-agent locks with typed retries.
// Dependencies: agent-relay-core, crate::source
// ============================================================================

//! ## Overview
//! The client caches one entry per agent: the fetched score, its capture
//! instant, and the performance baseline observed at capture. An entry is
//! valid while it is younger than the TTL, the agent's performance has not
//! drifted beyond the invalidation threshold from the baseline, and the
//! sliding window of recent samples is not too noisy. Invalid entries are
//! evicted on access and on performance observations. Fetches retry transient
//! failures with exponential backoff up to a bounded attempt count; permanent
//! failures end immediately. The decision path never blocks on karma: a final
//! failure simply reports unavailability.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::RwLock;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use agent_relay_core::AgentId;
use agent_relay_core::KarmaProvider;
use serde::Deserialize;
use serde::Serialize;

use crate::source::KarmaFetchError;
use crate::source::KarmaSource;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Karma client configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KarmaClientConfig {
    /// Maximum entry age before expiry.
    pub cache_ttl: Duration,
    /// Absolute performance movement that invalidates an entry.
    pub invalidation_threshold: f64,
    /// Sliding-window length for recent performance samples.
    pub window_size: usize,
    /// Window standard deviation above which entries are invalidated.
    pub stddev_bound: f64,
    /// Maximum fetch attempts per lookup (first try included).
    pub max_attempts: u32,
    /// Base backoff delay; doubles per retry.
    pub backoff_base: Duration,
}

impl Default for KarmaClientConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(60),
            invalidation_threshold: 0.2,
            window_size: 10,
            stddev_bound: 0.25,
            max_attempts: 3,
            backoff_base: Duration::from_millis(50),
        }
    }
}

// ============================================================================
// SECTION: Metrics
// ============================================================================

/// Serializable point-in-time view of the client counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KarmaMetricsSnapshot {
    /// Lookups served.
    pub requests: u64,
    /// Lookups answered from a valid cache entry.
    pub cache_hits: u64,
    /// Lookups that missed or evicted the cache.
    pub cache_misses: u64,
    /// Lookups that exhausted all attempts.
    pub errors: u64,
    /// Transient retries performed.
    pub retries: u64,
    /// Permanent upstream failures.
    pub non_retryable_errors: u64,
}

/// Atomic client counters.
#[derive(Debug, Default)]
struct KarmaMetrics {
    /// Lookups served.
    requests: AtomicU64,
    /// Lookups answered from a valid cache entry.
    cache_hits: AtomicU64,
    /// Lookups that missed or evicted the cache.
    cache_misses: AtomicU64,
    /// Lookups that exhausted all attempts.
    errors: AtomicU64,
    /// Transient retries performed.
    retries: AtomicU64,
    /// Permanent upstream failures.
    non_retryable_errors: AtomicU64,
}

// ============================================================================
// SECTION: Cache State
// ============================================================================

/// One cached karma entry.
#[derive(Debug, Clone)]
struct CacheEntry {
    /// Fetched karma score in `[0, 1]`.
    score: f64,
    /// Capture instant for TTL checks.
    captured_at: Instant,
    /// Agent performance score observed at capture time.
    baseline_performance: f64,
}

/// Per-agent cache state behind its own lock.
#[derive(Debug, Default)]
struct AgentKarmaState {
    /// Current cache entry, if any.
    entry: Option<CacheEntry>,
    /// Most recent observed performance score.
    last_performance: Option<f64>,
    /// Bounded window of recent performance samples.
    window: VecDeque<f64>,
}

/// Sample standard deviation over the sliding window.
fn window_stddev(window: &VecDeque<f64>) -> f64 {
    if window.len() < 2 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss, reason = "Window lengths stay tiny.")]
    let len = window.len() as f64;
    let mean = window.iter().sum::<f64>() / len;
    let variance = window.iter().map(|sample| (sample - mean).powi(2)).sum::<f64>() / len;
    variance.sqrt()
}

// ============================================================================
// SECTION: Client
// ============================================================================

/// Pull-through karma cache over an injected source.
///
/// # Invariants
/// - Cache access for one agent is serialized by that agent's lock.
/// - TTL-expired and drift-invalidated entries are treated as absent.
pub struct KarmaClient {
    /// Client configuration.
    config: KarmaClientConfig,
    /// Upstream score source.
    source: Arc<dyn KarmaSource>,
    /// Per-agent cache states, each behind its own lock.
    states: RwLock<BTreeMap<AgentId, Arc<Mutex<AgentKarmaState>>>>,
    /// Client counters.
    metrics: KarmaMetrics,
}

impl KarmaClient {
    /// Creates a client over the provided source.
    #[must_use]
    pub fn new(config: KarmaClientConfig, source: Arc<dyn KarmaSource>) -> Self {
        Self {
            config,
            source,
            states: RwLock::new(BTreeMap::new()),
            metrics: KarmaMetrics::default(),
        }
    }

    /// Returns a point-in-time snapshot of the client counters.
    #[must_use]
    pub fn metrics(&self) -> KarmaMetricsSnapshot {
        KarmaMetricsSnapshot {
            requests: self.metrics.requests.load(Ordering::Relaxed),
            cache_hits: self.metrics.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.metrics.cache_misses.load(Ordering::Relaxed),
            errors: self.metrics.errors.load(Ordering::Relaxed),
            retries: self.metrics.retries.load(Ordering::Relaxed),
            non_retryable_errors: self.metrics.non_retryable_errors.load(Ordering::Relaxed),
        }
    }

    /// Resolves the per-agent state slot, creating it when absent.
    fn state(&self, agent_id: &AgentId) -> Option<Arc<Mutex<AgentKarmaState>>> {
        if let Ok(guard) = self.states.read() {
            if let Some(slot) = guard.get(agent_id) {
                return Some(Arc::clone(slot));
            }
        }
        let mut guard = self.states.write().ok()?;
        Some(Arc::clone(
            guard.entry(agent_id.clone()).or_insert_with(Arc::default),
        ))
    }

    /// Returns whether an entry is still valid for the given state.
    fn entry_valid(&self, state: &AgentKarmaState, entry: &CacheEntry) -> bool {
        if entry.captured_at.elapsed() >= self.config.cache_ttl {
            return false;
        }
        if let Some(performance) = state.last_performance {
            if (performance - entry.baseline_performance).abs() > self.config.invalidation_threshold
            {
                return false;
            }
        }
        window_stddev(&state.window) < self.config.stddev_bound
    }

    /// Fetches with bounded retries on transient failures.
    fn fetch_with_retry(&self, agent_id: &AgentId) -> Option<f64> {
        let mut attempt = 1;
        loop {
            match self.source.fetch(agent_id) {
                Ok(score) => return Some(score.clamp(0.0, 1.0)),
                Err(KarmaFetchError::Permanent(_)) => {
                    self.metrics.non_retryable_errors.fetch_add(1, Ordering::Relaxed);
                    self.metrics.errors.fetch_add(1, Ordering::Relaxed);
                    return None;
                }
                Err(KarmaFetchError::Transient(_)) => {
                    if attempt >= self.config.max_attempts {
                        self.metrics.errors.fetch_add(1, Ordering::Relaxed);
                        return None;
                    }
                    self.metrics.retries.fetch_add(1, Ordering::Relaxed);
                    let backoff = self.config.backoff_base * 2_u32.saturating_pow(attempt - 1);
                    thread::sleep(backoff);
                    attempt += 1;
                }
            }
        }
    }
}

impl KarmaProvider for KarmaClient {
    fn karma(&self, agent_id: &AgentId) -> Option<f64> {
        self.metrics.requests.fetch_add(1, Ordering::Relaxed);
        let slot = self.state(agent_id)?;
        let mut state = slot.lock().ok()?;

        if let Some(entry) = state.entry.clone() {
            if self.entry_valid(&state, &entry) {
                self.metrics.cache_hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.score);
            }
            state.entry = None;
        }
        self.metrics.cache_misses.fetch_add(1, Ordering::Relaxed);

        let score = self.fetch_with_retry(agent_id)?;
        state.entry = Some(CacheEntry {
            score,
            captured_at: Instant::now(),
            baseline_performance: state.last_performance.unwrap_or(0.5),
        });
        Some(score)
    }

    fn observe_performance(&self, agent_id: &AgentId, performance: f64) {
        let Some(slot) = self.state(agent_id) else {
            return;
        };
        let Ok(mut state) = slot.lock() else {
            return;
        };
        let sample = performance.clamp(0.0, 1.0);
        state.window.push_back(sample);
        while state.window.len() > self.config.window_size {
            state.window.pop_front();
        }
        state.last_performance = Some(sample);
        if let Some(entry) = state.entry.clone() {
            if !self.entry_valid(&state, &entry) {
                state.entry = None;
            }
        }
    }

    fn clear_cache(&self, agent_id: Option<&AgentId>) {
        match agent_id {
            Some(agent_id) => {
                if let Some(slot) = self.state(agent_id) {
                    if let Ok(mut state) = slot.lock() {
                        state.entry = None;
                    }
                }
            }
            None => {
                if let Ok(guard) = self.states.read() {
                    for slot in guard.values() {
                        if let Ok(mut state) = slot.lock() {
                            state.entry = None;
                        }
                    }
                }
            }
        }
    }
}
