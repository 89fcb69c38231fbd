// crates/agent-relay-core/src/runtime/engine.rs
// ============================================================================
// Module: Agent Relay Decision Engine
// Description: Request-to-decision pipeline with strategy selection.
// Purpose: Encode state, score candidates, select one agent, and emit records.
// Dependencies: agent-relay-stp, crate::core, crate::interfaces, rand
// ============================================================================

//! ## Overview
//! `decide` is the canonical request path: encode state, collect candidates,
//! score each one, branch on strategy, and return an immutable decision
//! record. Emission to the decision log and the telemetry bus is best-effort;
//! a failure there increments a counter and never fails the decision. A panic
//! while scoring one candidate excludes that candidate only. Given the same
//! table, registry snapshot, strategy, and ε-branch outcome, the selected
//! agent is fixed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::panic::AssertUnwindSafe;
use std::panic::catch_unwind;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::Instant;

use agent_relay_stp::PacketType;
use agent_relay_stp::Sealer;
use agent_relay_stp::decision_priority;
use lru::LruCache;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde_json::Value;
use sha2::Digest;
use sha2::Sha256;

use crate::core::agent::Agent;
use crate::core::agent::AgentType;
use crate::core::decision::Alternative;
use crate::core::decision::DecisionRecord;
use crate::core::decision::RoutingStrategy;
use crate::core::decision::ScoreBreakdown;
use crate::core::hashing::DEFAULT_HASH_ALGORITHM;
use crate::core::hashing::hash_canonical_json;
use crate::core::identifiers::AgentId;
use crate::core::identifiers::DecisionId;
use crate::core::identifiers::RequestId;
use crate::core::identity::unique_id;
use crate::core::state::LoadBucket;
use crate::core::state::encode_state;
use crate::core::time::Clock;
use crate::core::time::TimeBucket;
use crate::core::time::to_rfc3339;
use crate::interfaces::DecisionSink;
use crate::interfaces::EngineError;
use crate::interfaces::KarmaProvider;
use crate::interfaces::TelemetryPublisher;
use crate::runtime::metrics::RelayMetrics;
use crate::runtime::qlearn::QLearningUpdater;
use crate::runtime::registry::AgentRegistry;
use crate::runtime::scoring::ScoringEngine;

// ============================================================================
// SECTION: Request Types
// ============================================================================

/// Advisory routing preferences narrowing the candidate set.
///
/// # Invariants
/// - Preferences never empty the candidate set; a filter that would is
///   ignored.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RoutePreferences {
    /// Maximum acceptable average latency in milliseconds.
    pub max_latency_ms: Option<f64>,
    /// Minimum acceptable scored confidence.
    pub min_confidence: Option<f64>,
}

/// One incoming routing request.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionRequest {
    /// Caller-supplied request identifier; generated when absent.
    pub request_id: Option<RequestId>,
    /// Required input-type tag (non-empty).
    pub input_type: String,
    /// Free-form context map (priority, domain, preferences).
    pub context: BTreeMap<String, Value>,
    /// Capabilities the request requires, matched against agent declarations.
    pub required_capabilities: Vec<String>,
    /// Selection strategy.
    pub strategy: RoutingStrategy,
    /// Advisory preferences.
    pub preferences: Option<RoutePreferences>,
}

impl DecisionRequest {
    /// Creates a request with defaults for everything but the input type.
    #[must_use]
    pub fn new(input_type: impl Into<String>) -> Self {
        Self {
            request_id: None,
            input_type: input_type.into(),
            context: BTreeMap::new(),
            required_capabilities: Vec::new(),
            strategy: RoutingStrategy::default(),
            preferences: None,
        }
    }
}

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Decision engine configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    /// Maximum alternatives recorded per decision.
    pub max_alternatives: usize,
    /// Whether the per-decision RNG is seeded from the request identifier.
    pub deterministic_seeding: bool,
    /// Deadline for one decide call.
    pub decide_deadline: Duration,
    /// Capacity of the recent-decision index consulted by feedback.
    pub decision_index_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_alternatives: 3,
            deterministic_seeding: false,
            decide_deadline: Duration::from_secs(2),
            decision_index_capacity: 100_000,
        }
    }
}

// ============================================================================
// SECTION: Decision Index
// ============================================================================

/// Compact view of one decision retained for feedback lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedDecision {
    /// Encoded state the decision was made in.
    pub state: String,
    /// Selected agent.
    pub agent_id: AgentId,
    /// Final confidence of the selection.
    pub confidence: f64,
}

/// Bounded index of recent decisions keyed by decision identifier.
///
/// # Invariants
/// - Capacity-bounded; the oldest decisions age out first.
#[derive(Debug)]
pub struct DecisionIndex {
    /// Recent decisions, least-recently-inserted evicted first.
    recent: Mutex<LruCache<DecisionId, IndexedDecision>>,
}

impl DecisionIndex {
    /// Creates an index with the provided capacity (clamped to at least one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            recent: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Records one decision.
    pub fn insert(&self, decision_id: DecisionId, decision: IndexedDecision) {
        if let Ok(mut guard) = self.recent.lock() {
            guard.put(decision_id, decision);
        }
    }

    /// Looks up one decision by identifier.
    #[must_use]
    pub fn get(&self, decision_id: &DecisionId) -> Option<IndexedDecision> {
        self.recent.lock().ok().and_then(|mut guard| guard.get(decision_id).cloned())
    }
}

// ============================================================================
// SECTION: Scored Candidate
// ============================================================================

/// One candidate with its scored confidence.
#[derive(Debug, Clone)]
struct ScoredCandidate {
    /// Candidate agent snapshot.
    agent: Agent,
    /// Bounded confidence.
    confidence: f64,
    /// Component breakdown behind the confidence.
    breakdown: ScoreBreakdown,
}

// ============================================================================
// SECTION: Decision Engine
// ============================================================================

/// Request-to-decision pipeline over injected collaborators.
pub struct DecisionEngine {
    /// Engine configuration.
    config: EngineConfig,
    /// Agent registry.
    registry: Arc<AgentRegistry>,
    /// Confidence scorer.
    scoring: Arc<ScoringEngine>,
    /// Q-table and exploration schedule.
    updater: Arc<QLearningUpdater>,
    /// Karma provider consulted per candidate.
    karma: Arc<dyn KarmaProvider>,
    /// Decision log sink (best-effort).
    sink: Arc<dyn DecisionSink>,
    /// Telemetry publisher (best-effort).
    publisher: Arc<dyn TelemetryPublisher>,
    /// Packet sealer for routing-decision packets.
    sealer: Arc<Sealer>,
    /// Injected wall clock.
    clock: Arc<dyn Clock>,
    /// Shared runtime metrics.
    metrics: Arc<RelayMetrics>,
    /// Recent-decision index shared with the feedback processor.
    index: Arc<DecisionIndex>,
    /// Aggregate in-flight decision gauge, shared with the feedback path.
    in_flight: Arc<AtomicU64>,
    /// Whether karma lookups are enabled.
    karma_enabled: Arc<AtomicBool>,
    /// Per-type round-robin rotation counters.
    rotation: Mutex<BTreeMap<String, usize>>,
}

impl DecisionEngine {
    /// Creates a decision engine.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] when the configuration is invalid.
    #[allow(clippy::too_many_arguments, reason = "Composition root wires every collaborator once.")]
    pub fn new(
        config: EngineConfig,
        registry: Arc<AgentRegistry>,
        scoring: Arc<ScoringEngine>,
        updater: Arc<QLearningUpdater>,
        karma: Arc<dyn KarmaProvider>,
        sink: Arc<dyn DecisionSink>,
        publisher: Arc<dyn TelemetryPublisher>,
        sealer: Arc<Sealer>,
        clock: Arc<dyn Clock>,
        metrics: Arc<RelayMetrics>,
        index: Arc<DecisionIndex>,
        karma_enabled: Arc<AtomicBool>,
        in_flight: Arc<AtomicU64>,
    ) -> Result<Self, EngineError> {
        if config.decide_deadline.is_zero() {
            return Err(EngineError::Config("decide_deadline must be positive".to_string()));
        }
        if config.decision_index_capacity == 0 {
            return Err(EngineError::Config(
                "decision_index_capacity must be positive".to_string(),
            ));
        }
        Ok(Self {
            config,
            registry,
            scoring,
            updater,
            karma,
            sink,
            publisher,
            sealer,
            clock,
            metrics,
            index,
            in_flight,
            karma_enabled,
            rotation: Mutex::new(BTreeMap::new()),
        })
    }

    /// Returns the aggregate in-flight decision count.
    #[must_use]
    pub fn in_flight(&self) -> u64 {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Routes one request to an agent.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NoEligibleAgent`] when no active agent matches,
    /// or [`EngineError::Timeout`] when the deadline expires. Telemetry and
    /// log failures are counted, never surfaced.
    pub fn decide(&self, request: &DecisionRequest) -> Result<DecisionRecord, EngineError> {
        let started = Instant::now();
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        let result = self.decide_inner(request, started);
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
        match &result {
            Ok(record) => self.metrics.record_decision(record.exploration),
            Err(EngineError::NoEligibleAgent(_)) => self.metrics.record_no_eligible_agent(),
            Err(EngineError::Timeout(_)) => self.metrics.record_decision_timeout(),
            Err(_) => self.metrics.record_internal_error(),
        }
        result
    }

    /// Inner pipeline; the wrapper owns gauge and metric bookkeeping.
    fn decide_inner(
        &self,
        request: &DecisionRequest,
        started: Instant,
    ) -> Result<DecisionRecord, EngineError> {
        if request.input_type.trim().is_empty() {
            return Err(EngineError::Config("input_type must be non-empty".to_string()));
        }
        let request_id =
            request.request_id.clone().unwrap_or_else(|| RequestId::new(unique_id("req")));
        let now = self.clock.now_utc();
        let state = encode_state(
            &request.input_type,
            &request.context,
            LoadBucket::from_in_flight(self.in_flight.load(Ordering::Relaxed)),
            TimeBucket::from_time(now),
        );

        let agent_type = AgentType::parse(&request.input_type);
        let mut candidates = self.registry.candidates(&agent_type, None);
        if let Some(preferences) = &request.preferences {
            candidates = narrow_by_latency(candidates, preferences.max_latency_ms);
        }
        candidates.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));
        if candidates.is_empty() {
            return Err(EngineError::NoEligibleAgent(request.input_type.clone()));
        }
        self.check_deadline(started)?;

        let mut scored = self.score_candidates(&candidates, request);
        if scored.is_empty() {
            return Err(EngineError::NoEligibleAgent(request.input_type.clone()));
        }
        if let Some(preferences) = &request.preferences {
            scored = narrow_by_confidence(scored, preferences.min_confidence);
        }
        self.check_deadline(started)?;

        let mut rng = self.decision_rng(&request_id);
        let (winner_index, exploration) = self.select(&scored, &state, request.strategy, &mut rng);
        let winner = &scored[winner_index];

        let alternatives = build_alternatives(&scored, winner_index, self.config.max_alternatives);
        let context_digest = hash_canonical_json(DEFAULT_HASH_ALGORITHM, &request.context)
            .map(|digest| digest.value)
            .unwrap_or_default();

        let record = DecisionRecord {
            decision_id: DecisionId::new(unique_id("dec")),
            request_id,
            decided_at: to_rfc3339(now),
            state: state.clone(),
            selected_agent: winner.agent.agent_id.clone(),
            confidence: winner.confidence,
            breakdown: winner.breakdown,
            alternatives,
            exploration,
            strategy: request.strategy,
            context_digest,
        };

        self.index.insert(
            record.decision_id.clone(),
            IndexedDecision {
                state,
                agent_id: record.selected_agent.clone(),
                confidence: record.confidence,
            },
        );
        self.emit(&record);
        Ok(record)
    }

    /// Scores all candidates, excluding any whose scoring panicked.
    fn score_candidates(
        &self,
        candidates: &[Agent],
        request: &DecisionRequest,
    ) -> Vec<ScoredCandidate> {
        let load = self.in_flight.load(Ordering::Relaxed);
        let karma_on = self.karma_enabled.load(Ordering::Relaxed);
        let mut scored = Vec::with_capacity(candidates.len());
        for agent in candidates {
            let karma = if karma_on {
                self.karma.karma(&agent.agent_id)
            } else {
                None
            };
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                self.scoring.confidence(agent, &request.required_capabilities, karma, load)
            }));
            match outcome {
                Ok((confidence, breakdown)) => scored.push(ScoredCandidate {
                    agent: agent.clone(),
                    confidence,
                    breakdown,
                }),
                Err(_) => self.metrics.record_scoring_panic(),
            }
        }
        scored
    }

    /// Branches on strategy and returns the winner index and explore flag.
    fn select(
        &self,
        scored: &[ScoredCandidate],
        state: &str,
        strategy: RoutingStrategy,
        rng: &mut StdRng,
    ) -> (usize, bool) {
        match strategy {
            RoutingStrategy::Random => (rng.gen_range(0..scored.len()), false),
            RoutingStrategy::RoundRobin => (self.rotate(state, scored.len()), false),
            RoutingStrategy::PerformanceBased => (argmax_confidence(scored), false),
            RoutingStrategy::QLearning => {
                let epsilon = self.updater.epsilon();
                if rng.r#gen::<f64>() < epsilon {
                    (rng.gen_range(0..scored.len()), true)
                } else {
                    (self.argmax_blended(scored, state), false)
                }
            }
        }
    }

    /// Advances the per-type rotation and returns the next index.
    fn rotate(&self, state: &str, len: usize) -> usize {
        let type_key = state
            .split('|')
            .find_map(|fragment| fragment.strip_prefix("input_type:"))
            .unwrap_or(state)
            .to_string();
        let mut guard = match self.rotation.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let counter = guard.entry(type_key).or_insert(0);
        let index = *counter % len;
        *counter = counter.wrapping_add(1);
        index
    }

    /// Argmax of `Q(state, agent) + β · confidence`, ties by agent ID.
    fn argmax_blended(&self, scored: &[ScoredCandidate], state: &str) -> usize {
        let beta = self.updater.config().score_blend_beta;
        let mut best = 0;
        let mut best_value = f64::NEG_INFINITY;
        for (index, candidate) in scored.iter().enumerate() {
            let value = self.updater.q_value(state, &candidate.agent.agent_id)
                + beta * candidate.confidence;
            if value > best_value {
                best = index;
                best_value = value;
            }
        }
        best
    }

    /// Builds the per-decision RNG, seeded when deterministic mode is on.
    fn decision_rng(&self, request_id: &RequestId) -> StdRng {
        if self.config.deterministic_seeding {
            StdRng::seed_from_u64(seed_from_request(request_id))
        } else {
            StdRng::from_entropy()
        }
    }

    /// Best-effort emission to the decision log and the telemetry bus.
    fn emit(&self, record: &DecisionRecord) {
        match serde_json::to_value(record) {
            Ok(json) => {
                if self.sink.append(&json).is_err() {
                    self.metrics.record_log_append_failure();
                }
                let priority = decision_priority(record.confidence);
                match self.sealer.wrap(
                    PacketType::RoutingDecision,
                    priority,
                    false,
                    json,
                    self.clock.now_utc(),
                ) {
                    Ok(packet) => {
                        if self.publisher.publish(packet).is_err() {
                            self.metrics.record_publish_failure();
                        }
                    }
                    Err(_) => self.metrics.record_publish_failure(),
                }
            }
            Err(_) => {
                self.metrics.record_log_append_failure();
                self.metrics.record_publish_failure();
            }
        }
    }

    /// Fails with `Timeout` once the decide deadline has expired.
    fn check_deadline(&self, started: Instant) -> Result<(), EngineError> {
        if started.elapsed() > self.config.decide_deadline {
            return Err(EngineError::Timeout(format!(
                "decide exceeded {:?}",
                self.config.decide_deadline
            )));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Selection Helpers
// ============================================================================

/// Argmax of confidence; ties by performance score, then by agent ID.
fn argmax_confidence(scored: &[ScoredCandidate]) -> usize {
    let mut best = 0;
    for (index, candidate) in scored.iter().enumerate().skip(1) {
        let current = &scored[best];
        let better = candidate.confidence > current.confidence
            || (candidate.confidence == current.confidence
                && (candidate.agent.counters.performance_score
                    > current.agent.counters.performance_score
                    || (candidate.agent.counters.performance_score
                        == current.agent.counters.performance_score
                        && candidate.agent.agent_id < current.agent.agent_id)));
        if better {
            best = index;
        }
    }
    best
}

/// Builds the next-best alternatives, confidence-descending.
fn build_alternatives(
    scored: &[ScoredCandidate],
    winner_index: usize,
    max_alternatives: usize,
) -> Vec<Alternative> {
    let mut others: Vec<&ScoredCandidate> = scored
        .iter()
        .enumerate()
        .filter_map(|(index, candidate)| (index != winner_index).then_some(candidate))
        .collect();
    others.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.agent.agent_id.cmp(&b.agent.agent_id))
    });
    others
        .into_iter()
        .take(max_alternatives)
        .map(|candidate| Alternative {
            agent_id: candidate.agent.agent_id.clone(),
            confidence: candidate.confidence,
        })
        .collect()
}

/// Applies the advisory latency preference; never empties the set.
fn narrow_by_latency(candidates: Vec<Agent>, max_latency_ms: Option<f64>) -> Vec<Agent> {
    let Some(bound) = max_latency_ms else {
        return candidates;
    };
    let narrowed: Vec<Agent> = candidates
        .iter()
        .filter(|agent| agent.counters.average_latency_ms <= bound)
        .cloned()
        .collect();
    if narrowed.is_empty() {
        candidates
    } else {
        narrowed
    }
}

/// Applies the advisory confidence preference; never empties the set.
fn narrow_by_confidence(
    scored: Vec<ScoredCandidate>,
    min_confidence: Option<f64>,
) -> Vec<ScoredCandidate> {
    let Some(bound) = min_confidence else {
        return scored;
    };
    let narrowed: Vec<ScoredCandidate> =
        scored.iter().filter(|candidate| candidate.confidence >= bound).cloned().collect();
    if narrowed.is_empty() {
        scored
    } else {
        narrowed
    }
}

/// Derives a stable RNG seed from a request identifier.
fn seed_from_request(request_id: &RequestId) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(request_id.as_str().as_bytes());
    let digest = hasher.finalize();
    let mut seed_bytes = [0_u8; 8];
    seed_bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(seed_bytes)
}
