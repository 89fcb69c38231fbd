// crates/agent-relay-core/src/runtime/qlearn.rs
// ============================================================================
// Module: Agent Relay Q-Learning Updater
// Description: Tabular Q-learning with ε-greedy schedule and reward shaping.
// Purpose: Learn state-action values from feedback with crash-safe persistence.
// Dependencies: crate::core, crate::interfaces, serde
// ============================================================================

//! ## Overview
//! The updater holds the tabular Q-function keyed by (encoded state, agent)
//! and the exploration schedule. Values stay finite under all inputs:
//! non-finite update results collapse to zero and are counted. Persistence is
//! event-driven: the table saves when the dirty count crosses a threshold or
//! enough wall time passed, plus a forced save at orderly shutdown. Abrupt
//! termination loses at most one save interval of updates.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::Hash;
use std::hash::Hasher;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::Instant;

use serde::Deserialize;
use serde::Serialize;

use crate::core::feedback::FeedbackEvent;
use crate::core::identifiers::AgentId;
use crate::core::state::is_current_schema;
use crate::interfaces::EngineError;
use crate::interfaces::QTableStore;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Number of state-keyed shards; each shard has its own lock.
const SHARD_COUNT: usize = 16;

/// Reward clamp bound.
const REWARD_BOUND: f64 = 2.0;

/// Weight of the raw reward under karma smoothing.
const SMOOTHING_REWARD_WEIGHT: f64 = 0.75;

/// Weight of the normalized karma under karma smoothing.
const SMOOTHING_KARMA_WEIGHT: f64 = 0.25;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Q-learning and exploration-schedule configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QLearningConfig {
    /// Learning rate α in `(0, 1]`.
    pub alpha: f64,
    /// Discount factor γ in `[0, 1]`.
    pub gamma: f64,
    /// Initial exploration rate ε.
    pub epsilon_initial: f64,
    /// Multiplicative ε decay applied per feedback event.
    pub epsilon_decay: f64,
    /// Lower ε bound.
    pub epsilon_min: f64,
    /// Confidence blend factor β used for cold-state tie-breaking.
    pub score_blend_beta: f64,
    /// Whether rewards are smoothed toward normalized karma.
    pub karma_smoothing: bool,
    /// Dirty-write count that triggers a save.
    pub save_threshold: u64,
    /// Wall-clock interval that triggers a save.
    pub save_interval: Duration,
}

impl Default for QLearningConfig {
    fn default() -> Self {
        Self {
            alpha: 0.1,
            gamma: 0.95,
            epsilon_initial: 0.1,
            epsilon_decay: 0.995,
            epsilon_min: 0.01,
            score_blend_beta: 1.0,
            karma_smoothing: true,
            save_threshold: 10,
            save_interval: Duration::from_secs(300),
        }
    }
}

impl QLearningConfig {
    /// Validates the configuration invariants.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] when any knob leaves its documented
    /// range.
    pub fn validate(&self) -> Result<(), EngineError> {
        if !self.alpha.is_finite() || !(0.0..=1.0).contains(&self.alpha) || self.alpha == 0.0 {
            return Err(EngineError::Config(format!("alpha must be in (0, 1], got {}", self.alpha)));
        }
        if !self.gamma.is_finite() || !(0.0..=1.0).contains(&self.gamma) {
            return Err(EngineError::Config(format!("gamma must be in [0, 1], got {}", self.gamma)));
        }
        if !self.epsilon_initial.is_finite() || !(0.0..=1.0).contains(&self.epsilon_initial) {
            return Err(EngineError::Config(format!(
                "epsilon_initial must be in [0, 1], got {}",
                self.epsilon_initial
            )));
        }
        if !self.epsilon_decay.is_finite() || !(0.0..=1.0).contains(&self.epsilon_decay) || self.epsilon_decay == 0.0 {
            return Err(EngineError::Config(format!(
                "epsilon_decay must be in (0, 1], got {}",
                self.epsilon_decay
            )));
        }
        if !self.epsilon_min.is_finite() || self.epsilon_min < 0.0 || self.epsilon_min > self.epsilon_initial {
            return Err(EngineError::Config(format!(
                "epsilon_min must be in [0, epsilon_initial], got {}",
                self.epsilon_min
            )));
        }
        if !self.score_blend_beta.is_finite() || self.score_blend_beta < 0.0 {
            return Err(EngineError::Config(format!(
                "score_blend_beta must be non-negative, got {}",
                self.score_blend_beta
            )));
        }
        if self.save_threshold == 0 {
            return Err(EngineError::Config("save_threshold must be positive".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Snapshot
// ============================================================================

/// One persisted state-action value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QTableEntry {
    /// Encoded state string.
    pub state: String,
    /// Agent identifier acting as the Q-table action.
    pub agent_id: AgentId,
    /// Learned value; always finite.
    pub value: f64,
}

/// Serializable snapshot of the table and exploration schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QTableSnapshot {
    /// Persisted state-action values, state-then-agent ordered.
    pub entries: Vec<QTableEntry>,
    /// Exploration rate at snapshot time.
    pub epsilon: f64,
}

/// Result of one Q-value update.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QUpdate {
    /// Value before the update.
    pub previous: f64,
    /// Value after the update; always finite.
    pub updated: f64,
}

// ============================================================================
// SECTION: Updater
// ============================================================================

/// Tabular Q-learning updater with sharded locking.
///
/// # Invariants
/// - Every stored value is finite; sanitized writes are counted.
/// - ε is monotone non-increasing and never drops below `epsilon_min`.
/// - Updates for one (state, action) are linearizable via the state's shard.
pub struct QLearningUpdater {
    /// Learning configuration.
    config: QLearningConfig,
    /// State-keyed shards mapping state to per-agent values.
    shards: Vec<Mutex<BTreeMap<String, BTreeMap<AgentId, f64>>>>,
    /// Current exploration rate.
    epsilon: Mutex<f64>,
    /// Dirty writes since the last successful save.
    dirty: AtomicU64,
    /// Non-finite results replaced with zero.
    sanitized: AtomicU64,
    /// Wall-clock instant of the last successful save.
    last_save: Mutex<Instant>,
}

impl QLearningUpdater {
    /// Creates an empty updater, validating the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] when the configuration is invalid.
    pub fn new(config: QLearningConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let shards = (0..SHARD_COUNT).map(|_| Mutex::new(BTreeMap::new())).collect();
        let epsilon = Mutex::new(config.epsilon_initial);
        Ok(Self {
            config,
            shards,
            epsilon,
            dirty: AtomicU64::new(0),
            sanitized: AtomicU64::new(0),
            last_save: Mutex::new(Instant::now()),
        })
    }

    /// Returns the learning configuration.
    #[must_use]
    pub const fn config(&self) -> &QLearningConfig {
        &self.config
    }

    /// Returns the learned value for one state-action pair (0 when unseen).
    #[must_use]
    pub fn q_value(&self, state: &str, agent_id: &AgentId) -> f64 {
        self.with_shard(state, |table| {
            table.get(state).and_then(|actions| actions.get(agent_id)).copied().unwrap_or(0.0)
        })
    }

    /// Returns the maximum learned value over known actions for a state.
    ///
    /// States under older schema tags are excluded and report zero, as do
    /// states with no known actions.
    #[must_use]
    pub fn max_value(&self, state: &str) -> f64 {
        if !is_current_schema(state) {
            return 0.0;
        }
        self.with_shard(state, |table| {
            table
                .get(state)
                .map(|actions| actions.values().copied().fold(0.0_f64, f64::max))
                .unwrap_or(0.0)
        })
    }

    /// Applies one reward via the tabular Q-learning rule.
    ///
    /// `next_state` defaults to the decision state when the feedback carried
    /// no transition context. Non-finite results are replaced with zero and
    /// counted.
    pub fn apply_reward(
        &self,
        state: &str,
        agent_id: &AgentId,
        reward: f64,
        next_state: Option<&str>,
    ) -> QUpdate {
        let successor = next_state.unwrap_or(state);
        let max_next = self.max_value(successor);
        let update = self.with_shard(state, |table| {
            let actions = table.entry(state.to_string()).or_default();
            let previous = actions.get(agent_id).copied().unwrap_or(0.0);
            let mut updated = previous
                + self.config.alpha * (reward + self.config.gamma * max_next - previous);
            if !updated.is_finite() {
                updated = 0.0;
                self.sanitized.fetch_add(1, Ordering::Relaxed);
            }
            actions.insert(agent_id.clone(), updated);
            QUpdate {
                previous,
                updated,
            }
        });
        self.dirty.fetch_add(1, Ordering::Relaxed);
        update
    }

    /// Returns the current exploration rate.
    #[must_use]
    pub fn epsilon(&self) -> f64 {
        self.epsilon.lock().map_or(self.config.epsilon_min, |guard| *guard)
    }

    /// Decays ε by one multiplicative step, bounded below by `epsilon_min`.
    pub fn decay_epsilon(&self) -> f64 {
        self.epsilon.lock().map_or(self.config.epsilon_min, |mut guard| {
            *guard = (*guard * self.config.epsilon_decay).max(self.config.epsilon_min);
            *guard
        })
    }

    /// Overrides ε; used by deterministic tests and snapshot restore.
    pub fn set_epsilon(&self, epsilon: f64) {
        if let Ok(mut guard) = self.epsilon.lock() {
            *guard = epsilon.clamp(self.config.epsilon_min, 1.0);
        }
    }

    /// Returns the number of sanitized (non-finite) writes.
    #[must_use]
    pub fn sanitized_writes(&self) -> u64 {
        self.sanitized.load(Ordering::Relaxed)
    }

    /// Returns the number of dirty writes since the last save.
    #[must_use]
    pub fn dirty_writes(&self) -> u64 {
        self.dirty.load(Ordering::Relaxed)
    }

    /// Returns the number of stored state-action entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .filter_map(|shard| shard.lock().ok())
            .map(|table| table.values().map(BTreeMap::len).sum::<usize>())
            .sum()
    }

    /// Returns whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Returns whether either persistence trigger has fired.
    #[must_use]
    pub fn save_due(&self) -> bool {
        if self.dirty.load(Ordering::Relaxed) >= self.config.save_threshold {
            return true;
        }
        self.last_save
            .lock()
            .map(|last| last.elapsed() >= self.config.save_interval)
            .unwrap_or(true)
    }

    /// Persists the table when a trigger has fired; returns whether it saved.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store rejects the snapshot.
    pub fn save_if_due(&self, store: &dyn QTableStore) -> Result<bool, StoreError> {
        if !self.save_due() {
            return Ok(false);
        }
        self.force_save(store)?;
        Ok(true)
    }

    /// Persists the table immediately; always invoked at orderly shutdown.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store rejects the snapshot.
    pub fn force_save(&self, store: &dyn QTableStore) -> Result<(), StoreError> {
        let snapshot = self.snapshot();
        store.save(&snapshot)?;
        self.dirty.store(0, Ordering::Relaxed);
        if let Ok(mut last) = self.last_save.lock() {
            *last = Instant::now();
        }
        Ok(())
    }

    /// Loads the persisted snapshot, replacing the in-memory table.
    ///
    /// Returns whether a snapshot was found. Callers treat errors as a logged
    /// warning and start empty; load is best-effort by contract.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store exists but cannot be read.
    pub fn load_from(&self, store: &dyn QTableStore) -> Result<bool, StoreError> {
        match store.load()? {
            Some(snapshot) => {
                self.restore(&snapshot);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Builds a serializable snapshot of the table and schedule.
    #[must_use]
    pub fn snapshot(&self) -> QTableSnapshot {
        let mut entries = Vec::new();
        for shard in &self.shards {
            if let Ok(table) = shard.lock() {
                for (state, actions) in table.iter() {
                    for (agent_id, value) in actions {
                        entries.push(QTableEntry {
                            state: state.clone(),
                            agent_id: agent_id.clone(),
                            value: *value,
                        });
                    }
                }
            }
        }
        entries.sort_by(|a, b| (&a.state, &a.agent_id).cmp(&(&b.state, &b.agent_id)));
        QTableSnapshot {
            entries,
            epsilon: self.epsilon(),
        }
    }

    /// Restores a snapshot, sanitizing non-finite values to zero.
    pub fn restore(&self, snapshot: &QTableSnapshot) {
        for shard in &self.shards {
            if let Ok(mut table) = shard.lock() {
                table.clear();
            }
        }
        for entry in &snapshot.entries {
            let value = if entry.value.is_finite() {
                entry.value
            } else {
                self.sanitized.fetch_add(1, Ordering::Relaxed);
                0.0
            };
            self.with_shard(&entry.state, |table| {
                table
                    .entry(entry.state.clone())
                    .or_default()
                    .insert(entry.agent_id.clone(), value);
            });
        }
        self.set_epsilon(snapshot.epsilon);
        self.dirty.store(0, Ordering::Relaxed);
    }

    /// Runs a closure against the shard owning one state.
    ///
    /// Poisoned shard locks are recovered; a panic elsewhere must not freeze
    /// the learner.
    fn with_shard<R>(
        &self,
        state: &str,
        f: impl FnOnce(&mut BTreeMap<String, BTreeMap<AgentId, f64>>) -> R,
    ) -> R {
        let index = shard_index(state);
        let mut table = self.shards[index].lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut table)
    }
}

/// Maps a state string onto its shard index.
fn shard_index(state: &str) -> usize {
    let mut hasher = DefaultHasher::new();
    state.hash(&mut hasher);
    #[allow(clippy::cast_possible_truncation, reason = "Shard index is a small modulus.")]
    let index = (hasher.finish() as usize) % SHARD_COUNT;
    index
}

// ============================================================================
// SECTION: Reward Shaping
// ============================================================================

/// Computes the shaped reward for one feedback event, clamped to ±2.
#[must_use]
pub fn compute_reward(event: &FeedbackEvent) -> f64 {
    let base = if event.success { 1.0 } else { -1.0 };
    let latency_penalty = -0.1 * (event.latency_ms.max(0.0) / 1_000.0);
    let accuracy_bonus = event.accuracy.map_or(0.0, |accuracy| 0.5 * accuracy.clamp(0.0, 1.0));
    let satisfaction_bonus = event
        .user_satisfaction
        .map_or(0.0, |rating| 0.3 * (f64::from(rating.clamp(1, 5)) - 3.0) / 2.0);
    (base + latency_penalty + accuracy_bonus + satisfaction_bonus).clamp(-REWARD_BOUND, REWARD_BOUND)
}

/// Blends a reward toward normalized karma to damp oscillation.
///
/// `karma` is the cached score in `[0, 1]`, mapped linearly onto `[-1, 1]`.
#[must_use]
pub fn smooth_reward(reward: f64, karma: f64) -> f64 {
    let karma_normalized = 2.0 * karma.clamp(0.0, 1.0) - 1.0;
    SMOOTHING_REWARD_WEIGHT * reward + SMOOTHING_KARMA_WEIGHT * karma_normalized
}
