// crates/agent-relay-config/src/config.rs
// ============================================================================
// Module: Relay Configuration Record
// Description: Section-per-component configuration with strict validation.
// Purpose: Provide fail-closed config conversion into component configs.
// Dependencies: agent-relay-core, agent-relay-stp, agent-relay-telemetry, serde
// ============================================================================

//! ## Overview
//! Each section mirrors one component's knobs. Defaults match the constants
//! documented on the components; `validate` re-checks everything a component
//! constructor would reject so misconfiguration surfaces at load time, not at
//! first use. Unknown keys are rejected by `deny_unknown_fields` on every
//! section.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;
use std::time::Duration;

use agent_relay_core::EngineConfig;
use agent_relay_core::QLearningConfig;
use agent_relay_core::RegistryConfig;
use agent_relay_core::RelayCoreConfig;
use agent_relay_core::ScoreWeights;
use agent_relay_core::ScoringConfig;
use agent_relay_stp::Sealer;
use agent_relay_stp::SealerConfig;
use agent_relay_stp::VerifierConfig;
use agent_relay_stp::VerifyMode;
use agent_relay_telemetry::BusConfig;
use serde::Deserialize;
use thiserror::Error;

use agent_relay_store_file::FileDecisionLogConfig;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration validation errors.
///
/// # Invariants
/// - Raised at load/validate time only; components never re-raise at use.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A named field violated its documented range or consistency rule.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Scoring Section
// ============================================================================

/// Scoring engine knobs.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ScoringSection {
    /// Weight of the capability-match score.
    pub rule_weight: f64,
    /// Weight of the historical success-rate score.
    pub feedback_weight: f64,
    /// Weight of the availability score.
    pub availability_weight: f64,
    /// Weight of the karma score.
    pub karma_weight: f64,
    /// Lower confidence bound.
    pub min_confidence: f64,
    /// Upper confidence bound.
    pub max_confidence: f64,
    /// In-flight count below which availability is full.
    pub soft_load_cap: u64,
    /// In-flight count at which availability reaches zero.
    pub hard_load_cap: u64,
}

impl Default for ScoringSection {
    fn default() -> Self {
        Self {
            rule_weight: 0.30,
            feedback_weight: 0.35,
            availability_weight: 0.20,
            karma_weight: 0.15,
            min_confidence: 0.1,
            max_confidence: 1.0,
            soft_load_cap: 10,
            hard_load_cap: 50,
        }
    }
}

impl ScoringSection {
    /// Converts the section into the component configuration.
    #[must_use]
    pub const fn to_scoring_config(&self) -> ScoringConfig {
        ScoringConfig {
            weights: ScoreWeights {
                rule: self.rule_weight,
                feedback: self.feedback_weight,
                availability: self.availability_weight,
                karma: self.karma_weight,
            },
            min_confidence: self.min_confidence,
            max_confidence: self.max_confidence,
            soft_load_cap: self.soft_load_cap,
            hard_load_cap: self.hard_load_cap,
        }
    }

    /// Validates the section.
    fn validate(&self) -> Result<(), ConfigError> {
        agent_relay_core::ScoringEngine::new(self.to_scoring_config())
            .map(|_| ())
            .map_err(|err| ConfigError::Invalid(err.to_string()))
    }
}

// ============================================================================
// SECTION: Q-Learning Section
// ============================================================================

/// Q-learning and exploration-schedule knobs.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct QLearningSection {
    /// Learning rate α in `(0, 1]`.
    pub alpha: f64,
    /// Discount factor γ in `[0, 1]`.
    pub gamma: f64,
    /// Initial exploration rate ε.
    pub epsilon_initial: f64,
    /// Multiplicative ε decay per feedback event.
    pub epsilon_decay: f64,
    /// Lower ε bound.
    pub epsilon_min: f64,
    /// Confidence blend factor β for cold-state tie-breaking.
    pub score_blend_beta: f64,
    /// Whether rewards are smoothed toward normalized karma.
    pub karma_smoothing: bool,
    /// Dirty-write count that triggers a save.
    pub save_threshold: u64,
    /// Wall-clock save interval in seconds.
    pub save_interval_secs: u64,
}

impl Default for QLearningSection {
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
            save_interval_secs: 300,
        }
    }
}

impl QLearningSection {
    /// Converts the section into the component configuration.
    #[must_use]
    pub const fn to_qlearning_config(&self) -> QLearningConfig {
        QLearningConfig {
            alpha: self.alpha,
            gamma: self.gamma,
            epsilon_initial: self.epsilon_initial,
            epsilon_decay: self.epsilon_decay,
            epsilon_min: self.epsilon_min,
            score_blend_beta: self.score_blend_beta,
            karma_smoothing: self.karma_smoothing,
            save_threshold: self.save_threshold,
            save_interval: Duration::from_secs(self.save_interval_secs),
        }
    }

    /// Validates the section.
    fn validate(&self) -> Result<(), ConfigError> {
        self.to_qlearning_config()
            .validate()
            .map_err(|err| ConfigError::Invalid(err.to_string()))
    }
}

// ============================================================================
// SECTION: Karma Section
// ============================================================================

/// Karma client knobs.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct KarmaSection {
    /// Whether karma starts enabled.
    pub enabled: bool,
    /// Cache TTL in seconds.
    pub cache_ttl_secs: u64,
    /// Absolute performance movement that invalidates an entry.
    pub invalidation_threshold: f64,
    /// Sliding-window length for recent performance samples.
    pub window_size: usize,
    /// Window standard deviation above which entries are invalidated.
    pub stddev_bound: f64,
    /// Maximum fetch attempts per lookup.
    pub max_attempts: u32,
    /// Base backoff delay in milliseconds.
    pub backoff_base_ms: u64,
    /// Optional upstream base URL for the HTTP source.
    pub base_url: Option<String>,
}

impl Default for KarmaSection {
    fn default() -> Self {
        Self {
            enabled: true,
            cache_ttl_secs: 60,
            invalidation_threshold: 0.2,
            window_size: 10,
            stddev_bound: 0.25,
            max_attempts: 3,
            backoff_base_ms: 50,
            base_url: None,
        }
    }
}

impl KarmaSection {
    /// Validates the section.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_ttl_secs == 0 {
            return Err(ConfigError::Invalid("karma cache_ttl_secs must be positive".to_string()));
        }
        if !(0.0..=1.0).contains(&self.invalidation_threshold) {
            return Err(ConfigError::Invalid(format!(
                "karma invalidation_threshold must be in [0, 1], got {}",
                self.invalidation_threshold
            )));
        }
        if self.window_size == 0 {
            return Err(ConfigError::Invalid("karma window_size must be positive".to_string()));
        }
        if !self.stddev_bound.is_finite() || self.stddev_bound <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "karma stddev_bound must be positive, got {}",
                self.stddev_bound
            )));
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid("karma max_attempts must be positive".to_string()));
        }
        if let Some(url) = &self.base_url {
            if url.trim().is_empty() {
                return Err(ConfigError::Invalid("karma base_url must be non-empty".to_string()));
            }
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: STP Section
// ============================================================================

/// STP envelope knobs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct StpSection {
    /// Protocol version written into envelopes.
    pub version: String,
    /// Packet-token prefix.
    pub token_prefix: String,
    /// Logical source component name.
    pub source: String,
    /// Logical destination component name.
    pub destination: String,
    /// Whether signing starts enabled.
    pub signing_enabled: bool,
    /// Shared signing secret (UTF-8); required when signing is enabled.
    pub signing_secret: Option<String>,
    /// Whether checksum verification is strict.
    pub strict_checksum: bool,
    /// Whether a valid signature is required on unwrap.
    pub require_signature: bool,
    /// Maximum tolerated drift in seconds.
    pub max_drift_secs: i64,
    /// Replay window capacity.
    pub replay_capacity: usize,
}

impl Default for StpSection {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            token_prefix: "stp".to_string(),
            source: "agent-relay".to_string(),
            destination: "observers".to_string(),
            signing_enabled: false,
            signing_secret: None,
            strict_checksum: true,
            require_signature: false,
            max_drift_secs: 5,
            replay_capacity: 100_000,
        }
    }
}

impl StpSection {
    /// Converts the section into the sealer configuration.
    #[must_use]
    pub fn to_sealer_config(&self) -> SealerConfig {
        SealerConfig {
            version: self.version.clone(),
            token_prefix: self.token_prefix.clone(),
            source: self.source.clone(),
            destination: self.destination.clone(),
            signing_secret: self.signing_secret.as_ref().map(|secret| secret.clone().into_bytes()),
            signing_enabled: self.signing_enabled,
        }
    }

    /// Converts the section into the verifier configuration.
    #[must_use]
    pub fn to_verifier_config(&self) -> VerifierConfig {
        VerifierConfig {
            mode: if self.strict_checksum {
                VerifyMode::Strict
            } else {
                VerifyMode::Lenient
            },
            require_signature: self.require_signature,
            signing_secret: self.signing_secret.as_ref().map(|secret| secret.clone().into_bytes()),
            max_drift: time::Duration::seconds(self.max_drift_secs),
            replay_capacity: self.replay_capacity,
        }
    }

    /// Validates the section.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.version.trim().is_empty() {
            return Err(ConfigError::Invalid("stp version must be non-empty".to_string()));
        }
        if self.token_prefix.trim().is_empty() {
            return Err(ConfigError::Invalid("stp token_prefix must be non-empty".to_string()));
        }
        if self.max_drift_secs <= 0 {
            return Err(ConfigError::Invalid(format!(
                "stp max_drift_secs must be positive, got {}",
                self.max_drift_secs
            )));
        }
        if self.replay_capacity == 0 {
            return Err(ConfigError::Invalid("stp replay_capacity must be positive".to_string()));
        }
        Sealer::new(self.to_sealer_config(), std::sync::Arc::default())
            .map(|_| ())
            .map_err(|err| ConfigError::Invalid(err.to_string()))?;
        if self.require_signature && self.signing_secret.is_none() {
            return Err(ConfigError::Invalid(
                "stp require_signature needs a signing_secret".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Telemetry Section
// ============================================================================

/// Telemetry bus knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct TelemetrySection {
    /// Ring capacity.
    pub buffer_size: usize,
    /// Per-subscriber private queue capacity.
    pub queue_capacity: usize,
    /// Per-subscriber consumption cap in packets per second.
    pub rate_limit_per_sec: u32,
    /// Stale cutoff in seconds.
    pub max_packet_age_secs: u64,
    /// Maximum concurrent subscribers.
    pub max_subscribers: usize,
}

impl Default for TelemetrySection {
    fn default() -> Self {
        Self {
            buffer_size: 1_000,
            queue_capacity: 256,
            rate_limit_per_sec: 200,
            max_packet_age_secs: 10,
            max_subscribers: 100,
        }
    }
}

impl TelemetrySection {
    /// Converts the section into the bus configuration.
    #[must_use]
    pub const fn to_bus_config(&self) -> BusConfig {
        BusConfig {
            buffer_size: self.buffer_size,
            queue_capacity: self.queue_capacity,
            rate_limit_per_sec: self.rate_limit_per_sec,
            max_packet_age: Duration::from_secs(self.max_packet_age_secs),
            max_subscribers: self.max_subscribers,
        }
    }

    /// Validates the section.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.buffer_size == 0 {
            return Err(ConfigError::Invalid("telemetry buffer_size must be positive".to_string()));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "telemetry queue_capacity must be positive".to_string(),
            ));
        }
        if self.rate_limit_per_sec == 0 {
            return Err(ConfigError::Invalid(
                "telemetry rate_limit_per_sec must be positive".to_string(),
            ));
        }
        if self.max_packet_age_secs == 0 {
            return Err(ConfigError::Invalid(
                "telemetry max_packet_age_secs must be positive".to_string(),
            ));
        }
        if self.max_subscribers == 0 {
            return Err(ConfigError::Invalid(
                "telemetry max_subscribers must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Engine Section
// ============================================================================

/// Decision engine knobs.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct EngineSection {
    /// Maximum alternatives recorded per decision.
    pub max_alternatives: usize,
    /// Whether the per-decision RNG is seeded from the request identifier.
    pub deterministic_seeding: bool,
    /// Decide deadline in milliseconds.
    pub decide_deadline_ms: u64,
    /// Capacity of the recent-decision index.
    pub decision_index_capacity: usize,
    /// Latency normalization reference in milliseconds.
    pub latency_reference_ms: f64,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            max_alternatives: 3,
            deterministic_seeding: false,
            decide_deadline_ms: 2_000,
            decision_index_capacity: 100_000,
            latency_reference_ms: 1_000.0,
        }
    }
}

impl EngineSection {
    /// Converts the section into the engine configuration.
    #[must_use]
    pub const fn to_engine_config(&self) -> EngineConfig {
        EngineConfig {
            max_alternatives: self.max_alternatives,
            deterministic_seeding: self.deterministic_seeding,
            decide_deadline: Duration::from_millis(self.decide_deadline_ms),
            decision_index_capacity: self.decision_index_capacity,
        }
    }

    /// Converts the section into the registry configuration.
    #[must_use]
    pub const fn to_registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            latency_reference_ms: self.latency_reference_ms,
        }
    }

    /// Validates the section.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.decide_deadline_ms == 0 {
            return Err(ConfigError::Invalid(
                "engine decide_deadline_ms must be positive".to_string(),
            ));
        }
        if self.decision_index_capacity == 0 {
            return Err(ConfigError::Invalid(
                "engine decision_index_capacity must be positive".to_string(),
            ));
        }
        if !self.latency_reference_ms.is_finite() || self.latency_reference_ms <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "engine latency_reference_ms must be positive, got {}",
                self.latency_reference_ms
            )));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Store Section
// ============================================================================

/// Durable store knobs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct StoreSection {
    /// Canonical Q-table file path.
    pub qtable_path: PathBuf,
    /// Canonical decision log path.
    pub decision_log_path: PathBuf,
    /// Optional nonce journal path.
    pub nonce_journal_path: Option<PathBuf>,
    /// Log retention horizon in days.
    pub log_retention_days: u64,
    /// Log append deadline in milliseconds.
    pub append_deadline_ms: u64,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            qtable_path: PathBuf::from("data/qtable.json"),
            decision_log_path: PathBuf::from("data/decisions.jsonl"),
            nonce_journal_path: None,
            log_retention_days: 30,
            append_deadline_ms: 2_000,
        }
    }
}

impl StoreSection {
    /// Converts the section into the decision log configuration.
    #[must_use]
    pub fn to_log_config(&self) -> FileDecisionLogConfig {
        FileDecisionLogConfig {
            path: self.decision_log_path.clone(),
            append_deadline: Duration::from_millis(self.append_deadline_ms),
            retention: Duration::from_secs(self.log_retention_days * 24 * 60 * 60),
        }
    }

    /// Validates the section.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.qtable_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("store qtable_path must be non-empty".to_string()));
        }
        if self.decision_log_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "store decision_log_path must be non-empty".to_string(),
            ));
        }
        if self.log_retention_days == 0 {
            return Err(ConfigError::Invalid(
                "store log_retention_days must be positive".to_string(),
            ));
        }
        if self.append_deadline_ms == 0 {
            return Err(ConfigError::Invalid(
                "store append_deadline_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Relay Config
// ============================================================================

/// Complete relay configuration record.
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
#[serde(deny_unknown_fields, default)]
pub struct RelayConfig {
    /// Scoring engine section.
    pub scoring: ScoringSection,
    /// Q-learning section.
    pub qlearning: QLearningSection,
    /// Karma client section.
    pub karma: KarmaSection,
    /// STP envelope section.
    pub stp: StpSection,
    /// Telemetry bus section.
    pub telemetry: TelemetrySection,
    /// Decision engine section.
    pub engine: EngineSection,
    /// Durable store section.
    pub store: StoreSection,
}

impl RelayConfig {
    /// Validates every section; fails closed before construction.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] naming the first violated rule.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.scoring.validate()?;
        self.qlearning.validate()?;
        self.karma.validate()?;
        self.stp.validate()?;
        self.telemetry.validate()?;
        self.engine.validate()?;
        self.store.validate()?;
        Ok(())
    }

    /// Converts the record into the composition-root configuration.
    #[must_use]
    pub const fn to_core_config(&self) -> RelayCoreConfig {
        RelayCoreConfig {
            engine: self.engine.to_engine_config(),
            scoring: self.scoring.to_scoring_config(),
            registry: self.engine.to_registry_config(),
            qlearning: self.qlearning.to_qlearning_config(),
            karma_enabled: self.karma.enabled,
        }
    }
}
