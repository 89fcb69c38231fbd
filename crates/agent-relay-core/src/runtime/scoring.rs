// crates/agent-relay-core/src/runtime/scoring.rs
// ============================================================================
// Module: Agent Relay Scoring Engine
// Description: Multi-factor confidence scoring with bounded normalization.
// Purpose: Blend rule, feedback, availability, and karma signals into [0, 1].
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! The scoring engine combines four component scores into one bounded
//! confidence. Hostile inputs cannot escape the bounds: NaN collapses to the
//! configured minimum, infinities to the nearest bound, and out-of-range sums
//! are squashed through a sigmoid before clamping. Weight configuration is
//! validated at construction and hot-swappable afterwards; past decisions keep
//! the confidences they were scored with.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::RwLock;

use serde::Deserialize;
use serde::Serialize;

use crate::core::agent::Agent;
use crate::core::agent::AgentStatus;
use crate::core::decision::ScoreBreakdown;
use crate::interfaces::EngineError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Neutral karma prior substituted when the karma service is unavailable.
pub const NEUTRAL_KARMA: f64 = 0.5;

/// Absolute raw-sum magnitude beyond which the sigmoid squash applies.
const SIGMOID_THRESHOLD: f64 = 1.5;

/// Tolerance for the weight-sum check.
const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

// ============================================================================
// SECTION: Weights
// ============================================================================

/// Component weights for the confidence blend.
///
/// # Invariants
/// - Each weight is in `[0, 1]` and the four sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    /// Weight of the static capability-match score.
    pub rule: f64,
    /// Weight of the historical success-rate score.
    pub feedback: f64,
    /// Weight of the availability score.
    pub availability: f64,
    /// Weight of the karma score.
    pub karma: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            rule: 0.30,
            feedback: 0.35,
            availability: 0.20,
            karma: 0.15,
        }
    }
}

impl ScoreWeights {
    /// Validates the weight invariants.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] when a weight leaves `[0, 1]` or the
    /// sum strays from 1.0.
    pub fn validate(&self) -> Result<(), EngineError> {
        let components = [
            ("rule", self.rule),
            ("feedback", self.feedback),
            ("availability", self.availability),
            ("karma", self.karma),
        ];
        for (name, weight) in components {
            if !weight.is_finite() || !(0.0..=1.0).contains(&weight) {
                return Err(EngineError::Config(format!(
                    "weight {name} must be in [0, 1], got {weight}"
                )));
            }
        }
        let sum = self.rule + self.feedback + self.availability + self.karma;
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(EngineError::Config(format!("weights must sum to 1.0, got {sum}")));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Scoring engine configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringConfig {
    /// Initial component weights.
    pub weights: ScoreWeights,
    /// Lower confidence bound.
    pub min_confidence: f64,
    /// Upper confidence bound.
    pub max_confidence: f64,
    /// In-flight count below which availability is full.
    pub soft_load_cap: u64,
    /// In-flight count at which availability reaches zero.
    pub hard_load_cap: u64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: ScoreWeights::default(),
            min_confidence: 0.1,
            max_confidence: 1.0,
            soft_load_cap: 10,
            hard_load_cap: 50,
        }
    }
}

// ============================================================================
// SECTION: Scoring Engine
// ============================================================================

/// Multi-factor confidence scorer.
///
/// # Invariants
/// - Every returned confidence is finite and within the configured bounds.
pub struct ScoringEngine {
    /// Scoring configuration minus the hot-swappable weights.
    config: ScoringConfig,
    /// Current component weights.
    weights: RwLock<ScoreWeights>,
}

impl ScoringEngine {
    /// Creates a scoring engine, validating the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] when weights are invalid, bounds are
    /// misordered, or load caps are inconsistent. Validation happens here so
    /// scoring itself can never fail on configuration.
    pub fn new(config: ScoringConfig) -> Result<Self, EngineError> {
        config.weights.validate()?;
        if !config.min_confidence.is_finite() || !config.max_confidence.is_finite() {
            return Err(EngineError::Config("confidence bounds must be finite".to_string()));
        }
        if config.min_confidence >= config.max_confidence {
            return Err(EngineError::Config(format!(
                "min_confidence {} must be below max_confidence {}",
                config.min_confidence, config.max_confidence
            )));
        }
        if config.hard_load_cap <= config.soft_load_cap {
            return Err(EngineError::Config(format!(
                "hard_load_cap {} must exceed soft_load_cap {}",
                config.hard_load_cap, config.soft_load_cap
            )));
        }
        let weights = RwLock::new(config.weights);
        Ok(Self {
            config,
            weights,
        })
    }

    /// Replaces the component weights for future scores.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] when the new weights are invalid; the
    /// previous weights stay in effect.
    pub fn set_weights(&self, weights: ScoreWeights) -> Result<(), EngineError> {
        weights.validate()?;
        let mut guard = self
            .weights
            .write()
            .map_err(|_| EngineError::Internal("weight lock poisoned".to_string()))?;
        *guard = weights;
        Ok(())
    }

    /// Returns the weights currently in effect.
    #[must_use]
    pub fn weights(&self) -> ScoreWeights {
        self.weights
            .read()
            .map_or_else(|poisoned| *poisoned.into_inner(), |guard| *guard)
    }

    /// Scores one candidate for a request.
    ///
    /// `required_capabilities` come from the request; `karma` is the latest
    /// cached score or `None` for the neutral prior; `current_load` is the
    /// aggregate in-flight count.
    #[must_use]
    pub fn confidence(
        &self,
        agent: &Agent,
        required_capabilities: &[String],
        karma: Option<f64>,
        current_load: u64,
    ) -> (f64, ScoreBreakdown) {
        let breakdown = ScoreBreakdown {
            rule: rule_score(agent, required_capabilities),
            feedback: agent.counters.success_rate.clamp(0.0, 1.0),
            availability: self.availability_score(agent, current_load),
            karma: karma.unwrap_or(NEUTRAL_KARMA).clamp(0.0, 1.0),
        };
        let weights = self.weights();
        let raw = weights.rule * breakdown.rule
            + weights.feedback * breakdown.feedback
            + weights.availability * breakdown.availability
            + weights.karma * breakdown.karma;
        (self.normalize(raw), breakdown)
    }

    /// Normalizes a raw sum into the configured confidence bounds.
    #[must_use]
    pub fn normalize(&self, raw: f64) -> f64 {
        if raw.is_nan() {
            return self.config.min_confidence;
        }
        if raw == f64::INFINITY {
            return self.config.max_confidence;
        }
        if raw == f64::NEG_INFINITY {
            return self.config.min_confidence;
        }
        let squashed = if raw.abs() > SIGMOID_THRESHOLD {
            1.0 / (1.0 + (-raw).exp())
        } else {
            raw
        };
        squashed.clamp(self.config.min_confidence, self.config.max_confidence)
    }

    /// Computes the availability component for one candidate.
    fn availability_score(&self, agent: &Agent, current_load: u64) -> f64 {
        if agent.status != AgentStatus::Active {
            return 0.0;
        }
        if current_load < self.config.soft_load_cap {
            return 1.0;
        }
        if current_load >= self.config.hard_load_cap {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss, reason = "Load caps stay far below 2^52.")]
        let span = (self.config.hard_load_cap - self.config.soft_load_cap) as f64;
        #[allow(clippy::cast_precision_loss, reason = "Load caps stay far below 2^52.")]
        let over = (current_load - self.config.soft_load_cap) as f64;
        (1.0 - over / span).clamp(0.0, 1.0)
    }
}

// ============================================================================
// SECTION: Rule Score
// ============================================================================

/// Capability-match score with partial credit for partial coverage.
///
/// A requirement is covered when the agent declares a capability of the same
/// name and the capability's threshold (when present) is met by the agent's
/// current performance score.
fn rule_score(agent: &Agent, required_capabilities: &[String]) -> f64 {
    if required_capabilities.is_empty() {
        return 1.0;
    }
    let matched = required_capabilities
        .iter()
        .filter(|required| {
            agent.capabilities.iter().any(|capability| {
                capability.name == **required
                    && capability
                        .threshold
                        .is_none_or(|threshold| agent.counters.performance_score >= threshold)
            })
        })
        .count();
    #[allow(clippy::cast_precision_loss, reason = "Requirement counts stay tiny.")]
    let fraction = matched as f64 / required_capabilities.len() as f64;
    fraction
}
