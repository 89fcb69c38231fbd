// crates/agent-relay-core/src/core/state.rs
// ============================================================================
// Module: Agent Relay State Encoding
// Description: Deterministic, versioned string encoding of request context.
// Purpose: Discretize request context into stable Q-table state keys.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! States are stable, order-independent strings assembled from a closed set of
//! `key:value` fragments, sorted and joined by `|`, prefixed with a schema
//! tag. Adding a key is a schema change: a new tag opens a fresh Q-table
//! namespace, and entries under older tags stay readable but never feed max
//! computations.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::time::TimeBucket;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Current state-encoding schema tag.
pub const STATE_SCHEMA_TAG: &str = "v1";

/// Default complexity fragment when the context omits one.
const DEFAULT_COMPLEXITY: &str = "medium";

/// Default domain fragment when the context omits one.
const DEFAULT_DOMAIN: &str = "general";

/// In-flight count below which load is `low`.
const LOAD_MEDIUM_FLOOR: u64 = 10;

/// In-flight count at or above which load is `high`.
const LOAD_HIGH_FLOOR: u64 = 50;

// ============================================================================
// SECTION: Load Bucket
// ============================================================================

/// Discretized aggregate in-flight load bucket.
///
/// # Invariants
/// - Labels are stable encoding values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadBucket {
    /// Fewer than 10 requests in flight.
    Low,
    /// 10 through 49 requests in flight.
    Medium,
    /// 50 or more requests in flight.
    High,
}

impl LoadBucket {
    /// Derives the bucket from the aggregate in-flight count.
    #[must_use]
    pub const fn from_in_flight(count: u64) -> Self {
        if count < LOAD_MEDIUM_FLOOR {
            Self::Low
        } else if count < LOAD_HIGH_FLOOR {
            Self::Medium
        } else {
            Self::High
        }
    }

    /// Returns the stable encoding label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

// ============================================================================
// SECTION: Encoding
// ============================================================================

/// Encodes request context into the current-schema state string.
///
/// The mandatory keys are `input_type`, `complexity`, `domain`, `load`, and
/// `time`. Unknown context keys are ignored; non-string context values fall
/// back to the key defaults. Fragments are sorted so the encoding is
/// order-independent.
#[must_use]
pub fn encode_state(
    input_type: &str,
    context: &BTreeMap<String, Value>,
    load: LoadBucket,
    time: TimeBucket,
) -> String {
    let complexity = context_fragment(context, "complexity", DEFAULT_COMPLEXITY);
    let domain = context_fragment(context, "domain", DEFAULT_DOMAIN);
    let mut fragments = [
        format!("complexity:{complexity}"),
        format!("domain:{domain}"),
        format!("input_type:{input_type}"),
        format!("load:{}", load.as_str()),
        format!("time:{}", time.as_str()),
    ];
    fragments.sort_unstable();
    format!("{STATE_SCHEMA_TAG}:{}", fragments.join("|"))
}

/// Returns whether an encoded state belongs to the current schema.
#[must_use]
pub fn is_current_schema(state: &str) -> bool {
    state.split(':').next() == Some(STATE_SCHEMA_TAG)
}

/// Extracts a lowercase string fragment from the context map.
fn context_fragment<'a>(
    context: &'a BTreeMap<String, Value>,
    key: &str,
    default: &'a str,
) -> &'a str {
    context.get(key).and_then(Value::as_str).unwrap_or(default)
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde_json::json;

    use super::LoadBucket;
    use super::encode_state;
    use super::is_current_schema;
    use crate::core::time::TimeBucket;

    /// Tests defaults fill missing context keys.
    #[test]
    fn encode_state_applies_defaults() {
        let state =
            encode_state("text", &BTreeMap::new(), LoadBucket::Low, TimeBucket::Morning);
        assert_eq!(
            state,
            "v1:complexity:medium|domain:general|input_type:text|load:low|time:morning"
        );
    }

    /// Tests context values override defaults and unknown keys are ignored.
    #[test]
    fn encode_state_reads_known_keys_only() {
        let mut context = BTreeMap::new();
        context.insert("complexity".to_string(), json!("high"));
        context.insert("domain".to_string(), json!("medical"));
        context.insert("priority".to_string(), json!("urgent"));
        let state = encode_state("text", &context, LoadBucket::High, TimeBucket::Night);
        assert_eq!(
            state,
            "v1:complexity:high|domain:medical|input_type:text|load:high|time:night"
        );
    }

    /// Tests schema tag detection.
    #[test]
    fn schema_tag_is_detected() {
        assert!(is_current_schema("v1:input_type:text"));
        assert!(!is_current_schema("v0:input_type:text"));
    }

    /// Tests load bucket thresholds.
    #[test]
    fn load_buckets_follow_thresholds() {
        assert_eq!(LoadBucket::from_in_flight(0), LoadBucket::Low);
        assert_eq!(LoadBucket::from_in_flight(9), LoadBucket::Low);
        assert_eq!(LoadBucket::from_in_flight(10), LoadBucket::Medium);
        assert_eq!(LoadBucket::from_in_flight(49), LoadBucket::Medium);
        assert_eq!(LoadBucket::from_in_flight(50), LoadBucket::High);
    }
}
