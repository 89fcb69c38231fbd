// crates/agent-relay-config/src/lib.rs
// ============================================================================
// Module: Agent Relay Configuration
// Description: Closed, validated configuration record for the relay.
// Purpose: Name every knob, reject unknown keys, and fail closed at init.
// Dependencies: agent-relay-core, agent-relay-stp, agent-relay-telemetry, serde
// ============================================================================

//! ## Overview
//! Configuration is one closed record: every knob the relay honors is a named
//! field with a documented default, unknown keys fail deserialization, and
//! `validate` rejects inconsistent values before any component is
//! constructed. The serialization format and any file or CLI binding belong
//! to the host; this crate only defines the record and its conversions into
//! the per-component configurations.

pub mod config;

pub use config::ConfigError;
pub use config::EngineSection;
pub use config::KarmaSection;
pub use config::QLearningSection;
pub use config::RelayConfig;
pub use config::ScoringSection;
pub use config::StoreSection;
pub use config::StpSection;
pub use config::TelemetrySection;
