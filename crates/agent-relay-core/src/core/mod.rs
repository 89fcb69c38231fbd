// crates/agent-relay-core/src/core/mod.rs
// ============================================================================
// Module: Agent Relay Core Domain Model
// Description: Canonical domain types for agents, decisions, and feedback.
// Purpose: Define the immutable data model shared by every runtime component.
// Dependencies: serde, serde_jcs, sha2, rand, time
// ============================================================================

//! ## Overview
//! The domain model is deliberately plain: serializable records with documented
//! invariants, opaque identifiers, explicit time injection, and canonical
//! hashing. Runtime components mutate nothing in this module except through
//! their own serialized copies.

pub mod agent;
pub mod decision;
pub mod feedback;
pub mod hashing;
pub mod identifiers;
pub mod identity;
pub mod state;
pub mod time;

pub use agent::Agent;
pub use agent::AgentCounters;
pub use agent::AgentStatus;
pub use agent::AgentType;
pub use agent::Capability;
pub use agent::ExecutionOutcome;
pub use decision::Alternative;
pub use decision::DecisionRecord;
pub use decision::RoutingStrategy;
pub use decision::ScoreBreakdown;
pub use feedback::FeedbackEvent;
pub use identifiers::AgentId;
pub use identifiers::DecisionId;
pub use identifiers::FeedbackId;
pub use identifiers::RequestId;
pub use identifiers::SubscriberId;
pub use state::LoadBucket;
pub use state::STATE_SCHEMA_TAG;
pub use state::encode_state;
pub use time::Clock;
pub use time::FixedClock;
pub use time::SystemClock;
pub use time::TimeBucket;
