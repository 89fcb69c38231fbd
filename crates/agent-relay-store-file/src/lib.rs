// crates/agent-relay-store-file/src/lib.rs
// ============================================================================
// Module: Agent Relay File Store
// Description: Atomic-rename file persistence for relay state.
// Purpose: Provide the durable Q-table, decision log, and nonce journal.
// Dependencies: agent-relay-core, serde_json, time, tokio
// ============================================================================

//! ## Overview
//! The relay owns exactly two canonical on-disk files (the Q-table and the
//! decision log) plus an optional nonce journal. Every canonical write goes
//! through the temp-write-then-rename discipline: a crash at any byte leaves
//! the canonical file either pre-write or post-write, never truncated.
//! Loading is best-effort where the contract says so; pruning and periodic
//! persistence run off the hot path on their own tasks.

pub mod atomic;
pub mod decision_log;
pub mod nonce_store;
pub mod persistence;
pub mod qtable;

pub use decision_log::FileDecisionLog;
pub use decision_log::FileDecisionLogConfig;
pub use nonce_store::FileNonceStore;
pub use persistence::spawn_log_retention;
pub use persistence::spawn_qtable_persistence;
pub use qtable::FileQTableStore;
