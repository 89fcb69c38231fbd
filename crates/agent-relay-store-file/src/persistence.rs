// crates/agent-relay-store-file/src/persistence.rs
// ============================================================================
// Module: Background Persistence Tasks
// Description: Periodic Q-table saves and log retention off the hot path.
// Purpose: Drive the time-based persistence trigger and pruning as tasks.
// Dependencies: agent-relay-core, tokio
// ============================================================================

//! ## Overview
//! The updater's persistence triggers fire on the feedback path when the
//! dirty threshold is crossed; the wall-clock trigger needs its own ticker.
//! These helpers spawn cooperative tokio tasks: one polling `save_if_due`,
//! one pruning the decision log. Both are shut down by aborting the returned
//! handle; callers still invoke `force_save` at orderly shutdown.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use agent_relay_core::QLearningUpdater;
use agent_relay_core::QTableStore;
use time::OffsetDateTime;
use tokio::task::JoinHandle;

use crate::decision_log::FileDecisionLog;

// ============================================================================
// SECTION: Tasks
// ============================================================================

/// Spawns the periodic Q-table persistence task.
///
/// Save failures are swallowed here; the updater keeps its dirty count so the
/// next trigger retries, and callers observe failures through `force_save`.
pub fn spawn_qtable_persistence(
    updater: Arc<QLearningUpdater>,
    store: Arc<dyn QTableStore>,
    poll_interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let _ = updater.save_if_due(store.as_ref());
        }
    })
}

/// Spawns the periodic decision-log retention task.
pub fn spawn_log_retention(log: Arc<FileDecisionLog>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let _ = log.prune(OffsetDateTime::now_utc());
        }
    })
}
