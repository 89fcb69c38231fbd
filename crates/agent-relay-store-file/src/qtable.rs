// crates/agent-relay-store-file/src/qtable.rs
// ============================================================================
// Module: File Q-Table Store
// Description: Single-file JSON persistence for Q-table snapshots.
// Purpose: Persist learned values atomically; load best-effort at startup.
// Dependencies: agent-relay-core, serde_json
// ============================================================================

//! ## Overview
//! The Q-table lives in one JSON file written through the atomic-rename
//! helper. Serialization happens outside the store lock; the lock is held
//! only across the write and rename. An absent file loads as `None`; an
//! unreadable or unparsable file is an error the caller downgrades to an
//! empty table with a counted warning.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use agent_relay_core::QTableSnapshot;
use agent_relay_core::QTableStore;
use agent_relay_core::StoreError;

use crate::atomic::write_atomic;

// ============================================================================
// SECTION: Store
// ============================================================================

/// File-backed Q-table store.
///
/// # Invariants
/// - The canonical file is only ever replaced via atomic rename.
pub struct FileQTableStore {
    /// Canonical file path.
    path: PathBuf,
    /// Write serialization lock, held only across write and rename.
    lock: Mutex<()>,
}

impl FileQTableStore {
    /// Creates a store over the provided canonical path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Returns the canonical file path.
    #[must_use]
    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl QTableStore for FileQTableStore {
    fn load(&self) -> Result<Option<QTableSnapshot>, StoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(StoreError::Io(err.to_string())),
        };
        let snapshot: QTableSnapshot = serde_json::from_slice(&bytes)
            .map_err(|err| StoreError::Serialization(err.to_string()))?;
        Ok(Some(snapshot))
    }

    fn save(&self, snapshot: &QTableSnapshot) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(snapshot)
            .map_err(|err| StoreError::Serialization(err.to_string()))?;
        let guard = self
            .lock
            .lock()
            .map_err(|_| StoreError::Io("q-table store lock poisoned".to_string()))?;
        let result = write_atomic(&self.path, &bytes);
        drop(guard);
        result
    }
}
