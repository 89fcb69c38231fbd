// crates/agent-relay-store-file/src/nonce_store.rs
// ============================================================================
// Module: File Nonce Store
// Description: Append-only replay-nonce journal with startup compaction.
// Purpose: Persist seen nonces so replay detection survives restarts.
// Dependencies: agent-relay-core, std
// ============================================================================

//! ## Overview
//! The nonce journal is the third, optional relay file. Nonces append one per
//! line; at startup the journal is compacted to the newest entries up to the
//! replay-window capacity and rewritten atomically. The size bound prevents
//! unbounded growth across restarts.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use agent_relay_core::StoreError;

use crate::atomic::ensure_parent_dir;
use crate::atomic::write_atomic;

// ============================================================================
// SECTION: Store
// ============================================================================

/// File-backed append-only nonce journal.
///
/// # Invariants
/// - Appends preserve arrival order; compaction keeps the newest entries.
pub struct FileNonceStore {
    /// Canonical journal path.
    path: PathBuf,
    /// Append serialization lock.
    lock: Mutex<()>,
}

impl FileNonceStore {
    /// Creates a store over the provided canonical path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Returns the canonical journal path.
    #[must_use]
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Appends one nonce to the journal.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] when the append fails.
    pub fn append(&self, nonce: &str) -> Result<(), StoreError> {
        let guard = self
            .lock
            .lock()
            .map_err(|_| StoreError::Io("nonce store lock poisoned".to_string()))?;
        ensure_parent_dir(&self.path)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|err| StoreError::Io(err.to_string()))?;
        writeln!(file, "{nonce}").map_err(|err| StoreError::Io(err.to_string()))?;
        drop(guard);
        Ok(())
    }

    /// Compacts the journal to the newest `capacity` entries and returns
    /// them, oldest first, for seeding the replay window.
    ///
    /// An absent journal compacts to an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the journal cannot be read or rewritten.
    pub fn compact(&self, capacity: usize) -> Result<Vec<String>, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(StoreError::Io(err.to_string())),
        };
        let lines: Vec<&str> = content.lines().filter(|line| !line.is_empty()).collect();
        let start = lines.len().saturating_sub(capacity);
        let kept: Vec<String> = lines[start..].iter().map(|line| (*line).to_string()).collect();

        let mut rewritten = String::with_capacity(content.len());
        for nonce in &kept {
            rewritten.push_str(nonce);
            rewritten.push('\n');
        }
        let guard = self
            .lock
            .lock()
            .map_err(|_| StoreError::Io("nonce store lock poisoned".to_string()))?;
        write_atomic(&self.path, rewritten.as_bytes())?;
        drop(guard);
        Ok(kept)
    }
}
