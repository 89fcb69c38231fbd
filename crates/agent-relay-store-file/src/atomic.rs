// crates/agent-relay-store-file/src/atomic.rs
// ============================================================================
// Module: Atomic File Writes
// Description: Temp-write-then-rename helper with partial-write cleanup.
// Purpose: Guarantee canonical files are never observed truncated.
// Dependencies: agent-relay-core, std
// ============================================================================

//! ## Overview
//! `write_atomic` serializes the durability contract every store in this
//! crate relies on: bytes land in a sibling temp file first, and only a
//! successful write is renamed over the canonical path. A failure at any
//! point deletes the temp file and leaves the canonical file untouched.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use agent_relay_core::StoreError;

// ============================================================================
// SECTION: Atomic Write
// ============================================================================

/// Writes bytes to a canonical path via a sibling temp file and rename.
///
/// # Errors
///
/// Returns [`StoreError::Io`] when any filesystem step fails; the temp file
/// is removed on failure and the canonical file is left untouched.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    ensure_parent_dir(path)?;
    let temp = temp_path(path);
    fs::write(&temp, bytes).map_err(|err| StoreError::Io(err.to_string()))?;
    if let Err(err) = fs::rename(&temp, path) {
        let _ = fs::remove_file(&temp);
        return Err(StoreError::Io(err.to_string()));
    }
    Ok(())
}

/// Creates the parent directory of a canonical path when missing.
///
/// # Errors
///
/// Returns [`StoreError::Io`] when directory creation fails.
pub fn ensure_parent_dir(path: &Path) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|err| StoreError::Io(err.to_string()))?;
        }
    }
    Ok(())
}

/// Returns the sibling temp path for a canonical path.
fn temp_path(path: &Path) -> PathBuf {
    let mut temp = path.as_os_str().to_os_string();
    temp.push(".tmp");
    PathBuf::from(temp)
}
