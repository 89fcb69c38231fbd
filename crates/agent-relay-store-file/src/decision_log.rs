// crates/agent-relay-store-file/src/decision_log.rs
// ============================================================================
// Module: File Decision Log
// Description: Append-only JSON-lines log with atomic per-record writes.
// Purpose: Durably record every decision and alert; prune off the hot path.
// Dependencies: agent-relay-core, serde_json, time
// ============================================================================

//! ## Overview
//! Each append serializes the record, rewrites existing contents plus the new
//! line to a temp file, and renames it over the canonical log. That is the
//! durability contract for decisions: abrupt termination leaves the last
//! record complete. Appends carry a deadline; on expiry the partial write is
//! rolled back and `Timeout` is returned. Retention pruning drops records
//! older than the configured horizon and never runs on the decision path.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

use agent_relay_core::DecisionSink;
use agent_relay_core::SinkError;
use agent_relay_core::StoreError;
use serde_json::Value;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::atomic::write_atomic;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Decision log configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDecisionLogConfig {
    /// Canonical log path.
    pub path: PathBuf,
    /// Append deadline; expiry rolls back the partial write.
    pub append_deadline: Duration,
    /// Retention horizon for pruning.
    pub retention: Duration,
}

impl FileDecisionLogConfig {
    /// Creates a configuration with the default deadline and retention.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            append_deadline: Duration::from_secs(2),
            retention: Duration::from_secs(30 * 24 * 60 * 60),
        }
    }
}

// ============================================================================
// SECTION: Log
// ============================================================================

/// File-backed append-only decision log.
///
/// # Invariants
/// - The canonical file is only ever replaced via atomic rename.
/// - Records are one JSON object per line, append order preserved.
pub struct FileDecisionLog {
    /// Log configuration.
    config: FileDecisionLogConfig,
    /// Append serialization lock.
    lock: Mutex<()>,
}

impl FileDecisionLog {
    /// Creates a log over the provided configuration.
    #[must_use]
    pub fn new(config: FileDecisionLogConfig) -> Self {
        Self {
            config,
            lock: Mutex::new(()),
        }
    }

    /// Returns the canonical log path.
    #[must_use]
    pub fn path(&self) -> &PathBuf {
        &self.config.path
    }

    /// Reads all logged records, skipping unparsable lines.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] when the log exists but cannot be read.
    pub fn read_all(&self) -> Result<Vec<Value>, StoreError> {
        let content = match fs::read_to_string(&self.config.path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(StoreError::Io(err.to_string())),
        };
        Ok(content.lines().filter_map(|line| serde_json::from_str(line).ok()).collect())
    }

    /// Prunes records older than the retention horizon.
    ///
    /// Records without a parsable timestamp are retained. Never invoked on
    /// the decision path.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the rewrite fails.
    pub fn prune(&self, now: OffsetDateTime) -> Result<usize, StoreError> {
        let content = match fs::read_to_string(&self.config.path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(StoreError::Io(err.to_string())),
        };
        let horizon = now - self.config.retention;
        let mut kept = String::with_capacity(content.len());
        let mut pruned = 0_usize;
        for line in content.lines() {
            if record_expired(line, horizon) {
                pruned += 1;
            } else {
                kept.push_str(line);
                kept.push('\n');
            }
        }
        if pruned == 0 {
            return Ok(0);
        }
        let guard = self
            .lock
            .lock()
            .map_err(|_| StoreError::Io("decision log lock poisoned".to_string()))?;
        let result = write_atomic(&self.config.path, kept.as_bytes());
        drop(guard);
        result.map(|()| pruned)
    }
}

impl DecisionSink for FileDecisionLog {
    fn append(&self, record: &Value) -> Result<(), SinkError> {
        let started = Instant::now();
        let line = serde_json::to_string(record).map_err(|err| SinkError::Append(err.to_string()))?;

        let guard = self
            .lock
            .lock()
            .map_err(|_| SinkError::Append("decision log lock poisoned".to_string()))?;
        let mut content = match fs::read_to_string(&self.config.path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(err) => return Err(SinkError::Append(err.to_string())),
        };
        content.push_str(&line);
        content.push('\n');

        if started.elapsed() > self.config.append_deadline {
            return Err(SinkError::Timeout(format!(
                "append exceeded {:?}",
                self.config.append_deadline
            )));
        }
        let result = write_atomic(&self.config.path, content.as_bytes());
        drop(guard);
        result.map_err(|err| SinkError::Append(err.to_string()))
    }
}

// ============================================================================
// SECTION: Retention Helpers
// ============================================================================

/// Returns whether a logged line carries a timestamp older than the horizon.
fn record_expired(line: &str, horizon: OffsetDateTime) -> bool {
    let Ok(value) = serde_json::from_str::<Value>(line) else {
        return false;
    };
    let timestamp = ["decided_at", "observed_at", "generated_at"]
        .iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str));
    let Some(raw) = timestamp else {
        return false;
    };
    OffsetDateTime::parse(raw, &Rfc3339).is_ok_and(|ts| ts < horizon)
}
