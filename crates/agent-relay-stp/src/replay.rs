// crates/agent-relay-stp/src/replay.rs
// ============================================================================
// Module: STP Replay Window
// Description: Bounded LRU of recently seen nonces.
// Purpose: Detect replayed packets without unbounded memory growth.
// Dependencies: lru
// ============================================================================

//! ## Overview
//! The replay window remembers the most recent nonces up to a fixed capacity.
//! A nonce is fresh exactly once; presenting it again within the window is a
//! replay. Capacity bounds memory; the oldest entries age out first, which is
//! acceptable because drift checking rejects packets older than the window
//! long before their nonces can recycle.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::num::NonZeroUsize;

use lru::LruCache;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default capacity of the replay window.
pub const DEFAULT_REPLAY_CAPACITY: usize = 100_000;

// ============================================================================
// SECTION: Replay Window
// ============================================================================

/// Bounded LRU of seen nonces.
///
/// # Invariants
/// - At most `capacity` nonces are retained; eviction is least-recently-seen.
#[derive(Debug)]
pub struct ReplayWindow {
    /// Seen-nonce cache; values are unit markers.
    seen: LruCache<String, ()>,
}

impl ReplayWindow {
    /// Creates a replay window with the provided capacity.
    ///
    /// Zero capacities are clamped to one entry so the window always detects
    /// immediate replays.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity)
            .unwrap_or_else(|| NonZeroUsize::MIN);
        Self {
            seen: LruCache::new(capacity),
        }
    }

    /// Records a nonce; returns `true` when it was fresh.
    pub fn insert(&mut self, nonce: &str) -> bool {
        if self.seen.contains(nonce) {
            return false;
        }
        self.seen.put(nonce.to_string(), ());
        true
    }

    /// Returns whether a nonce has been seen.
    #[must_use]
    pub fn contains(&self, nonce: &str) -> bool {
        self.seen.contains(nonce)
    }

    /// Returns the number of retained nonces.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Returns whether the window is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Seeds the window from a journaled nonce list, oldest first.
    pub fn seed<I: IntoIterator<Item = String>>(&mut self, nonces: I) {
        for nonce in nonces {
            self.seen.put(nonce, ());
        }
    }

    /// Returns the retained nonces, most recent first, for journal compaction.
    #[must_use]
    pub fn export(&self) -> Vec<String> {
        self.seen.iter().map(|(nonce, _marker)| nonce.clone()).collect()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
