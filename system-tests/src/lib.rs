// system-tests/src/lib.rs
// ============================================================================
// Module: Agent Relay System Tests
// Description: Crate root for the end-to-end test suites.
// Purpose: Anchor the hermetic system-test targets under tests/.
// Dependencies: none
// ============================================================================

//! ## Overview
//! The system-test suites live under `tests/` and wire the full relay
//! (registry, scoring, learner, STP, bus, file stores) through the
//! composition root with no external infrastructure. This library target
//! exists only to anchor the package.
