// crates/agent-relay-karma/src/lib.rs
// ============================================================================
// Module: Agent Relay Karma
// Description: Pull-through cached client for the external karma service.
// Purpose: Serve behavioral scores with TTL and drift invalidation.
// Dependencies: agent-relay-core, reqwest, serde
// ============================================================================

//! ## Overview
//! Karma is an externally supplied per-agent behavioral score in `[0, 1]`.
//! This crate caches scores per agent, invalidating entries on age, on
//! performance drift away from the capture-time baseline, and on noisy
//! sliding-window observations. Upstream failures are typed: transient
//! outcomes retry with bounded exponential backoff, permanent outcomes end
//! immediately. A final failure degrades to unavailability; the scoring
//! engine substitutes its neutral prior and the decision continues.

pub mod client;
pub mod http;
pub mod source;

pub use client::KarmaClient;
pub use client::KarmaClientConfig;
pub use client::KarmaMetricsSnapshot;
pub use http::HttpKarmaConfig;
pub use http::HttpKarmaSource;
pub use source::KarmaFetchError;
pub use source::KarmaSource;
pub use source::StaticKarmaSource;
