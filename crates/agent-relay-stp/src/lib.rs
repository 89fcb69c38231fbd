// crates/agent-relay-stp/src/lib.rs
// ============================================================================
// Module: Agent Relay STP
// Description: Structured Token Protocol envelope for signed relay packets.
// Purpose: Wrap, sign, verify, and meter every packet leaving or entering the core.
// Dependencies: hmac, lru, rand, serde, serde_jcs, sha2, subtle, time
// ============================================================================

//! ## Overview
//! STP is the sole wire-level artifact the relay fixes. Every routing
//! decision, feedback acknowledgement, policy update, and health report is
//! wrapped into a [`PacketEnvelope`] whose checksum and signature are computed
//! over an RFC 8785 canonical serialization, so any implementer sharing the
//! secret produces bit-identical checksums and verifiable signatures.
//! Verification distinguishes integrity, signature, replay, and drift
//! failures; strict mode rejects, lenient mode flags and passes payloads.

pub mod envelope;
pub mod metrics;
pub mod replay;
pub mod seal;
pub mod token;

pub use envelope::HealthStatus;
pub use envelope::PacketEnvelope;
pub use envelope::PacketMetadata;
pub use envelope::PacketPriority;
pub use envelope::PacketType;
pub use envelope::SecurityBlock;
pub use envelope::decision_priority;
pub use envelope::feedback_priority;
pub use envelope::health_priority;
pub use metrics::AlertLevel;
pub use metrics::AlertRecord;
pub use metrics::EnvelopeMetrics;
pub use metrics::EnvelopeMetricsSnapshot;
pub use replay::ReplayWindow;
pub use seal::DEFAULT_MAX_DRIFT;
pub use seal::STP_VERSION;
pub use seal::SealError;
pub use seal::Sealer;
pub use seal::SealerConfig;
pub use seal::UnwrapError;
pub use seal::VerifiedPacket;
pub use seal::Verifier;
pub use seal::VerifierConfig;
pub use seal::VerifyMode;
pub use token::nonce;
pub use token::packet_token;
