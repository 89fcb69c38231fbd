// crates/agent-relay-stp/src/envelope.rs
// ============================================================================
// Module: STP Packet Envelope
// Description: Wire-level envelope fields, metadata, and priority selection.
// Purpose: Define the canonical packet shape fixed by the wire contract.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! The envelope carries a version string, a random token, an RFC 3339 UTC
//! issuance timestamp, a packet-type tag, routing metadata, an arbitrary JSON
//! payload, an integrity checksum, and an optional security block. The
//! checksum and signature cover a canonical serialization of everything except
//! the checksum and the security block itself.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

// ============================================================================
// SECTION: Packet Type
// ============================================================================

/// Packet-type tag enumeration fixed by the wire contract.
///
/// # Invariants
/// - Labels are stable wire values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PacketType {
    /// Routing decision emitted by the decision engine.
    RoutingDecision,
    /// Feedback event acknowledgement.
    Feedback,
    /// Policy-update emitted by the feedback processor.
    PolicyUpdate,
    /// Health snapshot report.
    Health,
}

impl PacketType {
    /// Returns the stable wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RoutingDecision => "routing_decision",
            Self::Feedback => "feedback",
            Self::PolicyUpdate => "policy_update",
            Self::Health => "health",
        }
    }
}

// ============================================================================
// SECTION: Priority
// ============================================================================

/// Downstream prioritization hint; the envelope itself never reorders.
///
/// # Invariants
/// - Labels are stable wire values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PacketPriority {
    /// Default priority.
    #[default]
    Normal,
    /// Elevated priority.
    High,
    /// Urgent priority.
    Critical,
}

impl PacketPriority {
    /// Returns the stable wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

/// Selects the priority for a routing-decision packet.
///
/// Very confident selections are `high`; suspiciously weak ones are
/// `critical` so downstream observers triage them first.
#[must_use]
pub fn decision_priority(confidence: f64) -> PacketPriority {
    if confidence >= 0.9 {
        PacketPriority::High
    } else if confidence <= 0.3 {
        PacketPriority::Critical
    } else {
        PacketPriority::Normal
    }
}

/// Selects the priority for a feedback or policy-update packet.
#[must_use]
pub fn feedback_priority(success: bool, latency_ms: f64) -> PacketPriority {
    if !success || latency_ms > 5_000.0 {
        PacketPriority::Critical
    } else if latency_ms > 1_000.0 {
        PacketPriority::High
    } else {
        PacketPriority::Normal
    }
}

/// Health status labels accepted by [`health_priority`].
///
/// # Invariants
/// - Labels are stable wire values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// All derived rates below the warning threshold.
    Healthy,
    /// Warning threshold crossed.
    Degraded,
    /// Critical threshold crossed.
    Unhealthy,
}

impl HealthStatus {
    /// Returns the stable wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Unhealthy => "unhealthy",
        }
    }
}

/// Selects the priority for a health packet.
#[must_use]
pub const fn health_priority(status: HealthStatus) -> PacketPriority {
    match status {
        HealthStatus::Unhealthy => PacketPriority::Critical,
        HealthStatus::Degraded => PacketPriority::High,
        HealthStatus::Healthy => PacketPriority::Normal,
    }
}

// ============================================================================
// SECTION: Metadata
// ============================================================================

/// Envelope routing metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketMetadata {
    /// Logical source component.
    pub source: String,
    /// Logical destination component.
    pub destination: String,
    /// Downstream prioritization hint.
    pub priority: PacketPriority,
    /// Whether the receiver should acknowledge the packet.
    pub requires_ack: bool,
}

// ============================================================================
// SECTION: Security Block
// ============================================================================

/// Optional security block carrying nonce, timestamp, and signature.
///
/// # Invariants
/// - `nonce` is globally unique within the drift window.
/// - `packet_signature` is HMAC-SHA256 over the canonical form, hex-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityBlock {
    /// Single-use replay-detection token.
    pub nonce: String,
    /// RFC 3339 UTC timestamp of signing.
    pub timestamp: String,
    /// Hex-encoded HMAC-SHA256 signature.
    pub packet_signature: String,
}

// ============================================================================
// SECTION: Envelope
// ============================================================================

/// Structured Token Protocol packet envelope.
///
/// # Invariants
/// - `stp_token` format is stable: `<prefix>-<32 hex chars>`.
/// - `stp_checksum` is deterministic under the canonical serialization.
/// - The signature verifies iff key and content are unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PacketEnvelope {
    /// Protocol version string.
    pub stp_version: String,
    /// Random packet token.
    pub stp_token: String,
    /// RFC 3339 UTC issuance timestamp.
    pub stp_timestamp: String,
    /// Packet-type tag.
    pub stp_type: PacketType,
    /// Routing metadata.
    pub stp_metadata: PacketMetadata,
    /// Component-specific payload.
    pub payload: Value,
    /// SHA-256 checksum over the canonical form, hex-encoded.
    pub stp_checksum: String,
    /// Optional security block (present when signing is enabled).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stp_security: Option<SecurityBlock>,
}

/// Borrowed view of the checksum/signature coverage of an envelope.
///
/// # Invariants
/// - Field set and order match [`PacketEnvelope`] minus checksum and security.
#[derive(Debug, Serialize)]
pub(crate) struct CanonicalEnvelope<'a> {
    /// Protocol version string.
    pub stp_version: &'a str,
    /// Random packet token.
    pub stp_token: &'a str,
    /// RFC 3339 UTC issuance timestamp.
    pub stp_timestamp: &'a str,
    /// Packet-type tag.
    pub stp_type: PacketType,
    /// Routing metadata.
    pub stp_metadata: &'a PacketMetadata,
    /// Component-specific payload.
    pub payload: &'a Value,
}

impl PacketEnvelope {
    /// Returns the canonical view covered by checksum and signature.
    #[must_use]
    pub(crate) fn canonical_view(&self) -> CanonicalEnvelope<'_> {
        CanonicalEnvelope {
            stp_version: &self.stp_version,
            stp_token: &self.stp_token,
            stp_timestamp: &self.stp_timestamp,
            stp_type: self.stp_type,
            stp_metadata: &self.stp_metadata,
            payload: &self.payload,
        }
    }
}
