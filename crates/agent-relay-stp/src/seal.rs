// crates/agent-relay-stp/src/seal.rs
// ============================================================================
// Module: STP Seal and Verify
// Description: Checksum, HMAC signing, and drift-bounded verification.
// Purpose: Produce and check envelopes under strict or lenient modes.
// Dependencies: hmac, serde_jcs, sha2, subtle, time
// ============================================================================

//! ## Overview
//! Sealing computes a SHA-256 checksum over the envelope's canonical RFC 8785
//! form and, when signing is enabled, an HMAC-SHA256 signature plus nonce and
//! timestamp in the security block. Verification walks checksum, signature,
//! drift, and replay in that order; replay rejection touches no counter other
//! than `replays_rejected`. Signature comparison is constant-time.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use hmac::Hmac;
use hmac::Mac;
use serde_json::Value;
use sha2::Digest;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;
use time::Duration;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::envelope::CanonicalEnvelope;
use crate::envelope::PacketEnvelope;
use crate::envelope::PacketMetadata;
use crate::envelope::PacketPriority;
use crate::envelope::PacketType;
use crate::envelope::SecurityBlock;
use crate::metrics::EnvelopeMetrics;
use crate::replay::DEFAULT_REPLAY_CAPACITY;
use crate::replay::ReplayWindow;
use crate::token::hex_encode;
use crate::token::nonce;
use crate::token::packet_token;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Current STP protocol version.
pub const STP_VERSION: &str = "1.0";

/// Default packet-token prefix.
pub const DEFAULT_TOKEN_PREFIX: &str = "stp";

/// Default maximum tolerated clock drift.
pub const DEFAULT_MAX_DRIFT: Duration = Duration::seconds(5);

/// HMAC-SHA256 type alias used for packet signatures.
type HmacSha256 = Hmac<Sha256>;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while sealing a packet.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum SealError {
    /// Canonical serialization failed.
    #[error("failed to canonicalize packet: {0}")]
    Canonicalization(String),
    /// Signing was requested without a configured secret.
    #[error("signing enabled without a signing secret")]
    MissingSecret,
}

/// Errors raised while unwrapping a packet.
///
/// # Invariants
/// - Variants are stable for programmatic handling; replay is distinct from
///   signature failure so callers can distinguish.
#[derive(Debug, Error)]
pub enum UnwrapError {
    /// Checksum mismatch in strict mode.
    #[error("integrity error: {0}")]
    Integrity(String),
    /// Missing or invalid signature.
    #[error("signature error: {0}")]
    Signature(String),
    /// Nonce was already seen within the replay window.
    #[error("replay detected: {0}")]
    ReplayDetected(String),
    /// Issuance timestamp outside the tolerated drift window.
    #[error("drift exceeded: {0}")]
    DriftExceeded(String),
}

// ============================================================================
// SECTION: Verify Mode
// ============================================================================

/// Checksum handling mode on unwrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VerifyMode {
    /// Any mismatch fails unwrap; no payload is returned.
    #[default]
    Strict,
    /// Mismatches are counted and flagged; the payload is still returned.
    Lenient,
}

// ============================================================================
// SECTION: Sealer
// ============================================================================

/// Configuration for a packet sealer.
#[derive(Debug, Clone)]
pub struct SealerConfig {
    /// Protocol version written into envelopes.
    pub version: String,
    /// Packet-token prefix.
    pub token_prefix: String,
    /// Logical source component name.
    pub source: String,
    /// Logical destination component name.
    pub destination: String,
    /// Shared signing secret; required when signing starts enabled.
    pub signing_secret: Option<Vec<u8>>,
    /// Whether signing starts enabled.
    pub signing_enabled: bool,
}

impl Default for SealerConfig {
    fn default() -> Self {
        Self {
            version: STP_VERSION.to_string(),
            token_prefix: DEFAULT_TOKEN_PREFIX.to_string(),
            source: "agent-relay".to_string(),
            destination: "observers".to_string(),
            signing_secret: None,
            signing_enabled: false,
        }
    }
}

/// Wraps payloads into checksummed, optionally signed envelopes.
pub struct Sealer {
    /// Sealer configuration.
    config: SealerConfig,
    /// Runtime signing toggle.
    signing: AtomicBool,
    /// Shared envelope metrics.
    metrics: Arc<EnvelopeMetrics>,
}

impl Sealer {
    /// Creates a sealer.
    ///
    /// # Errors
    ///
    /// Returns [`SealError::MissingSecret`] when signing starts enabled
    /// without a configured secret.
    pub fn new(config: SealerConfig, metrics: Arc<EnvelopeMetrics>) -> Result<Self, SealError> {
        if config.signing_enabled && config.signing_secret.is_none() {
            return Err(SealError::MissingSecret);
        }
        let signing = AtomicBool::new(config.signing_enabled);
        Ok(Self {
            config,
            signing,
            metrics,
        })
    }

    /// Enables or disables signing at runtime.
    ///
    /// # Errors
    ///
    /// Returns [`SealError::MissingSecret`] when enabling without a secret.
    pub fn set_signing(&self, enabled: bool) -> Result<(), SealError> {
        if enabled && self.config.signing_secret.is_none() {
            return Err(SealError::MissingSecret);
        }
        self.signing.store(enabled, Ordering::Relaxed);
        Ok(())
    }

    /// Returns whether signing is currently enabled.
    #[must_use]
    pub fn signing_enabled(&self) -> bool {
        self.signing.load(Ordering::Relaxed)
    }

    /// Returns the shared envelope metrics.
    #[must_use]
    pub fn metrics(&self) -> Arc<EnvelopeMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Wraps a payload into a sealed envelope.
    ///
    /// # Errors
    ///
    /// Returns [`SealError`] when canonicalization fails.
    pub fn wrap(
        &self,
        packet_type: PacketType,
        priority: PacketPriority,
        requires_ack: bool,
        payload: Value,
        now: OffsetDateTime,
    ) -> Result<PacketEnvelope, SealError> {
        let timestamp = format_rfc3339(now);
        let mut envelope = PacketEnvelope {
            stp_version: self.config.version.clone(),
            stp_token: packet_token(&self.config.token_prefix),
            stp_timestamp: timestamp.clone(),
            stp_type: packet_type,
            stp_metadata: PacketMetadata {
                source: self.config.source.clone(),
                destination: self.config.destination.clone(),
                priority,
                requires_ack,
            },
            payload,
            stp_checksum: String::new(),
            stp_security: None,
        };

        let canonical = match canonical_bytes(&envelope.canonical_view()) {
            Ok(bytes) => bytes,
            Err(err) => {
                self.metrics.record_wrap_failure();
                return Err(err);
            }
        };
        envelope.stp_checksum = sha256_hex(&canonical);

        if self.signing.load(Ordering::Relaxed) {
            let Some(secret) = self.config.signing_secret.as_deref() else {
                self.metrics.record_wrap_failure();
                return Err(SealError::MissingSecret);
            };
            envelope.stp_security = Some(SecurityBlock {
                nonce: nonce(),
                timestamp,
                packet_signature: hmac_hex(secret, &canonical),
            });
        }

        self.metrics.record_wrapped();
        Ok(envelope)
    }
}

// ============================================================================
// SECTION: Verifier
// ============================================================================

/// Configuration for a packet verifier.
#[derive(Debug, Clone)]
pub struct VerifierConfig {
    /// Checksum handling mode.
    pub mode: VerifyMode,
    /// Whether a valid signature is required for acceptance.
    pub require_signature: bool,
    /// Shared signing secret used for verification.
    pub signing_secret: Option<Vec<u8>>,
    /// Maximum tolerated drift between issuance and verification.
    pub max_drift: Duration,
    /// Replay window capacity.
    pub replay_capacity: usize,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            mode: VerifyMode::Strict,
            require_signature: false,
            signing_secret: None,
            max_drift: DEFAULT_MAX_DRIFT,
            replay_capacity: DEFAULT_REPLAY_CAPACITY,
        }
    }
}

/// Payload accepted by a verifier.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedPacket {
    /// Packet-type tag.
    pub packet_type: PacketType,
    /// Packet token.
    pub token: String,
    /// Component-specific payload.
    pub payload: Value,
    /// Set in lenient mode when the checksum did not match.
    pub checksum_failed: bool,
}

/// Unwraps and verifies sealed envelopes.
pub struct Verifier {
    /// Verifier configuration.
    config: VerifierConfig,
    /// Seen-nonce window.
    replay: Mutex<ReplayWindow>,
    /// Shared envelope metrics.
    metrics: Arc<EnvelopeMetrics>,
}

impl Verifier {
    /// Creates a verifier.
    #[must_use]
    pub fn new(config: VerifierConfig, metrics: Arc<EnvelopeMetrics>) -> Self {
        let replay = Mutex::new(ReplayWindow::new(config.replay_capacity));
        Self {
            config,
            replay,
            metrics,
        }
    }

    /// Seeds the replay window from a journaled nonce list, oldest first.
    pub fn seed_replay<I: IntoIterator<Item = String>>(&self, nonces: I) {
        if let Ok(mut window) = self.replay.lock() {
            window.seed(nonces);
        }
    }

    /// Exports retained nonces, most recent first, for journal compaction.
    #[must_use]
    pub fn export_replay(&self) -> Vec<String> {
        self.replay.lock().map(|window| window.export()).unwrap_or_default()
    }

    /// Returns the shared envelope metrics.
    #[must_use]
    pub fn metrics(&self) -> Arc<EnvelopeMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Unwraps an envelope, enforcing checksum, signature, drift, and replay.
    ///
    /// # Errors
    ///
    /// Returns [`UnwrapError`] when any enabled check fails; replay rejection
    /// increments only the `replays_rejected` counter.
    pub fn unwrap(
        &self,
        envelope: &PacketEnvelope,
        now: OffsetDateTime,
    ) -> Result<VerifiedPacket, UnwrapError> {
        let canonical = canonical_bytes(&envelope.canonical_view()).map_err(|err| {
            self.metrics.record_unwrap_failure();
            UnwrapError::Integrity(err.to_string())
        })?;

        let mut checksum_failed = false;
        if sha256_hex(&canonical) != envelope.stp_checksum {
            self.metrics.record_checksum_failure();
            match self.config.mode {
                VerifyMode::Strict => {
                    self.metrics.record_unwrap_failure();
                    return Err(UnwrapError::Integrity(format!(
                        "checksum mismatch for token {}",
                        envelope.stp_token
                    )));
                }
                VerifyMode::Lenient => {
                    self.metrics.record_fallback_response();
                    checksum_failed = true;
                }
            }
        }

        match (&envelope.stp_security, self.config.require_signature) {
            (None, true) => {
                self.metrics.record_signature_failure();
                self.metrics.record_unwrap_failure();
                return Err(UnwrapError::Signature(format!(
                    "missing security block for token {}",
                    envelope.stp_token
                )));
            }
            (None, false) => {}
            (Some(security), _) => {
                self.verify_security(security, &canonical, now)?;
            }
        }

        self.metrics.record_unwrapped();
        Ok(VerifiedPacket {
            packet_type: envelope.stp_type,
            token: envelope.stp_token.clone(),
            payload: envelope.payload.clone(),
            checksum_failed,
        })
    }

    /// Verifies the security block: signature, drift, then replay.
    fn verify_security(
        &self,
        security: &SecurityBlock,
        canonical: &[u8],
        now: OffsetDateTime,
    ) -> Result<(), UnwrapError> {
        if let Some(secret) = self.config.signing_secret.as_deref() {
            let expected = hmac_hex(secret, canonical);
            let matches: bool = expected
                .as_bytes()
                .ct_eq(security.packet_signature.as_bytes())
                .into();
            if !matches {
                self.metrics.record_signature_failure();
                self.metrics.record_unwrap_failure();
                return Err(UnwrapError::Signature("hmac mismatch".to_string()));
            }
        } else if self.config.require_signature {
            self.metrics.record_signature_failure();
            self.metrics.record_unwrap_failure();
            return Err(UnwrapError::Signature(
                "no verification secret configured".to_string(),
            ));
        }

        let issued = OffsetDateTime::parse(&security.timestamp, &Rfc3339).map_err(|_| {
            self.metrics.record_unwrap_failure();
            UnwrapError::DriftExceeded("unparsable security timestamp".to_string())
        })?;
        let drift = now - issued;
        if drift.abs() > self.config.max_drift {
            self.metrics.record_unwrap_failure();
            return Err(UnwrapError::DriftExceeded(format!(
                "drift of {drift} exceeds bound"
            )));
        }

        let fresh = self
            .replay
            .lock()
            .map(|mut window| window.insert(&security.nonce))
            .unwrap_or(false);
        if !fresh {
            self.metrics.record_replay_rejected();
            return Err(UnwrapError::ReplayDetected(security.nonce.clone()));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Canonical Helpers
// ============================================================================

/// Serializes the canonical view to RFC 8785 bytes.
fn canonical_bytes(view: &CanonicalEnvelope<'_>) -> Result<Vec<u8>, SealError> {
    serde_jcs::to_vec(view).map_err(|err| SealError::Canonicalization(err.to_string()))
}

/// Computes a lowercase-hex SHA-256 digest.
fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex_encode(&hasher.finalize())
}

/// Computes a lowercase-hex HMAC-SHA256 tag.
fn hmac_hex(secret: &[u8], bytes: &[u8]) -> String {
    // HMAC accepts keys of any length; new_from_slice only fails for
    // variable-output MACs, so an empty-tag fallback is unreachable here.
    HmacSha256::new_from_slice(secret).map_or_else(
        |_| String::new(),
        |mut mac| {
            mac.update(bytes);
            hex_encode(&mac.finalize().into_bytes())
        },
    )
}

/// Formats a timestamp as RFC 3339 UTC.
fn format_rfc3339(ts: OffsetDateTime) -> String {
    ts.format(&Rfc3339).unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}
