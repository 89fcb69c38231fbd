// crates/agent-relay-stp/src/token.rs
// ============================================================================
// Module: STP Token Generation
// Description: Cryptographically random packet tokens and nonces.
// Purpose: Generate unpredictable, stable-format identifiers for envelopes.
// Dependencies: rand
// ============================================================================

//! ## Overview
//! Packet tokens have the form `<prefix>-<32 hex chars>` carrying 128 bits of
//! CSPRNG output. Timestamps are never part of the token; they live in their
//! own envelope field so token values stay unpredictable.

// ============================================================================
// SECTION: Imports
// ============================================================================

use rand::RngCore;
use rand::rngs::OsRng;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Number of random bytes in a token or nonce.
const TOKEN_RANDOM_BYTES: usize = 16;

/// Prefix used for generated nonces.
const NONCE_PREFIX: &str = "nonce";

// ============================================================================
// SECTION: Generation
// ============================================================================

/// Generates a packet token with the provided prefix.
#[must_use]
pub fn packet_token(prefix: &str) -> String {
    let mut bytes = [0_u8; TOKEN_RANDOM_BYTES];
    OsRng.fill_bytes(&mut bytes);
    format!("{prefix}-{}", hex_encode(&bytes))
}

/// Generates a globally unique nonce for the security block.
#[must_use]
pub fn nonce() -> String {
    packet_token(NONCE_PREFIX)
}

/// Encodes bytes as a lowercase hex string.
pub(crate) fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(HEX[(byte >> 4) as usize] as char);
        out.push(HEX[(byte & 0x0f) as usize] as char);
    }
    out
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::nonce;
    use super::packet_token;

    /// Tests token format is `<prefix>-<32 hex chars>`.
    #[test]
    fn packet_token_has_stable_format() {
        let token = packet_token("stp");
        let (prefix, body) = token.split_once('-').unwrap_or(("", ""));
        assert_eq!(prefix, "stp");
        assert_eq!(body.len(), 32);
        assert!(body.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    /// Tests nonces are unique across calls.
    #[test]
    fn nonces_do_not_collide() {
        assert_ne!(nonce(), nonce());
    }
}
