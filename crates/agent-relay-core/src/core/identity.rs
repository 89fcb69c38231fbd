// crates/agent-relay-core/src/core/identity.rs
// ============================================================================
// Module: Agent Relay Identity Generation
// Description: Cryptographically random unique identifiers.
// Purpose: Generate collision-resistant IDs for requests, decisions, and feedback.
// Dependencies: rand
// ============================================================================

//! ## Overview
//! Unique identifiers carry 128 bits of CSPRNG output rendered as lowercase
//! hex with a short prefix naming the identifier kind. Timestamps are never
//! mixed into identifiers; predictable components would weaken the token
//! contract shared with the STP envelope.

// ============================================================================
// SECTION: Imports
// ============================================================================

use rand::RngCore;
use rand::rngs::OsRng;

// ============================================================================
// SECTION: Generation
// ============================================================================

/// Number of random bytes in a unique identifier.
const ID_RANDOM_BYTES: usize = 16;

/// Generates a unique identifier with the provided kind prefix.
///
/// The result has the form `<prefix>-<32 hex chars>` carrying 128 bits of
/// cryptographic randomness.
#[must_use]
pub fn unique_id(prefix: &str) -> String {
    let mut bytes = [0_u8; ID_RANDOM_BYTES];
    OsRng.fill_bytes(&mut bytes);
    format!("{prefix}-{}", hex_encode(&bytes))
}

/// Encodes bytes as a lowercase hex string.
fn hex_encode(bytes: &[u8]) -> String {
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
