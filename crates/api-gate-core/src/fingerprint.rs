// api-gate-core/src/fingerprint.rs
// ============================================================================
// Module: Token Fingerprints
// Description: Non-reversible identifiers for stored credentials.
// Purpose: Let audit records correlate credentials without exposing them.
// Dependencies: sha2
// ============================================================================

//! ## Overview
//! A fingerprint is the leading hex characters of the SHA-256 digest of a
//! token. Two events carrying the same fingerprint used the same credential;
//! the fingerprint cannot be reversed into the token.

// ============================================================================
// SECTION: Imports
// ============================================================================

use sha2::Digest;
use sha2::Sha256;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Number of hex characters kept from the digest.
const FINGERPRINT_HEX_CHARS: usize = 16;

// ============================================================================
// SECTION: Fingerprinting
// ============================================================================

/// Returns a short SHA-256 fingerprint of `token`.
#[must_use]
pub fn token_fingerprint(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    let digest = hasher.finalize();
    let mut encoded = hex_encode(&digest);
    encoded.truncate(FINGERPRINT_HEX_CHARS);
    encoded
}

/// Encodes bytes as a lowercase hex string.
fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(HEX[usize::from(byte >> 4)] as char);
        out.push(HEX[usize::from(byte & 0x0f)] as char);
    }
    out
}

// ============================================================================
// SECTION: Tests
// ============================================================================
