// Certvault — Identity hashing

use sha2::{Digest, Sha256};

/// Deterministic 32-bit hash over a canonical encoding.
///
/// Little-endian interpretation of the first four SHA-256 bytes. Used as a
/// pre-filter for equality and as the dedup lookup key, never as proof of
/// identity on its own.
pub fn content_hash(bytes: &[u8]) -> u32 {
    let digest = Sha256::digest(bytes);
    u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]])
}

// ─── Tests ───────────────────────────────────────────────────────────────────
