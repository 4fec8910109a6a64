//! SHA-256 helpers for configuration content fingerprints

use super::Sha256Hash;
use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of string content (64 characters)
pub fn compute_sha256(content: &str) -> Sha256Hash {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    Sha256Hash(format!("{result:x}"))
}

/// Fingerprint of several parts, separated so that `("ab", "c")` and `("a", "bc")` differ
pub fn compute_sha256_parts(parts: &[&str]) -> Sha256Hash {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }
    let result = hasher.finalize();
    Sha256Hash(format!("{result:x}"))
}
