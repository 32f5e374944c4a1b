//! Deterministic cache key derivation.

use sha2::{Digest, Sha256};

/// Length of the hex-encoded SHA-256 digest part of a derived key.
pub const DIGEST_HEX_LEN: usize = 64;

/// Derive a cache key as `<prefix>:<sha256(data) as lowercase hex>`.
///
/// Pure function: the same prefix and data always yield the same key.
#[must_use]
pub fn derive_key(prefix: &str, data: impl AsRef<[u8]>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data.as_ref());
    format!("{}:{}", prefix, hex::encode(hasher.finalize()))
}
