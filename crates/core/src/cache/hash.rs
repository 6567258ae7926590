//! Row keys for cache entries.

use sha2::{Digest, Sha256};

/// Compute the storage row key for a response stored under `cache_key` in `cache_name`.
pub fn entry_hash(cache_name: &str, cache_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(cache_name.as_bytes());
    hasher.update(b"\n");
    hasher.update(cache_key.as_bytes());
    hex::encode(hasher.finalize())
}
