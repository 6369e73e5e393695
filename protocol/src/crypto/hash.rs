//! # Hashing Utilities
//!
//! Two digests, each with one job:
//!
//! - **BLAKE3**: every ledger-native hash: transaction hashes, block data
//!   hashes and header hashes. Wrapped in the [`Hash`] newtype.
//! - **SHA-256**: address derivation from public keys.
//!
//! [`HashCache`] is the compute-once cell used by values whose hash is
//! derived from otherwise immutable fields.

use std::fmt;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::HASH_LENGTH;

// ---------------------------------------------------------------------------
// Hash
// ---------------------------------------------------------------------------

/// A 32-byte digest.
///
/// The all-zero value is reserved to mean "unset" (the genesis header uses it
/// for its parent and data hashes). Ordering is lexicographic over the bytes,
/// which the mempool uses as a deterministic tiebreaker.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Hash([u8; HASH_LENGTH]);

impl Hash {
    /// The distinguished "unset" digest.
    pub const ZERO: Hash = Hash([0u8; HASH_LENGTH]);

    /// Wraps raw digest bytes.
    pub const fn from_bytes(bytes: [u8; HASH_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Returns the raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; HASH_LENGTH] {
        &self.0
    }

    /// Returns `true` for [`Hash::ZERO`].
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; HASH_LENGTH]
    }

    /// Lowercase hex, 64 characters.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First eight hex characters. Enough to tell hashes apart in logs.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; HASH_LENGTH]> for Hash {
    fn from(bytes: [u8; HASH_LENGTH]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.to_hex())
    }
}

// ---------------------------------------------------------------------------
// Digest functions
// ---------------------------------------------------------------------------

/// BLAKE3 digest of `data`. The ledger's hash function.
///
/// # Example
///
/// ```
/// use tessera_protocol::crypto::hash;
///
/// let h = hash(b"tessera");
/// assert!(!h.is_zero());
/// assert_eq!(h, hash(b"tessera"));
/// ```
pub fn hash(data: &[u8]) -> Hash {
    Hash(*blake3::hash(data).as_bytes())
}

/// BLAKE3 over several slices fed in order, without concatenating them first.
pub fn hash_multi(parts: &[&[u8]]) -> Hash {
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        hasher.update(part);
    }
    Hash(*hasher.finalize().as_bytes())
}

/// SHA-256 digest as a fixed-size array.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

// ---------------------------------------------------------------------------
// HashCache
// ---------------------------------------------------------------------------

/// Compute-once storage for a derived hash.
///
/// Holders are logically immutable once hashed, so the cell is never reset.
/// It takes no part in equality, serialization or `Debug` output: two values
/// with the same fields are equal whether or not either has been hashed yet.
#[derive(Clone, Default)]
pub struct HashCache(OnceLock<Hash>);

impl HashCache {
    /// An empty cache.
    pub const fn new() -> Self {
        Self(OnceLock::new())
    }

    /// Returns the cached hash, running `compute` only on the first call.
    pub fn get_or_compute(&self, compute: impl FnOnce() -> Hash) -> Hash {
        *self.0.get_or_init(compute)
    }

    /// Returns the cached hash if it has been computed.
    pub fn get(&self) -> Option<Hash> {
        self.0.get().copied()
    }
}

impl PartialEq for HashCache {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

impl Eq for HashCache {}

impl fmt::Debug for HashCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(h) => write!(f, "HashCache({})", h.short()),
            None => f.write_str("HashCache(empty)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        assert_eq!(hash(b"tessera"), hash(b"tessera"));
        assert_ne!(hash(b"tessera"), hash(b"tesserA"));
    }

    #[test]
    fn hash_multi_matches_concatenation() {
        let joined = hash(b"headerbody");
        let parts = hash_multi(&[b"header", b"body"]);
        assert_eq!(joined, parts);
    }

    #[test]
    fn zero_hash_is_zero() {
        assert!(Hash::ZERO.is_zero());
        assert!(Hash::default().is_zero());
        assert!(!hash(b"").is_zero());
    }

    #[test]
    fn sha256_known_vector() {
        let expected =
            hex::decode("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855")
                .unwrap();
        assert_eq!(sha256(b"").to_vec(), expected);
    }

    #[test]
    fn display_is_full_hex() {
        let h = Hash::from_bytes([0xAB; 32]);
        assert_eq!(h.to_string(), "ab".repeat(32));
        assert_eq!(h.short(), "abababab");
    }

    #[test]
    fn cache_computes_once() {
        let cache = HashCache::new();
        assert!(cache.get().is_none());

        let mut calls = 0;
        let first = cache.get_or_compute(|| {
            calls += 1;
            hash(b"once")
        });
        let second = cache.get_or_compute(|| hash(b"never used"));

        assert_eq!(calls, 1);
        assert_eq!(first, second);
        assert_eq!(cache.get(), Some(hash(b"once")));
    }

    #[test]
    fn cache_ignored_by_equality() {
        let filled = HashCache::new();
        filled.get_or_compute(|| hash(b"x"));
        assert_eq!(filled, HashCache::new());
    }
}
