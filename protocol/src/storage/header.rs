//! # Block Header
//!
//! The hashed, linked, signed part of a block.
//!
//! ## Canonical Layout
//!
//! ```text
//! ┌──────────────────────────────┐
//! │ version          u32 LE  4 B │
//! │ data_hash                32 B│
//! │ prev_block_hash          32 B│
//! │ height           u64 LE  8 B │
//! │ timestamp        i64 LE  8 B │
//! └──────────────────────────────┘
//! ```
//!
//! Fixed width, no maps, no optional parts: the same header always yields
//! the same 84 bytes. Those bytes are what the validator signs and what the
//! block hash covers.

use serde::{Deserialize, Serialize};

use crate::config::HEADER_VERSION;
use crate::crypto::{hash, Hash, HashCache};

/// Size of [`Header::canonical_bytes`].
pub const HEADER_ENCODED_LEN: usize = 4 + 32 + 32 + 8 + 8;

/// Block metadata and chain linkage.
///
/// Immutable after construction: fields are read through accessors and the
/// header hash is memoised in a [`HashCache`] that never needs invalidating.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    version: u32,
    data_hash: Hash,
    prev_block_hash: Hash,
    height: u64,
    /// Producer wall clock, Unix nanoseconds. Advisory only.
    timestamp: i64,
    #[serde(skip)]
    hash: HashCache,
}

impl Header {
    pub fn new(
        version: u32,
        data_hash: Hash,
        prev_block_hash: Hash,
        height: u64,
        timestamp: i64,
    ) -> Self {
        Self {
            version,
            data_hash,
            prev_block_hash,
            height,
            timestamp,
            hash: HashCache::new(),
        }
    }

    /// The fixed genesis header: height 0, zero data and parent hashes,
    /// timestamp 0.
    ///
    /// Fully deterministic so that independently started nodes agree on the
    /// hash every later block links back to.
    pub fn genesis() -> Self {
        Self::new(HEADER_VERSION, Hash::ZERO, Hash::ZERO, 0, 0)
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn data_hash(&self) -> Hash {
        self.data_hash
    }

    pub fn prev_block_hash(&self) -> Hash {
        self.prev_block_hash
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Deterministic byte encoding. See the module docs for the layout.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_ENCODED_LEN);
        buf.extend_from_slice(&self.version.to_le_bytes());
        buf.extend_from_slice(self.data_hash.as_bytes());
        buf.extend_from_slice(self.prev_block_hash.as_bytes());
        buf.extend_from_slice(&self.height.to_le_bytes());
        buf.extend_from_slice(&self.timestamp.to_le_bytes());
        buf
    }

    /// Hash of the canonical bytes, computed on first call.
    pub fn hash(&self) -> Hash {
        self.hash.get_or_compute(|| hash(&self.canonical_bytes()))
    }
}
