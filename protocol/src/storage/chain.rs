//! In-memory ledger of accepted block headers.
//!
//! The ledger only ever grows by one header at a time. A block is appended
//! when, in this order, it verifies on its own, its height is exactly one
//! past the tip and it links to the tip's hash. Any failure leaves the
//! ledger untouched.

use thiserror::Error;
use tracing::debug;

use super::block::{Block, BlockError};
use super::header::Header;
use crate::crypto::Hash;

/// Reasons the ledger refuses a block or a lookup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("invalid block: {0}")]
    InvalidBlock(#[from] BlockError),

    #[error("block height mismatch: expected {expected}, got {got}")]
    HeightMismatch { expected: u64, got: u64 },

    #[error("block does not extend the tip: expected parent {expected}, got {got}")]
    PrevHashMismatch { expected: Hash, got: Hash },

    #[error("height {requested} is above the tip ({height})")]
    HeightOutOfRange { requested: u64, height: u64 },

    #[error("genesis header must have height 0, got {0}")]
    InvalidGenesis(u64),
}

/// Ordered list of accepted headers. Index equals height.
///
/// Never empty: index 0 always holds the genesis header.
#[derive(Debug, Clone)]
pub struct Blockchain {
    headers: Vec<Header>,
}

impl Blockchain {
    /// A ledger holding only [`Header::genesis`].
    pub fn new() -> Self {
        Self {
            headers: vec![Header::genesis()],
        }
    }

    /// A ledger rooted at a caller-supplied genesis header.
    pub fn with_genesis(genesis: Header) -> Result<Self, ChainError> {
        if genesis.height() != 0 {
            return Err(ChainError::InvalidGenesis(genesis.height()));
        }
        Ok(Self {
            headers: vec![genesis],
        })
    }

    /// Height of the tip. Zero for a fresh ledger.
    pub fn height(&self) -> u64 {
        (self.headers.len() - 1) as u64
    }

    /// The tip header.
    pub fn tip(&self) -> &Header {
        // headers always holds at least the genesis header
        &self.headers[self.headers.len() - 1]
    }

    pub fn tip_hash(&self) -> Hash {
        self.tip().hash()
    }

    pub fn has_block(&self, height: u64) -> bool {
        height <= self.height()
    }

    /// Header at `height`, or [`ChainError::HeightOutOfRange`] above the tip.
    pub fn get_header(&self, height: u64) -> Result<&Header, ChainError> {
        usize::try_from(height)
            .ok()
            .and_then(|index| self.headers.get(index))
            .ok_or(ChainError::HeightOutOfRange {
                requested: height,
                height: self.height(),
            })
    }

    /// Validates `block` against the tip and appends its header.
    pub fn add_block(&mut self, block: &Block) -> Result<(), ChainError> {
        block.verify()?;

        let expected = self.height() + 1;
        if block.height() != expected {
            return Err(ChainError::HeightMismatch {
                expected,
                got: block.height(),
            });
        }

        let tip_hash = self.tip_hash();
        let prev = block.header().prev_block_hash();
        if prev != tip_hash {
            return Err(ChainError::PrevHashMismatch {
                expected: tip_hash,
                got: prev,
            });
        }

        self.headers.push(block.header().clone());
        debug!(
            height = block.height(),
            hash = %block.hash().short(),
            txs = block.transactions().len(),
            "block appended"
        );
        Ok(())
    }
}

impl Default for Blockchain {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
