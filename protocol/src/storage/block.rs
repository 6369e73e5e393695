//! # Block Structure
//!
//! A block is the unit the ledger accepts: a [`Header`], the ordered
//! transactions it commits to, and the validator's signature over the
//! header.
//!
//! ## Block Layout
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  Header                                     │
//! │  ├── version, height, timestamp             │
//! │  ├── prev_block_hash   (hash of parent)     │
//! │  └── data_hash         (hash of tx list)    │
//! ├─────────────────────────────────────────────┤
//! │  transactions: Vec<Transaction>   (ordered) │
//! ├─────────────────────────────────────────────┤
//! │  validator: PublicKey                       │
//! │  signature: Ed25519 over header bytes       │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Hash Computation
//!
//! The block hash is the header hash. Transactions reach it only through
//! `data_hash`, so reordering them changes the block hash. The signature is
//! not covered: it signs the header, not the other way around.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::header::Header;
use crate::config::HEADER_VERSION;
use crate::crypto::{hash_multi, Hash, PrivateKey, PublicKey, Signature};
use crate::transaction::{Transaction, TransactionError};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Reasons a block fails [`Block::verify`], in the order they are checked.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlockError {
    #[error("block has no signature")]
    MissingSignature,

    #[error("block {hash} has an invalid signature")]
    InvalidSignature { hash: Hash },

    /// The first transaction, left to right, that failed its own check.
    #[error("transaction {index} in block is invalid: {source}")]
    InvalidTransaction {
        index: usize,
        #[source]
        source: TransactionError,
    },

    #[error("block data hash mismatch: header={expected}, computed={actual}")]
    DataHashMismatch { expected: Hash, actual: Hash },
}

// ---------------------------------------------------------------------------
// Block
// ---------------------------------------------------------------------------

/// A header plus its ordered transactions and validator signature.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    header: Header,
    transactions: Vec<Transaction>,
    validator: Option<PublicKey>,
    signature: Option<Signature>,
}

impl Block {
    /// Wraps an existing header and transaction list. Unsigned.
    pub fn new(header: Header, transactions: Vec<Transaction>) -> Self {
        Self {
            header,
            transactions,
            validator: None,
            signature: None,
        }
    }

    /// Reassembles a block from all of its parts. No verification happens.
    pub fn from_parts(
        header: Header,
        transactions: Vec<Transaction>,
        validator: Option<PublicKey>,
        signature: Option<Signature>,
    ) -> Self {
        Self {
            header,
            transactions,
            validator,
            signature,
        }
    }

    /// Builds the unsigned child of `parent` carrying `transactions`.
    ///
    /// Height is the parent's plus one, the parent hash links back, the data
    /// hash commits to the transactions in the given order and the timestamp
    /// is the current wall clock in nanoseconds. Sign before handing it to a
    /// ledger.
    pub fn new_from_parent(parent: &Header, transactions: Vec<Transaction>) -> Self {
        let header = Header::new(
            HEADER_VERSION,
            compute_data_hash(&transactions),
            parent.hash(),
            parent.height() + 1,
            Utc::now().timestamp_nanos_opt().unwrap_or_default(),
        );
        Self::new(header, transactions)
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn validator(&self) -> Option<&PublicKey> {
        self.validator.as_ref()
    }

    pub fn signature(&self) -> Option<&Signature> {
        self.signature.as_ref()
    }

    pub fn height(&self) -> u64 {
        self.header.height()
    }

    /// The header hash, computed at most once.
    pub fn hash(&self) -> Hash {
        self.header.hash()
    }

    /// Signs the canonical header bytes and records the validator.
    pub fn sign(&mut self, key: &PrivateKey) {
        self.signature = Some(key.sign(&self.header.canonical_bytes()));
        self.validator = Some(key.public_key());
    }

    /// Checks, in order: signature present, signature valid for the
    /// validator, every transaction valid, data hash matches.
    ///
    /// All transactions are checked; the first failure is reported.
    pub fn verify(&self) -> Result<(), BlockError> {
        let (Some(validator), Some(signature)) = (&self.validator, &self.signature) else {
            return Err(BlockError::MissingSignature);
        };

        if !validator.verify(&self.header.canonical_bytes(), signature) {
            return Err(BlockError::InvalidSignature { hash: self.hash() });
        }

        let mut first_failure = None;
        for (index, tx) in self.transactions.iter().enumerate() {
            if let Err(source) = tx.verify() {
                first_failure.get_or_insert(BlockError::InvalidTransaction { index, source });
            }
        }
        if let Some(err) = first_failure {
            return Err(err);
        }

        let actual = compute_data_hash(&self.transactions);
        if actual != self.header.data_hash() {
            return Err(BlockError::DataHashMismatch {
                expected: self.header.data_hash(),
                actual,
            });
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Data hash
// ---------------------------------------------------------------------------

/// Hash over the concatenated [`Transaction::encoded_bytes`] of
/// `transactions`, in list order.
///
/// Order matters: callers that want the same hash must keep the same order.
pub fn compute_data_hash(transactions: &[Transaction]) -> Hash {
    let encoded: Vec<Vec<u8>> = transactions.iter().map(Transaction::encoded_bytes).collect();
    let parts: Vec<&[u8]> = encoded.iter().map(Vec::as_slice).collect();
    hash_multi(&parts)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
