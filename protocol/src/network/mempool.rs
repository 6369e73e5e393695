//! Pending-transaction pool.
//!
//! Holds verified transactions between admission and block inclusion. The
//! pool is owned by the server loop and never shared, so it carries no
//! locks.
//!
//! ## Design
//!
//! - `HashMap<Hash, OrderKey>` answers membership in O(1) during gossip.
//! - `BTreeMap<OrderKey, Transaction>` keeps entries in inclusion order, so
//!   a block proposal is a single in-order walk.
//! - Order is first-seen ascending with the transaction hash as tiebreaker,
//!   which makes the snapshot a total order even when clocks collide.

use std::collections::{BTreeMap, HashMap};

use chrono::Utc;
use thiserror::Error;
use tracing::trace;

use crate::crypto::Hash;
use crate::transaction::Transaction;

// ---------------------------------------------------------------------------
// MempoolError
// ---------------------------------------------------------------------------

/// Errors returned by [`TxPool::add`].
///
/// Re-adding a known transaction is not an error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MempoolError {
    /// The wall clock cannot be expressed as i64 nanoseconds, so no
    /// first-seen stamp can be assigned.
    #[error("system clock is outside the representable nanosecond range")]
    ClockOutOfRange,
}

// ---------------------------------------------------------------------------
// OrderKey
// ---------------------------------------------------------------------------

/// Sort key for the inclusion index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct OrderKey {
    first_seen: i64,
    hash: Hash,
}

// ---------------------------------------------------------------------------
// TxPool
// ---------------------------------------------------------------------------

/// Unbounded set of pending transactions keyed by hash.
#[derive(Debug, Default)]
pub struct TxPool {
    lookup: HashMap<Hash, OrderKey>,
    ordered: BTreeMap<OrderKey, Transaction>,
}

impl TxPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `tx` unless a transaction with the same hash is present.
    ///
    /// A first-seen of 0 is treated as unset and replaced with the current
    /// time in nanoseconds; any other value is kept as is.
    pub fn add(&mut self, mut tx: Transaction) -> Result<(), MempoolError> {
        let hash = tx.hash();
        if self.lookup.contains_key(&hash) {
            trace!(hash = %hash.short(), "duplicate transaction ignored");
            return Ok(());
        }

        if tx.first_seen() == 0 {
            let now = Utc::now()
                .timestamp_nanos_opt()
                .ok_or(MempoolError::ClockOutOfRange)?;
            tx.set_first_seen(now);
        }

        let key = OrderKey {
            first_seen: tx.first_seen(),
            hash,
        };
        self.lookup.insert(hash, key);
        self.ordered.insert(key, tx);
        Ok(())
    }

    pub fn has(&self, hash: &Hash) -> bool {
        self.lookup.contains_key(hash)
    }

    pub fn len(&self) -> usize {
        self.lookup.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lookup.is_empty()
    }

    /// Snapshot of every pending transaction, oldest first-seen first.
    ///
    /// The pool is left untouched.
    pub fn transactions(&self) -> Vec<Transaction> {
        self.ordered.values().cloned().collect()
    }

    /// Removes one transaction, returning it if it was pending.
    pub fn remove(&mut self, hash: &Hash) -> Option<Transaction> {
        let key = self.lookup.remove(hash)?;
        self.ordered.remove(&key)
    }

    /// Drops every pending transaction.
    pub fn flush(&mut self) {
        self.lookup.clear();
        self.ordered.clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
