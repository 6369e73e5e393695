//! Transaction signing with Ed25519 keys.

use super::types::Transaction;
use crate::crypto::PrivateKey;

impl Transaction {
    /// Signs the canonical payload bytes and records the signer.
    ///
    /// Re-signing overwrites the previous key and signature. The transaction
    /// hash is unaffected because it covers the payload only.
    pub fn sign(&mut self, key: &PrivateKey) {
        let signature = key.sign(self.canonical_bytes());
        self.set_signature(key.public_key(), signature);
    }
}

/// Free-function form of [`Transaction::sign`].
pub fn sign_transaction(tx: &mut Transaction, key: &PrivateKey) {
    tx.sign(key);
}
