//! Transaction verification.
//!
//! A transaction is valid when it carries a signature and that signature
//! verifies against the embedded public key over the canonical payload
//! bytes. Nothing else is checked at this layer.

use thiserror::Error;

use super::types::Transaction;

/// Errors that can occur during transaction verification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionError {
    /// No signature or no signer key.
    #[error("transaction is unsigned")]
    MissingSignature,

    /// The signature does not verify against the embedded public key.
    #[error("invalid signature on transaction {hash}")]
    InvalidSignature { hash: String },
}

impl Transaction {
    /// Checks the signature. See the module docs for the rule.
    pub fn verify(&self) -> Result<(), TransactionError> {
        let (Some(public_key), Some(signature)) = (self.public_key(), self.signature()) else {
            return Err(TransactionError::MissingSignature);
        };

        if !public_key.verify(self.canonical_bytes(), signature) {
            return Err(TransactionError::InvalidSignature {
                hash: self.hash().to_hex(),
            });
        }

        Ok(())
    }
}

/// Free-function form of [`Transaction::verify`].
pub fn verify_transaction(tx: &Transaction) -> Result<(), TransactionError> {
    tx.verify()
}
