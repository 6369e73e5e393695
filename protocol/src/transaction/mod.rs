//! # Transaction Module
//!
//! Construction, signing and verification of ledger transactions.
//!
//! ## Architecture
//!
//! ```text
//! types.rs        - The Transaction value, canonical and block-encoded bytes
//! signing.rs      - Ed25519 signing
//! verification.rs - Signature verification and TransactionError
//! ```
//!
//! ## Transaction Lifecycle
//!
//! 1. **Create**: [`Transaction::new`] with an opaque payload.
//! 2. **Sign**: [`Transaction::sign`] with the sender's key.
//! 3. **Broadcast**: encode into a message and hand it to a transport.
//! 4. **Admit**: a node verifies it and adds it to its pool, stamping
//!    `first_seen`.
//! 5. **Include**: the producer drains the pool into the next block.
//!
//! ## Design Decisions
//!
//! - The transaction hash covers the payload only, so it is stable across
//!   signing and re-signing.
//! - The block data hash covers payload, key and signature
//!   ([`Transaction::encoded_bytes`]), so a block commits to exactly which
//!   signed form it carries.

pub mod signing;
pub mod types;
pub mod verification;

pub use signing::sign_transaction;
pub use types::Transaction;
pub use verification::{verify_transaction, TransactionError};
