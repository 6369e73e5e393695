//! # Cryptographic Primitives
//!
//! Everything security-related in the ledger flows through here:
//!
//! - **Ed25519** for transaction and block header signatures.
//! - **BLAKE3** for every ledger hash.
//! - **SHA-256** for address derivation.
//!
//! The types are thin wrappers around audited implementations. Nothing in
//! this module invents cryptography.

pub mod hash;
pub mod keys;

pub use hash::{hash, hash_multi, sha256, Hash, HashCache};
pub use keys::{Address, KeyError, PrivateKey, PublicKey, Signature};
