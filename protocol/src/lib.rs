// Copyright (c) 2026 Tessera Contributors. MIT License.
// See LICENSE for details.

//! # Tessera Protocol: Core Library
//!
//! A single-validator ledger: one node holds the key and seals blocks on a
//! timer, every node verifies and gossips transactions, and followers check
//! each sealed block against their own copy of the chain.
//!
//! Ed25519 for signatures, BLAKE3 for ledger hashes, SHA-256 only where an
//! address is derived from a public key.
//!
//! ## Architecture
//!
//! - **crypto**: Hashes, the compute-once hash cell, keys and signatures.
//! - **transaction**: Opaque signed payloads and their verification.
//! - **storage**: Headers, blocks and the append-only ledger.
//! - **network**: Transaction pool, wire envelope, transports, server loop.
//! - **config**: Protocol constants and defaults.
//!
//! ## Quick Start
//!
//! ```
//! use tessera_protocol::crypto::PrivateKey;
//! use tessera_protocol::storage::{Block, Blockchain};
//! use tessera_protocol::transaction::Transaction;
//!
//! let key = PrivateKey::generate();
//! let mut chain = Blockchain::new();
//!
//! let mut tx = Transaction::new(b"hello".to_vec());
//! tx.sign(&key);
//!
//! let mut block = Block::new_from_parent(chain.tip(), vec![tx]);
//! block.sign(&key);
//! chain.add_block(&block).unwrap();
//!
//! assert_eq!(chain.height(), 1);
//! ```

pub mod config;
pub mod crypto;
pub mod network;
pub mod storage;
pub mod transaction;
