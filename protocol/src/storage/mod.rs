//! # Storage Module
//!
//! Blocks and the ledger that accepts them.
//!
//! ## Architecture
//!
//! ```text
//! header.rs - Header, canonical bytes, cached header hash, genesis
//! block.rs  - Block, signing, self-verification, data hash
//! chain.rs  - Blockchain: append-only header list with linkage checks
//! ```
//!
//! ## Data Flow
//!
//! ```text
//! TxPool ──flush──▶ Block::new_from_parent ──sign──▶ Blockchain::add_block
//!                                                         │
//!                                     verify ─▶ height ─▶ parent hash
//! ```
//!
//! Only headers are kept once a block is accepted. Transactions live in the
//! block value for as long as the caller holds it.

pub mod block;
pub mod chain;
pub mod header;

pub use block::{compute_data_hash, Block, BlockError};
pub use chain::{Blockchain, ChainError};
pub use header::Header;
