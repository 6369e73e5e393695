//! # Protocol Configuration & Constants
//!
//! Every fixed number the ledger depends on lives here. Runtime knobs
//! (block interval, keys, transports) belong on
//! [`ServerConfig`](crate::network::server::ServerConfig), which takes its
//! defaults from the constants below.

use std::time::Duration;

// ---------------------------------------------------------------------------
// Versioning
// ---------------------------------------------------------------------------

/// Crate-level protocol version string, reported by the node binary.
pub const PROTOCOL_VERSION: &str = "0.1.0";

/// Format tag written into every block header. Bump on any change to the
/// canonical header layout.
pub const HEADER_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Cryptographic Parameters
// ---------------------------------------------------------------------------

/// Signature scheme for transactions and block headers.
pub const SIGNING_ALGORITHM: &str = "Ed25519";

/// Digest used for block, data and transaction hashes.
pub const PRIMARY_HASH_FUNCTION: &str = "BLAKE3";

/// Digest length in bytes.
pub const HASH_LENGTH: usize = 32;

/// Ed25519 public key length in bytes.
pub const PUBLIC_KEY_LENGTH: usize = 32;

/// Ed25519 signature length in bytes.
pub const SIGNATURE_LENGTH: usize = 64;

/// Address length in bytes: the trailing 20 bytes of SHA-256(public key).
pub const ADDRESS_LENGTH: usize = 20;

// ---------------------------------------------------------------------------
// Timing
// ---------------------------------------------------------------------------

/// Interval between produced blocks when the operator does not override it.
pub const DEFAULT_BLOCK_TIME: Duration = Duration::from_secs(5);

/// Same as [`DEFAULT_BLOCK_TIME`] in milliseconds, for CLI defaults.
pub const DEFAULT_BLOCK_TIME_MS: u64 = 5_000;

// ---------------------------------------------------------------------------
// Networking
// ---------------------------------------------------------------------------

/// Capacity of the server's merged inbound channel and of each transport's
/// inbox. Producers wait when it is full.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Largest frame the TCP transport will read or write. Anything bigger is
/// treated as a protocol violation and the connection is dropped.
pub const MAX_FRAME_SIZE: usize = 8 * 1024 * 1024;
