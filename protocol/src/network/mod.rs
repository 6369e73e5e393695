//! # Network Module
//!
//! Everything between the ledger and the wire: the pending-transaction
//! pool, the message envelope, the transports and the server loop that
//! ties them together.
//!
//! ## Architecture
//!
//! ```text
//! mempool.rs   - TxPool: pending transactions in first-seen order
//! message.rs   - Tagged envelope, default RPC decoder
//! transport.rs - Transport trait, Rpc, NetAddr, TransportError
//! local.rs     - In-process transport over tokio channels
//! tcp.rs       - TCP transport with length-prefixed frames
//! server.rs    - Server control loop, ServerHandle, RpcProcessor
//! ```
//!
//! ## Design Decisions
//!
//! - One task owns ledger and pool. Transports, timers and handles talk to
//!   it through channels, so nothing here takes a lock on ledger state.
//! - Transports move opaque `Bytes`. Only the server decodes, which keeps
//!   the transports reusable for any payload.
//! - Transports are trait objects so a node can mix in-process and TCP
//!   links in one server.

pub mod local;
pub mod mempool;
pub mod message;
pub mod server;
pub mod tcp;
pub mod transport;

pub use local::LocalTransport;
pub use mempool::{MempoolError, TxPool};
pub use message::{
    decode_rpc, DecodedMessage, Message, MessageData, MessageError, MessageType, RpcDecoder,
};
pub use server::{NodeStatus, RpcProcessor, Server, ServerConfig, ServerError, ServerHandle};
pub use tcp::TcpTransport;
pub use transport::{NetAddr, Rpc, Transport, TransportError};
