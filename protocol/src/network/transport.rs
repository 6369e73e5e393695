//! Transport abstraction shared by the in-process and TCP variants.
//!
//! A transport has one inbound queue of [`Rpc`]s, handed out once through
//! [`Transport::consume`], and can push raw bytes to a named peer or to
//! every connected peer. It knows nothing about message contents.

use std::fmt;
use std::net::SocketAddr;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// NetAddr
// ---------------------------------------------------------------------------

/// Opaque peer identifier. A name for in-process peers, `ip:port` for TCP.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NetAddr(String);

impl NetAddr {
    pub fn new(addr: impl Into<String>) -> Self {
        Self(addr.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NetAddr {
    fn from(addr: &str) -> Self {
        Self::new(addr)
    }
}

impl From<String> for NetAddr {
    fn from(addr: String) -> Self {
        Self(addr)
    }
}

impl From<SocketAddr> for NetAddr {
    fn from(addr: SocketAddr) -> Self {
        Self(addr.to_string())
    }
}

impl fmt::Display for NetAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for NetAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NetAddr({})", self.0)
    }
}

// ---------------------------------------------------------------------------
// Rpc
// ---------------------------------------------------------------------------

/// Raw inbound bytes tagged with the sending peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rpc {
    pub from: NetAddr,
    pub payload: Bytes,
}

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("unknown peer {0}")]
    UnknownPeer(NetAddr),

    #[error("peer {0} disconnected")]
    PeerDisconnected(NetAddr),

    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("frame of {size} bytes exceeds the {max} byte limit")]
    FrameTooLarge { size: usize, max: usize },

    #[error("inbound queue already consumed")]
    AlreadyConsumed,

    #[error("invalid handshake from {0}")]
    InvalidHandshake(SocketAddr),
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// A way of reaching peers.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// This transport's own address, as peers see it.
    fn addr(&self) -> NetAddr;

    /// Delivers `payload` to the connected peer `to`.
    async fn send_message(&self, to: &NetAddr, payload: Bytes) -> Result<(), TransportError>;

    /// Delivers `payload` to every connected peer.
    ///
    /// Every peer is attempted; the first failure is returned.
    async fn broadcast(&self, payload: Bytes) -> Result<(), TransportError>;

    /// Takes the inbound queue. Succeeds once per transport.
    fn consume(&self) -> Result<mpsc::Receiver<Rpc>, TransportError>;
}
