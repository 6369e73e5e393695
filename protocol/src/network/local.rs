//! In-process transport.
//!
//! Peers are other `LocalTransport`s in the same process. Connecting
//! records the peer's inbound sender; sending is a channel push. Links are
//! one-directional, so two nodes that talk both ways connect both ways.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tracing::trace;

use super::transport::{NetAddr, Rpc, Transport, TransportError};
use crate::config::DEFAULT_CHANNEL_CAPACITY;

#[derive(Debug)]
pub struct LocalTransport {
    addr: NetAddr,
    peers: RwLock<HashMap<NetAddr, mpsc::Sender<Rpc>>>,
    inbound: mpsc::Sender<Rpc>,
    receiver: Mutex<Option<mpsc::Receiver<Rpc>>>,
}

impl LocalTransport {
    pub fn new(addr: impl Into<NetAddr>) -> Self {
        Self::with_capacity(addr, DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(addr: impl Into<NetAddr>, capacity: usize) -> Self {
        let (inbound, receiver) = mpsc::channel(capacity);
        Self {
            addr: addr.into(),
            peers: RwLock::new(HashMap::new()),
            inbound,
            receiver: Mutex::new(Some(receiver)),
        }
    }

    /// Lets this transport send to `peer`. Reconnecting replaces the link.
    pub fn connect(&self, peer: &LocalTransport) {
        self.peers
            .write()
            .insert(peer.addr.clone(), peer.inbound.clone());
        trace!(from = %self.addr, to = %peer.addr, "local link established");
    }

    pub fn is_connected(&self, peer: &NetAddr) -> bool {
        self.peers.read().contains_key(peer)
    }

    pub fn peer_count(&self) -> usize {
        self.peers.read().len()
    }

    async fn deliver(
        &self,
        to: NetAddr,
        sender: mpsc::Sender<Rpc>,
        payload: Bytes,
    ) -> Result<(), TransportError> {
        let rpc = Rpc {
            from: self.addr.clone(),
            payload,
        };
        sender
            .send(rpc)
            .await
            .map_err(|_| TransportError::PeerDisconnected(to))
    }
}

#[async_trait]
impl Transport for LocalTransport {
    fn addr(&self) -> NetAddr {
        self.addr.clone()
    }

    async fn send_message(&self, to: &NetAddr, payload: Bytes) -> Result<(), TransportError> {
        let sender = self
            .peers
            .read()
            .get(to)
            .cloned()
            .ok_or_else(|| TransportError::UnknownPeer(to.clone()))?;
        self.deliver(to.clone(), sender, payload).await
    }

    async fn broadcast(&self, payload: Bytes) -> Result<(), TransportError> {
        let peers: Vec<(NetAddr, mpsc::Sender<Rpc>)> = self
            .peers
            .read()
            .iter()
            .map(|(addr, sender)| (addr.clone(), sender.clone()))
            .collect();

        let mut first_error = None;
        for (addr, sender) in peers {
            if let Err(err) = self.deliver(addr, sender, payload.clone()).await {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn consume(&self) -> Result<mpsc::Receiver<Rpc>, TransportError> {
        self.receiver
            .lock()
            .take()
            .ok_or(TransportError::AlreadyConsumed)
    }
}
