//! # Node Server
//!
//! The `Server` owns a node's ledger and transaction pool and drives them
//! from a single async control loop.
//!
//! ## How it works
//!
//! [`Server::run`] selects over four sources:
//!
//! 1. **Shutdown**: a `watch` flag flipped by [`ServerHandle::shutdown`].
//! 2. **Commands**: status queries and local submissions from a
//!    [`ServerHandle`].
//! 3. **Inbound RPCs**: one forwarding task per transport feeds a shared
//!    bounded queue, so per-transport order is preserved.
//! 4. **Block timer**: only on a validator (a node configured with a private
//!    key). Each tick builds a block from the whole pool on top of the tip.
//!
//! Ledger and pool are touched only from this loop, so they need no locks.
//! Errors from a single message or tick are logged and the loop moves on.
//!
//! ## Gossip
//!
//! A newly admitted transaction is re-broadcast, as the bytes it arrived
//! in, to every transport. A committed block is broadcast the same way.
//! Receivers already holding the transaction drop it at the pool check,
//! which is what ends the flood.
//!
//! ## Testing
//!
//! [`Server::process_rpc`] and [`Server::produce_block`] are the loop's two
//! step functions. Tests call them directly to drive a node one step at a
//! time without timers.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, info_span, warn, Instrument};

use super::mempool::{MempoolError, TxPool};
use super::message::{decode_rpc, DecodedMessage, Message, MessageData, MessageError, RpcDecoder};
use super::transport::{Rpc, Transport, TransportError};
use crate::config::{DEFAULT_BLOCK_TIME, DEFAULT_CHANNEL_CAPACITY};
use crate::crypto::{Hash, PrivateKey};
use crate::storage::{Block, Blockchain, ChainError};
use crate::transaction::{Transaction, TransactionError};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Everything a [`Server`] needs at construction.
pub struct ServerConfig {
    /// Name attached to every log line from this node.
    pub id: String,

    /// Interval between produced blocks. Ignored without `private_key`.
    pub block_time: Duration,

    /// Validator key. Its presence is what makes the node produce blocks.
    pub private_key: Option<PrivateKey>,

    /// Envelope decoder. `None` selects [`decode_rpc`].
    pub decoder: Option<RpcDecoder>,

    /// Replaces the built-in message handling entirely when set.
    pub processor: Option<Arc<dyn RpcProcessor>>,

    pub transports: Vec<Arc<dyn Transport>>,

    /// Capacity of the merged inbound queue and the command queue.
    pub channel_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            id: "node".to_string(),
            block_time: DEFAULT_BLOCK_TIME,
            private_key: None,
            decoder: None,
            processor: None,
            transports: Vec::new(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("id", &self.id)
            .field("block_time", &self.block_time)
            .field("validator", &self.private_key.is_some())
            .field("custom_decoder", &self.decoder.is_some())
            .field("custom_processor", &self.processor.is_some())
            .field("transports", &self.transports.len())
            .field("channel_capacity", &self.channel_capacity)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Message(#[from] MessageError),

    #[error(transparent)]
    Transaction(#[from] TransactionError),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Mempool(#[from] MempoolError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("node has no validator key")]
    NotValidator,

    #[error("server is not running")]
    Stopped,
}

// ---------------------------------------------------------------------------
// Processor
// ---------------------------------------------------------------------------

/// Custom handler for decoded messages.
///
/// A server configured with a processor hands it every decoded message and
/// does nothing else with it: no pool admission, no ledger update, no
/// gossip.
pub trait RpcProcessor: Send + Sync {
    fn process_message(&self, message: DecodedMessage) -> Result<(), ServerError>;
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Point-in-time view of a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeStatus {
    pub id: String,
    pub height: u64,
    pub tip_hash: Hash,
    pub mempool_len: usize,
    pub is_validator: bool,
}

enum Command {
    Status(oneshot::Sender<NodeStatus>),
    Submit(Transaction, oneshot::Sender<Result<(), ServerError>>),
}

/// Cloneable remote control for a running [`Server`].
#[derive(Clone)]
pub struct ServerHandle {
    commands: mpsc::Sender<Command>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl ServerHandle {
    pub async fn status(&self) -> Result<NodeStatus, ServerError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Status(reply))
            .await
            .map_err(|_| ServerError::Stopped)?;
        response.await.map_err(|_| ServerError::Stopped)
    }

    /// Hands `tx` to the node as if a peer had sent it.
    pub async fn submit_transaction(&self, tx: Transaction) -> Result<(), ServerError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Submit(tx, reply))
            .await
            .map_err(|_| ServerError::Stopped)?;
        response.await.map_err(|_| ServerError::Stopped)?
    }

    /// Asks the loop to stop. Idempotent.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }
}

impl fmt::Debug for ServerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerHandle")
            .field("stopped", &*self.shutdown.borrow())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

pub struct Server {
    id: String,
    block_time: Duration,
    private_key: Option<PrivateKey>,
    decoder: RpcDecoder,
    processor: Option<Arc<dyn RpcProcessor>>,
    transports: Vec<Arc<dyn Transport>>,
    channel_capacity: usize,

    chain: Blockchain,
    pool: TxPool,

    command_tx: mpsc::Sender<Command>,
    command_rx: mpsc::Receiver<Command>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Server {
    /// Builds a node at genesis with an empty pool.
    pub fn new(config: ServerConfig) -> Self {
        let capacity = config.channel_capacity.max(1);
        let (command_tx, command_rx) = mpsc::channel(capacity);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self {
            id: config.id,
            block_time: config.block_time,
            private_key: config.private_key,
            decoder: config.decoder.unwrap_or_else(|| Arc::new(decode_rpc)),
            processor: config.processor,
            transports: config.transports,
            channel_capacity: capacity,
            chain: Blockchain::new(),
            pool: TxPool::new(),
            command_tx,
            command_rx,
            shutdown_tx: Arc::new(shutdown_tx),
            shutdown_rx,
        }
    }

    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            commands: self.command_tx.clone(),
            shutdown: Arc::clone(&self.shutdown_tx),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_validator(&self) -> bool {
        self.private_key.is_some()
    }

    pub fn chain(&self) -> &Blockchain {
        &self.chain
    }

    pub fn pool(&self) -> &TxPool {
        &self.pool
    }

    pub fn status(&self) -> NodeStatus {
        NodeStatus {
            id: self.id.clone(),
            height: self.chain.height(),
            tip_hash: self.chain.tip_hash(),
            mempool_len: self.pool.len(),
            is_validator: self.is_validator(),
        }
    }

    /// Runs the control loop until [`ServerHandle::shutdown`] is called,
    /// then hands the server back.
    pub async fn run(mut self) -> Self {
        let span = info_span!("server", id = %self.id);
        async move {
            let (inbound_tx, mut inbound_rx) = mpsc::channel(self.channel_capacity);
            let forwarders = self.spawn_forwarders(&inbound_tx);
            drop(inbound_tx);

            let mut ticker = self.private_key.as_ref().map(|_| {
                let mut ticker = interval_at(Instant::now() + self.block_time, self.block_time);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                ticker
            });

            info!(
                validator = self.is_validator(),
                block_time_ms = self.block_time.as_millis() as u64,
                transports = self.transports.len(),
                "server started"
            );

            loop {
                if *self.shutdown_rx.borrow() {
                    break;
                }

                tokio::select! {
                    biased;

                    changed = self.shutdown_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    Some(command) = self.command_rx.recv() => self.handle_command(command),
                    Some(rpc) = inbound_rx.recv() => {
                        if let Err(err) = self.process_rpc(rpc) {
                            warn!(error = %err, "failed to process message");
                        }
                    }
                    _ = next_tick(&mut ticker) => {
                        if let Err(err) = self.produce_block() {
                            warn!(error = %err, "block production failed");
                        }
                    }
                }
            }

            for forwarder in forwarders {
                forwarder.abort();
            }
            info!(height = self.chain.height(), "server shutting down");
            self
        }
        .instrument(span)
        .await
    }

    /// Decodes one inbound RPC and handles it.
    ///
    /// With a custom processor the decoded message goes there and nowhere
    /// else. Otherwise transactions are admitted and gossiped and blocks are
    /// offered to the ledger.
    pub fn process_rpc(&mut self, rpc: Rpc) -> Result<(), ServerError> {
        let raw = rpc.payload.clone();
        let message = (self.decoder)(rpc)?;

        if let Some(processor) = &self.processor {
            return processor.process_message(message);
        }

        match message.data {
            MessageData::Transaction(tx) => self.process_transaction(tx, raw),
            MessageData::Block(block) => self.process_block(&block),
        }
    }

    /// Builds, signs and commits a block holding the whole pool.
    ///
    /// On success the pool is emptied and the block is broadcast. On failure
    /// neither ledger nor pool change.
    pub fn produce_block(&mut self) -> Result<Block, ServerError> {
        let key = self.private_key.as_ref().ok_or(ServerError::NotValidator)?;

        let mut block = Block::new_from_parent(self.chain.tip(), self.pool.transactions());
        block.sign(key);
        let encoded = Message::block(&block)?.to_bytes()?;

        self.chain.add_block(&block)?;
        self.pool.flush();

        info!(
            height = block.height(),
            hash = %block.hash().short(),
            txs = block.transactions().len(),
            "block committed"
        );
        self.spawn_broadcast(Bytes::from(encoded));
        Ok(block)
    }

    /// Verifies, stamps and admits a transaction, then relays the original
    /// bytes to every transport.
    ///
    /// A duplicate is only a no-op while it is still pending. The pool has
    /// no memory of committed transactions, so a copy that arrives after the
    /// block holding it (a late echo from a peer, or after a follower prunes
    /// its pool on block intake) is admitted again and lands in a later
    /// block.
    fn process_transaction(&mut self, mut tx: Transaction, raw: Bytes) -> Result<(), ServerError> {
        tx.verify()?;

        let hash = tx.hash();
        if self.pool.has(&hash) {
            debug!(hash = %hash.short(), "transaction already in mempool");
            return Ok(());
        }

        let now = Utc::now()
            .timestamp_nanos_opt()
            .ok_or(MempoolError::ClockOutOfRange)?;
        tx.set_first_seen(now);
        self.pool.add(tx)?;

        info!(
            hash = %hash.short(),
            mempool_len = self.pool.len(),
            "transaction admitted"
        );
        self.spawn_broadcast(raw);
        Ok(())
    }

    fn process_block(&mut self, block: &Block) -> Result<(), ServerError> {
        self.chain.add_block(block)?;
        for tx in block.transactions() {
            self.pool.remove(&tx.hash());
        }
        info!(
            height = block.height(),
            hash = %block.hash().short(),
            txs = block.transactions().len(),
            "block accepted"
        );
        Ok(())
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Status(reply) => {
                let _ = reply.send(self.status());
            }
            Command::Submit(tx, reply) => {
                let result = Message::transaction(&tx)
                    .and_then(|message| message.to_bytes())
                    .map_err(ServerError::from)
                    .and_then(|raw| self.process_transaction(tx, Bytes::from(raw)));
                let _ = reply.send(result);
            }
        }
    }

    fn spawn_forwarders(&self, inbound: &mpsc::Sender<Rpc>) -> Vec<JoinHandle<()>> {
        let mut forwarders = Vec::with_capacity(self.transports.len());
        for transport in &self.transports {
            let mut receiver = match transport.consume() {
                Ok(receiver) => receiver,
                Err(err) => {
                    warn!(transport = %transport.addr(), error = %err, "transport not attached");
                    continue;
                }
            };
            let inbound = inbound.clone();
            forwarders.push(tokio::spawn(async move {
                while let Some(rpc) = receiver.recv().await {
                    if inbound.send(rpc).await.is_err() {
                        break;
                    }
                }
            }));
        }
        forwarders
    }

    fn spawn_broadcast(&self, payload: Bytes) {
        if self.transports.is_empty() {
            return;
        }
        let transports = self.transports.clone();
        tokio::spawn(
            async move {
                for transport in &transports {
                    if let Err(err) = transport.broadcast(payload.clone()).await {
                        warn!(transport = %transport.addr(), error = %err, "broadcast failed");
                    }
                }
            }
            .in_current_span(),
        );
    }
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("id", &self.id)
            .field("height", &self.chain.height())
            .field("mempool_len", &self.pool.len())
            .field("validator", &self.is_validator())
            .finish()
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;
    use crate::network::local::LocalTransport;
    use crate::network::transport::NetAddr;
    use crate::storage::Header;

    fn validator() -> Server {
        Server::new(ServerConfig {
            id: "validator".into(),
            private_key: Some(PrivateKey::generate()),
            ..Default::default()
        })
    }

    fn follower() -> Server {
        Server::new(ServerConfig {
            id: "follower".into(),
            ..Default::default()
        })
    }

    fn signed_tx(payload: &[u8]) -> Transaction {
        let mut tx = Transaction::new(payload.to_vec());
        tx.sign(&PrivateKey::generate());
        tx
    }

    fn tx_rpc(tx: &Transaction) -> Rpc {
        Rpc {
            from: NetAddr::from("peer"),
            payload: Bytes::from(Message::transaction(tx).unwrap().to_bytes().unwrap()),
        }
    }

    fn block_rpc(block: &Block) -> Rpc {
        Rpc {
            from: NetAddr::from("validator"),
            payload: Bytes::from(Message::block(block).unwrap().to_bytes().unwrap()),
        }
    }

    // -- configuration --

    #[test]
    fn default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.id, "node");
        assert_eq!(config.block_time, DEFAULT_BLOCK_TIME);
        assert!(config.private_key.is_none());
        assert!(config.transports.is_empty());
        assert_eq!(config.channel_capacity, DEFAULT_CHANNEL_CAPACITY);
    }

    #[test]
    fn validator_role_follows_key() {
        assert!(validator().is_validator());
        assert!(!follower().is_validator());
    }

    // -- transactions --

    #[tokio::test]
    async fn valid_transaction_is_admitted() {
        let mut server = follower();
        let tx = signed_tx(b"hello");

        server.process_rpc(tx_rpc(&tx)).unwrap();

        assert_eq!(server.pool().len(), 1);
        assert!(server.pool().has(&tx.hash()));
        assert!(server.pool().transactions()[0].first_seen() > 0);
    }

    #[tokio::test]
    async fn duplicate_transaction_is_ignored() {
        let mut server = follower();
        let tx = signed_tx(b"hello");

        server.process_rpc(tx_rpc(&tx)).unwrap();
        server.process_rpc(tx_rpc(&tx)).unwrap();

        assert_eq!(server.pool().len(), 1);
    }

    #[tokio::test]
    async fn unsigned_transaction_is_rejected() {
        let mut server = follower();
        let tx = Transaction::new(b"unsigned".to_vec());

        let err = server.process_rpc(tx_rpc(&tx)).unwrap_err();

        assert!(matches!(
            err,
            ServerError::Transaction(TransactionError::MissingSignature)
        ));
        assert!(server.pool().is_empty());
    }

    #[tokio::test]
    async fn garbage_payload_is_a_decode_error() {
        let mut server = follower();
        let rpc = Rpc {
            from: NetAddr::from("peer"),
            payload: Bytes::from_static(&[0xde, 0xad]),
        };
        assert!(matches!(
            server.process_rpc(rpc),
            Err(ServerError::Message(_))
        ));
    }

    #[tokio::test]
    async fn admitted_transaction_is_rebroadcast() {
        let node = Arc::new(LocalTransport::new("node"));
        let peer = LocalTransport::new("peer");
        node.connect(&peer);
        let mut peer_inbox = peer.consume().unwrap();

        let mut server = Server::new(ServerConfig {
            transports: vec![node.clone() as Arc<dyn Transport>],
            ..Default::default()
        });
        let rpc = tx_rpc(&signed_tx(b"gossip"));
        let original = rpc.payload.clone();

        server.process_rpc(rpc).unwrap();

        let relayed = peer_inbox.recv().await.unwrap();
        assert_eq!(relayed.payload, original);
        assert_eq!(relayed.from, NetAddr::from("node"));
    }

    // -- block production --

    #[tokio::test]
    async fn produce_block_on_empty_pool() {
        let mut server = validator();
        let block = server.produce_block().unwrap();

        assert_eq!(block.height(), 1);
        assert!(block.transactions().is_empty());
        assert_eq!(server.chain().height(), 1);
        assert_eq!(server.chain().tip_hash(), block.hash());
    }

    #[tokio::test]
    async fn produce_block_drains_pool_in_order() {
        let mut server = validator();
        let a = signed_tx(b"a");
        let b = signed_tx(b"b");
        server.process_rpc(tx_rpc(&a)).unwrap();
        server.process_rpc(tx_rpc(&b)).unwrap();
        let expected = server.pool().transactions();

        let block = server.produce_block().unwrap();

        assert_eq!(block.transactions(), expected.as_slice());
        assert!(server.pool().is_empty());
        assert!(block.verify().is_ok());
    }

    #[tokio::test]
    async fn committed_transaction_is_pending_again_on_late_copy() {
        let mut server = validator();
        let tx = signed_tx(b"echoed");
        server.process_rpc(tx_rpc(&tx)).unwrap();
        let first = server.produce_block().unwrap();
        assert!(server.pool().is_empty());

        server.process_rpc(tx_rpc(&tx)).unwrap();
        assert!(server.pool().has(&tx.hash()));

        let second = server.produce_block().unwrap();
        assert_eq!(first.transactions()[0].hash(), tx.hash());
        assert_eq!(second.transactions()[0].hash(), tx.hash());
        assert_eq!(server.chain().height(), 2);
    }

    #[test]
    fn follower_cannot_produce() {
        let mut server = follower();
        assert!(matches!(
            server.produce_block(),
            Err(ServerError::NotValidator)
        ));
        assert_eq!(server.chain().height(), 0);
    }

    // -- block intake --

    #[tokio::test]
    async fn follower_accepts_validator_blocks() {
        let mut producer = validator();
        let mut node = follower();
        let tx = signed_tx(b"included");
        producer.process_rpc(tx_rpc(&tx)).unwrap();
        node.process_rpc(tx_rpc(&tx)).unwrap();

        let block = producer.produce_block().unwrap();
        node.process_rpc(block_rpc(&block)).unwrap();

        assert_eq!(node.chain().height(), 1);
        assert_eq!(node.chain().tip_hash(), producer.chain().tip_hash());
        assert!(node.pool().is_empty());
    }

    #[tokio::test]
    async fn out_of_order_block_is_rejected() {
        let mut producer = validator();
        let mut node = follower();
        producer.produce_block().unwrap();
        let second = producer.produce_block().unwrap();

        let err = node.process_rpc(block_rpc(&second)).unwrap_err();

        assert!(matches!(
            err,
            ServerError::Chain(ChainError::HeightMismatch { expected: 1, got: 2 })
        ));
        assert_eq!(node.chain().height(), 0);
    }

    #[tokio::test]
    async fn unsigned_block_is_rejected() {
        let mut node = follower();
        let block = Block::new_from_parent(&Header::genesis(), vec![]);
        assert!(node.process_rpc(block_rpc(&block)).is_err());
        assert_eq!(node.chain().height(), 0);
    }

    // -- custom processing --

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<DecodedMessage>>,
    }

    impl RpcProcessor for Recorder {
        fn process_message(&self, message: DecodedMessage) -> Result<(), ServerError> {
            self.seen.lock().push(message);
            Ok(())
        }
    }

    #[tokio::test]
    async fn custom_processor_replaces_dispatch() {
        let recorder = Arc::new(Recorder::default());
        let mut server = Server::new(ServerConfig {
            processor: Some(recorder.clone()),
            ..Default::default()
        });
        let tx = signed_tx(b"custom");

        server.process_rpc(tx_rpc(&tx)).unwrap();

        assert!(server.pool().is_empty());
        let seen = recorder.seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].data, MessageData::Transaction(tx));
    }

    #[tokio::test]
    async fn custom_decoder_is_used() {
        let decoder: RpcDecoder = Arc::new(|rpc: Rpc| -> Result<DecodedMessage, MessageError> {
            Ok(DecodedMessage {
                from: rpc.from,
                data: MessageData::Transaction(signed_tx(&rpc.payload)),
            })
        });
        let mut server = Server::new(ServerConfig {
            decoder: Some(decoder),
            ..Default::default()
        });

        let rpc = Rpc {
            from: NetAddr::from("peer"),
            payload: Bytes::from_static(b"raw"),
        };
        server.process_rpc(rpc).unwrap();

        assert_eq!(server.pool().transactions()[0].payload(), b"raw");
    }

    // -- control loop --

    #[tokio::test(start_paused = true)]
    async fn validator_produces_on_every_tick() {
        let server = Server::new(ServerConfig {
            private_key: Some(PrivateKey::generate()),
            block_time: Duration::from_secs(1),
            ..Default::default()
        });
        let handle = server.handle();
        let task = tokio::spawn(server.run());

        tokio::time::sleep(Duration::from_millis(3_500)).await;
        let status = handle.status().await.unwrap();
        assert_eq!(status.height, 3);
        assert!(status.is_validator);

        handle.shutdown();
        let server = task.await.unwrap();
        assert_eq!(server.chain().height(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn follower_never_produces() {
        let server = follower();
        let handle = server.handle();
        let task = tokio::spawn(server.run());

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(handle.status().await.unwrap().height, 0);

        handle.shutdown();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn submitted_transaction_lands_in_pool() {
        let server = follower();
        let handle = server.handle();
        let task = tokio::spawn(server.run());

        handle.submit_transaction(signed_tx(b"local")).await.unwrap();
        let err = handle
            .submit_transaction(Transaction::new(b"unsigned".to_vec()))
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::Transaction(_)));

        assert_eq!(handle.status().await.unwrap().mempool_len, 1);
        handle.shutdown();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_before_run_returns_immediately() {
        let server = follower();
        let handle = server.handle();
        handle.shutdown();

        let server = server.run().await;
        assert_eq!(server.chain().height(), 0);

        drop(server);
        assert!(matches!(handle.status().await, Err(ServerError::Stopped)));
    }

    #[tokio::test]
    async fn inbound_messages_flow_through_transports() {
        let node_side = Arc::new(LocalTransport::new("node"));
        let peer = LocalTransport::new("peer");
        peer.connect(&node_side);

        let server = Server::new(ServerConfig {
            transports: vec![node_side.clone() as Arc<dyn Transport>],
            ..Default::default()
        });
        let handle = server.handle();
        let task = tokio::spawn(server.run());

        let tx = signed_tx(b"over the wire");
        let bytes = Message::transaction(&tx).unwrap().to_bytes().unwrap();
        peer.send_message(&NetAddr::from("node"), Bytes::from(bytes))
            .await
            .unwrap();

        let mut mempool_len = 0;
        for _ in 0..100 {
            mempool_len = handle.status().await.unwrap().mempool_len;
            if mempool_len == 1 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(mempool_len, 1);

        handle.shutdown();
        task.await.unwrap();
    }
}
