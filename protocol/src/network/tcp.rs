//! TCP transport.
//!
//! ## Framing
//!
//! Every frame is a little-endian `u32` length followed by that many bytes.
//! Frames above [`MAX_FRAME_SIZE`] are refused on both ends.
//!
//! ## Handshake
//!
//! Each side sends one hello frame: an 8-byte little-endian nonce, drawn
//! once per transport, followed by its listen address as UTF-8. The dialer
//! speaks first and the acceptor answers. The acceptor files the
//! connection under the claimed listen address, whose IP must match the
//! socket's remote IP (an unspecified IP such as `0.0.0.0` is replaced by
//! it). Both ends can then name each other by listen address rather than
//! by the ephemeral port the dial came from.
//!
//! ## One link per peer
//!
//! When two nodes dial each other, both connections arrive at both ends.
//! The connection dialed by the side with the lower nonce is preferred,
//! and both ends reach the same verdict on their own. A new connection
//! replaces the current link unless the current link is the preferred one
//! to the same peer incarnation (same nonce) and the new one is not.
//! Every link carries an id, and a reader only removes the table entry if
//! it still holds that id, so retiring a replaced link never evicts its
//! successor.
//!
//! ## Tasks
//!
//! ```text
//!   accept loop ──▶ per connection: reader task ──▶ inbound queue
//!                                   writer task ◀── peer table (mpsc)
//! ```
//!
//! A reader that hits EOF or a bad frame removes its own link from the
//! table, which in turn ends the writer.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::transport::{NetAddr, Rpc, Transport, TransportError};
use crate::config::{DEFAULT_CHANNEL_CAPACITY, MAX_FRAME_SIZE};

// ---------------------------------------------------------------------------
// Framing
// ---------------------------------------------------------------------------

/// Writes one length-prefixed frame.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    if payload.len() > MAX_FRAME_SIZE {
        return Err(TransportError::FrameTooLarge {
            size: payload.len(),
            max: MAX_FRAME_SIZE,
        });
    }
    let len = payload.len() as u32;
    writer.write_all(&len.to_le_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one length-prefixed frame. `Ok(None)` on a clean EOF between
/// frames.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Bytes>, TransportError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(err) if err.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        Err(err) => return Err(err.into()),
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(TransportError::FrameTooLarge {
            size: len,
            max: MAX_FRAME_SIZE,
        });
    }

    let mut data = vec![0u8; len];
    reader.read_exact(&mut data).await?;
    Ok(Some(Bytes::from(data)))
}

// ---------------------------------------------------------------------------
// TcpTransport
// ---------------------------------------------------------------------------

const NONCE_LEN: usize = 8;

fn encode_hello(nonce: u64, addr: &NetAddr) -> Vec<u8> {
    let mut hello = Vec::with_capacity(NONCE_LEN + addr.as_str().len());
    hello.extend_from_slice(&nonce.to_le_bytes());
    hello.extend_from_slice(addr.as_str().as_bytes());
    hello
}

fn decode_hello(frame: &[u8]) -> Option<(u64, &str)> {
    if frame.len() < NONCE_LEN {
        return None;
    }
    let (nonce, addr) = frame.split_at(NONCE_LEN);
    let nonce = u64::from_le_bytes(nonce.try_into().ok()?);
    let addr = std::str::from_utf8(addr).ok()?;
    Some((nonce, addr))
}

/// Resolves the listen address a dialer claims against the address its
/// connection actually comes from.
fn verify_claimed_addr(claimed: &str, remote: SocketAddr) -> Option<NetAddr> {
    let mut claimed: SocketAddr = claimed.parse().ok()?;
    if claimed.ip().is_unspecified() {
        claimed.set_ip(remote.ip());
    } else if claimed.ip() != remote.ip() {
        return None;
    }
    Some(NetAddr::from(claimed))
}

#[derive(Debug)]
struct Link {
    id: u64,
    peer_nonce: u64,
    preferred: bool,
    sender: mpsc::Sender<Bytes>,
}

type PeerTable = RwLock<HashMap<NetAddr, Link>>;

#[derive(Debug)]
struct Shared {
    addr: NetAddr,
    nonce: u64,
    next_link: AtomicU64,
    peers: PeerTable,
    inbound: mpsc::Sender<Rpc>,
}

#[derive(Debug)]
pub struct TcpTransport {
    shared: Arc<Shared>,
    local_addr: SocketAddr,
    receiver: Mutex<Option<mpsc::Receiver<Rpc>>>,
    accept_task: JoinHandle<()>,
}

impl TcpTransport {
    /// Binds `addr` and starts accepting connections.
    ///
    /// Binding port 0 picks a free port; [`Self::local_addr`] reports it.
    pub async fn bind(addr: SocketAddr) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let (inbound, receiver) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);

        let shared = Arc::new(Shared {
            addr: NetAddr::from(local_addr),
            nonce: rand::random(),
            next_link: AtomicU64::new(0),
            peers: RwLock::new(HashMap::new()),
            inbound,
        });
        let accept_task = tokio::spawn(accept_loop(listener, Arc::clone(&shared)));

        info!(addr = %local_addr, "tcp transport listening");
        Ok(Self {
            shared,
            local_addr,
            receiver: Mutex::new(Some(receiver)),
            accept_task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Dials `peer`, exchanges hellos and registers the link under the
    /// dialed address.
    ///
    /// Returns the peer's name even when an existing preferred link to the
    /// same peer wins and this connection is dropped.
    pub async fn connect(&self, peer: SocketAddr) -> Result<NetAddr, TransportError> {
        let stream = TcpStream::connect(peer).await?;
        stream.set_nodelay(true)?;
        let (mut reader, mut writer) = stream.into_split();

        let hello = encode_hello(self.shared.nonce, &self.shared.addr);
        write_frame(&mut writer, &hello).await?;

        let reply = read_frame(&mut reader)
            .await?
            .ok_or(TransportError::InvalidHandshake(peer))?;
        let (peer_nonce, _) = decode_hello(&reply).ok_or(TransportError::InvalidHandshake(peer))?;
        if peer_nonce == self.shared.nonce {
            return Err(TransportError::InvalidHandshake(peer));
        }

        let peer_addr = NetAddr::from(peer);
        let preferred = self.shared.nonce < peer_nonce;
        if register_peer(&self.shared, peer_addr.clone(), peer_nonce, preferred, reader, writer) {
            info!(peer = %peer_addr, "connected to peer");
        }
        Ok(peer_addr)
    }

    pub fn peer_count(&self) -> usize {
        self.shared.peers.read().len()
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

#[async_trait]
impl Transport for TcpTransport {
    fn addr(&self) -> NetAddr {
        self.shared.addr.clone()
    }

    async fn send_message(&self, to: &NetAddr, payload: Bytes) -> Result<(), TransportError> {
        let sender = self
            .shared
            .peers
            .read()
            .get(to)
            .map(|link| link.sender.clone())
            .ok_or_else(|| TransportError::UnknownPeer(to.clone()))?;
        sender
            .send(payload)
            .await
            .map_err(|_| TransportError::PeerDisconnected(to.clone()))
    }

    async fn broadcast(&self, payload: Bytes) -> Result<(), TransportError> {
        let peers: Vec<(NetAddr, mpsc::Sender<Bytes>)> = self
            .shared
            .peers
            .read()
            .iter()
            .map(|(addr, link)| (addr.clone(), link.sender.clone()))
            .collect();

        let mut first_error = None;
        for (addr, sender) in peers {
            if sender.send(payload.clone()).await.is_err() {
                first_error.get_or_insert(TransportError::PeerDisconnected(addr));
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

// ---------------------------------------------------------------------------
// Connection tasks
// ---------------------------------------------------------------------------

async fn accept_loop(listener: TcpListener, shared: Arc<Shared>) {
    loop {
        let (stream, remote) = match listener.accept().await {
            Ok(conn) => conn,
            Err(err) => {
                warn!(error = %err, "accept failed");
                continue;
            }
        };

        let shared = Arc::clone(&shared);
        tokio::spawn(async move {
            if let Err(err) = accept_peer(stream, remote, shared).await {
                warn!(remote = %remote, error = %err, "rejected inbound connection");
            }
        });
    }
}

async fn accept_peer(
    stream: TcpStream,
    remote: SocketAddr,
    shared: Arc<Shared>,
) -> Result<(), TransportError> {
    stream.set_nodelay(true)?;
    let (mut reader, mut writer) = stream.into_split();

    let hello = read_frame(&mut reader)
        .await?
        .ok_or(TransportError::InvalidHandshake(remote))?;
    let (peer_nonce, claimed) = decode_hello(&hello).ok_or(TransportError::InvalidHandshake(remote))?;
    if peer_nonce == shared.nonce {
        return Err(TransportError::InvalidHandshake(remote));
    }
    let peer_addr =
        verify_claimed_addr(claimed, remote).ok_or(TransportError::InvalidHandshake(remote))?;

    write_frame(&mut writer, &encode_hello(shared.nonce, &shared.addr)).await?;

    let preferred = peer_nonce < shared.nonce;
    if register_peer(&shared, peer_addr.clone(), peer_nonce, preferred, reader, writer) {
        debug!(peer = %peer_addr, remote = %remote, "accepted peer");
    }
    Ok(())
}

/// Files a handshaken connection in the peer table and starts its tasks.
///
/// Returns `false`, dropping the connection, when the table already holds
/// the preferred link to the same peer and this one is not it.
fn register_peer(
    shared: &Arc<Shared>,
    peer: NetAddr,
    peer_nonce: u64,
    preferred: bool,
    reader: OwnedReadHalf,
    writer: OwnedWriteHalf,
) -> bool {
    let id = shared.next_link.fetch_add(1, Ordering::Relaxed);
    let (sender, queue) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);
    {
        let mut peers = shared.peers.write();
        if let Some(current) = peers.get(&peer) {
            if current.preferred && !preferred && current.peer_nonce == peer_nonce {
                debug!(peer = %peer, "keeping preferred link, dropping duplicate");
                return false;
            }
            debug!(peer = %peer, "replacing link");
        }
        peers.insert(
            peer.clone(),
            Link {
                id,
                peer_nonce,
                preferred,
                sender,
            },
        );
    }

    tokio::spawn(write_loop(peer.clone(), writer, queue));
    tokio::spawn(read_loop(peer, id, reader, Arc::clone(shared)));
    true
}

async fn write_loop(peer: NetAddr, mut writer: OwnedWriteHalf, mut queue: mpsc::Receiver<Bytes>) {
    while let Some(payload) = queue.recv().await {
        if let Err(err) = write_frame(&mut writer, &payload).await {
            warn!(peer = %peer, error = %err, "write failed, closing link");
            break;
        }
    }
}

async fn read_loop(peer: NetAddr, id: u64, mut reader: OwnedReadHalf, shared: Arc<Shared>) {
    loop {
        match read_frame(&mut reader).await {
            Ok(Some(payload)) => {
                let rpc = Rpc {
                    from: peer.clone(),
                    payload,
                };
                if shared.inbound.send(rpc).await.is_err() {
                    break;
                }
            }
            Ok(None) => {
                debug!(peer = %peer, "peer closed connection");
                break;
            }
            Err(err) => {
                warn!(peer = %peer, error = %err, "read failed, closing link");
                break;
            }
        }
    }
    let mut peers = shared.peers.write();
    if peers.get(&peer).is_some_and(|link| link.id == id) {
        peers.remove(&peer);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn loopback() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 0))
    }

    #[tokio::test]
    async fn frame_roundtrip_over_duplex() {
        let (mut client, mut server) = tokio::io::duplex(64);
        write_frame(&mut client, b"framed").await.unwrap();
        drop(client);

        let frame = read_frame(&mut server).await.unwrap();
        assert_eq!(frame, Some(Bytes::from_static(b"framed")));
        assert_eq!(read_frame(&mut server).await.unwrap(), None);
    }

    #[tokio::test]
    async fn oversized_length_prefix_is_refused() {
        let (mut client, mut server) = tokio::io::duplex(64);
        let len = (MAX_FRAME_SIZE as u32) + 1;
        client.write_all(&len.to_le_bytes()).await.unwrap();

        let err = read_frame(&mut server).await.unwrap_err();
        assert!(matches!(err, TransportError::FrameTooLarge { .. }));
    }

    #[tokio::test]
    async fn oversized_payload_is_not_written() {
        let (mut client, _server) = tokio::io::duplex(64);
        let payload = vec![0u8; MAX_FRAME_SIZE + 1];
        let err = write_frame(&mut client, &payload).await.unwrap_err();
        assert!(matches!(err, TransportError::FrameTooLarge { .. }));
    }

    #[tokio::test]
    async fn messages_flow_both_ways() {
        let a = TcpTransport::bind(loopback()).await.unwrap();
        let b = TcpTransport::bind(loopback()).await.unwrap();
        let mut a_inbox = a.consume().unwrap();
        let mut b_inbox = b.consume().unwrap();

        let b_addr = a.connect(b.local_addr()).await.unwrap();
        a.send_message(&b_addr, Bytes::from_static(b"ping")).await.unwrap();

        let rpc = tokio::time::timeout(Duration::from_secs(5), b_inbox.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rpc.payload, Bytes::from_static(b"ping"));
        assert_eq!(rpc.from, a.addr());

        // b now knows a under a's listen address
        b.send_message(&a.addr(), Bytes::from_static(b"pong")).await.unwrap();
        let rpc = tokio::time::timeout(Duration::from_secs(5), a_inbox.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rpc.payload, Bytes::from_static(b"pong"));
        assert_eq!(rpc.from, b_addr);
    }

    async fn recv_payload(inbox: &mut mpsc::Receiver<Rpc>) -> Bytes {
        tokio::time::timeout(Duration::from_secs(5), inbox.recv())
            .await
            .unwrap()
            .unwrap()
            .payload
    }

    #[tokio::test]
    async fn mutual_dial_keeps_one_live_link() {
        let a = TcpTransport::bind(loopback()).await.unwrap();
        let b = TcpTransport::bind(loopback()).await.unwrap();
        let mut a_inbox = a.consume().unwrap();
        let mut b_inbox = b.consume().unwrap();

        let b_addr = a.connect(b.local_addr()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        b.connect(a.local_addr()).await.unwrap();
        // retired connections close in the background
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert_eq!(a.peer_count(), 1);
        assert_eq!(b.peer_count(), 1);

        a.send_message(&b_addr, Bytes::from_static(b"ping")).await.unwrap();
        assert_eq!(recv_payload(&mut b_inbox).await, Bytes::from_static(b"ping"));
        b.send_message(&a.addr(), Bytes::from_static(b"pong")).await.unwrap();
        assert_eq!(recv_payload(&mut a_inbox).await, Bytes::from_static(b"pong"));
    }

    #[tokio::test]
    async fn simultaneous_dial_converges() {
        let a = TcpTransport::bind(loopback()).await.unwrap();
        let b = TcpTransport::bind(loopback()).await.unwrap();
        let mut a_inbox = a.consume().unwrap();
        let mut b_inbox = b.consume().unwrap();

        let (from_a, from_b) = tokio::join!(a.connect(b.local_addr()), b.connect(a.local_addr()));
        let b_addr = from_a.unwrap();
        from_b.unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert_eq!(a.peer_count(), 1);
        assert_eq!(b.peer_count(), 1);

        a.broadcast(Bytes::from_static(b"one")).await.unwrap();
        assert_eq!(recv_payload(&mut b_inbox).await, Bytes::from_static(b"one"));
        b.send_message(&a.addr(), Bytes::from_static(b"two")).await.unwrap();
        assert_eq!(recv_payload(&mut a_inbox).await, Bytes::from_static(b"two"));
        assert!(a.shared.peers.read().contains_key(&b_addr));
    }

    #[tokio::test]
    async fn forged_listen_address_is_refused() {
        let b = TcpTransport::bind(loopback()).await.unwrap();
        let mut stream = TcpStream::connect(b.local_addr()).await.unwrap();

        let forged = encode_hello(7, &NetAddr::from("10.1.2.3:4000"));
        write_frame(&mut stream, &forged).await.unwrap();

        // refused before any reply is sent
        let reply = tokio::time::timeout(Duration::from_secs(5), read_frame(&mut stream))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reply, None);
        assert_eq!(b.peer_count(), 0);
    }

    #[test]
    fn claimed_address_must_match_remote_ip() {
        let remote: SocketAddr = "127.0.0.1:51000".parse().unwrap();
        assert_eq!(
            verify_claimed_addr("127.0.0.1:3000", remote),
            Some(NetAddr::from("127.0.0.1:3000"))
        );
        assert_eq!(
            verify_claimed_addr("0.0.0.0:3000", remote),
            Some(NetAddr::from("127.0.0.1:3000"))
        );
        assert_eq!(verify_claimed_addr("10.0.0.9:3000", remote), None);
        assert_eq!(verify_claimed_addr("not an address", remote), None);
    }

    #[test]
    fn hello_carries_nonce_and_address() {
        let hello = encode_hello(42, &NetAddr::from("127.0.0.1:3000"));
        assert_eq!(decode_hello(&hello), Some((42, "127.0.0.1:3000")));
        assert_eq!(decode_hello(&hello[..4]), None);
    }

    #[tokio::test]
    async fn unknown_peer_is_rejected() {
        let a = TcpTransport::bind(loopback()).await.unwrap();
        let err = a
            .send_message(&NetAddr::from("127.0.0.1:1"), Bytes::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::UnknownPeer(_)));
    }
}
