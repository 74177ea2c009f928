//! # Client Session Management
//!
//! One [`Session`] per connected client. The session owns the
//! connection's outbound byte queue exclusively: the event loop appends
//! serialized packets, the connection's writer task drains them in FIFO
//! order after the event loop yields. Nothing else touches the queue.
//!
//! # Lifecycle
//!
//! Created on accept with the server's configured client version;
//! the version may be replaced once during the handshake for
//! multi-version-tolerant deployments, and is fixed afterwards. On
//! disconnect the queue is dropped with the session.

use bytes::Bytes;
use parking_lot::Mutex;
use roserver_core::{GuildId, MapId, PacketVer, PartyId, SessionId};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::Notify;

/// One connected client.
///
/// # Thread Safety
/// Game-visible state (map, position, party, guild) is only mutated from
/// the event loop; the writer task reads nothing but the outbound queue.
/// `parking_lot::Mutex` guards each piece so accessors stay cheap.
pub struct Session {
    /// Unique identifier for this connection.
    id: SessionId,

    /// Peer address (IP:port).
    peer_addr: SocketAddr,

    /// Negotiated client build date. Defaults to the server's configured
    /// version; fixed once the handshake announces the client's own.
    packet_ver: Mutex<PacketVer>,

    /// Display name announced at map entry, used for whisper routing.
    name: Mutex<String>,

    /// Current map, if the client has entered one.
    map: Mutex<Option<MapId>>,

    /// Current cell position on the map.
    position: Mutex<(u16, u16)>,

    /// Party membership, if any.
    party: Mutex<Option<PartyId>>,

    /// Guild membership, if any.
    guild: Mutex<Option<GuildId>>,

    /// Outbound frame queue, FIFO. Appended by the event loop, drained
    /// by the writer task.
    outbound: Mutex<VecDeque<Bytes>>,

    /// Wakes the writer task when the queue gains data or the session
    /// closes.
    writable: Notify,

    /// Set when either side is tearing the connection down.
    closed: AtomicBool,

    /// Connection established timestamp.
    connected_at: Instant,

    /// Total bytes received from the peer.
    bytes_received: AtomicU64,

    /// Total bytes handed to the transport.
    bytes_sent: AtomicU64,

    /// Total frames parsed from the peer.
    packets_received: AtomicU64,

    /// Total frames enqueued for the peer.
    packets_sent: AtomicU64,
}

impl Session {
    pub fn new(id: SessionId, peer_addr: SocketAddr, packet_ver: PacketVer) -> Self {
        tracing::debug!(session = id.get(), %peer_addr, "new session");

        Self {
            id,
            peer_addr,
            packet_ver: Mutex::new(packet_ver),
            name: Mutex::new(String::new()),
            map: Mutex::new(None),
            position: Mutex::new((0, 0)),
            party: Mutex::new(None),
            guild: Mutex::new(None),
            outbound: Mutex::new(VecDeque::new()),
            writable: Notify::new(),
            closed: AtomicBool::new(false),
            connected_at: Instant::now(),
            bytes_received: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            packets_received: AtomicU64::new(0),
            packets_sent: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn packet_ver(&self) -> PacketVer {
        *self.packet_ver.lock()
    }

    /// Fix the client version announced during the handshake.
    pub fn set_packet_ver(&self, ver: PacketVer) {
        *self.packet_ver.lock() = ver;
    }

    pub fn name(&self) -> String {
        self.name.lock().clone()
    }

    pub fn set_name(&self, name: impl Into<String>) {
        *self.name.lock() = name.into();
    }

    pub fn map(&self) -> Option<MapId> {
        *self.map.lock()
    }

    pub fn set_map(&self, map: Option<MapId>) {
        *self.map.lock() = map;
    }

    pub fn position(&self) -> (u16, u16) {
        *self.position.lock()
    }

    pub fn set_position(&self, x: u16, y: u16) {
        *self.position.lock() = (x, y);
    }

    pub fn party(&self) -> Option<PartyId> {
        *self.party.lock()
    }

    pub fn set_party(&self, party: Option<PartyId>) {
        *self.party.lock() = party;
    }

    pub fn guild(&self) -> Option<GuildId> {
        *self.guild.lock()
    }

    pub fn set_guild(&self, guild: Option<GuildId>) {
        *self.guild.lock() = guild;
    }

    /// Append a serialized frame to the outbound queue and wake the
    /// writer. Never blocks on I/O; delivery order over one session is
    /// the enqueue order.
    pub fn enqueue(&self, frame: Bytes) {
        self.packets_sent.fetch_add(1, Ordering::Relaxed);
        self.outbound.lock().push_back(frame);
        self.writable.notify_one();
    }

    /// Take every queued frame, preserving FIFO order. Called by the
    /// writer task only.
    pub fn drain_outbound(&self) -> Vec<Bytes> {
        let mut queue = self.outbound.lock();
        queue.drain(..).collect()
    }

    /// Frames currently queued.
    pub fn queued(&self) -> usize {
        self.outbound.lock().len()
    }

    /// Wait until the queue gains data or the session closes.
    pub async fn wait_writable(&self) {
        self.writable.notified().await;
    }

    /// Mark the session closed and wake the writer so it can exit.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.writable.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn uptime(&self) -> std::time::Duration {
        self.connected_at.elapsed()
    }

    pub fn record_received(&self, bytes: usize) {
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_parsed_frame(&self) {
        self.packets_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sent(&self, bytes: usize) {
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn bytes_received(&self) -> u64 {
        self.bytes_received.load(Ordering::Relaxed)
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent.load(Ordering::Relaxed)
    }

    pub fn packets_received(&self) -> u64 {
        self.packets_received.load(Ordering::Relaxed)
    }

    pub fn packets_sent(&self) -> u64 {
        self.packets_sent.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_session(id: u32) -> Session {
        Session::new(
            SessionId::new(id),
            "127.0.0.1:6121".parse().unwrap(),
            PacketVer::new(20180620),
        )
    }

    #[test]
    fn test_outbound_queue_is_fifo() {
        let session = test_session(1);
        session.enqueue(Bytes::from_static(b"first"));
        session.enqueue(Bytes::from_static(b"second"));
        session.enqueue(Bytes::from_static(b"third"));

        let drained = session.drain_outbound();
        assert_eq!(drained.len(), 3);
        assert_eq!(&drained[0][..], b"first");
        assert_eq!(&drained[1][..], b"second");
        assert_eq!(&drained[2][..], b"third");
        assert_eq!(session.queued(), 0);
        assert_eq!(session.packets_sent(), 3);
    }

    #[test]
    fn test_packet_ver_negotiation() {
        let session = test_session(2);
        assert_eq!(session.packet_ver(), PacketVer::new(20180620));
        session.set_packet_ver(PacketVer::new(20151104));
        assert_eq!(session.packet_ver(), PacketVer::new(20151104));
    }

    #[tokio::test]
    async fn test_enqueue_wakes_writer() {
        use std::sync::Arc;

        let session = Arc::new(test_session(3));
        let waiter = session.clone();
        let handle = tokio::spawn(async move {
            waiter.wait_writable().await;
            waiter.drain_outbound().len()
        });

        // give the waiter a chance to park first
        tokio::task::yield_now().await;
        session.enqueue(Bytes::from_static(b"ping"));
        assert_eq!(handle.await.unwrap(), 1);
    }
}
