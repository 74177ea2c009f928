//! # Map Server
//!
//! Accepts connections and runs the per-connection I/O tasks.
//!
//! # Architecture
//!
//! Each accepted connection gets:
//! 1. A reader task: reads from the socket, feeds a
//!    [`roserver_protocol::FrameReader`], and forwards every complete
//!    frame to the event loop over the frame channel.
//! 2. A writer task: waits on the session's queue notification and
//!    drains queued frames to the socket in FIFO order.
//!
//! Frame boundary detection needs only the immutable opcode table; all
//! actual parsing and dispatch happens in the event loop.

use crate::config::NetworkConfig;
use crate::event_loop::InboundFrame;
use crate::registry::SessionRegistry;
use crate::session::Session;
use roserver_core::{Result, ServerError, SessionIdAllocator};
use roserver_protocol::{FrameReader, OpcodeTable, Progress};
use socket2::{Domain, Protocol, Socket, Type};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

/// Main map-server instance: listener plus connection bookkeeping.
pub struct MapServer {
    config: NetworkConfig,
    listener: TcpListener,
    sessions: Arc<SessionRegistry>,
    allocator: Arc<SessionIdAllocator>,
    table: Arc<OpcodeTable>,
    frames: mpsc::UnboundedSender<InboundFrame>,
}

impl MapServer {
    /// Bind the listener and prepare the server.
    ///
    /// # Errors
    /// Fails when the configuration is invalid or the address cannot be
    /// bound.
    pub async fn bind(
        config: NetworkConfig,
        sessions: Arc<SessionRegistry>,
        table: Arc<OpcodeTable>,
        frames: mpsc::UnboundedSender<InboundFrame>,
    ) -> Result<Self> {
        config.validate().map_err(ServerError::Config)?;

        let addr = config.bind_address;
        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
        socket.set_reuse_address(true)?;
        socket.bind(&addr.into())?;
        socket.listen(1024)?;
        socket.set_nonblocking(true)?;
        let listener = TcpListener::from_std(socket.into())?;

        tracing::info!(
            addr = %listener.local_addr()?,
            max_sessions = config.max_sessions,
            packet_ver = %config.packet_ver,
            "map server listening"
        );

        Ok(Self {
            config,
            listener,
            sessions,
            allocator: Arc::new(SessionIdAllocator::default()),
            table,
            frames,
        })
    }

    /// The bound address (useful when binding port 0).
    pub fn local_addr(&self) -> Result<std::net::SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Accept connections until ctrl-c.
    pub async fn run(&self) -> Result<()> {
        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => {
                            if self.sessions.len() >= self.config.max_sessions {
                                tracing::warn!(%addr, "session limit reached, refusing connection");
                                drop(stream);
                                continue;
                            }
                            self.spawn_session(stream, addr);
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "accept failed");
                        }
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("ctrl-c received, shutting down");
                    break;
                }
            }
        }
        Ok(())
    }

    /// Set up one accepted connection.
    fn spawn_session(&self, stream: TcpStream, addr: std::net::SocketAddr) {
        if let Err(e) = stream.set_nodelay(true) {
            tracing::warn!(%addr, error = %e, "set_nodelay failed");
        }

        let id = self.allocator.acquire();
        let session = Arc::new(Session::new(id, addr, self.config.packet_ver));
        self.sessions.insert(session.clone());
        tracing::info!(session = id.get(), %addr, "session connected");

        let (read_half, write_half) = stream.into_split();

        tokio::spawn(reader_task(
            session.clone(),
            read_half,
            self.table.clone(),
            self.frames.clone(),
            self.config.clone(),
            self.sessions.clone(),
            self.allocator.clone(),
        ));
        tokio::spawn(writer_task(session, write_half));
    }
}

/// Read bytes, cut frames, forward them to the event loop.
///
/// Owns the disconnect cleanup: whichever way the connection ends, the
/// session is closed, unregistered, and its id recycled here.
async fn reader_task(
    session: Arc<Session>,
    mut read_half: OwnedReadHalf,
    table: Arc<OpcodeTable>,
    frames: mpsc::UnboundedSender<InboundFrame>,
    config: NetworkConfig,
    sessions: Arc<SessionRegistry>,
    allocator: Arc<SessionIdAllocator>,
) {
    let id = session.id();
    let mut reader = FrameReader::new();
    let mut buf = vec![0u8; config.read_buffer_size];

    'io: loop {
        let read = tokio::time::timeout(config.session_timeout, read_half.read(&mut buf)).await;
        let n = match read {
            Ok(Ok(0)) => {
                tracing::info!(session = id.get(), "peer closed connection");
                break;
            }
            Ok(Ok(n)) => n,
            Ok(Err(e)) => {
                tracing::warn!(session = id.get(), error = %e, "read failed");
                break;
            }
            Err(_elapsed) => {
                tracing::warn!(session = id.get(), "session timed out");
                break;
            }
        };

        session.record_received(n);
        reader.extend(&buf[..n]);

        loop {
            match reader.next(&table) {
                Progress::Frame { frame, .. } => {
                    session.record_parsed_frame();
                    if frames
                        .send(InboundFrame { session: id, frame })
                        .is_err()
                    {
                        tracing::error!(session = id.get(), "event loop gone, closing");
                        break 'io;
                    }
                }
                Progress::NeedMore => break,
                // framing already logged these; the connection stays
                // open and the next read starts from a clean buffer
                Progress::SkippedUnknown { .. } | Progress::Malformed { .. } => break,
            }
        }

        if session.is_closed() {
            break;
        }
    }

    session.close();
    sessions.remove(id);
    allocator.release(id);
    tracing::info!(
        session = id.get(),
        rx_bytes = session.bytes_received(),
        tx_bytes = session.bytes_sent(),
        "session disconnected"
    );
}

/// Drain the session's outbound queue to the socket, FIFO.
async fn writer_task(session: Arc<Session>, mut write_half: OwnedWriteHalf) {
    loop {
        for frame in session.drain_outbound() {
            if let Err(e) = write_half.write_all(&frame).await {
                tracing::warn!(session = session.id().get(), error = %e, "write failed");
                session.close();
                return;
            }
            session.record_sent(frame.len());
        }

        if session.is_closed() && session.queued() == 0 {
            return;
        }
        session.wait_writable().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_loop::frame_channel;
    use roserver_core::PacketVer;
    use roserver_protocol::{
        codecs, serialize, standard_registry, FieldValues, PacketKind,
    };
    use std::time::Duration;

    const VER: PacketVer = PacketVer(20180620);

    async fn test_server() -> (MapServer, mpsc::UnboundedReceiver<InboundFrame>) {
        let (tx, rx) = frame_channel();
        let registry = standard_registry();
        let table = Arc::new(OpcodeTable::build(&registry, VER).unwrap());
        let config = NetworkConfig {
            bind_address: "127.0.0.1:0".parse().unwrap(),
            packet_ver: VER,
            ..Default::default()
        };
        let server = MapServer::bind(config, Arc::new(SessionRegistry::new()), table, tx)
            .await
            .unwrap();
        (server, rx)
    }

    #[tokio::test]
    async fn test_client_frame_reaches_event_loop() {
        let (server, mut rx) = test_server().await;
        let addr = server.local_addr().unwrap();
        let sessions = server.sessions.clone();
        tokio::spawn(async move { server.run().await });

        let mut client = TcpStream::connect(addr).await.unwrap();
        let values = FieldValues::new().with("client_tick", 777u32);
        let frame = serialize(&standard_registry(), PacketKind::RequestTime, &values, VER).unwrap();

        // split the frame to exercise partial-read reassembly
        client.write_all(&frame[..4]).await.unwrap();
        client.flush().await.unwrap();
        client.write_all(&frame[4..]).await.unwrap();

        let inbound = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for frame")
            .expect("channel closed");
        assert_eq!(codecs::get_u16(&inbound.frame, 0), 0x0360);
        assert_eq!(inbound.frame.len(), 6);
        assert_eq!(sessions.len(), 1);

        // disconnect: the session is eventually unregistered
        drop(client);
        for _ in 0..50 {
            if sessions.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(sessions.is_empty());
    }

    #[tokio::test]
    async fn test_enqueued_frames_reach_the_wire_in_order() {
        let (server, _rx) = test_server().await;
        let addr = server.local_addr().unwrap();
        let sessions = server.sessions.clone();
        tokio::spawn(async move { server.run().await });

        let mut client = TcpStream::connect(addr).await.unwrap();

        // wait for the accept side to register the session
        let session = {
            let mut found = None;
            for _ in 0..50 {
                if let Some(s) = sessions.all().into_iter().next() {
                    found = Some(s);
                    break;
                }
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
            found.expect("session not registered")
        };

        let registry = standard_registry();
        for tick in [10u32, 20] {
            let values = FieldValues::new().with("server_tick", tick);
            let frame = serialize(&registry, PacketKind::NotifyTime, &values, VER).unwrap();
            session.enqueue(frame.freeze());
        }

        let mut buf = [0u8; 12];
        tokio::time::timeout(Duration::from_secs(5), client.read_exact(&mut buf))
            .await
            .expect("timed out")
            .unwrap();
        assert_eq!(codecs::get_u16(&buf, 0), 0x007f);
        assert_eq!(codecs::get_u32(&buf, 2), 10);
        assert_eq!(codecs::get_u16(&buf, 6), 0x007f);
        assert_eq!(codecs::get_u32(&buf, 8), 20);
    }
}
