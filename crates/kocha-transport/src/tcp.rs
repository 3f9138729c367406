//! TCP transport: a listener plus framed, timeout-aware connections.

use std::net::SocketAddr;
use std::time::Duration;

use kocha_protocol::{ChatMessage, DEFAULT_MAX_FRAME_LEN, FrameCodec, FrameDecoder};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::{Mutex, watch};

use crate::{Connection, ConnectionId, TransportError};

/// Size of the buffer handed to each socket read.
const READ_CHUNK_LEN: usize = 4096;

// ---------------------------------------------------------------------------
// ConnectionConfig
// ---------------------------------------------------------------------------

/// Per-connection I/O settings.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// How long [`Connection::recv`] waits for a complete message before
    /// returning [`TransportError::Timeout`].
    ///
    /// This bounds how long a session task can go without re-checking
    /// the server's shutdown flag. Default: 2 seconds.
    pub read_timeout: Duration,

    /// How long a single frame write may take. A write that times out
    /// leaves a partial frame on the stream, so the connection is closed.
    /// Default: 5 seconds.
    pub write_timeout: Duration,

    /// Largest accepted frame body in bytes. Default: 64 KiB.
    pub max_frame_len: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(2),
            write_timeout: Duration::from_secs(5),
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

// ---------------------------------------------------------------------------
// TcpTransport
// ---------------------------------------------------------------------------

/// A TCP listener producing [`TcpConnection`]s.
pub struct TcpTransport {
    listener: TcpListener,
    config: ConnectionConfig,
}

impl TcpTransport {
    /// Binds a listener to the given address.
    ///
    /// # Errors
    /// Returns [`TransportError::Bind`] if the address is unavailable.
    pub async fn bind(addr: &str, config: ConnectionConfig) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr).await.map_err(|source| TransportError::Bind {
            addr: addr.to_string(),
            source,
        })?;
        tracing::info!(addr, "TCP transport listening");
        Ok(Self { listener, config })
    }

    /// Waits for and accepts the next incoming connection.
    pub async fn accept(&self) -> Result<TcpConnection, TransportError> {
        let (stream, peer) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;

        let conn = TcpConnection::from_stream(stream, peer, self.config.clone());
        tracing::debug!(id = %conn.id(), %peer, "accepted TCP connection");
        Ok(conn)
    }

    /// Returns the address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

// ---------------------------------------------------------------------------
// TcpConnection
// ---------------------------------------------------------------------------

/// Read side state: the socket half plus the frame reassembly buffer.
///
/// The decoder lives next to the socket so that bytes read before a
/// timeout are still there when the next `recv` resumes the frame.
struct ReadState {
    half: Option<OwnedReadHalf>,
    decoder: FrameDecoder,
}

/// A framed TCP connection to one peer.
///
/// The socket is split into a read half and a write half behind separate
/// locks: the owning session task can sit in [`recv`](Connection::recv)
/// while other tasks [`send`](Connection::send) to this peer.
pub struct TcpConnection {
    id: ConnectionId,
    peer: SocketAddr,
    config: ConnectionConfig,
    frames: FrameCodec,
    reader: Mutex<ReadState>,
    writer: Mutex<Option<OwnedWriteHalf>>,
    /// Flips to `true` exactly once, on the first `close`.
    closed: watch::Sender<bool>,
}

impl TcpConnection {
    /// Connects to a server (client role).
    pub async fn connect(
        addr: impl ToSocketAddrs,
        config: ConnectionConfig,
    ) -> Result<Self, TransportError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(TransportError::ConnectFailed)?;
        let peer = stream.peer_addr().map_err(TransportError::ConnectFailed)?;
        Ok(Self::from_stream(stream, peer, config))
    }

    fn from_stream(stream: TcpStream, peer: SocketAddr, config: ConnectionConfig) -> Self {
        if let Err(e) = stream.set_nodelay(true) {
            tracing::trace!(%peer, error = %e, "set_nodelay failed");
        }

        let frames = FrameCodec::with_max_frame_len(config.max_frame_len);
        let (read_half, write_half) = stream.into_split();
        let (closed, _) = watch::channel(false);

        Self {
            id: ConnectionId::next(),
            peer,
            reader: Mutex::new(ReadState {
                half: Some(read_half),
                decoder: frames.decoder(),
            }),
            writer: Mutex::new(Some(write_half)),
            frames,
            config,
            closed,
        }
    }

    /// Returns `true` once [`close`](Connection::close) has been called,
    /// or after a failed or timed-out write.
    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Gives up on a stream whose write side is broken.
    ///
    /// Drops the write half and raises the closed flag, so the owner's
    /// pending or next `recv` returns `ConnectionClosed` and its session
    /// ends instead of lingering with a dead outbound path.
    fn abandon(&self, writer: &mut Option<OwnedWriteHalf>, reason: &'static str) {
        writer.take();
        if !self.closed.send_replace(true) {
            tracing::debug!(id = %self.id, peer = %self.peer, reason, "abandoning connection");
        }
    }
}

/// Outcome of one bounded socket read.
enum ReadOutcome {
    Data(std::io::Result<usize>),
    TimedOut,
    ClosedLocally,
}

impl Connection for TcpConnection {
    async fn send(&self, message: &ChatMessage) -> Result<(), TransportError> {
        let frame = self.frames.encode(message)?;

        let mut writer = self.writer.lock().await;
        let half = writer
            .as_mut()
            .ok_or_else(|| TransportError::ConnectionClosed("connection closed locally".into()))?;

        let written = tokio::time::timeout(self.config.write_timeout, half.write_all(&frame)).await;
        match written {
            Ok(Ok(())) => {
                tracing::trace!(id = %self.id, bytes = frame.len(), "frame sent");
                Ok(())
            }
            Ok(Err(e)) => {
                self.abandon(&mut *writer, "write failed");
                Err(TransportError::SendFailed(e))
            }
            Err(_) => {
                // Part of the frame may be on the wire; the stream can
                // no longer be resynchronized.
                self.abandon(&mut *writer, "write timed out");
                Err(TransportError::Timeout(self.config.write_timeout))
            }
        }
    }

    async fn recv(&self) -> Result<ChatMessage, TransportError> {
        let mut closed = self.closed.subscribe();
        let mut state = self.reader.lock().await;
        let mut chunk = [0u8; READ_CHUNK_LEN];

        loop {
            if *closed.borrow() {
                state.half = None;
                return Err(TransportError::ConnectionClosed("connection closed locally".into()));
            }

            // A previous read may already hold one or more complete frames.
            if let Some(message) = state.decoder.next_message()? {
                return Ok(message);
            }

            let Some(half) = state.half.as_mut() else {
                return Err(TransportError::ConnectionClosed("connection closed locally".into()));
            };

            let outcome = tokio::select! {
                read = tokio::time::timeout(self.config.read_timeout, half.read(&mut chunk)) => {
                    match read {
                        Ok(result) => ReadOutcome::Data(result),
                        Err(_) => ReadOutcome::TimedOut,
                    }
                }
                _ = closed.wait_for(|closed| *closed) => ReadOutcome::ClosedLocally,
            };

            match outcome {
                ReadOutcome::Data(Ok(0)) => {
                    let reason = if state.decoder.is_mid_frame() {
                        "peer closed mid-frame"
                    } else {
                        "peer closed"
                    };
                    return Err(TransportError::ConnectionClosed(reason.into()));
                }
                ReadOutcome::Data(Ok(n)) => {
                    tracing::trace!(id = %self.id, bytes = n, "read chunk");
                    state.decoder.extend(&chunk[..n]);
                }
                ReadOutcome::Data(Err(e)) => return Err(TransportError::ReceiveFailed(e)),
                ReadOutcome::TimedOut => {
                    return Err(TransportError::Timeout(self.config.read_timeout));
                }
                ReadOutcome::ClosedLocally => {
                    state.half = None;
                    return Err(TransportError::ConnectionClosed("connection closed locally".into()));
                }
            }
        }
    }

    async fn close(&self) {
        let already_closed = self.closed.send_replace(true);

        if let Some(mut half) = self.writer.lock().await.take() {
            if let Err(e) = half.shutdown().await {
                tracing::trace!(id = %self.id, error = %e, "shutdown of write half failed");
            }
        }
        // A pending `recv` wakes on the closed flag and releases the
        // reader lock, so this does not wait out the read timeout.
        self.reader.lock().await.half = None;

        if !already_closed {
            tracing::debug!(id = %self.id, peer = %self.peer, "connection closed");
        }
    }

    fn id(&self) -> ConnectionId {
        self.id
    }

    fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}
