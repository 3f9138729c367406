//! Transport layer for KOCHA.
//!
//! Provides the [`Connection`] trait — the unit of I/O with one peer —
//! and its TCP implementation ([`TcpConnection`], accepted by
//! [`TcpTransport`]). A connection moves whole [`ChatMessage`]s: framing
//! and decoding happen inside, using `kocha_protocol::FrameCodec`.
//!
//! # How it fits in the stack
//!
//! ```text
//! Session / Server (above)  ← talk to peers through `Connection`
//!     ↕
//! Transport (this crate)    ← sockets, timeouts, frame reassembly
//!     ↕
//! Protocol (below)          ← ChatMessage, FrameCodec
//! ```

mod error;
mod tcp;

pub use error::TransportError;
pub use tcp::{ConnectionConfig, TcpConnection, TcpTransport};

use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use kocha_protocol::ChatMessage;

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identifier for a connection.
///
/// Used as the identity of a connection in the session registry and as
/// a log field. Never reused within one process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Allocates the next process-unique ID.
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A single connection that can send and receive chat messages.
///
/// The futures are declared `Send` so that code generic over the
/// connection type can still be spawned onto the Tokio runtime.
pub trait Connection: Send + Sync + 'static {
    /// Encodes and writes one message.
    ///
    /// Failures (peer reset, broken pipe, write timeout) are returned to
    /// the caller and never retried.
    fn send(&self, message: &ChatMessage) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Waits for the next complete message from the peer.
    ///
    /// Returns [`TransportError::Timeout`] if nothing complete arrives
    /// within the read timeout. A timeout is not a failure: the
    /// connection stays usable and a partially received frame is kept
    /// for the next call.
    fn recv(&self) -> impl Future<Output = Result<ChatMessage, TransportError>> + Send;

    /// Shuts down both directions and releases the socket.
    ///
    /// Idempotent: a second call does nothing.
    fn close(&self) -> impl Future<Output = ()> + Send;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;

    /// Returns the remote address, for logging.
    fn peer_addr(&self) -> SocketAddr;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_new_and_into_inner() {
        let id = ConnectionId::new(42);
        assert_eq!(id.into_inner(), 42);
    }

    #[test]
    fn test_connection_id_display() {
        let id = ConnectionId::new(7);
        assert_eq!(id.to_string(), "conn-7");
    }

    #[test]
    fn test_connection_id_next_is_unique() {
        let a = ConnectionId::next();
        let b = ConnectionId::next();
        assert_ne!(a, b);
        assert!(b > a);
    }
}
