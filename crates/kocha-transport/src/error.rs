use std::time::Duration;

use kocha_protocol::ProtocolError;

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The listen address is unavailable. Fatal at server startup.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Accepting an incoming connection failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// Connecting to a server failed.
    #[error("connect failed: {0}")]
    ConnectFailed(#[source] std::io::Error),

    /// The connection was closed, by the peer or locally.
    ///
    /// Expected during normal operation: it ends one session and is not
    /// reported as a failure.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// No complete message arrived (or a write did not finish) within
    /// the configured timeout.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// The peer sent a frame that cannot be decoded, or a message could
    /// not be framed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Returns `true` for an orderly or abrupt end of the connection
    /// (as opposed to a protocol violation).
    pub fn is_closed(&self) -> bool {
        match self {
            Self::ConnectionClosed(_) => true,
            Self::ReceiveFailed(e) | Self::SendFailed(e) => matches!(
                e.kind(),
                std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_is_not_closed() {
        let err = TransportError::Timeout(Duration::from_secs(2));
        assert!(err.is_timeout());
        assert!(!err.is_closed());
    }

    #[test]
    fn test_reset_counts_as_closed() {
        let err = TransportError::ReceiveFailed(std::io::ErrorKind::ConnectionReset.into());
        assert!(err.is_closed());
    }

    #[test]
    fn test_malformed_frame_is_neither_timeout_nor_closed() {
        let err: TransportError = ProtocolError::MalformedFrame("bad".into()).into();
        assert!(!err.is_timeout());
        assert!(!err.is_closed());
        assert!(err.to_string().contains("bad"));
    }
}
