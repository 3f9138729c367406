//! Unified error type for KOCHA.

use kocha_protocol::ProtocolError;
use kocha_session::SessionError;
use kocha_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum KochaError {
    /// A transport-level error (bind, connection, send, recv, timeout).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, malformed frame).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (alias rejected, already registered).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Local I/O outside a connection (e.g. reading the terminal).
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl KochaError {
    /// Returns `true` for a read timeout. The connection is still usable.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_timeout())
    }

    /// Returns `true` if this error just means the connection ended.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_closed())
    }

    /// Returns `true` for a peer that sent bytes which are not a valid frame.
    pub fn is_malformed(&self) -> bool {
        match self {
            Self::Transport(TransportError::Protocol(e)) | Self::Protocol(e) => e.is_malformed(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use kocha_session::AliasRejection;

    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let kocha_err: KochaError = err.into();
        assert!(matches!(kocha_err, KochaError::Transport(_)));
        assert!(kocha_err.is_closed());
        assert!(!kocha_err.is_timeout());
        assert!(kocha_err.to_string().contains("gone"));
    }

    #[test]
    fn test_timeout_is_neither_closed_nor_malformed() {
        let err = KochaError::from(TransportError::Timeout(std::time::Duration::from_secs(2)));
        assert!(err.is_timeout());
        assert!(!err.is_closed());
        assert!(!err.is_malformed());
    }

    #[test]
    fn test_from_protocol_error_is_malformed() {
        let err = ProtocolError::MalformedFrame("bad".into());
        let kocha_err: KochaError = err.into();
        assert!(kocha_err.is_malformed());
        assert!(!kocha_err.is_closed());
    }

    #[test]
    fn test_malformed_frame_through_transport_is_malformed() {
        let err = TransportError::Protocol(ProtocolError::MalformedFrame("bad".into()));
        assert!(KochaError::from(err).is_malformed());
    }

    #[test]
    fn test_from_session_error() {
        let err = SessionError::AliasRejected {
            alias: "a b".into(),
            reason: AliasRejection::ContainsWhitespace,
        };
        let kocha_err: KochaError = err.into();
        assert!(matches!(kocha_err, KochaError::Session(_)));
        assert!(kocha_err.to_string().contains("whitespace"));
    }
}
