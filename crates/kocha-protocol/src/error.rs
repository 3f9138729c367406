//! Error types for the protocol layer.
//!
//! Each crate in KOCHA defines its own error enum. When you see a
//! `ProtocolError`, the problem is in serialization or framing, not in
//! networking or alias bookkeeping.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization of a message body failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization of a message body failed.
    ///
    /// Common causes: malformed JSON, missing or unknown fields,
    /// wrong data types.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// A frame read from the wire cannot be a valid message.
    ///
    /// Raised for a zero-length frame, a length prefix above the
    /// configured limit, or a payload that does not parse as a
    /// [`ChatMessage`](crate::ChatMessage). The session that produced it
    /// is terminated; other sessions are unaffected.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// A message is too large to be framed under the configured limit.
    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge { len: usize, max: usize },
}

impl ProtocolError {
    /// Returns `true` if the error was caused by bytes received from a peer.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedFrame(_))
    }
}
