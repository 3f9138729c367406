//! Codec trait and implementations for serializing message bodies.
//!
//! A "codec" (coder/decoder) converts between Rust types and raw bytes.
//! The framing layer doesn't care HOW a message body is serialized — it
//! just needs something that implements the [`Codec`] trait.
//!
//! Currently we provide [`JsonCodec`], which matches the historical KOCHA
//! wire format (a JSON object per message).

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// ## Trait bounds explained
///
/// - `Send + Sync` → safe to share between connection tasks, which Tokio
///   may run on any worker thread.
/// - `'static` → the codec owns everything it needs, so it can live
///   inside long-lived connection objects.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// ## Example
///
/// ```rust
/// use kocha_protocol::{ChatMessage, Codec, JsonCodec};
///
/// let codec = JsonCodec;
/// let message = ChatMessage::new("hello").with_sender("alice");
///
/// let bytes = codec.encode(&message).unwrap();
/// let decoded: ChatMessage = codec.decode(&bytes).unwrap();
/// assert_eq!(message, decoded);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
