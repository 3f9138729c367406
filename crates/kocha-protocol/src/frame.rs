//! Length-prefixed framing of chat messages on a byte stream.
//!
//! TCP delivers a stream of bytes, not messages. A single `read` may
//! return half a message, or the tail of one message followed by two
//! more. Every message therefore travels inside a frame that declares
//! its own boundary:
//!
//! ```text
//! ┌──────────────────┬──────────────────────────────┐
//! │ len: u32 (BE)    │ len bytes of JSON body       │
//! └──────────────────┴──────────────────────────────┘
//! ```
//!
//! [`FrameCodec`] produces frames. [`FrameDecoder`] is fed whatever
//! chunks the socket returns and hands back complete messages as soon as
//! they are buffered.

use crate::{ChatMessage, Codec, JsonCodec, ProtocolError};

/// Size of the big-endian length prefix in bytes.
pub const LENGTH_PREFIX_LEN: usize = 4;

/// Default upper bound on the body length of a single frame (64 KiB).
///
/// A peer announcing a larger frame is treated as hostile or garbled;
/// the decoder refuses it before buffering any of the body.
pub const DEFAULT_MAX_FRAME_LEN: usize = 64 * 1024;

// ---------------------------------------------------------------------------
// FrameCodec
// ---------------------------------------------------------------------------

/// Encodes messages into frames and creates matching decoders.
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec<C: Codec + Clone = JsonCodec> {
    codec: C,
    max_frame_len: usize,
}

impl FrameCodec<JsonCodec> {
    /// A JSON frame codec with the default size limit.
    pub fn new() -> Self {
        Self::with_codec(JsonCodec, DEFAULT_MAX_FRAME_LEN)
    }

    /// A JSON frame codec with a custom size limit.
    pub fn with_max_frame_len(max_frame_len: usize) -> Self {
        Self::with_codec(JsonCodec, max_frame_len)
    }
}

impl Default for FrameCodec<JsonCodec> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Codec + Clone> FrameCodec<C> {
    pub fn with_codec(codec: C, max_frame_len: usize) -> Self {
        Self { codec, max_frame_len }
    }

    pub fn max_frame_len(&self) -> usize {
        self.max_frame_len
    }

    /// Encodes one message into a complete frame (prefix + body).
    ///
    /// # Errors
    /// Returns [`ProtocolError::FrameTooLarge`] if the encoded body is
    /// larger than the limit. The peer would reject such a frame, so it
    /// is never written.
    pub fn encode(&self, message: &ChatMessage) -> Result<Vec<u8>, ProtocolError> {
        let body = self.codec.encode(message)?;
        if body.len() > self.max_frame_len {
            return Err(ProtocolError::FrameTooLarge {
                len: body.len(),
                max: self.max_frame_len,
            });
        }

        let mut frame = Vec::with_capacity(LENGTH_PREFIX_LEN + body.len());
        // `body.len() <= max_frame_len`, and a limit above u32::MAX would
        // be meaningless, so the cast cannot truncate in practice.
        frame.extend_from_slice(&(body.len() as u32).to_be_bytes());
        frame.extend_from_slice(&body);
        Ok(frame)
    }

    /// Creates an empty decoder sharing this codec's body codec and limit.
    pub fn decoder(&self) -> FrameDecoder<C> {
        FrameDecoder {
            codec: self.codec.clone(),
            max_frame_len: self.max_frame_len,
            buf: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// FrameDecoder
// ---------------------------------------------------------------------------

/// Incremental frame decoder.
///
/// Owns a reassembly buffer. Typical use:
///
/// ```rust
/// use kocha_protocol::{ChatMessage, FrameCodec};
///
/// let codec = FrameCodec::new();
/// let frame = codec.encode(&ChatMessage::new("hi")).unwrap();
///
/// let mut decoder = codec.decoder();
/// let (head, tail) = frame.split_at(3);
///
/// decoder.extend(head);
/// assert!(decoder.next_message().unwrap().is_none()); // not complete yet
///
/// decoder.extend(tail);
/// let msg = decoder.next_message().unwrap().unwrap();
/// assert_eq!(msg.content(), "hi");
/// ```
#[derive(Debug)]
pub struct FrameDecoder<C: Codec = JsonCodec> {
    codec: C,
    max_frame_len: usize,
    buf: Vec<u8>,
}

impl<C: Codec> FrameDecoder<C> {
    /// Appends bytes received from the stream.
    pub fn extend(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Removes and returns the next complete message, if one is buffered.
    ///
    /// Returns `Ok(None)` when more bytes are needed. Call repeatedly
    /// after each [`extend`](Self::extend): one chunk may complete
    /// several frames.
    ///
    /// # Errors
    /// Returns [`ProtocolError::MalformedFrame`] for a zero or oversized
    /// length prefix, or for a body that is not a valid message. The
    /// stream is unusable afterwards, since the next frame boundary is
    /// unknown.
    pub fn next_message(&mut self) -> Result<Option<ChatMessage>, ProtocolError> {
        if self.buf.len() < LENGTH_PREFIX_LEN {
            return Ok(None);
        }

        let mut prefix = [0u8; LENGTH_PREFIX_LEN];
        prefix.copy_from_slice(&self.buf[..LENGTH_PREFIX_LEN]);
        let len = u32::from_be_bytes(prefix) as usize;

        if len == 0 {
            return Err(ProtocolError::MalformedFrame("zero-length frame".into()));
        }
        if len > self.max_frame_len {
            return Err(ProtocolError::MalformedFrame(format!(
                "declared length {len} exceeds the {} byte limit",
                self.max_frame_len
            )));
        }
        if self.buf.len() < LENGTH_PREFIX_LEN + len {
            return Ok(None);
        }

        let frame: Vec<u8> = self.buf.drain(..LENGTH_PREFIX_LEN + len).collect();
        self.codec
            .decode(&frame[LENGTH_PREFIX_LEN..])
            .map(Some)
            .map_err(|e| ProtocolError::MalformedFrame(e.to_string()))
    }

    /// Number of bytes buffered but not yet returned as a message.
    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }

    /// Returns `true` if part of a frame has been received.
    ///
    /// A stream that ends while this is `true` was closed mid-frame.
    pub fn is_mid_frame(&self) -> bool {
        !self.buf.is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_of(content: &str) -> Vec<u8> {
        FrameCodec::new()
            .encode(&ChatMessage::new(content).with_sender("alice"))
            .unwrap()
    }

    #[test]
    fn test_encode_writes_big_endian_length_prefix() {
        let frame = frame_of("hi");
        let body_len = frame.len() - LENGTH_PREFIX_LEN;
        assert_eq!(&frame[..4], &(body_len as u32).to_be_bytes());
        let body: serde_json::Value = serde_json::from_slice(&frame[4..]).unwrap();
        assert_eq!(body["content"], "hi");
    }

    #[test]
    fn test_decode_message_split_across_single_bytes() {
        let frame = frame_of("fragmented");
        let mut decoder = FrameCodec::new().decoder();

        for (i, byte) in frame.iter().enumerate() {
            decoder.extend(std::slice::from_ref(byte));
            let result = decoder.next_message().unwrap();
            if i + 1 < frame.len() {
                assert!(result.is_none(), "message complete too early at byte {i}");
                assert!(decoder.is_mid_frame());
            } else {
                assert_eq!(result.unwrap().content(), "fragmented");
            }
        }
        assert!(!decoder.is_mid_frame());
    }

    #[test]
    fn test_decode_coalesced_frames_yields_each_in_order() {
        let mut chunk = frame_of("one");
        chunk.extend(frame_of("two"));
        let third = frame_of("three");
        chunk.extend(&third[..5]);

        let mut decoder = FrameCodec::new().decoder();
        decoder.extend(&chunk);

        assert_eq!(decoder.next_message().unwrap().unwrap().content(), "one");
        assert_eq!(decoder.next_message().unwrap().unwrap().content(), "two");
        assert!(decoder.next_message().unwrap().is_none());
        assert_eq!(decoder.buffered_len(), 5);

        decoder.extend(&third[5..]);
        assert_eq!(decoder.next_message().unwrap().unwrap().content(), "three");
    }

    #[test]
    fn test_decode_oversized_prefix_is_malformed_before_body_arrives() {
        let mut decoder = FrameCodec::with_max_frame_len(16).decoder();
        decoder.extend(&17u32.to_be_bytes());
        let err = decoder.next_message().unwrap_err();
        assert!(err.is_malformed(), "got {err:?}");
    }

    #[test]
    fn test_decode_huge_prefix_is_malformed() {
        let mut decoder = FrameCodec::new().decoder();
        decoder.extend(&u32::MAX.to_be_bytes());
        assert!(decoder.next_message().unwrap_err().is_malformed());
    }

    #[test]
    fn test_decode_zero_length_frame_is_malformed() {
        let mut decoder = FrameCodec::new().decoder();
        decoder.extend(&0u32.to_be_bytes());
        assert!(decoder.next_message().unwrap_err().is_malformed());
    }

    #[test]
    fn test_decode_garbage_body_is_malformed() {
        let body = b"{\"hello\":1}";
        let mut decoder = FrameCodec::new().decoder();
        decoder.extend(&(body.len() as u32).to_be_bytes());
        decoder.extend(body);
        assert!(decoder.next_message().unwrap_err().is_malformed());
    }

    #[test]
    fn test_encode_rejects_body_over_limit() {
        let codec = FrameCodec::with_max_frame_len(32);
        let err = codec
            .encode(&ChatMessage::new("x".repeat(64)))
            .unwrap_err();
        assert!(matches!(err, ProtocolError::FrameTooLarge { max: 32, .. }));
    }

    #[test]
    fn test_round_trip_preserves_all_fields() {
        let codec = FrameCodec::new();
        let original = ChatMessage::new("grüße, 世界").with_sender("bob").direct();

        let mut decoder = codec.decoder();
        decoder.extend(&codec.encode(&original).unwrap());

        assert_eq!(decoder.next_message().unwrap(), Some(original));
    }
}
