//! Wire protocol for KOCHA.
//!
//! This crate defines the "language" that chat clients and the chat
//! server speak:
//!
//! - **Types** ([`ChatMessage`], [`SERVER_ALIAS`]) — the one structure
//!   that travels on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how a message body is
//!   converted to/from bytes.
//! - **Framing** ([`FrameCodec`], [`FrameDecoder`]) — how message bodies
//!   are delimited on a byte stream.
//! - **Errors** ([`ProtocolError`]) — what can go wrong while encoding or
//!   decoding.
//!
//! # Architecture
//!
//! The protocol layer knows nothing about sockets or aliases. It turns a
//! message into a self-delimited frame and back:
//!
//! ```text
//! ChatMessage ──JsonCodec──→ JSON bytes ──FrameCodec──→ [len: u32 BE][JSON]
//! ```

mod codec;
mod error;
#[cfg(feature = "json")]
mod frame;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
#[cfg(feature = "json")]
pub use frame::{DEFAULT_MAX_FRAME_LEN, FrameCodec, FrameDecoder, LENGTH_PREFIX_LEN};
pub use types::{ChatMessage, KOCHA_VERSION, SERVER_ALIAS};
