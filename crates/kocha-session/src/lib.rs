//! Alias bookkeeping for KOCHA.
//!
//! This crate knows who is logged in:
//!
//! 1. **Alias rules** — what a display name may look like
//!    ([`validate_alias`], [`AliasRejection`])
//! 2. **Registry** — the concurrent mapping from connection to alias
//!    ([`SessionRegistry`]), which enforces uniqueness
//!
//! # How it fits in the stack
//!
//! ```text
//! Server / dispatcher (above)  ← logs users in and routes by alias
//!     ↕
//! Session layer (this crate)   ← connection ↔ alias, atomically
//!     ↕
//! Transport layer (below)      ← provides Connection, ConnectionId
//! ```

mod alias;
mod error;
mod registry;

pub use alias::{AliasRejection, MAX_ALIAS_LEN, validate_alias};
pub use error::SessionError;
pub use registry::SessionRegistry;
