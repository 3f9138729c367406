//! # KOCHA
//!
//! A small multi-user chat service over TCP.
//!
//! A [`ChatServer`] accepts connections, lets each one log in under a
//! unique alias, and routes text between members by broadcast or by
//! direct message. [`ChatClient`] speaks the same protocol from the
//! other end.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use kocha::prelude::*;
//!
//! # async fn start() -> Result<(), KochaError> {
//! let server = ChatServer::builder().bind("0.0.0.0:9999").build().await?;
//! server.run().await
//! # }
//! ```
//!
//! ## Commands
//!
//! Before login only `/login <alias>` is understood. Afterwards:
//! `/h`, `/help`, `/q`, `/quit`, `/l`, `/list`, `/m`, `/members` and
//! `/dm <alias> <text>`. Anything else is broadcast to every other member.

mod client;
pub mod commands;
mod config;
mod error;
mod handler;
mod server;
mod shutdown;

pub use client::{ChatClient, ClientHandle, LoginOutcome};
pub use config::{ClientConfig, DEFAULT_PORT, ServerConfig};
pub use error::KochaError;
pub use server::{ChatServer, ChatServerBuilder};
pub use shutdown::ShutdownHandle;

pub mod prelude {
    pub use crate::{
        ChatClient, ChatServer, ChatServerBuilder, ClientConfig, ClientHandle, KochaError,
        LoginOutcome, ServerConfig, ShutdownHandle,
    };
    pub use kocha_protocol::{ChatMessage, SERVER_ALIAS};
    pub use kocha_transport::TransportError;
}
