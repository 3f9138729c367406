//! Server configuration.

use std::time::Duration;

use kocha_protocol::DEFAULT_MAX_FRAME_LEN;
use kocha_transport::ConnectionConfig;

/// The port KOCHA listens on unless told otherwise.
pub const DEFAULT_PORT: u16 = 9999;

/// Everything a [`ChatServer`](crate::ChatServer) can be configured with.
///
/// Start from `ServerConfig::default()` and override the fields you
/// care about, or use [`ChatServerBuilder`](crate::ChatServerBuilder).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on. Default: `0.0.0.0:9999`.
    pub bind_addr: String,

    /// How long a session waits in `recv` before re-checking the
    /// shutdown flag. Also the upper bound on how long shutdown waits
    /// for each session. Default: 2 seconds.
    pub read_timeout: Duration,

    /// How long one frame write may take. Default: 5 seconds.
    pub write_timeout: Duration,

    /// Largest accepted frame body. Default: 64 KiB.
    pub max_frame_len: usize,

    /// Reply with a server notice when `/dm` names an alias nobody is
    /// logged in under. Default: `false` (the message is dropped silently).
    pub notify_unknown_recipient: bool,

    /// Tell remaining members when someone's session ends.
    /// Default: `false`.
    pub announce_departures: bool,

    /// Close the connection after this many rejected `/login` attempts.
    /// Default: `None` (unbounded).
    pub max_login_attempts: Option<u32>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: format!("0.0.0.0:{DEFAULT_PORT}"),
            read_timeout: Duration::from_secs(2),
            write_timeout: Duration::from_secs(5),
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            notify_unknown_recipient: false,
            announce_departures: false,
            max_login_attempts: None,
        }
    }
}

impl ServerConfig {
    /// The per-connection part of this config.
    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            read_timeout: self.read_timeout,
            write_timeout: self.write_timeout,
            max_frame_len: self.max_frame_len,
        }
    }
}

/// Settings for a [`ChatClient`](crate::ChatClient) connection.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// How long [`ChatClient::receive`](crate::ChatClient::receive) waits
    /// before returning a timeout. Default: 2 seconds.
    pub read_timeout: Duration,

    /// Largest accepted frame body. Must not be smaller than the
    /// server's limit. Default: 64 KiB.
    pub max_frame_len: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(2),
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

impl ClientConfig {
    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            read_timeout: self.read_timeout,
            max_frame_len: self.max_frame_len,
            ..ConnectionConfig::default()
        }
    }
}
