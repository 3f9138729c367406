//! `ChatServer` builder and server loop.
//!
//! This is the entry point for running a KOCHA server. It ties together
//! all the layers: transport → protocol → session → command handler.

use std::sync::Arc;
use std::time::Duration;

use kocha_transport::{Connection, TcpConnection, TcpTransport};
use tokio::task::{JoinError, JoinSet};

use crate::handler::{ServerState, handle_connection};
use crate::{KochaError, ServerConfig, ShutdownHandle};

/// Builder for configuring and starting a KOCHA server.
///
/// # Example
///
/// ```rust,no_run
/// use kocha::prelude::*;
///
/// # async fn start() -> Result<(), KochaError> {
/// let server = ChatServer::builder()
///     .bind("127.0.0.1:9999")
///     .announce_departures(true)
///     .build()
///     .await?;
///
/// let shutdown = server.shutdown_handle();
/// tokio::spawn(async move {
///     let _ = tokio::signal::ctrl_c().await;
///     shutdown.shutdown();
/// });
///
/// server.run().await
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct ChatServerBuilder {
    config: ServerConfig,
}

impl ChatServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout = timeout;
        self
    }

    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.config.write_timeout = timeout;
        self
    }

    pub fn max_frame_len(mut self, len: usize) -> Self {
        self.config.max_frame_len = len;
        self
    }

    /// Reply to a `/dm` for an unknown alias with a server notice.
    pub fn notify_unknown_recipient(mut self, enabled: bool) -> Self {
        self.config.notify_unknown_recipient = enabled;
        self
    }

    /// Tell remaining members when someone leaves.
    pub fn announce_departures(mut self, enabled: bool) -> Self {
        self.config.announce_departures = enabled;
        self
    }

    /// Close connections after `max` rejected logins.
    pub fn max_login_attempts(mut self, max: u32) -> Self {
        self.config.max_login_attempts = Some(max);
        self
    }

    /// Binds the listener and returns a server ready to [`run`](ChatServer::run).
    ///
    /// # Errors
    /// Returns a bind error if the address is unavailable. This is the
    /// only error that is fatal to the whole server.
    pub async fn build(self) -> Result<ChatServer, KochaError> {
        let transport =
            TcpTransport::bind(&self.config.bind_addr, self.config.connection_config()).await?;
        let state = Arc::new(ServerState::new(self.config, ShutdownHandle::new()));

        Ok(ChatServer { transport, state })
    }
}

/// A bound KOCHA chat server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct ChatServer {
    transport: TcpTransport,
    state: Arc<ServerState<TcpConnection>>,
}

impl ChatServer {
    /// Creates a new builder.
    pub fn builder() -> ChatServerBuilder {
        ChatServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Returns a handle that stops [`run`](Self::run) from any task.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.state.shutdown.clone()
    }

    /// Runs the accept loop until shutdown is requested, then shuts down.
    ///
    /// Each accepted connection gets its own handler task. Shutdown then
    /// proceeds in order:
    ///
    /// 1. stop accepting;
    /// 2. wait for every handler to notice the flag and exit (each one
    ///    within one read timeout);
    /// 3. close any connection still in the registry;
    /// 4. close the listening socket.
    ///
    /// Errors on individual connections never end this loop.
    pub async fn run(self) -> Result<(), KochaError> {
        let Self { transport, state } = self;
        let mut handlers = JoinSet::new();

        tracing::info!(
            addr = ?transport.local_addr().ok(),
            version = kocha_protocol::KOCHA_VERSION,
            "KOCHA server running"
        );

        loop {
            tokio::select! {
                _ = state.shutdown.requested() => break,

                accepted = transport.accept() => match accepted {
                    Ok(conn) => {
                        tracing::info!(id = %conn.id(), peer = %conn.peer_addr(), "client connected");
                        handlers.spawn(handle_connection(Arc::new(conn), Arc::clone(&state)));
                    }
                    Err(e) => tracing::warn!(error = %e, "accept failed"),
                },

                Some(joined) = handlers.join_next(), if !handlers.is_empty() => reap(joined),
            }
        }

        tracing::info!(sessions = handlers.len(), "waiting for sessions to end");
        while let Some(joined) = handlers.join_next().await {
            reap(joined);
        }

        // Handlers clean up after themselves; anything left here was
        // registered by a task that ended abnormally.
        for conn in state.registry.drain().await {
            conn.close().await;
        }

        drop(transport);
        tracing::info!("KOCHA server stopped");
        Ok(())
    }
}

/// Logs a handler task that did not finish normally.
fn reap(joined: Result<(), JoinError>) {
    if let Err(e) = joined {
        if e.is_panic() {
            tracing::error!(error = %e, "session task panicked");
        } else {
            tracing::debug!(error = %e, "session task cancelled");
        }
    }
}
