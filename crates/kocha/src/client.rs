//! Client side of the KOCHA protocol.
//!
//! [`ChatClient`] handles the login handshake. After login it either
//! stays in request/response style ([`send`](ChatClient::send),
//! [`receive`](ChatClient::receive)) or hands inbound traffic to a
//! callback with [`into_receiver`](ChatClient::into_receiver), which is
//! what a terminal front end wants.

use std::sync::Arc;

use kocha_protocol::ChatMessage;
use kocha_transport::{Connection, TcpConnection};
use tokio::net::ToSocketAddrs;
use tokio::sync::watch;

use crate::commands::{LOGIN_PREFIX, LOGIN_REJECTED_PREFIX};
use crate::{ClientConfig, KochaError};

/// The server's answer to a `/login`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Logged in. Carries the server's greeting.
    Accepted { welcome: String },
    /// Alias refused. The connection stays open for another attempt.
    Rejected { reason: String },
}

/// A connection to a KOCHA server.
pub struct ChatClient {
    conn: Arc<TcpConnection>,
    alias: Option<String>,
}

impl ChatClient {
    /// Connects to the server at `addr`.
    pub async fn connect(addr: impl ToSocketAddrs, config: ClientConfig) -> Result<Self, KochaError> {
        let conn = TcpConnection::connect(addr, config.connection_config()).await?;
        tracing::debug!(peer = %conn.peer_addr(), "connected");
        Ok(Self {
            conn: Arc::new(conn),
            alias: None,
        })
    }

    /// Sends `/login <alias>` and waits for the server's verdict.
    ///
    /// Read timeouts while waiting are skipped; any other error is
    /// returned. On rejection the client can try again with another
    /// alias.
    pub async fn login(&mut self, alias: &str) -> Result<LoginOutcome, KochaError> {
        self.conn
            .send(&ChatMessage::new(format!("{LOGIN_PREFIX}{alias}")))
            .await?;

        let reply = loop {
            match self.conn.recv().await {
                Ok(message) if message.is_from_server() => break message,
                Ok(message) => {
                    tracing::trace!(sender = message.sender(), "ignoring message before login reply");
                }
                Err(e) if e.is_timeout() => continue,
                Err(e) => return Err(e.into()),
            }
        };

        match reply.content().strip_prefix(LOGIN_REJECTED_PREFIX) {
            Some(reason) => Ok(LoginOutcome::Rejected {
                reason: reason.to_string(),
            }),
            None => {
                tracing::info!(alias, "logged in");
                self.alias = Some(alias.to_string());
                Ok(LoginOutcome::Accepted {
                    welcome: reply.content().to_string(),
                })
            }
        }
    }

    /// The alias accepted by the server, if logged in.
    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// Sends one line of user input. Commands are sent the same way.
    pub async fn send(&self, text: &str) -> Result<(), KochaError> {
        send_as(&self.conn, self.alias.as_deref().unwrap_or_default(), text).await
    }

    /// Waits for the next message from the server.
    ///
    /// A read timeout comes back as an error for which
    /// [`KochaError::is_timeout`] is `true`. The client stays usable.
    pub async fn receive(&self) -> Result<ChatMessage, KochaError> {
        Ok(self.conn.recv().await?)
    }

    /// Closes the connection. Safe to call more than once.
    pub async fn close(&self) {
        self.conn.close().await;
    }

    /// Spawns a task that passes every inbound message to `on_message`.
    ///
    /// The task runs until the connection closes from either side. The
    /// returned handle keeps the sending half.
    pub fn into_receiver<F>(self, mut on_message: F) -> ClientHandle
    where
        F: FnMut(ChatMessage) + Send + 'static,
    {
        let (done_tx, done) = watch::channel(false);
        let conn = Arc::clone(&self.conn);

        tokio::spawn(async move {
            loop {
                match conn.recv().await {
                    Ok(message) => on_message(message),
                    Err(e) if e.is_timeout() => continue,
                    Err(e) => {
                        tracing::debug!(error = %e, "receiver stopped");
                        break;
                    }
                }
            }
            conn.close().await;
            done_tx.send_replace(true);
        });

        ClientHandle {
            conn: self.conn,
            alias: self.alias.unwrap_or_default(),
            done,
        }
    }
}

/// The sending half of a client whose inbound messages go to a callback.
pub struct ClientHandle {
    conn: Arc<TcpConnection>,
    alias: String,
    done: watch::Receiver<bool>,
}

impl ClientHandle {
    pub async fn send(&self, text: &str) -> Result<(), KochaError> {
        send_as(&self.conn, &self.alias, text).await
    }

    /// Closes the connection. The receiver task ends shortly after.
    /// Safe to call more than once.
    pub async fn close(&self) {
        self.conn.close().await;
    }

    /// Resolves once the receiver task has stopped, whichever side closed.
    pub async fn disconnected(&mut self) {
        // The sender is only dropped after it has sent `true`.
        let _ = self.done.wait_for(|done| *done).await;
    }
}

async fn send_as(conn: &TcpConnection, alias: &str, text: &str) -> Result<(), KochaError> {
    conn.send(&ChatMessage::new(text).with_sender(alias)).await?;
    Ok(())
}
