//! Per-connection handler: login handshake and command dispatch.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The session is a small state machine:
//!
//! ```text
//!   Unauthenticated ──(/login ok)──→ Authenticated ──(/quit, error, shutdown)──→ Closed
//!        │  ↺ ignored message / rejected login                 ↺ commands
//!        └──────────────(error, shutdown, too many attempts)──────────────────→ Closed
//! ```
//!
//! Whatever the reason the loop ends, [`handle_connection`] releases the
//! alias and closes the connection before the task exits.

use std::sync::Arc;

use kocha_protocol::{ChatMessage, SERVER_ALIAS};
use kocha_session::SessionRegistry;
use kocha_transport::{Connection, ConnectionId};

use crate::commands::{self, Command, LOGIN_REJECTED_PREFIX};
use crate::{KochaError, ServerConfig, ShutdownHandle};

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks. The
/// registry synchronizes itself; everything else is read-only.
pub(crate) struct ServerState<C: Connection> {
    pub(crate) registry: SessionRegistry<C>,
    pub(crate) config: ServerConfig,
    pub(crate) shutdown: ShutdownHandle,
}

impl<C: Connection> ServerState<C> {
    pub(crate) fn new(config: ServerConfig, shutdown: ShutdownHandle) -> Self {
        Self {
            registry: SessionRegistry::new(),
            config,
            shutdown,
        }
    }
}

/// Where a session is in its lifecycle.
enum Phase {
    Unauthenticated { failed_logins: u32 },
    Authenticated { alias: String },
    Closed(SessionEnd),
}

/// Why a session ended without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    Quit,
    PeerClosed,
    Shutdown,
    TooManyLoginAttempts,
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Connection>(conn: Arc<C>, state: Arc<ServerState<C>>) {
    let id = conn.id();
    let peer = conn.peer_addr();
    tracing::debug!(%id, %peer, "session started");

    match run_session(&conn, &state).await {
        Ok(SessionEnd::PeerClosed) => tracing::info!(%id, %peer, "connection closed by peer"),
        Ok(end) => tracing::info!(%id, %peer, ?end, "session ended"),
        Err(e) if e.is_closed() => tracing::info!(%id, %peer, reason = %e, "connection lost"),
        Err(e) if e.is_malformed() => {
            tracing::warn!(%id, %peer, error = %e, "dropping connection after malformed frame");
        }
        Err(e) => tracing::debug!(%id, %peer, error = %e, "session ended with error"),
    }

    // Both steps are idempotent: shutdown may already have drained the
    // registry and closed this connection.
    let alias = state.registry.unregister(id).await;
    conn.close().await;

    if let Some(alias) = alias {
        if state.config.announce_departures && !state.shutdown.is_requested() {
            let notice =
                ChatMessage::new(format!("{alias} left the chat.")).with_sender(SERVER_ALIAS);
            deliver_to_all(&state, id, &notice).await;
        }
    }
}

/// Runs the state machine until the session ends.
async fn run_session<C: Connection>(
    conn: &Arc<C>,
    state: &ServerState<C>,
) -> Result<SessionEnd, KochaError> {
    let mut phase = Phase::Unauthenticated { failed_logins: 0 };

    loop {
        if state.shutdown.is_requested() {
            return Ok(SessionEnd::Shutdown);
        }

        let message = match conn.recv().await {
            Ok(message) => message,
            // Timeouts are the cancellation poll, not failures.
            Err(e) if e.is_timeout() => continue,
            Err(e) if e.is_closed() => return Ok(SessionEnd::PeerClosed),
            Err(e) => return Err(e.into()),
        };

        phase = match phase {
            Phase::Unauthenticated { failed_logins } => {
                handle_login(conn, state, message, failed_logins).await?
            }
            Phase::Authenticated { alias } => dispatch(conn, state, message, alias).await?,
            closed @ Phase::Closed(_) => closed,
        };

        if let Phase::Closed(end) = phase {
            return Ok(end);
        }
    }
}

// ---------------------------------------------------------------------------
// Unauthenticated
// ---------------------------------------------------------------------------

/// Handles one message received before login.
async fn handle_login<C: Connection>(
    conn: &Arc<C>,
    state: &ServerState<C>,
    message: ChatMessage,
    failed_logins: u32,
) -> Result<Phase, KochaError> {
    let id = conn.id();

    let Some(alias) = commands::parse_login(message.content()) else {
        tracing::debug!(%id, "ignoring message before login");
        return Ok(Phase::Unauthenticated { failed_logins });
    };

    match state.registry.try_register(conn, alias).await {
        Ok(()) => {
            tracing::info!(%id, alias, "logged in");
            conn.send(&ChatMessage::from_server(commands::welcome_text(alias)))
                .await?;
            Ok(Phase::Authenticated {
                alias: alias.to_string(),
            })
        }
        Err(e) => {
            tracing::debug!(%id, error = %e, "login rejected");
            conn.send(&ChatMessage::from_server(format!("{LOGIN_REJECTED_PREFIX}{e}")))
                .await?;

            Ok(after_failed_login(failed_logins, state.config.max_login_attempts))
        }
    }
}

/// Counts one more rejected login and decides whether to keep listening.
fn after_failed_login(failed_logins: u32, max_login_attempts: Option<u32>) -> Phase {
    let failed_logins = failed_logins.saturating_add(1);
    match max_login_attempts {
        Some(max) if failed_logins >= max => Phase::Closed(SessionEnd::TooManyLoginAttempts),
        _ => Phase::Unauthenticated { failed_logins },
    }
}

// ---------------------------------------------------------------------------
// Authenticated
// ---------------------------------------------------------------------------

/// Interprets one message from a logged-in member.
async fn dispatch<C: Connection>(
    conn: &Arc<C>,
    state: &ServerState<C>,
    message: ChatMessage,
    alias: String,
) -> Result<Phase, KochaError> {
    let id = conn.id();

    match Command::parse(message.content()) {
        Command::Help => {
            conn.send(&ChatMessage::from_server(commands::HELP_TEXT)).await?;
        }

        Command::Quit => {
            tracing::info!(%id, %alias, "member quit");
            return Ok(Phase::Closed(SessionEnd::Quit));
        }

        Command::Members => {
            let others = state.registry.snapshot(Some(id)).await;
            conn.send(&ChatMessage::from_server(others.join(","))).await?;
        }

        Command::DirectMessage { to, text } => {
            if to == alias {
                tracing::debug!(%id, %alias, "dropping direct message to self");
            } else if let Some(target) = state.registry.resolve(to).await {
                let forwarded =
                    ChatMessage::from_parts(text, alias.as_str(), message.sent_at(), true);
                if let Err(e) = target.send(&forwarded).await {
                    tracing::debug!(from = %alias, to, error = %e, "direct message delivery failed");
                }
            } else if state.config.notify_unknown_recipient {
                conn.send(&ChatMessage::from_server(format!(
                    "No member named '{to}' is online."
                )))
                .await?;
            } else {
                tracing::debug!(%id, to, "dropping direct message to unknown alias");
            }
        }

        Command::IncompleteDirectMessage => {
            tracing::debug!(%id, "dropping /dm without recipient or text");
        }

        Command::Chat => {
            // The sender is stamped from the registry, never trusted from
            // the client. Content and timestamp pass through unchanged.
            let forwarded = ChatMessage::from_parts(
                message.content(),
                alias.as_str(),
                message.sent_at(),
                false,
            );
            deliver_to_all(state, id, &forwarded).await;
        }
    }

    Ok(Phase::Authenticated { alias })
}

/// Sends `message` to every member except `excluding`.
///
/// The target list is copied out of the registry first, so no lock is
/// held during network writes. A failed write to one peer is logged and
/// skipped: that peer's own session notices the broken connection.
async fn deliver_to_all<C: Connection>(
    state: &ServerState<C>,
    excluding: ConnectionId,
    message: &ChatMessage,
) {
    let targets = state.registry.broadcast_targets(excluding).await;
    tracing::trace!(from = %excluding, recipients = targets.len(), "broadcasting");

    for target in targets {
        if let Err(e) = target.send(message).await {
            tracing::debug!(to = %target.id(), error = %e, "broadcast delivery failed");
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
