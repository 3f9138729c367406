//! The session registry: who is logged in, under which alias.
//!
//! Every session task consults the registry — to log in, to list
//! members, to find a direct-message recipient, to broadcast. All of
//! that shared state lives here, behind one lock.
//!
//! # Concurrency note
//!
//! Each public method takes the lock once and does its whole
//! read/modify/write inside that one critical section, so "is this alias
//! free?" and "take it" can never interleave with another task's login.
//! Critical sections only touch the maps; no network I/O ever happens
//! while the lock is held. Methods that feed I/O (`resolve`,
//! `broadcast_targets`, `drain`) return cloned `Arc`s, and the caller
//! sends after the lock is released.

use std::collections::HashMap;
use std::sync::Arc;

use kocha_transport::{Connection, ConnectionId};
use tokio::sync::Mutex;

use crate::{AliasRejection, SessionError, validate_alias};

/// One logged-in connection.
struct Member<C> {
    alias: String,
    conn: Arc<C>,
}

/// The two indexes, kept in sync under the registry lock.
struct Members<C> {
    /// Connection identity → member. At most one entry per connection.
    by_conn: HashMap<ConnectionId, Member<C>>,

    /// Alias → connection identity. Reverse index for direct messages
    /// and uniqueness checks, so neither has to scan every member.
    by_alias: HashMap<String, ConnectionId>,
}

/// Concurrency-safe mapping from connection to alias.
///
/// ## Lifecycle
///
/// ```text
/// accept ──→ try_register() ──→ [registered] ──→ unregister() / drain()
///               │ rejected                            │
///               └──→ (stays unregistered, may retry)  ▼
///                                                  alias free again
/// ```
pub struct SessionRegistry<C: Connection> {
    members: Mutex<Members<C>>,
}

impl<C: Connection> SessionRegistry<C> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            members: Mutex::new(Members {
                by_conn: HashMap::new(),
                by_alias: HashMap::new(),
            }),
        }
    }

    /// Binds `alias` to `conn`, if the alias is legal and free.
    ///
    /// On any violation nothing changes.
    ///
    /// # Errors
    /// - [`SessionError::AliasRejected`] — illegal shape (see
    ///   [`validate_alias`]) or [`AliasRejection::Taken`]
    /// - [`SessionError::AlreadyRegistered`] — this connection already
    ///   has an alias
    pub async fn try_register(&self, conn: &Arc<C>, alias: &str) -> Result<(), SessionError> {
        let rejected = |reason| SessionError::AliasRejected {
            alias: alias.to_string(),
            reason,
        };

        // Shape checks are pure, so they run before taking the lock.
        validate_alias(alias).map_err(rejected)?;

        let id = conn.id();
        let mut members = self.members.lock().await;

        if members.by_conn.contains_key(&id) {
            return Err(SessionError::AlreadyRegistered(id));
        }
        if members.by_alias.contains_key(alias) {
            return Err(rejected(AliasRejection::Taken));
        }

        members.by_alias.insert(alias.to_string(), id);
        members.by_conn.insert(
            id,
            Member {
                alias: alias.to_string(),
                conn: Arc::clone(conn),
            },
        );

        tracing::info!(%id, alias, members = members.by_conn.len(), "alias registered");
        Ok(())
    }

    /// Removes the connection's entry and returns the released alias.
    ///
    /// Returns `None` (and does nothing) if the connection is not
    /// registered, so cleanup paths may call this unconditionally.
    pub async fn unregister(&self, id: ConnectionId) -> Option<String> {
        let mut members = self.members.lock().await;
        let member = members.by_conn.remove(&id)?;
        members.by_alias.remove(&member.alias);

        tracing::info!(%id, alias = %member.alias, "alias released");
        Some(member.alias)
    }

    /// Returns the alias bound to the connection, if any.
    pub async fn alias_of(&self, id: ConnectionId) -> Option<String> {
        self.members
            .lock()
            .await
            .by_conn
            .get(&id)
            .map(|member| member.alias.clone())
    }

    /// Returns every registered alias except the excluded connection's,
    /// sorted.
    ///
    /// The result is a consistent point-in-time view: taken under one
    /// lock, so no alias appears twice and no half-registered alias
    /// appears at all.
    pub async fn snapshot(&self, excluding: Option<ConnectionId>) -> Vec<String> {
        let members = self.members.lock().await;
        let mut aliases: Vec<String> = members
            .by_conn
            .iter()
            .filter(|(id, _)| Some(**id) != excluding)
            .map(|(_, member)| member.alias.clone())
            .collect();
        aliases.sort();
        aliases
    }

    /// Finds the connection logged in under `alias`.
    pub async fn resolve(&self, alias: &str) -> Option<Arc<C>> {
        let members = self.members.lock().await;
        let id = members.by_alias.get(alias)?;
        members.by_conn.get(id).map(|member| Arc::clone(&member.conn))
    }

    /// Returns every registered connection except `excluding`.
    ///
    /// The returned `Vec` is a copy: the lock is already released when
    /// the caller starts sending, so a slow peer cannot block logins.
    pub async fn broadcast_targets(&self, excluding: ConnectionId) -> Vec<Arc<C>> {
        self.members
            .lock()
            .await
            .by_conn
            .iter()
            .filter(|(id, _)| **id != excluding)
            .map(|(_, member)| Arc::clone(&member.conn))
            .collect()
    }

    /// Removes every entry and returns the connections.
    ///
    /// Used at shutdown to close whatever is still open.
    pub async fn drain(&self) -> Vec<Arc<C>> {
        let mut members = self.members.lock().await;
        members.by_alias.clear();
        members.by_conn.drain().map(|(_, member)| member.conn).collect()
    }

    /// Returns `true` if some connection is logged in under `alias`.
    pub async fn contains_alias(&self, alias: &str) -> bool {
        self.members.lock().await.by_alias.contains_key(alias)
    }

    /// Number of registered connections.
    pub async fn len(&self) -> usize {
        self.members.lock().await.by_conn.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.members.lock().await.by_conn.is_empty()
    }
}

impl<C: Connection> Default for SessionRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

// =========================================================================
// Tests
// =========================================================================
