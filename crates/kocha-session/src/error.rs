//! Error types for the session layer.

use kocha_transport::ConnectionId;

use crate::AliasRejection;

/// Errors that can occur while registering a connection.
///
/// These are business-rule failures, reported to the user as a failed
/// login. The connection stays open for another attempt.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The requested alias is illegal or already taken.
    #[error("alias '{alias}' rejected: {reason}")]
    AliasRejected {
        alias: String,
        reason: AliasRejection,
    },

    /// The connection already has an alias.
    /// A connection can only be registered once.
    #[error("{0} is already registered")]
    AlreadyRegistered(ConnectionId),
}
