//! The chat message that travels on the wire.
//!
//! KOCHA has exactly one wire type: every line a user types, every
//! server notice, and every direct message is a [`ChatMessage`].
//! Commands such as `/help` or `/dm` are not separate message kinds —
//! they are ordinary messages whose `content` the server interprets.

use std::fmt;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// The version string shared by the KOCHA server and client.
pub const KOCHA_VERSION: &str = "v1.0.0";

/// The alias used as `sender` on every server-originated message.
///
/// No user may log in under this alias.
pub const SERVER_ALIAS: &str = "KOCHA-Server";

// ---------------------------------------------------------------------------
// ChatMessage
// ---------------------------------------------------------------------------

/// A single chat message.
///
/// Messages are immutable values: the builder-style methods
/// ([`with_sender`](Self::with_sender), [`with_content`](Self::with_content),
/// [`direct`](Self::direct)) consume the message and return a modified
/// copy. They are moved or cloned between tasks, never shared.
///
/// # Wire format
///
/// Serialized as a JSON object with exactly four keys:
///
/// ```json
/// { "content": "hi", "sender": "alice", "sent_at": 1700000000.25, "is_dm": false }
/// ```
///
/// `sent_at` is a number of seconds since the Unix epoch. Unknown and
/// missing keys are rejected on decode (`#[serde(deny_unknown_fields)]`
/// plus no `#[serde(default)]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChatMessage {
    content: String,

    /// Alias of the author. Empty until the client has logged in.
    sender: String,

    #[serde(with = "epoch_seconds")]
    sent_at: DateTime<Utc>,

    #[serde(rename = "is_dm")]
    is_direct: bool,
}

impl ChatMessage {
    /// Creates a broadcast message with no sender, stamped with the
    /// current time.
    pub fn new(content: impl Into<String>) -> Self {
        Self::from_parts(content, "", Utc::now(), false)
    }

    /// Creates a direct message from the reserved server alias.
    pub fn from_server(content: impl Into<String>) -> Self {
        Self::new(content).with_sender(SERVER_ALIAS).direct()
    }

    /// Creates a message from all four fields.
    ///
    /// `sent_at` is truncated to microseconds, the precision carried by
    /// the wire format, so that a message always compares equal to its
    /// own decoded frame.
    pub fn from_parts(
        content: impl Into<String>,
        sender: impl Into<String>,
        sent_at: DateTime<Utc>,
        is_direct: bool,
    ) -> Self {
        Self {
            content: content.into(),
            sender: sender.into(),
            sent_at: sent_at.trunc_subsecs(6),
            is_direct,
        }
    }

    /// Returns a copy with a different sender.
    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = sender.into();
        self
    }

    /// Returns a copy with different content.
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    /// Returns a copy marked as a direct message.
    pub fn direct(mut self) -> Self {
        self.is_direct = true;
        self
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn sent_at(&self) -> DateTime<Utc> {
        self.sent_at
    }

    pub fn is_direct(&self) -> bool {
        self.is_direct
    }

    /// Returns `true` if the sender is the reserved server alias.
    ///
    /// This is a rendering hint only. The server overwrites the sender of
    /// every forwarded user message, but a client must not treat this flag
    /// as proof of origin.
    pub fn is_from_server(&self) -> bool {
        self.sender == SERVER_ALIAS
    }
}

impl fmt::Display for ChatMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_direct {
            write!(f, "(dm) ")?;
        }
        write!(f, "{}: {}", self.sender, self.content)
    }
}

/// Serde adapter: `DateTime<Utc>` <-> fractional epoch seconds.
mod epoch_seconds {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(at: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        let secs = at.timestamp() as f64 + f64::from(at.timestamp_subsec_micros()) / 1_000_000.0;
        serializer.serialize_f64(secs)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        from_epoch_seconds(secs)
            .ok_or_else(|| D::Error::custom(format!("timestamp out of range: {secs}")))
    }

    /// Rounds to the nearest microsecond. An f64 near the current epoch
    /// resolves about a quarter of a microsecond, so this recovers the
    /// exact value written by `serialize`.
    fn from_epoch_seconds(secs: f64) -> Option<DateTime<Utc>> {
        if !secs.is_finite() {
            return None;
        }
        let micros = (secs * 1_000_000.0).round();
        if micros.abs() >= i64::MAX as f64 {
            return None;
        }
        DateTime::from_timestamp_micros(micros as i64)
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(all(test, feature = "json"))]
mod tests {
    //! The wire format is shared with clients written against the
    //! historical KOCHA JSON shape. These tests pin that shape.

    use super::*;

    fn sample() -> ChatMessage {
        let at = DateTime::from_timestamp(1_700_000_000, 250_000_000).unwrap();
        ChatMessage::from_parts("hi", "alice", at, false)
    }

    #[test]
    fn test_chat_message_serializes_with_wire_keys() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["content"], "hi");
        assert_eq!(value["sender"], "alice");
        assert_eq!(value["sent_at"], 1_700_000_000.25);
        assert_eq!(value["is_dm"], false);
        assert_eq!(value.as_object().unwrap().len(), 4);
    }

    #[test]
    fn test_chat_message_deserializes_integer_timestamp() {
        let json = r#"{"content":"x","sender":"bob","sent_at":1700000000,"is_dm":true}"#;
        let msg: ChatMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.sent_at().timestamp(), 1_700_000_000);
        assert!(msg.is_direct());
        assert_eq!(msg.sender(), "bob");
    }

    #[test]
    fn test_chat_message_rejects_unknown_field() {
        let json = r#"{"content":"x","sender":"","sent_at":1.0,"is_dm":false,"extra":1}"#;
        assert!(serde_json::from_str::<ChatMessage>(json).is_err());
    }

    #[test]
    fn test_chat_message_rejects_missing_field() {
        let json = r#"{"content":"x","sender":"","sent_at":1.0}"#;
        assert!(serde_json::from_str::<ChatMessage>(json).is_err());
    }

    #[test]
    fn test_chat_message_rejects_non_numeric_timestamp() {
        let json = r#"{"content":"x","sender":"","sent_at":"yesterday","is_dm":false}"#;
        assert!(serde_json::from_str::<ChatMessage>(json).is_err());
    }

    #[test]
    fn test_chat_message_round_trips_current_time_exactly() {
        let msg = ChatMessage::new("now").with_sender("carol");
        let json = serde_json::to_string(&msg).unwrap();
        let back: ChatMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_new_has_empty_sender_and_is_broadcast() {
        let msg = ChatMessage::new("hello");
        assert_eq!(msg.sender(), "");
        assert!(!msg.is_direct());
        assert!(!msg.is_from_server());
    }

    #[test]
    fn test_from_server_is_direct_with_reserved_sender() {
        let msg = ChatMessage::from_server("welcome");
        assert_eq!(msg.sender(), SERVER_ALIAS);
        assert!(msg.is_direct());
        assert!(msg.is_from_server());
    }

    #[test]
    fn test_from_parts_truncates_to_microseconds() {
        let at = DateTime::from_timestamp(10, 123_456_789).unwrap();
        let msg = ChatMessage::from_parts("", "", at, false);
        assert_eq!(msg.sent_at().timestamp_subsec_nanos(), 123_456_000);
    }

    #[test]
    fn test_builders_keep_timestamp() {
        let original = sample();
        let copy = original.clone().with_content("secret").direct();
        assert_eq!(copy.sent_at(), original.sent_at());
        assert_eq!(copy.content(), "secret");
        assert!(copy.is_direct());
    }

    #[test]
    fn test_display_marks_direct_messages() {
        assert_eq!(sample().to_string(), "alice: hi");
        assert_eq!(sample().direct().to_string(), "(dm) alice: hi");
    }
}
