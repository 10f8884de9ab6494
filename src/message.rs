//! Core message and session-identity types
//!
//! A chat thread is a date-ordered list of [`Message`] values. Message ids
//! are opaque strings: server-assigned in authenticated sessions, and
//! client-assigned ULIDs (sortable, derived from creation time) in
//! anonymous sessions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// The author of a message
///
/// Serialized lowercase (`"user"` / `"assistant"`) to match the wire and
/// storage formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    /// A message typed by the person in the chat
    User,
    /// A generated reply from the bot
    Assistant,
}

impl Sender {
    /// Returns the lowercase role string used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Sender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single message in a chat thread
///
/// # Examples
///
/// ```
/// use chatsync::message::{Message, Sender};
///
/// let msg = Message::local(Sender::User, "hello");
/// assert_eq!(msg.sender, Sender::User);
/// assert!(!msg.id.is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Opaque identifier, comparable for equality
    pub id: String,

    /// Message body; generated reply text is treated as opaque
    pub text: String,

    /// Who authored the message
    pub sender: Sender,

    /// Creation timestamp; the ordering key for the thread
    pub date: DateTime<Utc>,
}

impl Message {
    /// Creates a message with a client-assigned ULID id stamped now
    ///
    /// Used by anonymous sessions, where no server assigns ids. ULIDs sort
    /// by creation time, so id order agrees with date order.
    pub fn local(sender: Sender, text: impl Into<String>) -> Self {
        Self {
            id: Ulid::new().to_string(),
            text: text.into(),
            sender,
            date: Utc::now(),
        }
    }

    /// Creates a message from already-known parts (server rows, tests)
    pub fn new(
        id: impl Into<String>,
        sender: Sender,
        text: impl Into<String>,
        date: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            sender,
            date,
        }
    }
}

/// Inserts a message into a date-ascending list, keeping it sorted
///
/// Equal dates insert after existing entries, so arrival order is preserved
/// for ties. The thread invariant is ascending `date`; the engine never
/// reorders on display.
pub fn insert_ordered(messages: &mut Vec<Message>, message: Message) {
    let pos = messages.partition_point(|m| m.date <= message.date);
    messages.insert(pos, message);
}

/// Composite key identifying one conversation context
///
/// Maps to a remote room id (authenticated sessions) or a local storage key
/// (anonymous sessions).
///
/// # Examples
///
/// ```
/// use chatsync::message::SessionIdentity;
///
/// let identity = SessionIdentity::new("7", "2", "13");
/// assert_eq!(identity.storage_key(), "chat_messages_7_2_13");
/// assert_eq!(identity.room_key(), "chatroom_id_7_2_13");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionIdentity {
    /// Bot identifier
    pub bot_id: String,
    /// Category identifier
    pub category_id: String,
    /// Episode identifier
    pub episode_id: String,
}

impl SessionIdentity {
    /// Creates a session identity from its three parts
    pub fn new(
        bot_id: impl Into<String>,
        category_id: impl Into<String>,
        episode_id: impl Into<String>,
    ) -> Self {
        Self {
            bot_id: bot_id.into(),
            category_id: category_id.into(),
            episode_id: episode_id.into(),
        }
    }

    /// Storage key for the anonymous transcript of this identity
    pub fn storage_key(&self) -> String {
        format!(
            "chat_messages_{}_{}_{}",
            self.bot_id, self.category_id, self.episode_id
        )
    }

    /// Storage key for the cached room id of this identity
    ///
    /// The mapping outlives a single page view so repeated visits reuse the
    /// same room.
    pub fn room_key(&self) -> String {
        format!(
            "chatroom_id_{}_{}_{}",
            self.bot_id, self.category_id, self.episode_id
        )
    }
}

impl std::fmt::Display for SessionIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.bot_id, self.category_id, self.episode_id)
    }
}

/// Display profile of the bot behind a session
///
/// Only the display name participates in engine behavior (welcome template,
/// reply context); everything else about a bot is presentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotProfile {
    /// Bot identifier
    pub id: String,
    /// Display name, used in the welcome template
    pub name: String,
}

impl BotProfile {
    /// Creates a bot profile
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_sender_roundtrip() {
        let json = serde_json::to_string(&Sender::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
        let back: Sender = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Sender::Assistant);
    }

    #[test]
    fn test_sender_as_str() {
        assert_eq!(Sender::User.as_str(), "user");
        assert_eq!(Sender::Assistant.as_str(), "assistant");
    }

    #[test]
    fn test_local_message_ids_sort_by_creation() {
        let first = Message::local(Sender::User, "a");
        let second = Message::local(Sender::User, "b");
        assert!(first.id <= second.id);
    }

    #[test]
    fn test_insert_ordered_keeps_ascending_dates() {
        let mut messages = vec![
            Message::new("a", Sender::User, "one", at(10)),
            Message::new("b", Sender::Assistant, "two", at(30)),
        ];
        insert_ordered(&mut messages, Message::new("c", Sender::User, "mid", at(20)));

        let dates: Vec<_> = messages.iter().map(|m| m.date).collect();
        assert_eq!(dates, vec![at(10), at(20), at(30)]);
    }

    #[test]
    fn test_insert_ordered_ties_preserve_arrival_order() {
        let mut messages = vec![Message::new("a", Sender::User, "first", at(10))];
        insert_ordered(&mut messages, Message::new("b", Sender::User, "second", at(10)));

        assert_eq!(messages[0].id, "a");
        assert_eq!(messages[1].id, "b");
    }

    #[test]
    fn test_insert_ordered_appends_latest() {
        let mut messages = vec![Message::new("a", Sender::User, "one", at(10))];
        insert_ordered(&mut messages, Message::new("b", Sender::Assistant, "two", at(99)));
        assert_eq!(messages.last().unwrap().id, "b");
    }

    #[test]
    fn test_storage_and_room_keys() {
        let identity = SessionIdentity::new("42", "1", "3");
        assert_eq!(identity.storage_key(), "chat_messages_42_1_3");
        assert_eq!(identity.room_key(), "chatroom_id_42_1_3");
    }

    #[test]
    fn test_message_serde_roundtrip() {
        let msg = Message::new("m1", Sender::Assistant, "hello", at(5));
        let json = serde_json::to_string(&msg).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
        assert!(json.contains("\"assistant\""));
    }
}
