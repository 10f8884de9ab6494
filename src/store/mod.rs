//! Local session store
//!
//! Key/value persistence scoped to the visitor: anonymous transcripts live
//! under a per-identity storage key, and resolved room ids are cached under
//! a second durable mapping so repeated visits reuse the same room.

mod memory;
mod sled_store;

pub use memory::MemorySessionStore;
pub use sled_store::SledSessionStore;

use crate::error::Result;
use crate::message::{Message, SessionIdentity};

/// Durable key/value store for one visitor's sessions
///
/// Values are opaque strings; transcripts are JSON-encoded message lists.
/// Keys are private per session identity by construction, so there is no
/// cross-session interference to guard against.
pub trait SessionStore: Send + Sync {
    /// Reads the value under `key`, if present
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Writes `value` under `key`
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Reads the cached room id for a session identity
    fn room_id(&self, identity: &SessionIdentity) -> Result<Option<String>> {
        self.get(&identity.room_key())
    }

    /// Caches the resolved room id for a session identity
    ///
    /// This mapping outlives a single session.
    fn set_room_id(&self, identity: &SessionIdentity, room_id: &str) -> Result<()> {
        self.set(&identity.room_key(), room_id)
    }
}

/// Loads a JSON-encoded transcript from the store
///
/// An absent key or an empty list both read back as an empty transcript.
pub fn load_transcript(store: &dyn SessionStore, key: &str) -> Result<Vec<Message>> {
    match store.get(key)? {
        Some(json) if !json.is_empty() => Ok(serde_json::from_str(&json)?),
        _ => Ok(Vec::new()),
    }
}

/// Persists a transcript under the given storage key as JSON
pub fn save_transcript(store: &dyn SessionStore, key: &str, messages: &[Message]) -> Result<()> {
    let json = serde_json::to_string(messages)?;
    store.set(key, &json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Sender;

    #[test]
    fn test_transcript_roundtrip() {
        let store = MemorySessionStore::new();
        let messages = vec![
            Message::local(Sender::User, "hi"),
            Message::local(Sender::Assistant, "hello"),
        ];
        save_transcript(&store, "chat_messages_1_2_3", &messages).unwrap();
        let loaded = load_transcript(&store, "chat_messages_1_2_3").unwrap();
        assert_eq!(loaded, messages);
    }

    #[test]
    fn test_absent_transcript_is_empty() {
        let store = MemorySessionStore::new();
        let loaded = load_transcript(&store, "missing").unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn test_empty_value_is_empty_transcript() {
        let store = MemorySessionStore::new();
        store.set("blank", "").unwrap();
        let loaded = load_transcript(&store, "blank").unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn test_room_id_mapping() {
        let store = MemorySessionStore::new();
        let identity = SessionIdentity::new("7", "1", "2");
        assert_eq!(store.room_id(&identity).unwrap(), None);
        store.set_room_id(&identity, "room-42").unwrap();
        assert_eq!(store.room_id(&identity).unwrap(), Some("room-42".to_string()));
    }
}
