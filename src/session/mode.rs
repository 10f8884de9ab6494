//! Session mode arbitration
//!
//! A session resolves its backing store exactly once at start, from the
//! authentication snapshot, and carries the result as a tagged variant.
//! Every operation branches on this value instead of re-checking login
//! state ad hoc.

use crate::backend::RoomId;

/// Which backend owns this session's messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionMode {
    /// Remote backend owns the thread; changes arrive via the feed
    Authenticated {
        /// Resolved room for this session identity
        room_id: RoomId,
    },
    /// Local session store owns the thread; no network dependency
    Anonymous {
        /// Storage key derived from the session identity
        storage_key: String,
    },
}

impl SessionMode {
    /// Whether the remote backend owns this session
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionMode::Authenticated { .. })
    }

    /// The resolved room id, in authenticated mode
    pub fn room_id(&self) -> Option<&str> {
        match self {
            SessionMode::Authenticated { room_id } => Some(room_id),
            SessionMode::Anonymous { .. } => None,
        }
    }

    /// The derived storage key, in anonymous mode
    pub fn storage_key(&self) -> Option<&str> {
        match self {
            SessionMode::Anonymous { storage_key } => Some(storage_key),
            SessionMode::Authenticated { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authenticated_accessors() {
        let mode = SessionMode::Authenticated {
            room_id: "room-1".to_string(),
        };
        assert!(mode.is_authenticated());
        assert_eq!(mode.room_id(), Some("room-1"));
        assert_eq!(mode.storage_key(), None);
    }

    #[test]
    fn test_anonymous_accessors() {
        let mode = SessionMode::Anonymous {
            storage_key: "chat_messages_1_2_3".to_string(),
        };
        assert!(!mode.is_authenticated());
        assert_eq!(mode.room_id(), None);
        assert_eq!(mode.storage_key(), Some("chat_messages_1_2_3"));
    }
}
