//! Durable session store backed by an embedded `sled` database

use super::SessionStore;
use crate::error::{ChatsyncError, Result};
use sled::Db;
use std::path::Path;

/// Session store persisted in a `sled` key-value database
///
/// Used by the CLI so anonymous transcripts and cached room ids survive
/// restarts. Writes flush before returning; a transcript reported as saved
/// is on disk.
pub struct SledSessionStore {
    db: Db,
}

impl SledSessionStore {
    /// Opens or creates the database at `path`
    ///
    /// # Errors
    ///
    /// Returns `ChatsyncError::Storage` if the database cannot be opened
    /// (e.g. another process holds the lock).
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = sled::open(path)
            .map_err(|e| ChatsyncError::Storage(format!("Failed to open database: {}", e)))?;
        Ok(Self { db })
    }
}

impl SessionStore for SledSessionStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match self
            .db
            .get(key.as_bytes())
            .map_err(|e| ChatsyncError::Storage(format!("Get failed: {}", e)))?
        {
            Some(bytes) => {
                let value = String::from_utf8(bytes.to_vec())
                    .map_err(|e| ChatsyncError::Storage(format!("Corrupt value: {}", e)))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.db
            .insert(key.as_bytes(), value.as_bytes())
            .map_err(|e| ChatsyncError::Storage(format!("Insert failed: {}", e)))?;
        self.db
            .flush()
            .map_err(|e| ChatsyncError::Storage(format!("Flush failed: {}", e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::SessionIdentity;

    #[test]
    fn test_sled_get_set_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledSessionStore::open(dir.path()).unwrap();
        assert_eq!(store.get("k").unwrap(), None);
        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").unwrap(), Some("v".to_string()));
    }

    #[test]
    fn test_sled_room_id_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let identity = SessionIdentity::new("7", "1", "2");
        {
            let store = SledSessionStore::open(dir.path()).unwrap();
            store.set_room_id(&identity, "room-9").unwrap();
        }
        let store = SledSessionStore::open(dir.path()).unwrap();
        assert_eq!(store.room_id(&identity).unwrap(), Some("room-9".to_string()));
    }
}
