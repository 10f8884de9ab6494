//! In-memory session store for tests and ephemeral runs

use super::SessionStore;
use crate::error::Result;
use std::collections::HashMap;
use std::sync::Mutex;

/// Session store backed by a plain in-process map
///
/// Mirrors the browser's session storage: it lives exactly as long as the
/// process and never touches disk.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemorySessionStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
