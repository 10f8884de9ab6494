//! Clipboard seam for the copy operation
//!
//! Copy writes message text to the platform clipboard and reports
//! success/failure to the user; it never mutates session state.

use crate::error::{ChatsyncError, Result};
use copypasta::{ClipboardContext, ClipboardProvider};
use std::sync::Mutex;

/// Writes text to a clipboard
pub trait Clipboard: Send + Sync {
    /// Places the given text on the clipboard
    fn set_contents(&self, text: &str) -> Result<()>;
}

/// Platform clipboard backed by `copypasta`
///
/// The underlying context is not `Sync`, so it sits behind a mutex; copy is
/// rare enough that contention never matters.
pub struct SystemClipboard {
    ctx: Mutex<ClipboardContext>,
}

impl SystemClipboard {
    /// Connects to the platform clipboard
    ///
    /// # Errors
    ///
    /// Returns `ChatsyncError::Clipboard` when no clipboard is available
    /// (e.g. a headless host without a display server).
    pub fn new() -> Result<Self> {
        let ctx = ClipboardContext::new()
            .map_err(|e| ChatsyncError::Clipboard(format!("Clipboard unavailable: {}", e)))?;
        Ok(Self {
            ctx: Mutex::new(ctx),
        })
    }
}

impl Clipboard for SystemClipboard {
    fn set_contents(&self, text: &str) -> Result<()> {
        let mut ctx = self
            .ctx
            .lock()
            .map_err(|_| ChatsyncError::Clipboard("Clipboard lock poisoned".to_string()))?;
        ctx.set_contents(text.to_string())
            .map_err(|e| ChatsyncError::Clipboard(format!("Copy failed: {}", e)))?;
        Ok(())
    }
}

/// In-memory clipboard for tests and headless runs
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    contents: Mutex<Option<String>>,
}

impl MemoryClipboard {
    /// Creates an empty in-memory clipboard
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the last copied text, if any
    pub fn contents(&self) -> Option<String> {
        self.contents.lock().unwrap().clone()
    }
}

impl Clipboard for MemoryClipboard {
    fn set_contents(&self, text: &str) -> Result<()> {
        *self.contents.lock().unwrap() = Some(text.to_string());
        Ok(())
    }
}
