//! Error types for chatsync
//!
//! This module defines all error types used throughout the engine,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for chatsync operations
///
/// This enum encompasses all possible errors that can occur during
/// session startup, backend interactions, local persistence, and the
/// user-facing operations exposed by the synchronization engine.
#[derive(Error, Debug)]
pub enum ChatsyncError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Remote backend errors (room resolution, message writes, feed setup)
    #[error("Backend error: {0}")]
    Backend(String),

    /// Local session store errors (read/write/flush failures)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Anonymous message limit reached; the caller should prompt for login
    #[error("Message limit reached: limit={limit}, sign in to continue the conversation")]
    QuotaExceeded {
        /// The configured anonymous message limit that was hit
        limit: usize,
    },

    /// Clipboard write failures for the copy operation
    #[error("Clipboard error: {0}")]
    Clipboard(String),

    /// An operation referenced a message index outside the current list
    #[error("No message at index {0}")]
    IndexOutOfBounds(usize),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for chatsync operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;

impl ChatsyncError {
    /// Returns true if this error should be surfaced to the user as a
    /// blocking prompt rather than a silent no-op
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            ChatsyncError::QuotaExceeded { .. } | ChatsyncError::Clipboard(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let error = ChatsyncError::Config("invalid reveal tick".to_string());
        assert_eq!(error.to_string(), "Configuration error: invalid reveal tick");
    }

    #[test]
    fn test_backend_error_display() {
        let error = ChatsyncError::Backend("insert failed".to_string());
        assert_eq!(error.to_string(), "Backend error: insert failed");
    }

    #[test]
    fn test_storage_error_display() {
        let error = ChatsyncError::Storage("flush failed".to_string());
        assert_eq!(error.to_string(), "Storage error: flush failed");
    }

    #[test]
    fn test_quota_exceeded_display() {
        let error = ChatsyncError::QuotaExceeded { limit: 19 };
        let s = error.to_string();
        assert!(s.contains("limit=19"));
        assert!(s.contains("sign in"));
    }

    #[test]
    fn test_clipboard_error_display() {
        let error = ChatsyncError::Clipboard("no display".to_string());
        assert_eq!(error.to_string(), "Clipboard error: no display");
    }

    #[test]
    fn test_index_out_of_bounds_display() {
        let error = ChatsyncError::IndexOutOfBounds(7);
        assert_eq!(error.to_string(), "No message at index 7");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error: ChatsyncError = io_error.into();
        assert!(matches!(error, ChatsyncError::Io(_)));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_str = "{invalid json}";
        let json_error = serde_json::from_str::<serde_json::Value>(json_str).unwrap_err();
        let error: ChatsyncError = json_error.into();
        assert!(matches!(error, ChatsyncError::Serialization(_)));
    }

    #[test]
    fn test_user_facing_classification() {
        assert!(ChatsyncError::QuotaExceeded { limit: 19 }.is_user_facing());
        assert!(ChatsyncError::Clipboard("x".to_string()).is_user_facing());
        assert!(!ChatsyncError::Backend("x".to_string()).is_user_facing());
        assert!(!ChatsyncError::IndexOutOfBounds(0).is_user_facing());
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ChatsyncError>();
    }
}
