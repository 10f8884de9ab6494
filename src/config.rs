//! Configuration management for chatsync
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from a YAML file with sensible defaults for every field.

use crate::error::{ChatsyncError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration structure for chatsync
///
/// Holds everything a session needs beyond its identity: engine tuning,
/// remote backend settings, and the local store location.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Synchronization engine tuning
    #[serde(default)]
    pub session: SessionConfig,

    /// Remote backend settings
    #[serde(default)]
    pub backend: BackendConfig,

    /// Local session store settings
    #[serde(default)]
    pub store: StoreConfig,
}

/// Synchronization engine tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Delay before a scheduled reply is generated, in milliseconds
    #[serde(default = "default_reply_delay_ms")]
    pub reply_delay_ms: u64,

    /// Interval between revealed characters, in milliseconds
    #[serde(default = "default_reveal_tick_ms")]
    pub reveal_tick_ms: u64,

    /// Message count at which anonymous sessions stop accepting sends
    #[serde(default = "default_anonymous_limit")]
    pub anonymous_message_limit: usize,

    /// Bot display name used when no backend profile is available
    #[serde(default = "default_bot_name")]
    pub bot_name: String,
}

fn default_reply_delay_ms() -> u64 {
    500
}

fn default_reveal_tick_ms() -> u64 {
    50
}

fn default_anonymous_limit() -> usize {
    19
}

fn default_bot_name() -> String {
    "Assistant".to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reply_delay_ms: default_reply_delay_ms(),
            reveal_tick_ms: default_reveal_tick_ms(),
            anonymous_message_limit: default_anonymous_limit(),
            bot_name: default_bot_name(),
        }
    }
}

impl SessionConfig {
    /// Delay before a scheduled reply fires
    pub fn reply_delay(&self) -> Duration {
        Duration::from_millis(self.reply_delay_ms)
    }

    /// Interval between revealed characters
    pub fn reveal_tick(&self) -> Duration {
        Duration::from_millis(self.reveal_tick_ms)
    }
}

/// Remote backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the chat backend (None = no remote backend configured)
    #[serde(default)]
    pub base_url: Option<String>,

    /// Optional bearer token sent on every request
    #[serde(default)]
    pub api_key: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_backend_timeout")]
    pub timeout_secs: u64,
}

fn default_backend_timeout() -> u64 {
    30
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            timeout_secs: default_backend_timeout(),
        }
    }
}

/// Local session store settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StoreConfig {
    /// Path of the sled database directory (None = platform data dir)
    #[serde(default)]
    pub path: Option<std::path::PathBuf>,
}

impl StoreConfig {
    /// Resolves the store path, falling back to the platform data directory
    pub fn resolve_path(&self) -> std::path::PathBuf {
        if let Some(path) = &self.path {
            return path.clone();
        }
        directories::ProjectDirs::from("io", "chatsync", "chatsync")
            .map(|dirs| dirs.data_dir().join("sessions"))
            .unwrap_or_else(|| std::path::PathBuf::from(".chatsync/sessions"))
    }
}

impl Config {
    /// Loads configuration from a YAML file, falling back to defaults
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the YAML configuration file
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            Self::from_file(path)
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Parses configuration from a YAML file
    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ChatsyncError::Config(format!("Failed to read {}: {}", path, e)))?;
        let config: Config = serde_yaml::from_str(&contents)
            .map_err(|e| ChatsyncError::Config(format!("Failed to parse {}: {}", path, e)))?;
        Ok(config)
    }

    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns `ChatsyncError::Config` when a zero reveal tick or zero
    /// anonymous limit would stall the engine.
    pub fn validate(&self) -> Result<()> {
        if self.session.reveal_tick_ms == 0 {
            return Err(
                ChatsyncError::Config("reveal_tick_ms must be greater than 0".to_string()).into(),
            );
        }
        if self.session.anonymous_message_limit == 0 {
            return Err(ChatsyncError::Config(
                "anonymous_message_limit must be greater than 0".to_string(),
            )
            .into());
        }
        if let Some(url) = &self.backend.base_url {
            url::Url::parse(url)
                .map_err(|e| ChatsyncError::Config(format!("Invalid backend base_url: {}", e)))?;
        }
        Ok(())
    }
}
