//! chatsync - chat-room session synchronization engine
//!
//! This library reconciles a locally-held chat thread with a remote change
//! feed: it decides which backend owns a session, guarantees generated
//! replies land exactly once, supports edit/delete/regenerate with correct
//! ordering, and animates newly arrived assistant messages character by
//! character without racing the live feed.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `session`: the synchronization engine, its mode arbitration, feed
//!   reconciliation, and reveal animator
//! - `backend`: the remote chat backend trait plus HTTP/SSE and in-memory
//!   implementations
//! - `store`: the local session store trait plus sled and in-memory
//!   implementations
//! - `generator`, `speech`, `clipboard`, `auth`: collaborator seams
//! - `config`: configuration loading and validation
//! - `error`: error types and result alias
//! - `cli`: command-line interface and interactive chat loop
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use chatsync::auth::AuthState;
//! use chatsync::backend::MemoryBackend;
//! use chatsync::clipboard::MemoryClipboard;
//! use chatsync::config::SessionConfig;
//! use chatsync::generator::TemplateGenerator;
//! use chatsync::message::SessionIdentity;
//! use chatsync::session::{ChatSession, SessionHandles};
//! use chatsync::speech::NullSpeech;
//! use chatsync::store::MemorySessionStore;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let handles = SessionHandles {
//!         backend: Arc::new(MemoryBackend::new()),
//!         store: Arc::new(MemorySessionStore::new()),
//!         generator: Arc::new(TemplateGenerator),
//!         speech: Arc::new(NullSpeech),
//!         clipboard: Arc::new(MemoryClipboard::new()),
//!     };
//!     let session = ChatSession::start(
//!         SessionIdentity::new("7", "1", "2"),
//!         &AuthState::anonymous(),
//!         SessionConfig::default(),
//!         handles,
//!     )
//!     .await?;
//!     session.send("hello").await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod backend;
pub mod cli;
pub mod clipboard;
pub mod config;
pub mod error;
pub mod generator;
pub mod message;
pub mod session;
pub mod speech;
pub mod store;

// Re-export commonly used types
pub use auth::AuthState;
pub use config::Config;
pub use error::{ChatsyncError, Result};
pub use message::{BotProfile, Message, Sender, SessionIdentity};
pub use session::{ChatSession, RenderState, SessionHandles, SessionMode};
