//! chatsync - chat-room session synchronization engine CLI
//!
//! Main entry point: wires real collaborators (sled store, HTTP or
//! in-memory backend, platform clipboard) into a session engine and hands
//! it to the interactive chat loop.

use anyhow::Result;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use chatsync::auth::AuthState;
use chatsync::backend::{ChatBackend, HttpBackend, MemoryBackend};
use chatsync::cli::{run_chat_loop, Cli, Commands};
use chatsync::clipboard::{Clipboard, MemoryClipboard, SystemClipboard};
use chatsync::config::Config;
use chatsync::generator::TemplateGenerator;
use chatsync::message::{BotProfile, SessionIdentity};
use chatsync::session::{ChatSession, SessionHandles};
use chatsync::speech::NullSpeech;
use chatsync::store::SledSessionStore;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();
    init_tracing(cli.verbose);

    let mut config = Config::load(&cli.config)?;

    match cli.command.clone() {
        Commands::Chat {
            bot,
            category,
            episode,
            login,
            remote,
        } => {
            if let Some(url) = remote {
                config.backend.base_url = Some(url);
            }
            config.validate()?;

            let identity = SessionIdentity::new(bot, category, episode);
            let auth = match login {
                Some(user_id) => AuthState::logged_in(user_id),
                None => AuthState::anonymous(),
            };

            let backend: Arc<dyn ChatBackend> = if config.backend.base_url.is_some() {
                Arc::new(HttpBackend::new(&config.backend)?)
            } else {
                if auth.is_logged_in() {
                    tracing::info!("no backend configured; using the in-memory backend");
                }
                let memory = MemoryBackend::new();
                memory.add_bot(BotProfile::new(
                    identity.bot_id.clone(),
                    config.session.bot_name.clone(),
                ));
                Arc::new(memory)
            };

            let store = SledSessionStore::open(config.store.resolve_path())?;

            let clipboard: Arc<dyn Clipboard> = match SystemClipboard::new() {
                Ok(system) => Arc::new(system),
                Err(e) => {
                    tracing::warn!("clipboard unavailable, copies stay in-process: {}", e);
                    Arc::new(MemoryClipboard::new())
                }
            };

            let handles = SessionHandles {
                backend,
                store: Arc::new(store),
                generator: Arc::new(TemplateGenerator),
                speech: Arc::new(NullSpeech),
                clipboard,
            };

            let session =
                ChatSession::start(identity, &auth, config.session.clone(), handles).await?;
            run_chat_loop(session).await
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "chatsync=debug" } else { "chatsync=info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}
