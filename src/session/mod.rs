//! Chat session synchronization engine
//!
//! The engine owns the in-memory message thread for one session, arbitrates
//! between the local store and the remote backend based on the
//! authentication snapshot, applies remote change-feed events, animates
//! newly arrived assistant messages, and exposes the mutating operations
//! the presentation layer invokes.
//!
//! Execution is single-threaded cooperative: all state mutation happens
//! behind one async mutex, and concurrency comes only from interleaved
//! awaits (backend calls, feed events, reveal ticks, the reply delay).

mod feed;
pub mod mode;
pub mod render;
mod reveal;

pub use mode::SessionMode;
pub use render::{AnimationState, MessageFlags, RenderState};

use crate::auth::AuthState;
use crate::backend::ChatBackend;
use crate::clipboard::Clipboard;
use crate::config::SessionConfig;
use crate::error::{ChatsyncError, Result};
use crate::generator::{welcome_text, ReplyContext, ReplyGenerator, ReplyTrigger};
use crate::message::{insert_ordered, BotProfile, Message, Sender, SessionIdentity};
use crate::speech::SpeechSynthesizer;
use crate::store::{load_transcript, save_transcript, SessionStore};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;

/// Injected collaborator handles for one session
///
/// Constructing the engine with explicit handles (rather than module-level
/// singletons) is what makes isolated test instances with fake
/// collaborators possible.
#[derive(Clone)]
pub struct SessionHandles {
    /// Remote chat backend
    pub backend: Arc<dyn ChatBackend>,
    /// Local session store
    pub store: Arc<dyn SessionStore>,
    /// Reply text generator
    pub generator: Arc<dyn ReplyGenerator>,
    /// Read-aloud synthesizer
    pub speech: Arc<dyn SpeechSynthesizer>,
    /// Platform clipboard
    pub clipboard: Arc<dyn Clipboard>,
}

/// Mutable session state, guarded by the engine's single mutex
struct SessionState {
    messages: Vec<Message>,
    animation: Option<AnimationState>,
    playing: Option<usize>,
    generating: bool,
    revision: u64,
    pending_reply: Option<JoinHandle<()>>,
}

impl SessionState {
    fn new() -> Self {
        Self {
            messages: Vec::new(),
            animation: None,
            playing: None,
            generating: false,
            revision: 0,
            pending_reply: None,
        }
    }
}

/// State and collaborators shared between the engine and its worker tasks
pub(crate) struct SessionShared {
    config: SessionConfig,
    bot: BotProfile,
    mode: SessionMode,
    handles: SessionHandles,
    state: Mutex<SessionState>,
    render_tx: watch::Sender<RenderState>,
    reveal_tx: mpsc::UnboundedSender<Message>,
}

impl SessionShared {
    /// Publishes a fresh render snapshot, bumping the revision
    fn publish(&self, state: &mut SessionState) {
        state.revision += 1;
        let _ = self.render_tx.send(RenderState {
            messages: state.messages.clone(),
            animation: state.animation.clone(),
            playing: state.playing,
            generating: state.generating,
            revision: state.revision,
        });
    }

    /// Persists the thread in anonymous mode; no-op when authenticated
    fn persist_locked(&self, state: &SessionState) -> Result<()> {
        if let SessionMode::Anonymous { storage_key } = &self.mode {
            save_transcript(self.handles.store.as_ref(), storage_key, &state.messages)?;
        }
        Ok(())
    }

    /// Aborts a still-pending scheduled reply, if any
    ///
    /// Every transcript-mutating operation calls this before doing its own
    /// work, so a stale reply can never land in a thread that changed under
    /// it.
    fn cancel_pending_reply(&self, state: &mut SessionState) {
        if let Some(pending) = state.pending_reply.take() {
            pending.abort();
            if state.generating {
                state.generating = false;
            }
            tracing::debug!("cancelled pending reply");
        }
    }

    /// Schedules a reply after the configured delay
    ///
    /// Supersedes any reply still pending from an earlier operation.
    async fn schedule_reply(shared: &Arc<SessionShared>, trigger: ReplyTrigger) {
        let mut state = shared.state.lock().await;
        shared.cancel_pending_reply(&mut state);
        state.generating = true;

        let worker = Arc::clone(shared);
        let task = tokio::spawn(async move {
            tokio::time::sleep(worker.config.reply_delay()).await;
            if let Err(e) = worker.generate_reply(trigger).await {
                tracing::warn!("reply generation failed: {}", e);
                let mut state = worker.state.lock().await;
                state.generating = false;
                worker.publish(&mut state);
            }
        });
        state.pending_reply = Some(task);
        shared.publish(&mut state);
    }

    /// Generates reply text and inserts it through the mode's backend path
    async fn generate_reply(&self, trigger: ReplyTrigger) -> Result<()> {
        let transcript = { self.state.lock().await.messages.clone() };
        let ctx = ReplyContext {
            bot_name: self.bot.name.clone(),
            trigger,
            transcript,
        };
        let text = self.handles.generator.generate(&ctx).await?;

        match &self.mode {
            SessionMode::Authenticated { room_id } => {
                // Fire the write; the feed echo carries it into the thread.
                self.handles
                    .backend
                    .insert_message(room_id, Sender::Assistant, &text, Utc::now())
                    .await?;
                let mut state = self.state.lock().await;
                state.generating = false;
                self.publish(&mut state);
            }
            SessionMode::Anonymous { .. } => {
                // Revealed locally; the worker appends and persists on
                // completion and clears the generating flag.
                let message = Message::local(Sender::Assistant, text);
                let _ = self.reveal_tx.send(message);
            }
        }
        Ok(())
    }
}

/// One chat session's synchronization engine
///
/// Constructed per session with injected collaborators; dropped (or
/// [`close`](Self::close)d) to tear down its worker tasks.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use chatsync::auth::AuthState;
/// use chatsync::backend::MemoryBackend;
/// use chatsync::clipboard::MemoryClipboard;
/// use chatsync::config::SessionConfig;
/// use chatsync::generator::TemplateGenerator;
/// use chatsync::message::SessionIdentity;
/// use chatsync::session::{ChatSession, SessionHandles};
/// use chatsync::speech::NullSpeech;
/// use chatsync::store::MemorySessionStore;
///
/// # async fn example() -> chatsync::error::Result<()> {
/// let handles = SessionHandles {
///     backend: Arc::new(MemoryBackend::new()),
///     store: Arc::new(MemorySessionStore::new()),
///     generator: Arc::new(TemplateGenerator),
///     speech: Arc::new(NullSpeech),
///     clipboard: Arc::new(MemoryClipboard::new()),
/// };
/// let session = ChatSession::start(
///     SessionIdentity::new("7", "1", "2"),
///     &AuthState::anonymous(),
///     SessionConfig::default(),
///     handles,
/// )
/// .await?;
/// session.send("hello").await?;
/// # Ok(())
/// # }
/// ```
pub struct ChatSession {
    shared: Arc<SessionShared>,
    render_rx: watch::Receiver<RenderState>,
    feed_task: Option<JoinHandle<()>>,
    reveal_task: Option<JoinHandle<()>>,
}

impl ChatSession {
    /// Starts a session for the given identity
    ///
    /// Consults the authentication snapshot once: logged-in sessions
    /// resolve (and cache) their room id, subscribe to its change feed, and
    /// load the stored thread; anonymous sessions derive a storage key and
    /// load from the local store. Either way, an empty thread triggers the
    /// welcome message.
    ///
    /// # Errors
    ///
    /// Returns an error when room resolution, feed subscription, or the
    /// initial message load fails; a failed welcome insert degrades to a
    /// logged warning instead.
    pub async fn start(
        identity: SessionIdentity,
        auth: &AuthState,
        config: SessionConfig,
        handles: SessionHandles,
    ) -> Result<Self> {
        let (mode, bot) = match auth.current_user_id() {
            Some(user_id) => {
                let room_id = match handles.store.room_id(&identity)? {
                    Some(cached) => {
                        tracing::debug!("reusing cached room {} for {}", cached, identity);
                        cached
                    }
                    None => {
                        let created = handles
                            .backend
                            .find_or_create_room(user_id, &identity)
                            .await?;
                        handles.store.set_room_id(&identity, &created)?;
                        created
                    }
                };
                let bot = match handles.backend.bot_profile(&identity.bot_id).await {
                    Ok(profile) => profile,
                    Err(e) => {
                        tracing::warn!("bot profile unavailable, using fallback name: {}", e);
                        BotProfile::new(identity.bot_id.clone(), config.bot_name.clone())
                    }
                };
                (SessionMode::Authenticated { room_id }, bot)
            }
            None => (
                SessionMode::Anonymous {
                    storage_key: identity.storage_key(),
                },
                BotProfile::new(identity.bot_id.clone(), config.bot_name.clone()),
            ),
        };

        let (render_tx, render_rx) = watch::channel(RenderState::default());
        let (reveal_tx, reveal_rx) = mpsc::unbounded_channel();

        let shared = Arc::new(SessionShared {
            config,
            bot,
            mode,
            handles,
            state: Mutex::new(SessionState::new()),
            render_tx,
            reveal_tx,
        });

        let reveal_task = tokio::spawn(reveal::run_reveal_worker(Arc::clone(&shared), reveal_rx));

        // Subscribe before loading so no event between the two is lost;
        // inserts already present in the loaded snapshot dedup by id.
        let feed_task = if let SessionMode::Authenticated { room_id } = &shared.mode {
            let subscription = shared.handles.backend.subscribe(room_id).await?;
            Some(tokio::spawn(feed::run_feed_pump(
                Arc::clone(&shared),
                subscription,
            )))
        } else {
            None
        };

        let session = Self {
            shared,
            render_rx,
            feed_task,
            reveal_task: Some(reveal_task),
        };

        session.load_messages().await?;
        session.maybe_welcome().await;

        Ok(session)
    }

    /// Populates the thread from the mode's backing store
    async fn load_messages(&self) -> Result<()> {
        let shared = &self.shared;
        let loaded = match &shared.mode {
            SessionMode::Authenticated { room_id } => {
                shared.handles.backend.list_messages(room_id).await?
            }
            SessionMode::Anonymous { storage_key } => {
                load_transcript(shared.handles.store.as_ref(), storage_key)?
            }
        };

        let mut state = shared.state.lock().await;
        for message in loaded {
            if !state.messages.iter().any(|m| m.id == message.id) {
                insert_ordered(&mut state.messages, message);
            }
        }
        shared.publish(&mut state);
        Ok(())
    }

    /// Generates the welcome message when the loaded thread is empty
    ///
    /// Runs exactly once per session, after load. Authenticated sessions
    /// re-check the remote store for an assistant message first: if the
    /// feed already delivered one, it is adopted instead of duplicated.
    async fn maybe_welcome(&self) {
        let shared = &self.shared;
        {
            let state = shared.state.lock().await;
            if !state.messages.is_empty() || state.animation.is_some() {
                return;
            }
        }

        let text = welcome_text(&shared.bot.name);
        match &shared.mode {
            SessionMode::Authenticated { room_id } => {
                let existing = match shared.handles.backend.list_messages(room_id).await {
                    Ok(messages) => messages,
                    Err(e) => {
                        tracing::warn!("welcome check failed: {}", e);
                        return;
                    }
                };
                if let Some(assistant) = existing
                    .into_iter()
                    .find(|m| m.sender == Sender::Assistant)
                {
                    let mut state = shared.state.lock().await;
                    if state.messages.iter().all(|m| m.id != assistant.id) {
                        insert_ordered(&mut state.messages, assistant);
                        shared.publish(&mut state);
                    }
                    return;
                }
                // Written remotely; arrives back through the feed and is
                // revealed like any other assistant insert.
                if let Err(e) = shared
                    .handles
                    .backend
                    .insert_message(room_id, Sender::Assistant, &text, Utc::now())
                    .await
                {
                    tracing::warn!("welcome insert failed: {}", e);
                }
            }
            SessionMode::Anonymous { .. } => {
                let message = Message::local(Sender::Assistant, text);
                let _ = shared.reveal_tx.send(message);
            }
        }
    }

    /// Sends a user message and schedules a reply
    ///
    /// # Errors
    ///
    /// Returns [`ChatsyncError::QuotaExceeded`] when an anonymous thread
    /// has reached the configured message limit; the thread is left
    /// untouched and the caller should prompt for login.
    pub async fn send(&self, text: &str) -> Result<()> {
        let shared = &self.shared;
        {
            let mut state = shared.state.lock().await;
            if !shared.mode.is_authenticated()
                && state.messages.len() >= shared.config.anonymous_message_limit
            {
                return Err(ChatsyncError::QuotaExceeded {
                    limit: shared.config.anonymous_message_limit,
                }
                .into());
            }

            if !shared.mode.is_authenticated() {
                let message = Message::local(Sender::User, text);
                insert_ordered(&mut state.messages, message);
                shared.persist_locked(&state)?;
                shared.publish(&mut state);
            }
        }

        // Remote sends only fire the write; the feed echo appends.

        if let SessionMode::Authenticated { room_id } = &shared.mode {
            shared
                .handles
                .backend
                .insert_message(room_id, Sender::User, text, Utc::now())
                .await?;
        }

        SessionShared::schedule_reply(shared, ReplyTrigger::Send).await;
        Ok(())
    }

    /// Replaces the text of the message at `index`
    ///
    /// Editing a user turn invalidates its downstream answer, so a new
    /// reply is scheduled exactly as in [`send`](Self::send).
    pub async fn edit(&self, index: usize, new_text: &str) -> Result<()> {
        let shared = &self.shared;
        let (target_id, target_sender) = {
            let mut state = shared.state.lock().await;
            shared.cancel_pending_reply(&mut state);
            let target = state
                .messages
                .get(index)
                .ok_or(ChatsyncError::IndexOutOfBounds(index))?;
            let id = target.id.clone();
            let sender = target.sender;

            if !shared.mode.is_authenticated() {
                state.messages[index].text = new_text.to_string();
                shared.persist_locked(&state)?;
                shared.publish(&mut state);
            }
            (id, sender)
        };

        if shared.mode.is_authenticated() {
            // The corrected text arrives via the feed's update event.
            shared
                .handles
                .backend
                .update_message_text(&target_id, new_text)
                .await?;
        }

        if target_sender == Sender::User {
            SessionShared::schedule_reply(shared, ReplyTrigger::Edit).await;
        }
        Ok(())
    }

    /// Deletes the message at `index` and everything after it by date
    ///
    /// Deleting a turn drops everything causally after it: the cutoff is
    /// the target's date, inclusive. Deleting the first message never
    /// regenerates; deleting an assistant turn in an anonymous session
    /// schedules a fresh reply (remote sessions never auto-regenerate on
    /// delete, since multi-user delivery makes that ambiguous).
    pub async fn delete(&self, index: usize) -> Result<()> {
        let shared = &self.shared;
        let target = {
            let mut state = shared.state.lock().await;
            shared.cancel_pending_reply(&mut state);
            let target = state
                .messages
                .get(index)
                .ok_or(ChatsyncError::IndexOutOfBounds(index))?
                .clone();

            if !shared.mode.is_authenticated() {
                state.messages.truncate(index);
                shared.persist_locked(&state)?;
                shared.publish(&mut state);
            }
            target
        };

        if let SessionMode::Authenticated { room_id } = &shared.mode {
            // Local state updates only as the feed delete events arrive.
            shared
                .handles
                .backend
                .delete_messages_from(room_id, target.date)
                .await?;
        }

        if index == 0 {
            return Ok(());
        }
        if target.sender == Sender::Assistant && !shared.mode.is_authenticated() {
            SessionShared::schedule_reply(shared, ReplyTrigger::Delete).await;
        }
        Ok(())
    }

    /// Deletes the message at `index` and everything after it, then
    /// schedules a fresh reply regardless of session mode
    pub async fn regenerate(&self, index: usize) -> Result<()> {
        let shared = &self.shared;
        let target_id = {
            let mut state = shared.state.lock().await;
            shared.cancel_pending_reply(&mut state);
            state
                .messages
                .get(index)
                .ok_or(ChatsyncError::IndexOutOfBounds(index))?
                .id
                .clone()
        };

        if let SessionMode::Authenticated { room_id } = &shared.mode {
            shared
                .handles
                .backend
                .delete_messages_by_id_range(room_id, &target_id)
                .await?;
        }

        {
            // Truncated directly in both modes; in remote mode the matching
            // feed deletes then land as no-ops.
            let mut state = shared.state.lock().await;
            state.messages.truncate(index);
            shared.persist_locked(&state)?;
            shared.publish(&mut state);
        }

        SessionShared::schedule_reply(shared, ReplyTrigger::Regenerate).await;
        Ok(())
    }

    /// Copies the text of the message at `index` to the clipboard
    ///
    /// Pure side effect; session state is never touched.
    pub async fn copy(&self, index: usize) -> Result<()> {
        let text = {
            let state = self.shared.state.lock().await;
            state
                .messages
                .get(index)
                .ok_or(ChatsyncError::IndexOutOfBounds(index))?
                .text
                .clone()
        };
        self.shared.handles.clipboard.set_contents(&text)
    }

    /// Starts or stops reading the message at `index` aloud
    ///
    /// At most one utterance is active; starting a new one cancels any
    /// in-flight utterance first.
    pub async fn toggle_playback(&self, index: usize) -> Result<()> {
        let shared = &self.shared;
        let mut state = shared.state.lock().await;
        if state.playing == Some(index) {
            shared.handles.speech.cancel();
            state.playing = None;
        } else {
            if state.playing.is_some() {
                shared.handles.speech.cancel();
            }
            let text = state
                .messages
                .get(index)
                .ok_or(ChatsyncError::IndexOutOfBounds(index))?
                .text
                .clone();
            shared.handles.speech.speak(&text)?;
            state.playing = Some(index);
        }
        shared.publish(&mut state);
        Ok(())
    }

    /// Subscribes to render-state snapshots
    pub fn render_states(&self) -> watch::Receiver<RenderState> {
        self.render_rx.clone()
    }

    /// The latest render snapshot
    pub fn snapshot(&self) -> RenderState {
        self.render_rx.borrow().clone()
    }

    /// The session's resolved mode
    pub fn mode(&self) -> &SessionMode {
        &self.shared.mode
    }

    /// The bot this session talks to
    pub fn bot(&self) -> &BotProfile {
        &self.shared.bot
    }

    /// Tears the session down: aborts the feed pump, the reveal worker,
    /// and any pending reply, and cancels in-flight speech
    pub async fn close(mut self) {
        {
            let mut state = self.shared.state.lock().await;
            self.shared.cancel_pending_reply(&mut state);
        }
        self.shared.handles.speech.cancel();
        if let Some(task) = self.feed_task.take() {
            task.abort();
        }
        if let Some(task) = self.reveal_task.take() {
            task.abort();
        }
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        if let Some(task) = self.feed_task.take() {
            task.abort();
        }
        if let Some(task) = self.reveal_task.take() {
            task.abort();
        }
    }
}
