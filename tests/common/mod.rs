//! Shared helpers and fakes for integration tests

#![allow(dead_code)]

use chatsync::backend::{ChatBackend, FeedEvent, FeedSubscription, MemoryBackend, RoomId};
use chatsync::clipboard::MemoryClipboard;
use chatsync::config::SessionConfig;
use chatsync::error::Result;
use chatsync::generator::TemplateGenerator;
use chatsync::message::{BotProfile, Message, Sender, SessionIdentity};
use chatsync::session::{ChatSession, RenderState, SessionHandles};
use chatsync::speech::SpeechSynthesizer;
use chatsync::store::MemorySessionStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Engine tuning fast enough for tests while still exercising the delays
pub fn fast_config() -> SessionConfig {
    SessionConfig {
        reply_delay_ms: 30,
        reveal_tick_ms: 1,
        anonymous_message_limit: 19,
        bot_name: "Nova".to_string(),
    }
}

/// Handle bundle around explicit backend/store fakes
pub fn handles_with(
    backend: Arc<dyn ChatBackend>,
    store: Arc<MemorySessionStore>,
) -> (SessionHandles, Arc<MemoryClipboard>, Arc<RecordingSpeech>) {
    let clipboard = Arc::new(MemoryClipboard::new());
    let speech = Arc::new(RecordingSpeech::default());
    let handles = SessionHandles {
        backend,
        store,
        generator: Arc::new(TemplateGenerator),
        speech: Arc::clone(&speech) as Arc<dyn SpeechSynthesizer>,
        clipboard: Arc::clone(&clipboard) as _,
    };
    (handles, clipboard, speech)
}

/// Polls render snapshots until `predicate` holds or three seconds pass
pub async fn wait_until<F>(session: &ChatSession, predicate: F) -> RenderState
where
    F: Fn(&RenderState) -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
    loop {
        let snapshot = session.snapshot();
        if predicate(&snapshot) {
            return snapshot;
        }
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for state; last snapshot: {:?}", snapshot);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Asserts the thread is in ascending date order
pub fn assert_ascending(messages: &[Message]) {
    for pair in messages.windows(2) {
        assert!(
            pair[0].date <= pair[1].date,
            "thread out of order: {:?} then {:?}",
            pair[0],
            pair[1]
        );
    }
}

/// The standard test identity
pub fn identity() -> SessionIdentity {
    SessionIdentity::new("7", "1", "2")
}

/// Speech fake that records utterances and cancellations
#[derive(Debug, Default)]
pub struct RecordingSpeech {
    spoken: Mutex<Vec<String>>,
    cancels: AtomicUsize,
}

impl RecordingSpeech {
    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }

    pub fn cancel_count(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }
}

impl SpeechSynthesizer for RecordingSpeech {
    fn speak(&self, text: &str) -> Result<()> {
        self.spoken.lock().unwrap().push(text.to_string());
        Ok(())
    }

    fn cancel(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
    }
}

/// Backend whose change feed is driven by the test instead of echoing
///
/// Storage calls delegate to a [`MemoryBackend`]; `subscribe` hands out a
/// channel the test pushes [`FeedEvent`]s into manually. This makes the
/// window between "write fired" and "echo applied" arbitrarily wide, which
/// the echo-only and reveal-then-append properties need.
pub struct ManualFeedBackend {
    inner: MemoryBackend,
    feed: Mutex<Option<mpsc::UnboundedSender<FeedEvent>>>,
}

impl ManualFeedBackend {
    pub fn new() -> Self {
        let inner = MemoryBackend::new();
        inner.add_bot(BotProfile::new("7", "Nova"));
        Self {
            inner,
            feed: Mutex::new(None),
        }
    }

    /// Pushes one event into the engine's subscription
    pub fn push(&self, event: FeedEvent) {
        let guard = self.feed.lock().unwrap();
        let tx = guard.as_ref().expect("no active subscription");
        tx.send(event).expect("engine dropped its feed");
    }

    /// Messages the backend holds for a room
    pub fn stored_messages(&self, room_id: &str) -> Vec<Message> {
        self.inner.stored_messages(room_id)
    }
}

#[async_trait]
impl ChatBackend for ManualFeedBackend {
    async fn find_or_create_room(
        &self,
        user_id: &str,
        identity: &SessionIdentity,
    ) -> Result<RoomId> {
        self.inner.find_or_create_room(user_id, identity).await
    }

    async fn bot_profile(&self, bot_id: &str) -> Result<BotProfile> {
        self.inner.bot_profile(bot_id).await
    }

    async fn list_messages(&self, room_id: &str) -> Result<Vec<Message>> {
        self.inner.list_messages(room_id).await
    }

    async fn insert_message(
        &self,
        room_id: &str,
        sender: Sender,
        text: &str,
        date: DateTime<Utc>,
    ) -> Result<Message> {
        self.inner.insert_message(room_id, sender, text, date).await
    }

    async fn update_message_text(&self, message_id: &str, text: &str) -> Result<()> {
        self.inner.update_message_text(message_id, text).await
    }

    async fn delete_messages_from(
        &self,
        room_id: &str,
        date_cutoff: DateTime<Utc>,
    ) -> Result<()> {
        self.inner.delete_messages_from(room_id, date_cutoff).await
    }

    async fn delete_messages_by_id_range(&self, room_id: &str, start_id: &str) -> Result<()> {
        self.inner
            .delete_messages_by_id_range(room_id, start_id)
            .await
    }

    async fn subscribe(&self, room_id: &str) -> Result<FeedSubscription> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.feed.lock().unwrap() = Some(tx);
        Ok(FeedSubscription::new(room_id, rx, None))
    }
}
