//! In-memory chat backend with a broadcast change feed
//!
//! A faithful double of the remote service for tests and offline demos:
//! writes commit into per-room vectors and echo back through per-room
//! broadcast channels, exactly like the real feed.

use super::{ChatBackend, FeedEvent, FeedSubscription, RoomId};
use crate::error::{ChatsyncError, Result};
use crate::message::{BotProfile, Message, SessionIdentity, Sender};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::{broadcast, mpsc};

const FEED_CAPACITY: usize = 256;

#[derive(Default)]
struct MemoryState {
    rooms: HashMap<RoomId, Vec<Message>>,
    room_index: HashMap<(String, SessionIdentity), RoomId>,
    bots: HashMap<String, BotProfile>,
    feeds: HashMap<RoomId, broadcast::Sender<FeedEvent>>,
    next_message: u64,
}

/// In-memory implementation of [`ChatBackend`]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
}

impl MemoryBackend {
    /// Creates an empty backend with no rooms or bots
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
        }
    }

    /// Registers a bot profile for `bot_profile` lookups
    pub fn add_bot(&self, profile: BotProfile) {
        let mut state = self.state.lock().unwrap();
        state.bots.insert(profile.id.clone(), profile);
    }

    /// Number of rooms created so far (test hook)
    pub fn room_count(&self) -> usize {
        self.state.lock().unwrap().rooms.len()
    }

    /// Snapshot of a room's stored messages (test hook)
    pub fn stored_messages(&self, room_id: &str) -> Vec<Message> {
        self.state
            .lock()
            .unwrap()
            .rooms
            .get(room_id)
            .cloned()
            .unwrap_or_default()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryState {
    fn feed(&mut self, room_id: &str) -> broadcast::Sender<FeedEvent> {
        self.feeds
            .entry(room_id.to_string())
            .or_insert_with(|| broadcast::channel(FEED_CAPACITY).0)
            .clone()
    }

    fn publish(&mut self, room_id: &str, event: FeedEvent) {
        // A send error just means nobody is subscribed yet.
        let _ = self.feed(room_id).send(event);
    }

    fn room_mut(&mut self, room_id: &str) -> Result<&mut Vec<Message>> {
        self.rooms
            .get_mut(room_id)
            .ok_or_else(|| ChatsyncError::Backend(format!("Unknown room: {}", room_id)).into())
    }
}

#[async_trait]
impl ChatBackend for MemoryBackend {
    async fn find_or_create_room(
        &self,
        user_id: &str,
        identity: &SessionIdentity,
    ) -> Result<RoomId> {
        let mut state = self.state.lock().unwrap();
        let key = (user_id.to_string(), identity.clone());
        if let Some(existing) = state.room_index.get(&key) {
            return Ok(existing.clone());
        }
        let room_id = uuid::Uuid::new_v4().to_string();
        state.rooms.insert(room_id.clone(), Vec::new());
        state.room_index.insert(key, room_id.clone());
        tracing::debug!("created room {} for {}", room_id, identity);
        Ok(room_id)
    }

    async fn bot_profile(&self, bot_id: &str) -> Result<BotProfile> {
        let state = self.state.lock().unwrap();
        state
            .bots
            .get(bot_id)
            .cloned()
            .ok_or_else(|| ChatsyncError::Backend(format!("Unknown bot: {}", bot_id)).into())
    }

    async fn list_messages(&self, room_id: &str) -> Result<Vec<Message>> {
        let mut state = self.state.lock().unwrap();
        Ok(state.room_mut(room_id)?.clone())
    }

    async fn insert_message(
        &self,
        room_id: &str,
        sender: Sender,
        text: &str,
        date: DateTime<Utc>,
    ) -> Result<Message> {
        let mut state = self.state.lock().unwrap();
        state.next_message += 1;
        // Zero-padded so id order is also insertion order.
        let message = Message::new(format!("m{:08}", state.next_message), sender, text, date);
        let room = state.room_mut(room_id)?;
        crate::message::insert_ordered(room, message.clone());
        state.publish(
            room_id,
            FeedEvent::Insert {
                message: message.clone(),
            },
        );
        Ok(message)
    }

    async fn update_message_text(&self, message_id: &str, text: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let mut touched_room = None;
        for (room_id, messages) in state.rooms.iter_mut() {
            if let Some(msg) = messages.iter_mut().find(|m| m.id == message_id) {
                msg.text = text.to_string();
                touched_room = Some(room_id.clone());
                break;
            }
        }
        let room_id = touched_room
            .ok_or_else(|| ChatsyncError::Backend(format!("Unknown message: {}", message_id)))?;
        state.publish(
            &room_id,
            FeedEvent::Update {
                id: message_id.to_string(),
                text: text.to_string(),
            },
        );
        Ok(())
    }

    async fn delete_messages_from(
        &self,
        room_id: &str,
        date_cutoff: DateTime<Utc>,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let room = state.room_mut(room_id)?;
        let removed: Vec<String> = room
            .iter()
            .filter(|m| m.date >= date_cutoff)
            .map(|m| m.id.clone())
            .collect();
        room.retain(|m| m.date < date_cutoff);
        for id in removed {
            state.publish(room_id, FeedEvent::Delete { id });
        }
        Ok(())
    }

    async fn delete_messages_by_id_range(&self, room_id: &str, start_id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let room = state.room_mut(room_id)?;
        let removed: Vec<String> = room
            .iter()
            .filter(|m| m.id.as_str() >= start_id)
            .map(|m| m.id.clone())
            .collect();
        room.retain(|m| m.id.as_str() < start_id);
        for id in removed {
            state.publish(room_id, FeedEvent::Delete { id });
        }
        Ok(())
    }

    async fn subscribe(&self, room_id: &str) -> Result<FeedSubscription> {
        let mut broadcast_rx = {
            let mut state = self.state.lock().unwrap();
            if !state.rooms.contains_key(room_id) {
                return Err(ChatsyncError::Backend(format!("Unknown room: {}", room_id)).into());
            }
            state.feed(room_id).subscribe()
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let pump = tokio::spawn(async move {
            loop {
                match broadcast_rx.recv().await {
                    Ok(event) => {
                        if tx.send(event).is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!("feed lagged, skipped {} events", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Ok(FeedSubscription::new(room_id, rx, Some(pump)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> SessionIdentity {
        SessionIdentity::new("7", "1", "2")
    }

    #[tokio::test]
    async fn test_find_or_create_room_is_idempotent() {
        let backend = MemoryBackend::new();
        let first = backend.find_or_create_room("u1", &identity()).await.unwrap();
        let second = backend.find_or_create_room("u1", &identity()).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(backend.room_count(), 1);
    }

    #[tokio::test]
    async fn test_distinct_pairs_get_distinct_rooms() {
        let backend = MemoryBackend::new();
        let a = backend.find_or_create_room("u1", &identity()).await.unwrap();
        let b = backend.find_or_create_room("u2", &identity()).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(backend.room_count(), 2);
    }

    #[tokio::test]
    async fn test_insert_echoes_through_feed() {
        let backend = MemoryBackend::new();
        let room = backend.find_or_create_room("u1", &identity()).await.unwrap();
        let mut sub = backend.subscribe(&room).await.unwrap();

        let inserted = backend
            .insert_message(&room, Sender::User, "hi", Utc::now())
            .await
            .unwrap();

        match sub.next_event().await {
            Some(FeedEvent::Insert { message }) => assert_eq!(message.id, inserted.id),
            other => panic!("expected insert echo, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_date_cutoff_delete_spares_earlier_messages() {
        let backend = MemoryBackend::new();
        let room = backend.find_or_create_room("u1", &identity()).await.unwrap();
        let base = Utc::now();
        backend
            .insert_message(&room, Sender::User, "one", base)
            .await
            .unwrap();
        let second = backend
            .insert_message(&room, Sender::Assistant, "two", base + chrono::Duration::seconds(1))
            .await
            .unwrap();
        backend
            .insert_message(&room, Sender::User, "three", base + chrono::Duration::seconds(2))
            .await
            .unwrap();

        backend.delete_messages_from(&room, second.date).await.unwrap();

        let remaining = backend.stored_messages(&room);
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].text, "one");
    }

    #[tokio::test]
    async fn test_id_range_delete() {
        let backend = MemoryBackend::new();
        let room = backend.find_or_create_room("u1", &identity()).await.unwrap();
        let base = Utc::now();
        backend
            .insert_message(&room, Sender::User, "one", base)
            .await
            .unwrap();
        let second = backend
            .insert_message(&room, Sender::Assistant, "two", base + chrono::Duration::seconds(1))
            .await
            .unwrap();
        backend
            .insert_message(&room, Sender::User, "three", base + chrono::Duration::seconds(2))
            .await
            .unwrap();

        backend
            .delete_messages_by_id_range(&room, &second.id)
            .await
            .unwrap();

        let remaining = backend.stored_messages(&room);
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].text, "one");
    }

    #[tokio::test]
    async fn test_update_echoes_and_persists() {
        let backend = MemoryBackend::new();
        let room = backend.find_or_create_room("u1", &identity()).await.unwrap();
        let msg = backend
            .insert_message(&room, Sender::User, "typo", Utc::now())
            .await
            .unwrap();
        let mut sub = backend.subscribe(&room).await.unwrap();

        backend.update_message_text(&msg.id, "fixed").await.unwrap();

        assert_eq!(backend.stored_messages(&room)[0].text, "fixed");
        match sub.next_event().await {
            Some(FeedEvent::Update { id, text }) => {
                assert_eq!(id, msg.id);
                assert_eq!(text, "fixed");
            }
            other => panic!("expected update echo, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_bot_is_backend_error() {
        let backend = MemoryBackend::new();
        assert!(backend.bot_profile("missing").await.is_err());
    }
}
