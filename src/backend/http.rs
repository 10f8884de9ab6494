//! HTTP implementation of the chat backend
//!
//! Talks to a plain JSON REST surface and consumes the per-room change feed
//! as a server-sent-event stream:
//!
//! - `POST /rooms/find-or-create` -- idempotent room resolution
//! - `GET  /bots/{id}` -- bot display profile
//! - `GET  /rooms/{id}/messages` -- full thread, date ascending
//! - `POST /rooms/{id}/messages` -- insert (echoed back via the feed)
//! - `PATCH /messages/{id}` -- text update
//! - `DELETE /rooms/{id}/messages?date_gte=..` / `?id_gte=..` -- range deletes
//! - `GET  /rooms/{id}/feed` -- SSE stream of [`FeedEvent`] JSON payloads

use super::{ChatBackend, FeedEvent, FeedSubscription, RoomId};
use crate::config::BackendConfig;
use crate::error::{ChatsyncError, Result};
use crate::message::{BotProfile, Message, SessionIdentity, Sender};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::Stream;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use url::Url;

/// Request body for idempotent room resolution
#[derive(Debug, Serialize)]
struct FindOrCreateRoomRequest<'a> {
    user_id: &'a str,
    bot_id: &'a str,
    category_id: &'a str,
    episode_id: &'a str,
}

/// Response body for room resolution
#[derive(Debug, Deserialize)]
struct RoomRow {
    room_id: RoomId,
}

/// One stored message as the backend serializes it
///
/// The role arrives as a free string and is validated into [`Sender`] at
/// this boundary; unknown roles never reach the engine.
#[derive(Debug, Serialize, Deserialize)]
struct MessageRow {
    id: String,
    text: String,
    role: String,
    date: DateTime<Utc>,
}

impl MessageRow {
    fn into_message(self) -> Result<Message> {
        let sender = match self.role.as_str() {
            "user" => Sender::User,
            "assistant" => Sender::Assistant,
            other => {
                return Err(
                    ChatsyncError::Backend(format!("Unknown message role: {}", other)).into(),
                )
            }
        };
        Ok(Message::new(self.id, sender, self.text, self.date))
    }
}

#[derive(Debug, Serialize)]
struct InsertMessageRequest<'a> {
    role: &'a str,
    text: &'a str,
    date: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct UpdateMessageRequest<'a> {
    text: &'a str,
}

/// HTTP client implementation of [`ChatBackend`]
pub struct HttpBackend {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
}

impl HttpBackend {
    /// Builds a client from backend configuration
    ///
    /// # Errors
    ///
    /// Returns `ChatsyncError::Config` when no base URL is configured or it
    /// does not parse, and `ChatsyncError::Backend` when the HTTP client
    /// cannot be constructed.
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let base = config
            .base_url
            .as_deref()
            .ok_or_else(|| ChatsyncError::Config("No backend base_url configured".to_string()))?;
        let base_url = Url::parse(base)
            .map_err(|e| ChatsyncError::Config(format!("Invalid backend base_url: {}", e)))?;
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ChatsyncError::Backend(format!("Failed to build client: {}", e)))?;
        Ok(Self {
            client,
            base_url,
            api_key: config.api_key.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| ChatsyncError::Backend(format!("Bad endpoint {}: {}", path, e)).into())
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    async fn check(&self, response: Response, context: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ChatsyncError::Backend(format!("{} failed ({}): {}", context, status, body)).into())
    }
}

#[async_trait]
impl ChatBackend for HttpBackend {
    async fn find_or_create_room(
        &self,
        user_id: &str,
        identity: &SessionIdentity,
    ) -> Result<RoomId> {
        let url = self.endpoint("rooms/find-or-create")?;
        let request = FindOrCreateRoomRequest {
            user_id,
            bot_id: &identity.bot_id,
            category_id: &identity.category_id,
            episode_id: &identity.episode_id,
        };
        let response = self
            .authorize(self.client.post(url).json(&request))
            .send()
            .await?;
        let row: RoomRow = self.check(response, "find-or-create room").await?.json().await?;
        Ok(row.room_id)
    }

    async fn bot_profile(&self, bot_id: &str) -> Result<BotProfile> {
        let url = self.endpoint(&format!("bots/{}", bot_id))?;
        let response = self.authorize(self.client.get(url)).send().await?;
        let profile: BotProfile = self.check(response, "bot profile").await?.json().await?;
        Ok(profile)
    }

    async fn list_messages(&self, room_id: &str) -> Result<Vec<Message>> {
        let url = self.endpoint(&format!("rooms/{}/messages", room_id))?;
        let response = self.authorize(self.client.get(url)).send().await?;
        let rows: Vec<MessageRow> = self.check(response, "list messages").await?.json().await?;
        rows.into_iter().map(MessageRow::into_message).collect()
    }

    async fn insert_message(
        &self,
        room_id: &str,
        sender: Sender,
        text: &str,
        date: DateTime<Utc>,
    ) -> Result<Message> {
        let url = self.endpoint(&format!("rooms/{}/messages", room_id))?;
        let request = InsertMessageRequest {
            role: sender.as_str(),
            text,
            date,
        };
        let response = self
            .authorize(self.client.post(url).json(&request))
            .send()
            .await?;
        let row: MessageRow = self.check(response, "insert message").await?.json().await?;
        row.into_message()
    }

    async fn update_message_text(&self, message_id: &str, text: &str) -> Result<()> {
        let url = self.endpoint(&format!("messages/{}", message_id))?;
        let request = UpdateMessageRequest { text };
        let response = self
            .authorize(self.client.patch(url).json(&request))
            .send()
            .await?;
        self.check(response, "update message").await?;
        Ok(())
    }

    async fn delete_messages_from(
        &self,
        room_id: &str,
        date_cutoff: DateTime<Utc>,
    ) -> Result<()> {
        let mut url = self.endpoint(&format!("rooms/{}/messages", room_id))?;
        url.query_pairs_mut()
            .append_pair("date_gte", &date_cutoff.to_rfc3339());
        let response = self.authorize(self.client.delete(url)).send().await?;
        self.check(response, "delete by date").await?;
        Ok(())
    }

    async fn delete_messages_by_id_range(&self, room_id: &str, start_id: &str) -> Result<()> {
        let mut url = self.endpoint(&format!("rooms/{}/messages", room_id))?;
        url.query_pairs_mut().append_pair("id_gte", start_id);
        let response = self.authorize(self.client.delete(url)).send().await?;
        self.check(response, "delete by id range").await?;
        Ok(())
    }

    async fn subscribe(&self, room_id: &str) -> Result<FeedSubscription> {
        let url = self.endpoint(&format!("rooms/{}/feed", room_id))?;
        let response = self
            .authorize(self.client.get(url).header("Accept", "text/event-stream"))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(ChatsyncError::Backend(format!("Unknown room: {}", room_id)).into());
        }
        let response = self.check(response, "subscribe").await?;

        let (tx, rx) = mpsc::unbounded_channel();
        let byte_stream = response.bytes_stream();
        let pump = tokio::spawn(async move {
            parse_feed_stream(byte_stream, tx).await;
        });

        Ok(FeedSubscription::new(room_id, rx, Some(pump)))
    }
}

/// Parses an SSE byte stream and forwards decoded feed events
///
/// Runs inside the subscription's pump task and consumes the stream until
/// it ends or errors, which closes the channel and thereby the feed.
///
/// SSE field processing:
///
/// - `event: ping` -- silently discarded (keepalive)
/// - `data:` lines -- joined, decoded as [`FeedEvent`] JSON; payloads that
///   fail validation are logged and skipped at this boundary
/// - `id:` / `retry:` -- ignored (reconnect is the caller's responsibility)
async fn parse_feed_stream(
    byte_stream: impl Stream<Item = reqwest::Result<Bytes>>,
    events: mpsc::UnboundedSender<FeedEvent>,
) {
    use futures::StreamExt;

    // Buffer accumulates raw bytes between `\n\n` boundaries.
    let mut buffer = String::new();

    tokio::pin!(byte_stream);

    while let Some(chunk_result) = byte_stream.next().await {
        let chunk = match chunk_result {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!("feed stream error: {}", e);
                break;
            }
        };

        let text = match std::str::from_utf8(&chunk) {
            Ok(s) => s,
            Err(_) => continue,
        };
        buffer.push_str(text);

        // SSE events are separated by blank lines (`\n\n`).
        while let Some(pos) = buffer.find("\n\n") {
            let block = buffer[..pos].to_string();
            buffer = buffer[pos + 2..].to_string();
            if forward_feed_block(&block, &events).is_err() {
                return;
            }
        }
    }

    // Process any remaining partial event in the buffer.
    if !buffer.is_empty() {
        let _ = forward_feed_block(&buffer, &events);
    }
}

/// Decodes one SSE event block and forwards the feed event, if any
///
/// Returns `Err` only when the receiving side is gone, which ends the pump.
fn forward_feed_block(
    block: &str,
    events: &mpsc::UnboundedSender<FeedEvent>,
) -> std::result::Result<(), ()> {
    match decode_feed_block(block) {
        Some(event) => events.send(event).map_err(|_| ()),
        None => Ok(()),
    }
}

/// Extracts a [`FeedEvent`] from one SSE event block, if it carries one
fn decode_feed_block(block: &str) -> Option<FeedEvent> {
    let mut data_lines: Vec<&str> = Vec::new();
    let mut event_type: Option<&str> = None;

    for line in block.lines() {
        if let Some(value) = line.strip_prefix("data:") {
            data_lines.push(value.trim());
        } else if let Some(value) = line.strip_prefix("event:") {
            event_type = Some(value.trim());
        }
        // `id:`/`retry:` fields and `:` comments are ignored.
    }

    if let Some(et) = event_type {
        if et.eq_ignore_ascii_case("ping") {
            return None;
        }
    }

    if data_lines.is_empty() {
        return None;
    }

    let data = data_lines.join("\n");
    match serde_json::from_str::<FeedEvent>(&data) {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::warn!("discarding malformed feed payload: {}", e);
            None
        }
    }
}
