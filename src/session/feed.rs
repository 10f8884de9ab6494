//! Remote change-feed reconciliation
//!
//! Feed application is the sole path remote-origin messages take into local
//! state: the engine never optimistically inserts a remote message itself,
//! so the displayed list reflects exactly what the backend holds.

use super::SessionShared;
use crate::backend::{FeedEvent, FeedSubscription};
use crate::message::{insert_ordered, Sender};
use std::sync::Arc;

/// Applies feed events in arrival order until the feed closes
pub(super) async fn run_feed_pump(shared: Arc<SessionShared>, mut subscription: FeedSubscription) {
    while let Some(event) = subscription.next_event().await {
        apply_feed_event(&shared, event).await;
    }
    tracing::debug!("feed closed for room {}", subscription.room_id());
}

/// Applies one change-feed event to the in-memory thread
///
/// Update/delete targets that are absent locally are silently ignored: a
/// prior local removal raced the event, which is expected, not an error.
pub(super) async fn apply_feed_event(shared: &SessionShared, event: FeedEvent) {
    match event {
        FeedEvent::Insert { message } => {
            let mut state = shared.state.lock().await;
            if state.messages.iter().any(|m| m.id == message.id) {
                return;
            }
            match message.sender {
                Sender::Assistant => {
                    // Revealed before it joins the canonical list.
                    drop(state);
                    let _ = shared.reveal_tx.send(message);
                }
                Sender::User => {
                    insert_ordered(&mut state.messages, message);
                    shared.publish(&mut state);
                }
            }
        }
        FeedEvent::Update { id, text } => {
            let mut state = shared.state.lock().await;
            if let Some(message) = state.messages.iter_mut().find(|m| m.id == id) {
                message.text = text;
                shared.publish(&mut state);
            }
        }
        FeedEvent::Delete { id } => {
            let mut state = shared.state.lock().await;
            let before = state.messages.len();
            state.messages.retain(|m| m.id != id);
            if state.messages.len() != before {
                shared.publish(&mut state);
            }
        }
    }
}
