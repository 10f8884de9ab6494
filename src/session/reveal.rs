//! Reveal animator
//!
//! A single cooperative worker drains a FIFO queue of assistant messages,
//! revealing each one character by character. Exactly one reveal is active
//! at any time; messages arriving mid-reveal wait their turn. A reveal runs
//! to completion once started.

use super::SessionShared;
use crate::message::{insert_ordered, Message};
use crate::session::render::AnimationState;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Runs the reveal worker until the job queue closes
///
/// Spawned once per session; the queue sender lives in the session's shared
/// state, so the worker ends when the session is dropped.
pub(super) async fn run_reveal_worker(
    shared: Arc<SessionShared>,
    mut jobs: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(message) = jobs.recv().await {
        reveal_one(&shared, message).await;
    }
    tracing::debug!("reveal worker stopped");
}

/// Reveals one message, then commits it to the canonical list
async fn reveal_one(shared: &SessionShared, message: Message) {
    {
        let mut state = shared.state.lock().await;
        // The feed can replay a message the list already holds; committing
        // it twice would violate the exactly-once display guarantee.
        if state.messages.iter().any(|m| m.id == message.id) {
            state.generating = false;
            shared.publish(&mut state);
            return;
        }
        state.animation = Some(AnimationState {
            message_id: message.id.clone(),
            revealed: String::new(),
        });
        shared.publish(&mut state);
    }

    for ch in message.text.chars() {
        {
            let mut state = shared.state.lock().await;
            if let Some(animation) = state.animation.as_mut() {
                animation.revealed.push(ch);
            }
            shared.publish(&mut state);
        }
        tokio::time::sleep(shared.config.reveal_tick()).await;
    }

    let mut state = shared.state.lock().await;
    insert_ordered(&mut state.messages, message);
    state.animation = None;
    state.generating = false;
    if let Err(e) = shared.persist_locked(&state) {
        tracing::warn!("failed to persist revealed message: {}", e);
    }
    // This publication bumps the revision, which is the scroll-to-latest
    // signal for the presentation layer.
    shared.publish(&mut state);
}
