//! Render state handed to the presentation layer
//!
//! On every state change the engine publishes a full snapshot: the ordered
//! thread, the in-flight reveal (if any), playback state, and per-message
//! availability flags. The revision counter is the scroll-to-latest signal;
//! presentations scroll when they observe it advance.

use crate::message::{Message, Sender};

/// An assistant message mid-reveal
///
/// Exists only between acceptance of the message and the end of its
/// animation; the message itself is not yet part of the canonical list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimationState {
    /// Id of the message being revealed
    pub message_id: String,
    /// Prefix of the text revealed so far
    pub revealed: String,
}

/// Per-message operation availability for the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageFlags {
    /// Edit is offered on user messages
    pub can_edit: bool,
    /// Delete is offered on every message
    pub can_delete: bool,
    /// Regenerate targets assistant messages
    pub can_regenerate: bool,
    /// Whether this message is being read aloud
    pub is_playing: bool,
}

/// Snapshot of everything the presentation layer renders
#[derive(Debug, Clone, Default)]
pub struct RenderState {
    /// The canonical thread, date ascending
    pub messages: Vec<Message>,
    /// In-flight reveal, if any
    pub animation: Option<AnimationState>,
    /// Index of the message being read aloud, if any
    pub playing: Option<usize>,
    /// Whether a reply is pending or animating
    pub generating: bool,
    /// Monotonic change counter; advances on every publication
    pub revision: u64,
}

impl RenderState {
    /// Computes availability flags for each message in the snapshot
    pub fn flags(&self) -> Vec<MessageFlags> {
        self.messages
            .iter()
            .enumerate()
            .map(|(index, message)| MessageFlags {
                can_edit: message.sender == Sender::User,
                can_delete: true,
                can_regenerate: message.sender == Sender::Assistant,
                is_playing: self.playing == Some(index),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;

    #[test]
    fn test_flags_follow_sender() {
        let state = RenderState {
            messages: vec![
                Message::local(Sender::User, "hi"),
                Message::local(Sender::Assistant, "hello"),
            ],
            playing: Some(1),
            ..Default::default()
        };

        let flags = state.flags();
        assert!(flags[0].can_edit && !flags[0].can_regenerate);
        assert!(!flags[1].can_edit && flags[1].can_regenerate);
        assert!(flags.iter().all(|f| f.can_delete));
        assert!(!flags[0].is_playing && flags[1].is_playing);
    }

    #[test]
    fn test_default_state_is_idle() {
        let state = RenderState::default();
        assert!(state.messages.is_empty());
        assert!(state.animation.is_none());
        assert!(!state.generating);
        assert_eq!(state.revision, 0);
    }
}
