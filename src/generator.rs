//! Reply generation seam
//!
//! The engine treats reply text as opaque: it asks the generator for a
//! string and inserts the result as an assistant message. The context tells
//! the generator which operation triggered the reply and what the transcript
//! currently holds, but nothing obliges it to look.

use crate::error::Result;
use crate::message::Message;
use async_trait::async_trait;

/// The operation that scheduled a reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyTrigger {
    /// A user message was sent
    Send,
    /// A user message was edited
    Edit,
    /// An assistant turn was deleted
    Delete,
    /// A turn was explicitly regenerated
    Regenerate,
}

/// Context handed to the generator for each scheduled reply
#[derive(Debug, Clone)]
pub struct ReplyContext {
    /// Bot display name
    pub bot_name: String,
    /// Operation that scheduled this reply
    pub trigger: ReplyTrigger,
    /// Transcript at scheduling time, date ascending
    pub transcript: Vec<Message>,
}

/// Produces assistant reply text
///
/// Implementations may be as simple as a fixed template or as involved as a
/// remote model call; the engine does not inspect or constrain the output.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    /// Generates reply text for the given context
    async fn generate(&self, ctx: &ReplyContext) -> Result<String>;
}

/// Template generator mirroring the stock bot responses
///
/// Varies the wording by trigger so a transcript shows which operation
/// produced each reply.
#[derive(Debug, Default)]
pub struct TemplateGenerator;

#[async_trait]
impl ReplyGenerator for TemplateGenerator {
    async fn generate(&self, ctx: &ReplyContext) -> Result<String> {
        let text = match ctx.trigger {
            ReplyTrigger::Send => format!("Response from {}", ctx.bot_name),
            ReplyTrigger::Edit => format!("New response after edit from {}", ctx.bot_name),
            ReplyTrigger::Delete => format!("New response after deletion from {}", ctx.bot_name),
            ReplyTrigger::Regenerate => format!("Regenerated response from {}", ctx.bot_name),
        };
        Ok(text)
    }
}

/// Builds the fixed welcome template for a bot
///
/// Generated exactly once per session, when the loaded thread is empty.
pub fn welcome_text(bot_name: &str) -> String {
    format!("안녕하세요! {}입니다. 무엇을 도와드릴까요?", bot_name)
}
