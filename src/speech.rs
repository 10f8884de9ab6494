//! Read-aloud seam for the toggle-playback operation
//!
//! Text-to-speech playback itself is an external collaborator; the engine
//! only tracks which message is currently playing and guarantees at most one
//! utterance is active at a time.

use crate::error::Result;

/// Speaks message text aloud
///
/// Starting a new utterance must cancel any in-flight one; `cancel` on an
/// idle synthesizer is a no-op.
pub trait SpeechSynthesizer: Send + Sync {
    /// Starts speaking the given text, cancelling any in-flight utterance
    fn speak(&self, text: &str) -> Result<()>;

    /// Stops the in-flight utterance, if any
    fn cancel(&self);
}

/// Synthesizer that discards all utterances
///
/// Used where no audio device is wired up (tests, headless CLI runs).
#[derive(Debug, Default)]
pub struct NullSpeech;

impl SpeechSynthesizer for NullSpeech {
    fn speak(&self, text: &str) -> Result<()> {
        tracing::debug!("speech: would speak {} chars", text.chars().count());
        Ok(())
    }

    fn cancel(&self) {}
}
