//! Speech bridge capability traits.
//!
//! Recognition and synthesis are external capabilities consumed by the
//! orchestrator, not implemented here. Engine or device failure surfaces as
//! [`VoiceError::SpeechBridge`] and drains the session.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::audio::AudioFrame;
use crate::error::VoiceError;

/// Finite stream of synthesized frames. Dropping the stream cancels
/// synthesis mid-utterance.
pub type SynthesisStream = BoxStream<'static, Result<AudioFrame, VoiceError>>;

/// Incremental speech recognition, restartable per turn.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Feed one captured frame. Returns an incremental transcript delta
    /// when the engine has one ready.
    async fn accept_frame(&self, frame: &AudioFrame) -> Result<Option<String>, VoiceError>;

    /// Close the current utterance and return the final transcript.
    async fn finish(&self) -> Result<String, VoiceError>;

    /// Reset recognition state for the next turn.
    async fn reset(&self) -> Result<(), VoiceError>;
}

/// Text-to-speech synthesis.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize text into a finite stream of playable frames.
    async fn synthesize(&self, text: &str) -> Result<SynthesisStream, VoiceError>;
}
