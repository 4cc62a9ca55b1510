//! The bidirectional event stream to the remote agent backend.

pub mod ws;

pub use ws::WebSocketChannel;

use async_trait::async_trait;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::audio::AudioFrame;
use crate::error::VoiceError;

/// Messages the orchestrator sends to the agent backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// One captured frame, base64-encoded little-endian PCM16.
    UserAudio { audio: String, seq: u64 },
    /// Final transcript of a completed user turn.
    UserTranscript { text: String },
    /// Result of an agent-requested tool call.
    ToolResult { request_id: String, result: Value },
    /// Best-effort cancellation of an in-flight agent turn (barge-in).
    CancelTurn { turn_id: String },
}

impl OutboundMessage {
    pub fn user_audio(frame: &AudioFrame) -> Self {
        Self::UserAudio {
            audio: encode_pcm(frame.samples()),
            seq: frame.seq(),
        }
    }
}

/// Streamed agent output events received from the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    AgentTranscriptDelta { text: String },
    /// One synthesized frame, base64-encoded little-endian PCM16.
    AgentAudioDelta { audio: String, seq: u64 },
    ToolCallRequested {
        request_id: String,
        name: String,
        arguments: Value,
    },
    TurnEnded,
}

impl InboundMessage {
    /// Decode an `AgentAudioDelta` payload into a playable frame.
    pub fn decode_audio(&self, sample_rate: u32) -> Result<AudioFrame, VoiceError> {
        match self {
            Self::AgentAudioDelta { audio, seq } => decode_audio_payload(audio, sample_rate, *seq),
            other => Err(VoiceError::InvalidState(format!(
                "cannot decode audio from {other:?}"
            ))),
        }
    }
}

/// Decode a base64 PCM16 payload into a playable frame.
pub fn decode_audio_payload(
    audio: &str,
    sample_rate: u32,
    seq: u64,
) -> Result<AudioFrame, VoiceError> {
    Ok(AudioFrame::new(decode_pcm(audio)?, sample_rate, seq))
}

fn encode_pcm(samples: &[i16]) -> String {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

fn decode_pcm(encoded: &str) -> Result<Vec<i16>, VoiceError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| VoiceError::Connection(format!("malformed audio payload: {e}")))?;
    if bytes.len() % 2 != 0 {
        return Err(VoiceError::Connection(
            "malformed audio payload: odd byte length".into(),
        ));
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}

/// Duplex event stream keyed by agent and session.
///
/// Implementations own reconnection: a transient transport drop is healed
/// internally with bounded retries, so a `send` or `recv` error that reaches
/// the orchestrator means the channel is gone for good and is session-fatal.
#[async_trait]
pub trait AgentChannel: Send + Sync {
    /// Send one outbound message.
    async fn send(&self, message: OutboundMessage) -> Result<(), VoiceError>;

    /// Receive the next inbound message. `None` when the peer closed.
    async fn recv(&self) -> Result<Option<InboundMessage>, VoiceError>;

    /// Whether the protocol supports cancelling an in-flight agent turn.
    /// When it does not, barge-in marks the turn terminal locally only.
    fn supports_cancellation(&self) -> bool {
        false
    }

    /// Close the channel.
    async fn close(&self) -> Result<(), VoiceError>;
}
