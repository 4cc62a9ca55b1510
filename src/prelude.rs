//! Convenience re-exports for common use.

pub use crate::audio::{AudioCapture, AudioFrame, AudioPlayback};
pub use crate::channel::{AgentChannel, InboundMessage, OutboundMessage};
pub use crate::config::SessionConfig;
pub use crate::error::{Result, VoiceError};
pub use crate::session::{Session, SessionDeps, SessionOrchestrator, SessionState};
pub use crate::speech::{SpeechRecognizer, SpeechSynthesizer};
pub use crate::tools::{ToolCall, ToolCallStatus, ToolDefinition, ToolDispatcher, ToolRegistry};
pub use crate::turn::{Speaker, Turn, TurnEvent, TurnEventKind, TurnState};
