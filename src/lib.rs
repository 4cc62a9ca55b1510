//! Vivavoce: real-time voice session orchestration.
//!
//! Coordinates one spoken conversation between a human and a remote agent:
//! microphone capture, speech recognition, a duplex agent event channel,
//! concurrent HTTP tool calls, speech synthesis, and playback, with strict
//! turn ordering and sub-second barge-in.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use vivavoce::prelude::*;
//! use vivavoce::channel::ws::WebSocketChannel;
//! use vivavoce::tools::builtin;
//!
//! # async fn example(
//! #     recognizer: Arc<dyn vivavoce::speech::SpeechRecognizer>,
//! #     synthesizer: Arc<dyn vivavoce::speech::SpeechSynthesizer>,
//! #     capture: Box<dyn vivavoce::audio::AudioCapture>,
//! #     playback: Arc<dyn vivavoce::audio::AudioPlayback>,
//! # ) -> vivavoce::error::Result<()> {
//! let config = SessionConfig::new("concierge", "wss://agents.example.com/v1/session");
//!
//! let mut registry = ToolRegistry::new();
//! registry.register(builtin::currency_rate("https://rates.example.com"))?;
//!
//! let channel = WebSocketChannel::connect(
//!     &config.endpoint,
//!     &config.agent_id,
//!     uuid::Uuid::new_v4(),
//!     config.api_key.as_deref(),
//!     config.connect_attempts,
//! )
//! .await?;
//!
//! let deps = SessionDeps {
//!     channel: Arc::new(channel),
//!     recognizer,
//!     synthesizer,
//!     capture,
//!     playback,
//! };
//!
//! let mut session = SessionOrchestrator::connect(config, Arc::new(registry), deps).await?;
//! session.run().await?;
//! # Ok(())
//! # }
//! ```

pub mod audio;
pub mod channel;
pub mod config;
pub mod error;
pub mod prelude;
pub mod session;
pub mod speech;
pub mod tools;
pub mod turn;
pub mod util;
