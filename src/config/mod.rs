//! Session configuration.
//!
//! All configuration is passed explicitly at session construction; the core
//! keeps no ambient or process-global state. `from_env` exists as a
//! convenience for binaries and loads a `.env` file when present.

use std::time::Duration;

use crate::error::VoiceError;

/// Configuration for one voice session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Identifier of the remote agent this session binds to.
    pub agent_id: String,
    /// Conversation channel endpoint (ws:// or wss://).
    pub endpoint: String,
    /// Credential presented when establishing the channel.
    pub api_key: Option<String>,
    /// PCM sample rate for capture and playback frames.
    pub sample_rate: u32,
    /// RMS energy above which a frame counts as voice activity (0.0 to 1.0).
    pub vad_energy_threshold: f32,
    /// Trailing silence that ends a user utterance.
    pub silence_timeout: Duration,
    /// Per-call timeout for tool HTTP invocations.
    pub tool_call_timeout: Duration,
    /// Channel connection attempts before surfacing a connection error.
    pub connect_attempts: u32,
    /// Tool names the agent declares; each must resolve in the registry
    /// before the session starts.
    pub required_tools: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            agent_id: String::new(),
            endpoint: String::new(),
            api_key: None,
            sample_rate: 16_000,
            vad_energy_threshold: 0.01,
            silence_timeout: Duration::from_millis(800),
            tool_call_timeout: Duration::from_secs(10),
            connect_attempts: 3,
            required_tools: Vec::new(),
        }
    }
}

impl SessionConfig {
    /// Create a config for the given agent and endpoint.
    pub fn new(agent_id: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    /// Load from environment variables (`VOICE_AGENT_ID`,
    /// `VOICE_AGENT_ENDPOINT`, `VOICE_AGENT_API_KEY`).
    pub fn from_env() -> Result<Self, VoiceError> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error

        let agent_id = std::env::var("VOICE_AGENT_ID")
            .map_err(|_| VoiceError::Configuration("VOICE_AGENT_ID is not set".into()))?;
        let endpoint = std::env::var("VOICE_AGENT_ENDPOINT")
            .map_err(|_| VoiceError::Configuration("VOICE_AGENT_ENDPOINT is not set".into()))?;

        let mut config = Self::new(agent_id, endpoint);
        config.api_key = std::env::var("VOICE_AGENT_API_KEY").ok();
        Ok(config)
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_silence_timeout(mut self, timeout: Duration) -> Self {
        self.silence_timeout = timeout;
        self
    }

    pub fn with_tool_call_timeout(mut self, timeout: Duration) -> Self {
        self.tool_call_timeout = timeout;
        self
    }

    pub fn with_required_tools<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_tools = names.into_iter().map(Into::into).collect();
        self
    }

    /// Check that the config is complete enough to start a session.
    pub fn validate(&self) -> Result<(), VoiceError> {
        if self.agent_id.is_empty() {
            return Err(VoiceError::Configuration("agent_id is empty".into()));
        }
        if self.endpoint.is_empty() {
            return Err(VoiceError::Configuration("endpoint is empty".into()));
        }
        if self.sample_rate == 0 {
            return Err(VoiceError::Configuration("sample_rate must be non-zero".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_tool_call_timeout_is_ten_seconds() {
        let config = SessionConfig::default();
        assert_eq!(config.tool_call_timeout, Duration::from_secs(10));
        assert_eq!(config.connect_attempts, 3);
    }

    #[test]
    fn validate_rejects_missing_fields() {
        let config = SessionConfig::default();
        assert!(matches!(
            config.validate(),
            Err(VoiceError::Configuration(_))
        ));

        let config = SessionConfig::new("agent-1", "wss://example.test/channel");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_methods_compose() {
        let config = SessionConfig::new("agent-1", "wss://example.test/channel")
            .with_api_key("secret")
            .with_silence_timeout(Duration::from_millis(500))
            .with_required_tools(["get_rate"]);

        assert_eq!(config.api_key.as_deref(), Some("secret"));
        assert_eq!(config.silence_timeout, Duration::from_millis(500));
        assert_eq!(config.required_tools, vec!["get_rate".to_string()]);
    }
}
