//! Error types for vivavoce.

use thiserror::Error;

/// Primary error type for all orchestrator operations.
#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Schema validation failed for tool '{tool_name}': {message}")]
    SchemaValidation { tool_name: String, message: String },

    #[error("Tool execution error: {tool_name}: {message}")]
    ToolExecution {
        tool_name: String,
        message: String,
        retryable: bool,
    },

    #[error("Speech bridge error: {0}")]
    SpeechBridge(String),

    #[error("Duplicate tool: {0}")]
    DuplicateTool(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// High-level classification used for diagnostics and retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorCategory {
    Configuration,
    Connection,
    Authentication,
    SchemaValidation,
    ToolExecution,
    SpeechBridge,
    Network,
    Timeout,
    State,
    Serialization,
    Io,
}

impl VoiceError {
    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Connection(_) => ErrorCategory::Connection,
            Self::Authentication(_) => ErrorCategory::Authentication,
            Self::SchemaValidation { .. } => ErrorCategory::SchemaValidation,
            Self::ToolExecution { .. } | Self::UnknownTool(_) | Self::DuplicateTool(_) => {
                ErrorCategory::ToolExecution
            }
            Self::SpeechBridge(_) => ErrorCategory::SpeechBridge,
            Self::Network(_) => ErrorCategory::Network,
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::InvalidState(_) => ErrorCategory::State,
            Self::Serialization(_) => ErrorCategory::Serialization,
            Self::Io(_) => ErrorCategory::Io,
        }
    }

    /// Whether this error is worth retrying (timeouts, transient network
    /// failures, 5xx-class tool responses).
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ToolExecution { retryable, .. } => *retryable,
            Self::Network(_) | Self::Timeout(_) => true,
            _ => false,
        }
    }

    /// Whether this error ends the session.
    ///
    /// Tool-level and schema errors are contained and converted into
    /// conversational content; everything connection-, auth-, or
    /// device-shaped propagates to the session lifecycle.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Configuration
                | ErrorCategory::Connection
                | ErrorCategory::Authentication
                | ErrorCategory::SpeechBridge
        )
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, VoiceError>;
