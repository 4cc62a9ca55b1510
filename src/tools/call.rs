//! Tool calls and their monotone status transitions.

use std::time::Duration;

use serde_json::Value;

use crate::error::VoiceError;

/// Lifecycle status of a tool call.
///
/// The only legal sequences are prefixes of
/// `Pending, Executing, {Succeeded | Failed}`, with `Failed` also reachable
/// directly from `Pending` for calls rejected before execution begins
/// (schema validation, unknown tool).
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ToolCallStatus {
    Pending,
    Executing,
    Succeeded,
    Failed,
}

impl ToolCallStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// A request, emitted by the agent, to execute a registered tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    request_id: String,
    name: String,
    arguments: Value,
    status: ToolCallStatus,
    timeout: Option<Duration>,
}

impl ToolCall {
    pub fn new(request_id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            request_id: request_id.into(),
            name: name.into(),
            arguments,
            status: ToolCallStatus::Pending,
            timeout: None,
        }
    }

    /// Override the dispatcher's default per-call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arguments(&self) -> &Value {
        &self.arguments
    }

    pub fn status(&self) -> ToolCallStatus {
        self.status
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Transition `Pending` to `Executing`.
    pub fn begin(&mut self) -> Result<(), VoiceError> {
        self.transition(ToolCallStatus::Executing)
    }

    /// Transition `Executing` to `Succeeded`.
    pub fn succeed(&mut self) -> Result<(), VoiceError> {
        self.transition(ToolCallStatus::Succeeded)
    }

    /// Transition `Pending` or `Executing` to `Failed`.
    pub fn fail(&mut self) -> Result<(), VoiceError> {
        self.transition(ToolCallStatus::Failed)
    }

    fn transition(&mut self, next: ToolCallStatus) -> Result<(), VoiceError> {
        use ToolCallStatus::*;
        let legal = matches!(
            (self.status, next),
            (Pending, Executing) | (Executing, Succeeded) | (Executing, Failed) | (Pending, Failed)
        );
        if !legal {
            return Err(VoiceError::InvalidState(format!(
                "tool call {} cannot move {} -> {next}",
                self.request_id, self.status
            )));
        }
        self.status = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call() -> ToolCall {
        ToolCall::new("req-1", "get_rate", json!({"base": "USD", "target": "EUR"}))
    }

    #[test]
    fn happy_path_is_pending_executing_succeeded() {
        let mut call = call();
        assert_eq!(call.status(), ToolCallStatus::Pending);
        call.begin().expect("begin");
        assert_eq!(call.status(), ToolCallStatus::Executing);
        call.succeed().expect("succeed");
        assert!(call.is_terminal());
    }

    #[test]
    fn failure_is_reachable_without_executing() {
        let mut call = call();
        call.fail().expect("pending call can fail on validation");
        assert_eq!(call.status(), ToolCallStatus::Failed);
    }

    #[test]
    fn terminal_calls_reject_further_transitions() {
        let mut call = call();
        call.begin().expect("begin");
        call.succeed().expect("succeed");

        assert!(call.fail().is_err());
        assert!(call.begin().is_err());
        assert!(call.succeed().is_err());
    }

    #[test]
    fn success_requires_execution() {
        let mut call = call();
        assert!(call.succeed().is_err());
        assert_eq!(call.status(), ToolCallStatus::Pending);
    }
}
