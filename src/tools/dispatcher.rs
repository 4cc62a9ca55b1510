//! Execute tool calls against the registry over HTTP.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::error::VoiceError;
use crate::util::retry::RetryPolicy;

use super::call::ToolCall;
use super::definition::{AuthMode, ToolDefinition};
use super::registry::ToolRegistry;
use super::validation::validate_arguments;

/// Structured result of a tool invocation: HTTP status plus parsed body.
/// The body is opaque beyond status-code classification.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutcome {
    pub status: u16,
    pub body: Value,
}

/// Dispatches agent-requested tool calls.
///
/// Validation failures are surfaced before any request is sent. Transport
/// failures are classified: timeouts and 5xx responses retry with
/// exponential backoff, 4xx responses fail immediately. The dispatcher
/// drives each call's monotone status sequence and emits no turn events
/// itself; the orchestrator records completion.
#[derive(Debug, Clone)]
pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
    client: reqwest::Client,
    call_timeout: Duration,
    retry: RetryPolicy,
}

impl ToolDispatcher {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            client: reqwest::Client::new(),
            call_timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
        }
    }

    /// Default per-call timeout, overridable per [`ToolCall`].
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Resolve, validate, and execute a call, transitioning its status.
    pub async fn invoke(&self, call: &mut ToolCall) -> Result<ToolOutcome, VoiceError> {
        let definition = match self.registry.resolve(call.name()) {
            Ok(definition) => definition,
            Err(err) => {
                call.fail()?;
                return Err(err);
            }
        };

        if let Err(message) = validate_arguments(call.arguments(), &definition.parameters) {
            call.fail()?;
            return Err(VoiceError::SchemaValidation {
                tool_name: definition.name.clone(),
                message,
            });
        }

        call.begin()?;
        let timeout = call.timeout().unwrap_or(self.call_timeout);
        let arguments = call.arguments().clone();

        let result = self
            .retry
            .execute(|| self.attempt(&definition, &arguments, timeout))
            .await;

        match &result {
            Ok(outcome) => {
                call.succeed()?;
                tracing::debug!(
                    tool = %definition.name,
                    request_id = %call.request_id(),
                    status = outcome.status,
                    "tool call succeeded"
                );
            }
            Err(err) => {
                call.fail()?;
                tracing::debug!(
                    tool = %definition.name,
                    request_id = %call.request_id(),
                    error = %err,
                    "tool call failed"
                );
            }
        }

        result
    }

    async fn attempt(
        &self,
        definition: &ToolDefinition,
        arguments: &Value,
        timeout: Duration,
    ) -> Result<ToolOutcome, VoiceError> {
        let rendered = definition.invocation.render(&definition.name, arguments)?;

        let mut request = self
            .client
            .request(rendered.method.as_reqwest(), &rendered.url)
            .timeout(timeout);
        if !rendered.query.is_empty() {
            request = request.query(&rendered.query);
        }
        if let Some(body) = &rendered.body {
            request = request.json(body);
        }
        request = match &definition.invocation.auth {
            AuthMode::Anonymous => request,
            AuthMode::Bearer { token } => request.bearer_auth(token),
            AuthMode::ApiKeyHeader { header, key } => request.header(header.as_str(), key.as_str()),
        };

        let response = match request.send().await {
            Ok(response) => response,
            Err(err) if err.is_timeout() => {
                return Err(VoiceError::Timeout(timeout.as_millis() as u64));
            }
            Err(err) => return Err(VoiceError::Network(err)),
        };

        let status = response.status();
        let text = response.text().await.map_err(VoiceError::Network)?;
        let body = match serde_json::from_str::<Value>(&text) {
            Ok(value) => value,
            Err(_) => Value::String(text),
        };

        if status.is_success() {
            Ok(ToolOutcome {
                status: status.as_u16(),
                body,
            })
        } else {
            Err(VoiceError::ToolExecution {
                tool_name: definition.name.clone(),
                message: format!("endpoint returned {status}"),
                retryable: status.is_server_error(),
            })
        }
    }
}
