//! Tool definitions and HTTP invocation templates.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::VoiceError;

/// HTTP method for a tool invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_reqwest(&self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Post => reqwest::Method::POST,
            Self::Put => reqwest::Method::PUT,
            Self::Delete => reqwest::Method::DELETE,
        }
    }

    fn carries_body(&self) -> bool {
        matches!(self, Self::Post | Self::Put)
    }
}

/// How the tool endpoint authenticates requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AuthMode {
    Anonymous,
    Bearer { token: String },
    ApiKeyHeader { header: String, key: String },
}

/// A rendered, ready-to-send tool request.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedRequest {
    pub method: HttpMethod,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

/// Templated HTTP call for a tool.
///
/// `{placeholder}` tokens in the URL are substituted from the call's
/// arguments; remaining arguments become query parameters for bodyless
/// methods and a JSON body otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationTemplate {
    pub method: HttpMethod,
    pub url: String,
    pub auth: AuthMode,
}

impl InvocationTemplate {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            auth: AuthMode::Anonymous,
        }
    }

    pub fn with_auth(mut self, auth: AuthMode) -> Self {
        self.auth = auth;
        self
    }

    /// Render the template against concrete arguments.
    ///
    /// Arguments consumed by a URL placeholder do not reappear as query
    /// parameters or body fields. A placeholder with no matching argument
    /// is a validation failure surfaced before any request is made.
    pub fn render(&self, tool_name: &str, arguments: &Value) -> Result<RenderedRequest, VoiceError> {
        static PLACEHOLDER: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
        let placeholder = PLACEHOLDER
            .get_or_init(|| Regex::new(r"\{([A-Za-z0-9_]+)\}").expect("placeholder pattern compiles"));
        let args = arguments.as_object().cloned().unwrap_or_default();
        let mut remaining = args.clone();
        let mut missing: Option<String> = None;

        let url = placeholder
            .replace_all(&self.url, |caps: &regex::Captures<'_>| {
                let name = &caps[1];
                match args.get(name) {
                    Some(value) => {
                        remaining.remove(name);
                        scalar_to_string(value)
                    }
                    None => {
                        missing.get_or_insert_with(|| name.to_string());
                        String::new()
                    }
                }
            })
            .into_owned();

        if let Some(name) = missing {
            return Err(VoiceError::SchemaValidation {
                tool_name: tool_name.to_string(),
                message: format!("no argument for URL placeholder '{name}'"),
            });
        }

        let (query, body) = if self.method.carries_body() {
            let body = (!remaining.is_empty()).then(|| Value::Object(remaining));
            (Vec::new(), body)
        } else {
            let query = remaining
                .into_iter()
                .map(|(k, v)| (k, scalar_to_string(&v)))
                .collect();
            (query, None)
        };

        Ok(RenderedRequest {
            method: self.method,
            url,
            query,
            body,
        })
    }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// An immutable tool description: name, parameter schema, and how to call
/// the backing HTTP endpoint. Shared read-only once registered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema for the argument object.
    pub parameters: Value,
    pub invocation: InvocationTemplate,
}

impl ToolDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
        invocation: InvocationTemplate,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            invocation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn get_template_renders_query_parameters() {
        let template = InvocationTemplate::new(HttpMethod::Get, "https://api.test/latest");
        let request = template
            .render("get_rate", &json!({"base": "USD", "target": "EUR"}))
            .expect("render should succeed");

        assert_eq!(request.url, "https://api.test/latest");
        assert_eq!(request.query.len(), 2);
        assert!(request.body.is_none());
    }

    #[test]
    fn path_placeholders_consume_arguments() {
        let template = InvocationTemplate::new(HttpMethod::Get, "https://api.test/quote/{symbol}");
        let request = template
            .render("get_quote", &json!({"symbol": "MSFT", "detail": true}))
            .expect("render should succeed");

        assert_eq!(request.url, "https://api.test/quote/MSFT");
        assert_eq!(request.query, vec![("detail".to_string(), "true".to_string())]);
    }

    #[test]
    fn missing_placeholder_argument_is_a_validation_error() {
        let template = InvocationTemplate::new(HttpMethod::Get, "https://api.test/quote/{symbol}");
        let err = template
            .render("get_quote", &json!({}))
            .expect_err("render should fail");

        assert!(matches!(err, VoiceError::SchemaValidation { .. }));
    }

    #[test]
    fn post_template_renders_json_body() {
        let template = InvocationTemplate::new(HttpMethod::Post, "https://api.test/orders");
        let request = template
            .render("place_order", &json!({"symbol": "MSFT", "qty": 10}))
            .expect("render should succeed");

        assert!(request.query.is_empty());
        assert_eq!(request.body, Some(json!({"symbol": "MSFT", "qty": 10})));
    }
}
