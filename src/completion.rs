//! Chat completion client (OpenAI-compatible, OpenRouter by default)
//!
//! Uses a long-lived reqwest::Client for connection pooling. Provider error
//! bodies are logged here and replaced by an [`AiErrorKind`] before anything
//! leaves this module.

use crate::error::{AiErrorKind, BankingError};
use crate::Result;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{error, info};

pub const DEFAULT_MODEL: &str = "anthropic/claude-3.5-sonnet";
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<FunctionToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChatMessage {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
            name: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Result of `call` fed back to the model.
    pub fn tool_result(call: &FunctionToolCall, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: Some(call.id.clone()),
            name: Some(call.function.name.clone()),
        }
    }

    /// Trimmed text content, `None` when absent or blank.
    pub fn text(&self) -> Option<&str> {
        self.content
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_kind")]
    pub kind: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded arguments, as sent by the model
    #[serde(default)]
    pub arguments: String,
}

fn function_kind() -> String {
    "function".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionDefinition,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolDefinition {
    pub fn function(name: &str, description: &str, parameters: Value) -> Self {
        Self {
            kind: function_kind(),
            function: FunctionDefinition {
                name: name.to_string(),
                description: description.to_string(),
                parameters,
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "no_tools")]
    tools: &'a [ToolDefinition],
    stream: bool,
}

fn no_tools(tools: &&[ToolDefinition]) -> bool {
    tools.is_empty()
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

/// Chat completion backend.
#[async_trait::async_trait]
pub trait CompletionClient: Send + Sync {
    fn model(&self) -> &str;

    /// Returns the first choice's message.
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ChatMessage>;
}

pub fn classify_status(status: StatusCode) -> AiErrorKind {
    match status {
        StatusCode::TOO_MANY_REQUESTS => AiErrorKind::RateLimited,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AiErrorKind::Auth,
        StatusCode::BAD_REQUEST => AiErrorKind::BadRequest,
        StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => AiErrorKind::Unavailable,
        other => AiErrorKind::Status(other.as_u16()),
    }
}

/// Reusable OpenRouter client (connection-pooled)
pub struct OpenRouterClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenRouterClient {
    pub fn new(api_key: String, model: String, base_url: String, timeout: Duration) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(BankingError::Config(
                "OPENROUTER_API_KEY is not configured".to_string(),
            ));
        }

        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(timeout)
            .build()
            .map_err(|e| BankingError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait::async_trait]
impl CompletionClient for OpenRouterClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ChatMessage> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = CompletionRequest {
            model: &self.model,
            messages,
            tools,
            stream: false,
        };

        info!(
            model = %self.model,
            messages = messages.len(),
            tools = tools.len(),
            "Calling completion API"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Completion API request failed: {}", e);
                BankingError::Upstream(AiErrorKind::Unavailable)
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), body = %error_text, "Completion API error response");
            return Err(BankingError::Upstream(classify_status(status)));
        }

        let completion: CompletionResponse = response.json().await.map_err(|e| {
            error!("Failed to parse completion response: {}", e);
            BankingError::Upstream(AiErrorKind::InvalidResponse)
        })?;

        let message = completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| {
                error!("Completion response had no choices");
                BankingError::Upstream(AiErrorKind::InvalidResponse)
            })?;

        info!(tool_calls = message.tool_calls.len(), "Completion received");
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_mapping() {
        assert_eq!(classify_status(StatusCode::TOO_MANY_REQUESTS), AiErrorKind::RateLimited);
        assert_eq!(classify_status(StatusCode::FORBIDDEN), AiErrorKind::Auth);
        assert_eq!(classify_status(StatusCode::BAD_REQUEST), AiErrorKind::BadRequest);
        assert_eq!(classify_status(StatusCode::GATEWAY_TIMEOUT), AiErrorKind::Unavailable);
        assert_eq!(
            classify_status(StatusCode::INTERNAL_SERVER_ERROR),
            AiErrorKind::Status(500)
        );
    }

    #[test]
    fn test_request_shape() {
        let messages = vec![ChatMessage::system("sys"), ChatMessage::user("hi")];
        let tools = vec![ToolDefinition::function("get_balance", "Balance", json!({"type": "object"}))];

        let body = serde_json::to_value(CompletionRequest {
            model: "m",
            messages: &messages,
            tools: &tools,
            stream: false,
        })
        .unwrap();

        assert_eq!(body["messages"][1], json!({"role": "user", "content": "hi"}));
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "get_balance");

        let body = serde_json::to_value(CompletionRequest {
            model: "m",
            messages: &messages,
            tools: &[],
            stream: false,
        })
        .unwrap();
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn test_parses_tool_call_response() {
        let raw = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "deposit", "arguments": "{\"amount\": 50}"}
                    }]
                }
            }]
        });

        let parsed: CompletionResponse = serde_json::from_value(raw).unwrap();
        let message = &parsed.choices[0].message;
        assert_eq!(message.text(), None);
        assert_eq!(message.tool_calls[0].function.name, "deposit");

        let reply = ChatMessage::tool_result(&message.tool_calls[0], "{}");
        assert_eq!(reply.tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(reply.name.as_deref(), Some("deposit"));
    }

    #[test]
    fn test_missing_api_key_is_config_error() {
        let result = OpenRouterClient::new(
            "  ".to_string(),
            DEFAULT_MODEL.to_string(),
            DEFAULT_BASE_URL.to_string(),
            Duration::from_secs(30),
        );
        assert!(matches!(result, Err(BankingError::Config(_))));
    }
}
