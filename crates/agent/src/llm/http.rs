use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use carebook_core::config::LlmConfig;

use super::{ChatMessage, LlmClient, LlmError, LlmResponse, MessageRole, ToolCallRequest};
use crate::tools::registry::ToolSpec;

const RETRY_BASE_DELAY_MS: u64 = 250;

/// Chat-completions client for any OpenAI-compatible endpoint.
#[derive(Clone)]
pub struct OpenAiCompatibleClient {
    client: Client,
    completions_url: String,
    api_key: Option<SecretString>,
    model: String,
    max_retries: u32,
}

impl OpenAiCompatibleClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| LlmError::Configuration(error.to_string()))?;

        Ok(Self {
            client,
            completions_url: format!("{}/chat/completions", config.endpoint()),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_retries: config.max_retries,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn send_once(&self, body: &WireRequest<'_>) -> Result<LlmResponse, LlmError> {
        let mut request = self.client.post(&self.completions_url).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request.send().await.map_err(|error| {
            if error.is_timeout() {
                LlmError::Transport(format!("request timed out: {error}"))
            } else {
                LlmError::Transport(error.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read error body".to_string());
            return Err(map_http_error(status, &body));
        }

        let parsed: WireResponse =
            response.json().await.map_err(|error| LlmError::Decode(error.to_string()))?;
        parsed.into_response()
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatibleClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
    ) -> Result<LlmResponse, LlmError> {
        let body = WireRequest::new(&self.model, messages, tools);

        let mut attempt = 0;
        loop {
            match self.send_once(&body).await {
                Ok(response) => {
                    debug!(
                        event_name = "llm.completion",
                        model = %self.model,
                        tool_calls = response.tool_calls.len(),
                        total_tokens = response.total_tokens.unwrap_or_default(),
                        "completion received"
                    );
                    return Ok(response);
                }
                Err(error) if error.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = Duration::from_millis(RETRY_BASE_DELAY_MS << attempt.min(6));
                    warn!(
                        event_name = "llm.retry",
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "retrying completion"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
}

impl<'a> WireRequest<'a> {
    fn new(model: &'a str, messages: &[ChatMessage], tools: &'a [ToolSpec]) -> Self {
        Self {
            model,
            messages: messages.iter().map(WireMessage::from).collect(),
            tool_choice: (!tools.is_empty()).then_some("auto"),
            tools: tools
                .iter()
                .map(|spec| WireTool {
                    kind: "function",
                    function: WireFunction {
                        name: spec.name.as_str(),
                        description: spec.description,
                        parameters: &spec.parameters,
                    },
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
struct WireTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunction<'a>,
}

#[derive(Debug, Serialize)]
struct WireFunction<'a> {
    name: &'static str,
    description: &'static str,
    parameters: &'a Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

impl From<&ChatMessage> for WireMessage {
    fn from(message: &ChatMessage) -> Self {
        let tool_calls = (!message.tool_calls.is_empty()).then(|| {
            message
                .tool_calls
                .iter()
                .map(|call| WireToolCall {
                    id: call.id.clone(),
                    kind: Some("function".to_string()),
                    function: WireCallFunction {
                        name: call.name.clone(),
                        arguments: call.arguments.clone(),
                    },
                })
                .collect()
        });

        Self {
            role: message.role.as_str().to_string(),
            content: Some(message.content.clone()),
            tool_calls,
            tool_call_id: message.tool_call_id.clone(),
            name: if message.role == MessageRole::Tool { message.name.clone() } else { None },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    kind: Option<String>,
    function: WireCallFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireCallFunction {
    name: String,
    #[serde(default, deserialize_with = "arguments_as_text")]
    arguments: String,
}

/// Some providers send `arguments` as an object rather than JSON text.
fn arguments_as_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => text,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireMessage,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    #[serde(default)]
    total_tokens: Option<u32>,
}

impl WireResponse {
    fn into_response(self) -> Result<LlmResponse, LlmError> {
        let total_tokens = self.usage.and_then(|usage| usage.total_tokens);
        let message =
            self.choices.into_iter().next().map(|choice| choice.message).ok_or(LlmError::EmptyChoices)?;

        let tool_calls = message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| ToolCallRequest {
                id: call.id,
                name: call.function.name,
                arguments: call.function.arguments,
            })
            .collect();

        Ok(LlmResponse {
            content: message.content.filter(|content| !content.is_empty()),
            tool_calls,
            total_tokens,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

fn map_http_error(status: StatusCode, body: &str) -> LlmError {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|envelope| envelope.error.message)
        .unwrap_or_else(|_| body.chars().take(500).collect());

    let retryable = matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    );

    LlmError::Status { status: status.as_u16(), message, retryable }
}
