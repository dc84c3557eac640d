//! Language-model boundary.
//!
//! The runtime speaks in [`ChatMessage`]s and receives an [`LlmResponse`] that
//! carries either final text or one or more [`ToolCallRequest`]s. Providers that
//! implement the OpenAI-compatible chat-completions API (Mistral, OpenAI,
//! Ollama) share [`http::OpenAiCompatibleClient`].

pub mod http;
pub mod scripted;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::tools::registry::ToolSpec;

pub use http::OpenAiCompatibleClient;
pub use scripted::ScriptedLlmClient;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChatMessage {
    fn plain(role: MessageRole, content: impl Into<String>) -> Self {
        Self { role, content: content.into(), tool_calls: Vec::new(), tool_call_id: None, name: None }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(MessageRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(MessageRole::Assistant, content)
    }

    /// Assistant turn that requested tools; echoed back so the provider can
    /// match the following tool results by call id.
    pub fn assistant_tool_calls(content: impl Into<String>, calls: Vec<ToolCallRequest>) -> Self {
        Self { tool_calls: calls, ..Self::plain(MessageRole::Assistant, content) }
    }

    pub fn tool_result(call: &ToolCallRequest, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(call.id.clone()),
            name: Some(call.name.clone()),
            ..Self::plain(MessageRole::Tool, content)
        }
    }
}

/// One function call requested by the model. `arguments` is the raw JSON text.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

impl ToolCallRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: &Value) -> Self {
        Self { id: id.into(), name: name.into(), arguments: arguments.to_string() }
    }

    /// Malformed or non-object payloads degrade to an empty argument map.
    pub fn parsed_arguments(&self) -> Map<String, Value> {
        match serde_json::from_str::<Value>(&self.arguments) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct LlmResponse {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCallRequest>,
    pub total_tokens: Option<u32>,
}

impl LlmResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self { content: Some(content.into()), ..Self::default() }
    }

    pub fn with_tool_calls(tool_calls: Vec<ToolCallRequest>) -> Self {
        Self { tool_calls, ..Self::default() }
    }

    pub fn with_tokens(mut self, total_tokens: u32) -> Self {
        self.total_tokens = Some(total_tokens);
        self
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("language model request failed: {0}")]
    Transport(String),
    #[error("language model returned status {status}: {message}")]
    Status { status: u16, message: String, retryable: bool },
    #[error("language model response could not be decoded: {0}")]
    Decode(String),
    #[error("language model returned no choices")]
    EmptyChoices,
    #[error("language model client is misconfigured: {0}")]
    Configuration(String),
    #[error("scripted model has no response left for round {round}")]
    ScriptExhausted { round: usize },
}

impl LlmError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Status { retryable, .. } => *retryable,
            Self::Decode(_)
            | Self::EmptyChoices
            | Self::Configuration(_)
            | Self::ScriptExhausted { .. } => false,
        }
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// One chat-completions round with automatic tool selection.
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
    ) -> Result<LlmResponse, LlmError>;
}
