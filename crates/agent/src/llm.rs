use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: ChatRole::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: ChatRole::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: ChatRole::Assistant, content: content.into() }
    }
}

/// A tool the reasoning engine may call. `parameters` is a JSON schema
/// fragment in the provider's function-calling format.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

#[derive(Clone, Debug, Default)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolSpec>,
}

/// Unvalidated tool invocation as the provider returned it. `arguments`
/// is `Value::Null` when the provider sent something that was not JSON.
#[derive(Clone, Debug, PartialEq)]
pub struct RawToolCall {
    pub name: String,
    pub arguments: Value,
}

/// Raw engine output before schema validation. Nothing in here is trusted
/// by the turn controller.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawEngineOutput {
    pub reply_text: Option<String>,
    pub tool_call: Option<RawToolCall>,
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("provider returned status {code}: {detail}")]
    Status { code: u16, detail: String },
    #[error("could not decode provider response: {0}")]
    Decode(String),
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: ChatRequest) -> Result<RawEngineOutput, LlmError>;
}
