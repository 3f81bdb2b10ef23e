use std::time::Duration;

use async_trait::async_trait;
use cadence_core::config::{LlmConfig, LlmProvider};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::llm::{ChatRequest, ChatRole, LlmClient, LlmError, RawEngineOutput, RawToolCall};

const OPENAI_DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const MAX_REPLY_TOKENS: u32 = 300;

/// Chat-completions client for OpenAI-compatible providers (OpenAI itself
/// and Ollama's compatibility endpoint).
pub struct HttpLlmClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<SecretString>,
    model: String,
}

impl HttpLlmClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let base = match (&config.provider, &config.base_url) {
            (LlmProvider::OpenAi, Some(url)) => url.trim_end_matches('/').to_string(),
            (LlmProvider::OpenAi, None) => OPENAI_DEFAULT_BASE_URL.to_string(),
            (LlmProvider::Ollama, Some(url)) => format!("{}/v1", url.trim_end_matches('/')),
            (LlmProvider::Ollama, None) => {
                return Err(LlmError::Transport(
                    "ollama provider requires llm.base_url".to_string(),
                ))
            }
        };

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|err| LlmError::Transport(err.to_string()))?;

        Ok(Self {
            http,
            endpoint: format!("{base}/chat/completions"),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }

    fn request_body(&self, request: &ChatRequest) -> Value {
        let messages = request
            .messages
            .iter()
            .map(|message| {
                json!({
                    "role": match message.role {
                        ChatRole::System => "system",
                        ChatRole::User => "user",
                        ChatRole::Assistant => "assistant",
                    },
                    "content": message.content,
                })
            })
            .collect::<Vec<_>>();

        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": 0.7,
            "max_tokens": MAX_REPLY_TOKENS,
        });

        if !request.tools.is_empty() {
            let tools = request
                .tools
                .iter()
                .map(|tool| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": tool.name,
                            "description": tool.description,
                            "parameters": tool.parameters,
                        },
                    })
                })
                .collect::<Vec<_>>();
            body["tools"] = Value::Array(tools);
            body["tool_choice"] = Value::String("auto".to_string());
        }

        body
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(&self, request: ChatRequest) -> Result<RawEngineOutput, LlmError> {
        let mut http_request = self.http.post(&self.endpoint).json(&self.request_body(&request));
        if let Some(api_key) = &self.api_key {
            http_request = http_request.bearer_auth(api_key.expose_secret());
        }

        let response =
            http_request.send().await.map_err(|err| LlmError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(LlmError::Status { code: status.as_u16(), detail: truncate(&detail, 300) });
        }

        let completion: ChatCompletion =
            response.json().await.map_err(|err| LlmError::Decode(err.to_string()))?;

        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::Decode("completion contained no choices".to_string()))?;

        let tool_call = choice.message.tool_calls.and_then(|calls| calls.into_iter().next()).map(
            |call| RawToolCall {
                name: call.function.name,
                // Providers encode arguments as a JSON string; anything
                // unparseable surfaces as Null and fails schema validation
                // downstream instead of crashing the turn.
                arguments: serde_json::from_str(&call.function.arguments)
                    .unwrap_or(Value::Null),
            },
        );

        Ok(RawEngineOutput { reply_text: choice.message.content, tool_call })
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    text.chars().take(max_chars).collect()
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ChatToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ChatToolCall {
    function: ChatFunctionCall,
}

#[derive(Debug, Deserialize)]
struct ChatFunctionCall {
    name: String,
    arguments: String,
}
