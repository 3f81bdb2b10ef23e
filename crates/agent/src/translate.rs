use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::llm::{ChatMessage, ChatRequest, LlmClient};

/// Pure text-to-text transform at the channel boundary. The controller
/// always reasons in the working language; voice channels translate in
/// both directions around it.
///
/// Contract: translation never fails a turn. On any error the input text
/// is passed through unchanged.
#[async_trait]
pub trait Translator: Send + Sync {
    /// Caller language -> working language.
    async fn to_working(&self, text: &str) -> String;
    /// Working language -> caller language.
    async fn to_caller(&self, text: &str) -> String;
}

/// Identity transform for deployments where the caller already speaks the
/// working language.
#[derive(Default)]
pub struct NoopTranslator;

#[async_trait]
impl Translator for NoopTranslator {
    async fn to_working(&self, text: &str) -> String {
        text.to_string()
    }

    async fn to_caller(&self, text: &str) -> String {
        text.to_string()
    }
}

pub struct LlmTranslator {
    client: Arc<dyn LlmClient>,
    caller_language: String,
    working_language: String,
}

impl LlmTranslator {
    pub fn new(
        client: Arc<dyn LlmClient>,
        caller_language: impl Into<String>,
        working_language: impl Into<String>,
    ) -> Self {
        Self {
            client,
            caller_language: caller_language.into(),
            working_language: working_language.into(),
        }
    }

    async fn translate(&self, text: &str, from: &str, to: &str) -> String {
        if text.trim().is_empty() {
            return text.to_string();
        }

        let request = ChatRequest {
            messages: vec![
                ChatMessage::system(format!(
                    "Translate {from} to {to} concisely. Preserve meaning and tone. Return only \
                     the translation."
                )),
                ChatMessage::user(text),
            ],
            tools: Vec::new(),
        };

        match self.client.complete(request).await {
            Ok(output) => match output.reply_text.filter(|reply| !reply.trim().is_empty()) {
                Some(reply) => reply.trim().to_string(),
                None => text.to_string(),
            },
            Err(error) => {
                warn!(
                    event_name = "agent.translate.failed",
                    error = %error,
                    "translation failed, passing text through unchanged"
                );
                text.to_string()
            }
        }
    }
}

#[async_trait]
impl Translator for LlmTranslator {
    async fn to_working(&self, text: &str) -> String {
        self.translate(text, &self.caller_language, &self.working_language).await
    }

    async fn to_caller(&self, text: &str) -> String {
        self.translate(text, &self.working_language, &self.caller_language).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::{LlmTranslator, NoopTranslator, Translator};
    use crate::llm::{ChatRequest, LlmClient, LlmError, RawEngineOutput};

    struct EchoClient;

    #[async_trait]
    impl LlmClient for EchoClient {
        async fn complete(&self, request: ChatRequest) -> Result<RawEngineOutput, LlmError> {
            let input = request.messages.last().map(|m| m.content.clone()).unwrap_or_default();
            Ok(RawEngineOutput {
                reply_text: Some(format!("translated<{input}>")),
                tool_call: None,
            })
        }
    }

    struct BrokenClient;

    #[async_trait]
    impl LlmClient for BrokenClient {
        async fn complete(&self, _request: ChatRequest) -> Result<RawEngineOutput, LlmError> {
            Err(LlmError::Transport("offline".to_string()))
        }
    }

    #[tokio::test]
    async fn noop_translator_is_identity() {
        let translator = NoopTranslator;
        assert_eq!(translator.to_working("shalom").await, "shalom");
        assert_eq!(translator.to_caller("hello").await, "hello");
    }

    #[tokio::test]
    async fn llm_translator_uses_engine_reply() {
        let translator = LlmTranslator::new(Arc::new(EchoClient), "he-IL", "en");
        assert_eq!(translator.to_working("shalom").await, "translated<shalom>");
    }

    #[tokio::test]
    async fn failures_pass_text_through_unchanged() {
        let translator = LlmTranslator::new(Arc::new(BrokenClient), "he-IL", "en");
        assert_eq!(translator.to_working("shalom").await, "shalom");
    }

    #[tokio::test]
    async fn empty_text_is_not_sent_for_translation() {
        let translator = LlmTranslator::new(Arc::new(BrokenClient), "he-IL", "en");
        assert_eq!(translator.to_caller("   ").await, "   ");
    }
}
