use std::sync::Arc;
use std::time::Duration;

use cadence_core::{EndReason, Lead, Turn};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::llm::{ChatRequest, LlmClient, RawEngineOutput, RawToolCall};
use crate::prompt::{build_messages, tool_specs, EngineContext};

const RETRY_BASE_DELAY_MS: u64 = 300;
const RETRY_JITTER_MS: u64 = 250;

/// Validated intent extracted from a tool call. Distinct from
/// [`cadence_core::Action`]: an offer intent carries no slots because the
/// controller supplies authoritative availability.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActionIntent {
    OfferSlots { reason: String },
    BookMeeting { selected_start: DateTime<Utc>, duration_minutes: u32 },
    EndCall { reason: EndReason },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineDecision {
    pub reply_text: String,
    pub intent: Option<ActionIntent>,
}

#[derive(Debug, Error)]
pub enum EngineError {
    /// Transient transport/timeout/auth failure; already retried once.
    #[error("decision engine unavailable: {detail}")]
    Unavailable { detail: String },
    /// Response arrived but the claimed action did not validate. Retrying
    /// will not fix a schema violation, so this is surfaced immediately;
    /// `reply_text` preserves whatever usable text came with it.
    #[error("decision engine returned malformed output: {detail}")]
    MalformedOutput { detail: String, reply_text: Option<String> },
}

/// Wraps the opaque reasoning call: builds the instruction context,
/// invokes the LLM with a bounded timeout, and normalizes its output into
/// a typed decision.
pub struct DecisionEngine {
    client: Arc<dyn LlmClient>,
    timeout: Duration,
    max_retries: u32,
}

impl DecisionEngine {
    pub fn new(client: Arc<dyn LlmClient>, timeout: Duration, max_retries: u32) -> Self {
        Self { client, timeout, max_retries }
    }

    pub async fn decide(
        &self,
        lead: Option<&Lead>,
        history: &[Turn],
        context: &EngineContext,
    ) -> Result<EngineDecision, EngineError> {
        let request = ChatRequest {
            messages: build_messages(lead, history, context),
            tools: tool_specs(),
        };

        let mut attempt = 0;
        let raw = loop {
            match tokio::time::timeout(self.timeout, self.client.complete(request.clone())).await {
                Ok(Ok(raw)) => break raw,
                Ok(Err(error)) => {
                    if attempt >= self.max_retries {
                        return Err(EngineError::Unavailable { detail: error.to_string() });
                    }
                    warn!(
                        event_name = "agent.engine.retry",
                        attempt,
                        error = %error,
                        "reasoning call failed, retrying once"
                    );
                }
                Err(_) => {
                    if attempt >= self.max_retries {
                        return Err(EngineError::Unavailable {
                            detail: format!("timed out after {:?}", self.timeout),
                        });
                    }
                    warn!(
                        event_name = "agent.engine.retry",
                        attempt,
                        error = "timeout",
                        "reasoning call timed out, retrying once"
                    );
                }
            }
            attempt += 1;
            tokio::time::sleep(retry_backoff()).await;
        };

        validate(raw)
    }
}

fn retry_backoff() -> Duration {
    let jitter = rand::thread_rng().gen_range(0..RETRY_JITTER_MS);
    Duration::from_millis(RETRY_BASE_DELAY_MS + jitter)
}

/// Schema validation of the raw engine output. The closed tagged set is
/// the only path into the turn controller; unknown tool names map to a
/// plain reply plus a logged anomaly, never a dispatch failure.
fn validate(raw: RawEngineOutput) -> Result<EngineDecision, EngineError> {
    let reply_text = raw.reply_text.map(|text| text.trim().to_string()).filter(|t| !t.is_empty());

    let Some(tool_call) = raw.tool_call else {
        return Ok(EngineDecision {
            reply_text: reply_text
                .unwrap_or_else(|| "Sorry, I didn't catch that. Could you repeat?".to_string()),
            intent: None,
        });
    };

    match tool_call.name.as_str() {
        "offer_meeting_slots" => {
            let arguments = require_object(&tool_call, reply_text.clone())?;
            let reason =
                arguments.get("reason").and_then(Value::as_str).unwrap_or_default().to_string();
            Ok(EngineDecision {
                reply_text: reply_text.unwrap_or_default(),
                intent: Some(ActionIntent::OfferSlots { reason }),
            })
        }
        "book_meeting" => {
            let arguments = require_object(&tool_call, reply_text.clone())?;

            let selected_start = arguments
                .get("selected_start")
                .and_then(Value::as_str)
                .ok_or_else(|| EngineError::MalformedOutput {
                    detail: "book_meeting is missing `selected_start`".to_string(),
                    reply_text: reply_text.clone(),
                })
                .and_then(|value| {
                    DateTime::parse_from_rfc3339(value).map(|dt| dt.with_timezone(&Utc)).map_err(
                        |err| EngineError::MalformedOutput {
                            detail: format!("book_meeting `selected_start` is not RFC 3339: {err}"),
                            reply_text: reply_text.clone(),
                        },
                    )
                })?;

            let duration_minutes = arguments
                .get("duration_minutes")
                .and_then(Value::as_u64)
                .filter(|minutes| *minutes > 0 && *minutes <= u64::from(u32::MAX))
                .ok_or_else(|| EngineError::MalformedOutput {
                    detail: "book_meeting is missing a positive numeric `duration_minutes`"
                        .to_string(),
                    reply_text: reply_text.clone(),
                })? as u32;

            Ok(EngineDecision {
                reply_text: reply_text.unwrap_or_default(),
                intent: Some(ActionIntent::BookMeeting { selected_start, duration_minutes }),
            })
        }
        "end_call" => {
            let arguments = require_object(&tool_call, reply_text.clone())?;
            let reason_raw =
                arguments.get("reason").and_then(Value::as_str).unwrap_or_default();
            Ok(EngineDecision {
                reply_text: reply_text.unwrap_or_default(),
                intent: Some(ActionIntent::EndCall { reason: map_end_reason(reason_raw) }),
            })
        }
        unknown => {
            warn!(
                event_name = "agent.engine.unknown_tool",
                tool = unknown,
                "engine proposed an unknown action; discarding"
            );
            Ok(EngineDecision {
                reply_text: reply_text
                    .unwrap_or_else(|| "Sorry, I didn't catch that. Could you repeat?".to_string()),
                intent: None,
            })
        }
    }
}

fn require_object(
    tool_call: &RawToolCall,
    reply_text: Option<String>,
) -> Result<serde_json::Map<String, Value>, EngineError> {
    match &tool_call.arguments {
        Value::Object(map) => Ok(map.clone()),
        other => Err(EngineError::MalformedOutput {
            detail: format!("`{}` arguments are not a JSON object: {other}", tool_call.name),
            reply_text,
        }),
    }
}

fn map_end_reason(raw: &str) -> EndReason {
    let lowered = raw.to_ascii_lowercase();
    if lowered.contains("not interested") || lowered.contains("no interest") {
        EndReason::NotInterested
    } else {
        EndReason::Completed
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use cadence_core::EndReason;
    use serde_json::json;

    use super::{validate, ActionIntent, DecisionEngine, EngineError};
    use crate::llm::{ChatRequest, LlmClient, LlmError, RawEngineOutput, RawToolCall};
    use crate::prompt::EngineContext;

    struct FlakyClient {
        calls: AtomicUsize,
        fail_first: usize,
    }

    #[async_trait]
    impl LlmClient for FlakyClient {
        async fn complete(&self, _request: ChatRequest) -> Result<RawEngineOutput, LlmError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_first {
                return Err(LlmError::Transport("connection reset".to_string()));
            }
            Ok(RawEngineOutput { reply_text: Some("hello!".to_string()), tool_call: None })
        }
    }

    #[tokio::test]
    async fn transient_failure_is_retried_once() {
        let client = Arc::new(FlakyClient { calls: AtomicUsize::new(0), fail_first: 1 });
        let engine = DecisionEngine::new(client.clone(), Duration::from_secs(5), 1);

        let decision =
            engine.decide(None, &[], &EngineContext::default()).await.expect("retried ok");
        assert_eq!(decision.reply_text, "hello!");
        assert_eq!(client.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn repeated_failure_surfaces_unavailable() {
        let client = Arc::new(FlakyClient { calls: AtomicUsize::new(0), fail_first: 5 });
        let engine = DecisionEngine::new(client.clone(), Duration::from_secs(5), 1);

        let error = engine.decide(None, &[], &EngineContext::default()).await.expect_err("fails");
        assert!(matches!(error, EngineError::Unavailable { .. }));
        assert_eq!(client.calls.load(Ordering::SeqCst), 2, "exactly one retry");
    }

    #[test]
    fn plain_reply_with_no_tool_passes_through() {
        let decision = validate(RawEngineOutput {
            reply_text: Some("Interesting, tell me more.".to_string()),
            tool_call: None,
        })
        .expect("valid");
        assert_eq!(decision.reply_text, "Interesting, tell me more.");
        assert!(decision.intent.is_none());
    }

    #[test]
    fn empty_output_falls_back_to_clarifying_reply() {
        let decision =
            validate(RawEngineOutput { reply_text: None, tool_call: None }).expect("valid");
        assert!(!decision.reply_text.is_empty());
        assert!(decision.intent.is_none());
    }

    #[test]
    fn book_meeting_requires_numeric_duration() {
        let error = validate(RawEngineOutput {
            reply_text: Some("Booking that now".to_string()),
            tool_call: Some(RawToolCall {
                name: "book_meeting".to_string(),
                arguments: json!({
                    "selected_start": "2025-06-02T10:00:00Z",
                    "duration_minutes": "thirty"
                }),
            }),
        })
        .expect_err("malformed");

        match error {
            EngineError::MalformedOutput { reply_text, .. } => {
                assert_eq!(reply_text.as_deref(), Some("Booking that now"));
            }
            other => panic!("expected MalformedOutput, got {other:?}"),
        }
    }

    #[test]
    fn book_meeting_requires_rfc3339_start() {
        let error = validate(RawEngineOutput {
            reply_text: None,
            tool_call: Some(RawToolCall {
                name: "book_meeting".to_string(),
                arguments: json!({"selected_start": "tomorrow", "duration_minutes": 30}),
            }),
        })
        .expect_err("malformed");
        assert!(matches!(error, EngineError::MalformedOutput { .. }));
    }

    #[test]
    fn valid_book_meeting_parses() {
        let decision = validate(RawEngineOutput {
            reply_text: Some("Great, booking.".to_string()),
            tool_call: Some(RawToolCall {
                name: "book_meeting".to_string(),
                arguments: json!({
                    "selected_start": "2025-06-02T10:00:00Z",
                    "duration_minutes": 30
                }),
            }),
        })
        .expect("valid");

        match decision.intent {
            Some(ActionIntent::BookMeeting { duration_minutes, .. }) => {
                assert_eq!(duration_minutes, 30);
            }
            other => panic!("expected BookMeeting intent, got {other:?}"),
        }
    }

    #[test]
    fn unknown_tool_is_discarded_not_fatal() {
        let decision = validate(RawEngineOutput {
            reply_text: Some("Let me transfer you".to_string()),
            tool_call: Some(RawToolCall {
                name: "transfer_call".to_string(),
                arguments: json!({}),
            }),
        })
        .expect("valid");
        assert!(decision.intent.is_none());
        assert_eq!(decision.reply_text, "Let me transfer you");
    }

    #[test]
    fn end_call_reason_maps_to_closed_set() {
        let decision = validate(RawEngineOutput {
            reply_text: Some("Thanks for your time!".to_string()),
            tool_call: Some(RawToolCall {
                name: "end_call".to_string(),
                arguments: json!({"reason": "Not interested right now"}),
            }),
        })
        .expect("valid");
        assert_eq!(
            decision.intent,
            Some(ActionIntent::EndCall { reason: EndReason::NotInterested })
        );
    }

    #[test]
    fn non_object_arguments_are_malformed() {
        let error = validate(RawEngineOutput {
            reply_text: None,
            tool_call: Some(RawToolCall {
                name: "offer_meeting_slots".to_string(),
                arguments: serde_json::Value::Null,
            }),
        })
        .expect_err("malformed");
        assert!(matches!(error, EngineError::MalformedOutput { .. }));
    }
}
