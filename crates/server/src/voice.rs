//! Voice channel adapter: the webhook sequence a telephony gateway drives.
//!
//! An inbound call event opens a session keyed by the call id; every
//! transcribed utterance passes through the turn controller with the
//! translation boundary on both sides; call-status events mark sessions
//! ended. Replies render as speech markup (`markup` module).

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Form, Json, Router,
};
use cadence_agent::controller::TurnError;
use cadence_agent::prompt::permission_gate_greeting;
use cadence_agent::session::SessionStore;
use cadence_core::{ConversationState, Lead, LeadId, Phase, Turn};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::api::apply_lead_status;
use crate::bootstrap::AppState;
use crate::markup::{error_markup, hangup_markup, prompt_markup, SayAttrs};

const NO_RESPONSE_REPLY: &str =
    "I didn't catch anything there. Let's talk another time. Have a good day!";

#[derive(Clone)]
struct VoiceState {
    app: AppState,
    replayed: Arc<tokio::sync::Mutex<HashMap<String, String>>>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/voice/inbound", post(inbound))
        .route("/voice/turn", post(turn))
        .route("/voice/status", post(call_status))
        .with_state(VoiceState { app: state, replayed: Arc::new(Default::default()) })
}

fn xml_response(status: StatusCode, markup: String) -> Response {
    (status, [(header::CONTENT_TYPE, "application/xml")], markup).into_response()
}

fn turn_action_url(state: &AppState, call_sid: &str, lead_id: Option<&LeadId>, turn: u32) -> String {
    format!(
        "{}/voice/turn?call_sid={}&lead_id={}&turn={}",
        state.config.voice.callback_base_url,
        call_sid,
        lead_id.map(|id| id.0).unwrap_or(0),
        turn,
    )
}

fn log_transcript(state: &AppState, call_sid: &str, turn: u32, role: &str, text: &str) {
    if !state.config.logging.call_transcript {
        return;
    }
    let max_chars = state.config.logging.call_transcript_max_chars;
    let mut shown: String = text.chars().take(max_chars).collect();
    if shown.len() < text.len() {
        shown.push('…');
    }
    info!(
        event_name = "voice.transcript_turn",
        call_sid,
        turn,
        role,
        text = %shown,
        "call transcript turn"
    );
}

#[derive(Debug, Deserialize)]
struct InboundForm {
    #[serde(rename = "CallSid", default)]
    call_sid: String,
    #[serde(rename = "From", default)]
    from: String,
    #[serde(rename = "To", default)]
    to: String,
}

async fn inbound(State(state): State<VoiceState>, Form(form): Form<InboundForm>) -> Response {
    let app = &state.app;
    let attrs = SayAttrs::from(&app.config.voice);

    if form.call_sid.is_empty() {
        return xml_response(StatusCode::BAD_REQUEST, error_markup(&attrs));
    }
    if !app.llm_configured() {
        warn!(
            event_name = "voice.inbound.llm_unconfigured",
            call_sid = %form.call_sid,
            "rejecting call: language model is not configured"
        );
        return xml_response(StatusCode::OK, error_markup(&attrs));
    }

    let lead = resolve_lead_by_phone(app, &form.to, &form.from).await;
    info!(
        event_name = "voice.inbound.call_started",
        call_sid = %form.call_sid,
        lead_id = lead.as_ref().map(|l| l.id.0).unwrap_or(0),
        "inbound call leg started"
    );

    // First leg is deterministic: no reasoning call before the caller has
    // said anything.
    let greeting = permission_gate_greeting(lead.as_ref());

    let mut conversation =
        ConversationState::new(form.call_sid.clone(), lead.as_ref().map(|l| l.id.clone()));
    conversation.push_turn(Turn::agent(greeting.clone(), Utc::now()));
    if let Err(error) = app.controller.store().put(conversation).await {
        warn!(
            event_name = "voice.inbound.session_store_failed",
            call_sid = %form.call_sid,
            error = %error,
            "could not create call session"
        );
        return xml_response(StatusCode::SERVICE_UNAVAILABLE, error_markup(&attrs));
    }

    let caller_greeting = app.translator.to_caller(&greeting).await;
    log_transcript(app, &form.call_sid, 0, "agent", &caller_greeting);

    let action_url =
        turn_action_url(app, &form.call_sid, lead.as_ref().map(|l| &l.id), 1);
    xml_response(
        StatusCode::OK,
        prompt_markup(
            &caller_greeting,
            &attrs,
            &action_url,
            app.config.voice.record_max_length_secs,
            app.config.voice.record_silence_timeout_secs,
        ),
    )
}

async fn resolve_lead_by_phone(app: &AppState, to: &str, from: &str) -> Option<Lead> {
    for phone in [to, from] {
        if phone.trim().is_empty() {
            continue;
        }
        match app.leads.find_by_phone(phone).await {
            Ok(Some(lead)) => return Some(lead),
            Ok(None) => {}
            Err(error) => {
                warn!(
                    event_name = "voice.inbound.lead_lookup_failed",
                    error = %error,
                    "lead lookup failed, continuing without lead context"
                );
                return None;
            }
        }
    }
    None
}

#[derive(Debug, Deserialize)]
struct TurnQuery {
    #[serde(default)]
    call_sid: String,
    #[serde(default)]
    lead_id: i64,
    #[serde(default)]
    turn: u32,
}

#[derive(Debug, Deserialize)]
struct TurnForm {
    #[serde(rename = "SpeechResult", default)]
    speech: String,
    #[serde(rename = "CallSid", default)]
    call_sid: String,
}

async fn turn(
    State(state): State<VoiceState>,
    Query(query): Query<TurnQuery>,
    Form(form): Form<TurnForm>,
) -> Response {
    let app = &state.app;
    let attrs = SayAttrs::from(&app.config.voice);

    let call_sid =
        if query.call_sid.is_empty() { form.call_sid.clone() } else { query.call_sid.clone() };
    if call_sid.is_empty() {
        return xml_response(StatusCode::BAD_REQUEST, error_markup(&attrs));
    }

    let speech = form.speech.trim().to_string();

    // Gateways may deliver the same utterance twice; replay the first
    // answer rather than appending a duplicate turn.
    let idempotency_key = {
        let digest = Sha256::digest(speech.as_bytes());
        let digest_hex: String = digest.iter().map(|byte| format!("{byte:02x}")).collect();
        format!("{call_sid}:turn:{}:{digest_hex}", query.turn)
    };
    if let Some(markup) = state.replayed.lock().await.get(&idempotency_key) {
        return xml_response(StatusCode::OK, markup.clone());
    }

    if speech.is_empty() {
        let reply = app.translator.to_caller(NO_RESPONSE_REPLY).await;
        log_transcript(app, &call_sid, query.turn, "agent", &reply);
        let markup = hangup_markup(&reply, &attrs);
        state.replayed.lock().await.insert(idempotency_key, markup.clone());
        return xml_response(StatusCode::OK, markup);
    }

    let lead = if query.lead_id > 0 {
        match app.leads.find_by_id(&LeadId(query.lead_id)).await {
            Ok(lead) => lead,
            Err(error) => {
                warn!(
                    event_name = "voice.turn.lead_lookup_failed",
                    call_sid = %call_sid,
                    error = %error,
                    "lead lookup failed, continuing without lead context"
                );
                None
            }
        }
    } else {
        None
    };

    log_transcript(app, &call_sid, query.turn, "user", &speech);
    let utterance = app.translator.to_working(&speech).await;

    let outcome = match app.controller.process_turn(&call_sid, &utterance, lead.as_ref()).await {
        Ok(outcome) => outcome,
        Err(TurnError::SessionStore(detail)) => {
            warn!(
                event_name = "voice.turn.session_store_failed",
                call_sid = %call_sid,
                detail = %detail,
                "turn aborted: session store unavailable"
            );
            return xml_response(StatusCode::SERVICE_UNAVAILABLE, error_markup(&attrs));
        }
    };

    apply_lead_status(app, lead.as_ref(), &outcome).await;

    let caller_reply = app.translator.to_caller(&outcome.reply_text).await;
    log_transcript(app, &call_sid, query.turn, "agent", &caller_reply);

    let markup = match outcome.action.as_ref().map(|action| action.action_key()) {
        Some("end_call") | Some("book_meeting") => hangup_markup(&caller_reply, &attrs),
        _ => {
            let action_url =
                turn_action_url(app, &call_sid, lead.as_ref().map(|l| &l.id), query.turn + 1);
            prompt_markup(
                &caller_reply,
                &attrs,
                &action_url,
                app.config.voice.record_max_length_secs,
                app.config.voice.record_silence_timeout_secs,
            )
        }
    };

    state.replayed.lock().await.insert(idempotency_key, markup.clone());
    xml_response(StatusCode::OK, markup)
}

#[derive(Debug, Deserialize)]
struct StatusForm {
    #[serde(rename = "CallSid", default)]
    call_sid: String,
    #[serde(rename = "CallStatus", default)]
    call_status: String,
}

fn is_terminal_status(status: &str) -> bool {
    matches!(status, "completed" | "busy" | "failed" | "no-answer" | "canceled")
}

async fn call_status(State(state): State<VoiceState>, Form(form): Form<StatusForm>) -> Json<Value> {
    let app = &state.app;
    info!(
        event_name = "voice.status.received",
        call_sid = %form.call_sid,
        call_status = %form.call_status,
        "call status update"
    );

    if is_terminal_status(&form.call_status) && !form.call_sid.is_empty() {
        let store = app.controller.store();
        match store.get(&form.call_sid).await {
            Ok(Some(mut conversation)) if conversation.phase != Phase::Ended => {
                // A booked call that completes stays Booked; everything
                // else is closed out.
                if conversation.phase != Phase::Booked {
                    conversation.phase = Phase::Ended;
                }
                if let Err(error) = store.put(conversation).await {
                    warn!(
                        event_name = "voice.status.session_update_failed",
                        call_sid = %form.call_sid,
                        error = %error,
                        "could not mark session ended"
                    );
                }
            }
            Ok(_) => {}
            Err(error) => {
                warn!(
                    event_name = "voice.status.session_load_failed",
                    call_sid = %form.call_sid,
                    error = %error,
                    "could not load session for status update"
                );
            }
        }
    }

    Json(json!({ "status": "received" }))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use cadence_agent::session::SessionStore;
    use cadence_core::{ConversationState, Phase};
    use tower::ServiceExt;

    use crate::bootstrap::{bootstrap, AppState};
    use cadence_core::config::{ConfigOverrides, LoadOptions};

    async fn app_state(db_name: &str) -> AppState {
        let app = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(format!("sqlite:file:{db_name}?mode=memory&cache=shared")),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await
        .expect("bootstrap");
        app.state
    }

    fn form_request(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    async fn body_string(response: axum::response::Response) -> String {
        let bytes =
            axum::body::to_bytes(response.into_body(), usize::MAX).await.expect("body bytes");
        String::from_utf8(bytes.to_vec()).expect("utf8 body")
    }

    #[tokio::test]
    async fn inbound_call_greets_and_prompts_for_speech() {
        let state = app_state("voice_inbound").await;
        let router = super::router(state.clone());

        let response = router
            .oneshot(form_request("/voice/inbound", "CallSid=CA100&From=%2B15550100&To=%2B15550111"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let markup = body_string(response).await;
        assert!(markup.contains("<Say"));
        assert!(markup.contains("yes or no"));
        assert!(markup.contains("<Record"));
        assert!(markup.contains("call_sid=CA100"));

        let session = state
            .controller
            .store()
            .get("CA100")
            .await
            .expect("store get")
            .expect("session created");
        assert_eq!(session.history.len(), 1, "greeting is recorded as the first agent turn");
    }

    #[tokio::test]
    async fn empty_speech_hangs_up_politely() {
        let state = app_state("voice_empty_speech").await;
        let router = super::router(state);

        let response = router
            .oneshot(form_request("/voice/turn?call_sid=CA200&lead_id=0&turn=1", "SpeechResult="))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let markup = body_string(response).await;
        assert!(markup.contains("<Hangup/>"));
    }

    #[tokio::test]
    async fn duplicate_turn_deliveries_replay_the_same_markup() {
        let state = app_state("voice_idempotent").await;
        let router = super::router(state);

        let first = router
            .clone()
            .oneshot(form_request("/voice/turn?call_sid=CA300&lead_id=0&turn=2", "SpeechResult="))
            .await
            .expect("response");
        let first_markup = body_string(first).await;

        let second = router
            .oneshot(form_request("/voice/turn?call_sid=CA300&lead_id=0&turn=2", "SpeechResult="))
            .await
            .expect("response");
        let second_markup = body_string(second).await;

        assert_eq!(first_markup, second_markup);
    }

    #[tokio::test]
    async fn terminal_call_status_marks_the_session_ended() {
        let state = app_state("voice_status").await;
        state
            .controller
            .store()
            .put(ConversationState::new("CA400", None))
            .await
            .expect("seed session");

        let router = super::router(state.clone());
        let response = router
            .oneshot(form_request("/voice/status", "CallSid=CA400&CallStatus=completed"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let session = state
            .controller
            .store()
            .get("CA400")
            .await
            .expect("store get")
            .expect("session present");
        assert_eq!(session.phase, Phase::Ended);
    }
}
