//! Text channel and directory endpoints.
//!
//! `POST /agent/turn` is the synchronous request/response surface of the
//! turn controller; the remaining routes expose leads and meetings.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use cadence_agent::controller::{TurnError, TurnOutcome};
use cadence_agent::session::SessionStore;
use cadence_core::{ConversationState, Lead, LeadId, LeadStatus, Speaker, Turn};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::bootstrap::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/agent/turn", post(agent_turn))
        .route("/leads", get(list_leads).post(create_lead))
        .route("/meetings", get(list_meetings))
        .with_state(state)
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    ServiceUnavailable(String),
    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": "cadence",
        "description": "Outbound sales dialogue controller - qualifies leads and books meetings",
        "endpoints": {
            "agent_turn": "/agent/turn",
            "leads": "/leads",
            "meetings": "/meetings",
            "outbound_call": "/outbound/call",
            "outbound_campaign": "/outbound/campaign",
            "voice_inbound": "/voice/inbound",
            "voice_turn": "/voice/turn",
            "voice_status": "/voice/status",
        },
    }))
}

#[derive(Debug, Deserialize)]
pub struct AgentTurnRequest {
    pub session_id: Option<String>,
    pub lead_id: Option<i64>,
    pub user_utterance: String,
    pub history: Option<Vec<HistoryTurn>>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryTurn {
    pub speaker: String,
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct AgentTurnResponse {
    pub session_id: String,
    pub reply_text: String,
    pub action: Option<&'static str>,
    pub action_payload: Option<Value>,
}

async fn agent_turn(
    State(state): State<AppState>,
    Json(request): Json<AgentTurnRequest>,
) -> Result<Json<AgentTurnResponse>, ApiError> {
    if !state.llm_configured() {
        return Err(ApiError::ServiceUnavailable(
            "the language model is not configured".to_string(),
        ));
    }

    let lead = match request.lead_id {
        Some(raw_id) => {
            let lead_id = LeadId(raw_id);
            let found = state
                .leads
                .find_by_id(&lead_id)
                .await
                .map_err(|err| ApiError::ServiceUnavailable(err.to_string()))?;
            Some(found.ok_or_else(|| ApiError::NotFound(format!("lead {raw_id} not found")))?)
        }
        None => None,
    };

    let session_id = request
        .session_id
        .clone()
        .or_else(|| request.lead_id.map(|id| format!("lead-{id}")))
        .unwrap_or_else(|| format!("text-{}", Uuid::new_v4()));

    // The session store is authoritative; caller-provided history only
    // seeds a session the store has never seen.
    if let Some(history) = &request.history {
        seed_session(&state, &session_id, lead.as_ref(), history)
            .await
            .map_err(|err| ApiError::ServiceUnavailable(err.to_string()))?;
    }

    let outcome = state
        .controller
        .process_turn(&session_id, &request.user_utterance, lead.as_ref())
        .await
        .map_err(|err| match err {
            TurnError::SessionStore(detail) => ApiError::ServiceUnavailable(detail),
        })?;

    apply_lead_status(&state, lead.as_ref(), &outcome).await;

    Ok(Json(AgentTurnResponse {
        session_id,
        action: outcome.action.as_ref().map(|action| action.action_key()),
        reply_text: outcome.reply_text,
        action_payload: outcome.action_payload,
    }))
}

async fn seed_session(
    state: &AppState,
    session_id: &str,
    lead: Option<&Lead>,
    history: &[HistoryTurn],
) -> Result<(), cadence_agent::session::SessionStoreError> {
    let store = state.controller.store();
    if store.get(session_id).await?.is_some() {
        return Ok(());
    }

    let mut conversation =
        ConversationState::new(session_id, lead.map(|lead| lead.id.clone()));
    let now = Utc::now();
    for turn in history {
        let speaker = match turn.speaker.as_str() {
            "user" => Speaker::User,
            "agent" | "assistant" => Speaker::Agent,
            other => {
                warn!(
                    event_name = "api.turn.unknown_speaker",
                    speaker = other,
                    "skipping history entry with unknown speaker"
                );
                continue;
            }
        };
        conversation.push_turn(Turn { speaker, text: turn.text.clone(), timestamp: now });
    }
    store.put(conversation).await
}

/// Lead status tracking follows the structured outcome; failures only log.
pub(crate) async fn apply_lead_status(state: &AppState, lead: Option<&Lead>, outcome: &TurnOutcome) {
    let Some(lead) = lead else { return };
    let new_status = match outcome.action.as_ref().map(|action| action.action_key()) {
        Some("book_meeting") => Some(LeadStatus::MeetingBooked),
        Some("end_call") => {
            let not_interested = outcome
                .action_payload
                .as_ref()
                .and_then(|payload| payload.get("reason"))
                .and_then(Value::as_str)
                == Some("not_interested");
            not_interested.then_some(LeadStatus::NotInterested)
        }
        _ => None,
    };

    if let Some(status) = new_status {
        if let Err(error) = state.leads.update_status(&lead.id, status).await {
            warn!(
                event_name = "api.lead_status.update_failed",
                lead_id = %lead.id,
                error = %error,
                "failed to record lead status"
            );
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateLeadRequest {
    pub name: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub role: String,
    pub phone: String,
    pub notes: Option<String>,
}

async fn create_lead(
    State(state): State<AppState>,
    Json(request): Json<CreateLeadRequest>,
) -> Result<(StatusCode, Json<Lead>), ApiError> {
    let lead = state
        .leads
        .create(cadence_db::repositories::NewLead {
            name: request.name,
            company: request.company,
            role: request.role,
            phone: request.phone,
            notes: request.notes,
        })
        .await
        .map_err(|err| ApiError::ServiceUnavailable(err.to_string()))?;

    Ok((StatusCode::CREATED, Json(lead)))
}

async fn list_leads(State(state): State<AppState>) -> Result<Json<Vec<Lead>>, ApiError> {
    let leads =
        state.leads.list().await.map_err(|err| ApiError::ServiceUnavailable(err.to_string()))?;
    Ok(Json(leads))
}

async fn list_meetings(
    State(state): State<AppState>,
) -> Result<Json<Vec<cadence_core::Meeting>>, ApiError> {
    let meetings =
        state.meetings.list().await.map_err(|err| ApiError::ServiceUnavailable(err.to_string()))?;
    Ok(Json(meetings))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use cadence_core::config::{ConfigOverrides, LlmProvider, LoadOptions};
    use tower::ServiceExt;

    use crate::bootstrap::bootstrap;

    fn options(db_name: &str, llm_provider: Option<LlmProvider>) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(format!("sqlite:file:{db_name}?mode=memory&cache=shared")),
                llm_provider,
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    fn json_request(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    #[tokio::test]
    async fn agent_turn_requires_a_configured_llm() {
        // The openai provider with no api key counts as unconfigured.
        let app = bootstrap(options("api_llm_check", Some(LlmProvider::OpenAi))).await.expect("bootstrap");
        let router = super::router(app.state.clone());

        let response = router
            .oneshot(json_request(
                "/agent/turn",
                serde_json::json!({"user_utterance": "Hello"}),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        app.db_pool.close().await;
    }

    #[tokio::test]
    async fn agent_turn_rejects_unknown_leads() {
        let app = bootstrap(options("api_unknown_lead", None)).await.expect("bootstrap");
        let router = super::router(app.state.clone());

        let response = router
            .oneshot(json_request(
                "/agent/turn",
                serde_json::json!({"lead_id": 999, "user_utterance": "Hello"}),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        app.db_pool.close().await;
    }

    #[tokio::test]
    async fn leads_can_be_created_and_listed() {
        let app = bootstrap(options("api_leads_crud", None)).await.expect("bootstrap");

        let created = super::router(app.state.clone())
            .oneshot(json_request(
                "/leads",
                serde_json::json!({
                    "name": "Gal Miles",
                    "company": "Sales Corp",
                    "role": "VP Sales",
                    "phone": "+15550100",
                }),
            ))
            .await
            .expect("response");
        assert_eq!(created.status(), StatusCode::CREATED);

        let listed = super::router(app.state.clone())
            .oneshot(Request::builder().uri("/leads").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(listed.status(), StatusCode::OK);

        let bytes =
            axum::body::to_bytes(listed.into_body(), usize::MAX).await.expect("body bytes");
        let leads: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(leads.as_array().map(Vec::len), Some(1));
        assert_eq!(leads[0]["name"], "Gal Miles");

        app.db_pool.close().await;
    }

    #[tokio::test]
    async fn root_lists_the_public_endpoints() {
        let app = bootstrap(options("api_root", None)).await.expect("bootstrap");
        let router = super::router(app.state.clone());

        let response = router
            .oneshot(Request::builder().uri("/").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let bytes =
            axum::body::to_bytes(response.into_body(), usize::MAX).await.expect("body bytes");
        let payload: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(payload["service"], "cadence");
        assert!(payload["endpoints"]["agent_turn"].is_string());

        app.db_pool.close().await;
    }
}
