//! Outbound call initiation. A campaign is a plain iteration over the
//! lead list; per-call scheduling beyond that is out of scope.

use axum::{
    extract::{Query, State},
    routing::post,
    Json, Router,
};
use cadence_core::config::VoiceConfig;
use cadence_core::{Lead, LeadId, LeadStatus};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{info, warn};

use crate::api::ApiError;
use crate::bootstrap::AppState;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("gateway returned status {code}: {detail}")]
    Status { code: u16, detail: String },
}

/// REST client for the telephony gateway's call-origination API.
pub struct HttpVoiceGateway {
    http: reqwest::Client,
    base_url: String,
    account: String,
    token: SecretString,
    caller_id: String,
}

impl HttpVoiceGateway {
    /// Returns `None` when gateway credentials are absent; outbound
    /// endpoints then answer with a dry-run payload.
    pub fn from_config(config: &VoiceConfig) -> Option<Self> {
        if !config.gateway_configured() {
            return None;
        }
        let base_url = config.gateway_base_url.clone()?;

        Some(Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            account: config.gateway_account.clone()?,
            token: config.gateway_token.clone()?,
            caller_id: config.caller_id.clone()?,
        })
    }

    pub async fn initiate_call(
        &self,
        to: &str,
        webhook_url: &str,
        status_callback_url: &str,
    ) -> Result<String, GatewayError> {
        let url = format!("{}/accounts/{}/calls", self.base_url, self.account);
        let response = self
            .http
            .post(&url)
            .bearer_auth(self.token.expose_secret())
            .json(&json!({
                "to": to,
                "from": self.caller_id,
                "webhook_url": webhook_url,
                "status_callback_url": status_callback_url,
                "method": "POST",
            }))
            .send()
            .await
            .map_err(|err| GatewayError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(GatewayError::Status { code: status.as_u16(), detail });
        }

        let payload: Value =
            response.json().await.map_err(|err| GatewayError::Transport(err.to_string()))?;
        payload
            .get("call_id")
            .or_else(|| payload.get("sid"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                GatewayError::Transport("gateway response carried no call id".to_string())
            })
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/outbound/call", post(initiate_call))
        .route("/outbound/campaign", post(initiate_campaign))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct InitiateCallQuery {
    lead_id: i64,
}

async fn initiate_call(
    State(state): State<AppState>,
    Query(query): Query<InitiateCallQuery>,
) -> Result<Json<Value>, ApiError> {
    let lead = state
        .leads
        .find_by_id(&LeadId(query.lead_id))
        .await
        .map_err(|err| ApiError::ServiceUnavailable(err.to_string()))?
        .ok_or_else(|| ApiError::NotFound(format!("lead {} not found", query.lead_id)))?;

    Ok(Json(call_lead(&state, &lead).await))
}

async fn initiate_campaign(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let leads =
        state.leads.list().await.map_err(|err| ApiError::ServiceUnavailable(err.to_string()))?;

    if state.gateway.is_none() {
        return Ok(Json(json!({
            "status": "error",
            "message": "voice gateway is not configured",
            "leads_count": leads.len(),
        })));
    }

    let mut results = Vec::with_capacity(leads.len());
    for lead in &leads {
        results.push(call_lead(&state, lead).await);
    }

    Ok(Json(json!({ "status": "completed", "results": results })))
}

async fn call_lead(state: &AppState, lead: &Lead) -> Value {
    let Some(gateway) = &state.gateway else {
        return json!({
            "status": "dry_run",
            "message": "voice gateway is not configured; no call was placed",
            "lead_id": lead.id.0,
            "would_call": lead.phone,
        });
    };

    let base = &state.config.voice.callback_base_url;
    let webhook_url = format!("{base}/voice/inbound");
    let status_callback_url = format!("{base}/voice/status");

    match gateway.initiate_call(&lead.phone, &webhook_url, &status_callback_url).await {
        Ok(call_id) => {
            info!(
                event_name = "outbound.call_initiated",
                lead_id = lead.id.0,
                call_id = %call_id,
                "outbound call initiated"
            );
            if let Err(error) = state.leads.update_status(&lead.id, LeadStatus::Contacted).await {
                warn!(
                    event_name = "outbound.lead_status_failed",
                    lead_id = lead.id.0,
                    error = %error,
                    "failed to mark lead contacted"
                );
            }
            json!({
                "status": "initiated",
                "lead_id": lead.id.0,
                "call_id": call_id,
            })
        }
        Err(error) => {
            warn!(
                event_name = "outbound.call_failed",
                lead_id = lead.id.0,
                error = %error,
                "outbound call initiation failed"
            );
            json!({
                "status": "error",
                "lead_id": lead.id.0,
                "message": error.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use cadence_core::config::{ConfigOverrides, LoadOptions, VoiceConfig};
    use cadence_db::repositories::NewLead;
    use tower::ServiceExt;

    use super::HttpVoiceGateway;
    use crate::bootstrap::bootstrap;

    #[test]
    fn gateway_requires_full_credentials() {
        let mut voice = VoiceConfig {
            caller_language: "en-US".to_string(),
            working_language: "en".to_string(),
            translation_enabled: false,
            tts_voice: None,
            record_max_length_secs: 15,
            record_silence_timeout_secs: 2,
            callback_base_url: "http://localhost:8000".to_string(),
            gateway_base_url: None,
            gateway_account: None,
            gateway_token: None,
            caller_id: None,
        };
        assert!(HttpVoiceGateway::from_config(&voice).is_none());

        voice.gateway_account = Some("AC123".to_string());
        voice.gateway_token = Some("token".to_string().into());
        voice.caller_id = Some("+15550100".to_string());
        // Credentials but no base URL still means no gateway client.
        assert!(HttpVoiceGateway::from_config(&voice).is_none());

        voice.gateway_base_url = Some("https://gateway.example.com".to_string());
        assert!(HttpVoiceGateway::from_config(&voice).is_some());
    }

    #[tokio::test]
    async fn unconfigured_gateway_dry_runs_instead_of_calling() {
        let app = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(
                    "sqlite:file:outbound_dry_run?mode=memory&cache=shared".to_string(),
                ),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await
        .expect("bootstrap");

        let lead = app
            .state
            .leads
            .create(NewLead {
                name: "Roy Tamir".to_string(),
                company: "Tamir Agents Ltd".to_string(),
                role: "CEO".to_string(),
                phone: "+15550110".to_string(),
                notes: None,
            })
            .await
            .expect("create lead");

        let response = super::router(app.state.clone())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/outbound/call?lead_id={}", lead.id.0))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let bytes =
            axum::body::to_bytes(response.into_body(), usize::MAX).await.expect("body bytes");
        let payload: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(payload["status"], "dry_run");
        assert_eq!(payload["would_call"], "+15550110");

        app.db_pool.close().await;
    }

    #[tokio::test]
    async fn campaign_reports_when_gateway_is_missing() {
        let app = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(
                    "sqlite:file:outbound_campaign?mode=memory&cache=shared".to_string(),
                ),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await
        .expect("bootstrap");

        let response = super::router(app.state.clone())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/outbound/campaign")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let bytes =
            axum::body::to_bytes(response.into_body(), usize::MAX).await.expect("body bytes");
        let payload: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(payload["status"], "error");

        app.db_pool.close().await;
    }
}
