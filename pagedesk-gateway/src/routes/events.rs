//! Automation-event forwarding endpoint

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use pagedesk_core::validate_webhook_url;

use crate::error::GatewayError;
use crate::graph::PlatformClient;
use crate::identity::IdentityProvider;
use crate::state::AppState;
use crate::store::{AuditStore, PageStore, RelationStore, RoleStore, TokenStore};

use super::auth::bearer_user;

/// Action gated by the cooldown limiter.
const THROTTLED_ACTION: &str = "check_new_messages";

#[derive(Deserialize)]
pub struct AutomationEventRequest {
    pub event: String,
    pub url: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

#[derive(Serialize)]
pub struct AutomationEventResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// POST /automation-event
///
/// Validates the target URL against the webhook policy, then forwards the
/// event from a spawned task. Delivery is best-effort: the response only
/// reports acceptance, not delivery.
pub async fn automation_event<D, G, I>(
    State(state): State<Arc<AppState<D, G, I>>>,
    headers: HeaderMap,
    Json(req): Json<AutomationEventRequest>,
) -> Result<Json<AutomationEventResponse>, GatewayError>
where
    D: RelationStore + PageStore + TokenStore + RoleStore + AuditStore + 'static,
    G: PlatformClient + 'static,
    I: IdentityProvider + 'static,
{
    let user_id = bearer_user(&state, &headers)?;

    validate_webhook_url(&req.url, &state.webhook_allowlist)
        .map_err(|violation| GatewayError::Validation(violation.to_string()))?;

    // Advisory throttle, not an error: the caller is told to back off.
    if req.event == THROTTLED_ACTION && !state.limiter.allow(THROTTLED_ACTION) {
        return Ok(Json(AutomationEventResponse {
            success: false,
            reason: Some("cooldown".to_string()),
        }));
    }

    let payload = json!({
        "event": req.event,
        "user_id": user_id.0,
        "payload": req.payload,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    let url = req.url;
    let state_for_task = state.clone();
    tokio::spawn(async move {
        if let Err(e) = state_for_task.automation.deliver(&url, &payload).await {
            tracing::warn!(url, error = %e, "Automation event delivery failed");
        }
    });

    Ok(Json(AutomationEventResponse {
        success: true,
        reason: None,
    }))
}
