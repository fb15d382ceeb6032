//! OAuth connection endpoint

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

use crate::connect::{connect_account, ConnectReport};
use crate::error::GatewayError;
use crate::graph::PlatformClient;
use crate::identity::IdentityProvider;
use crate::state::AppState;
use crate::store::{AuditStore, PageStore, RelationStore, RoleStore, TokenStore};

use super::auth::bearer_user;

#[derive(Deserialize)]
pub struct OAuthCallbackRequest {
    pub code: String,
}

/// POST /facebook-oauth-callback
pub async fn oauth_callback<D, G, I>(
    State(state): State<Arc<AppState<D, G, I>>>,
    headers: HeaderMap,
    Json(req): Json<OAuthCallbackRequest>,
) -> Result<Json<ConnectReport>, GatewayError>
where
    D: RelationStore + PageStore + TokenStore + RoleStore + AuditStore,
    G: PlatformClient,
    I: IdentityProvider,
{
    let user_id = bearer_user(&state, &headers)?;

    if req.code.is_empty() {
        return Err(GatewayError::Validation(
            "authorization code is required".to_string(),
        ));
    }

    let report = connect_account(&state.store, &state.platform, &user_id, &req.code).await?;

    for result in &report.results {
        state.changes.publish("facebook_pages", result.page_id.clone());
    }

    Ok(Json(report))
}
