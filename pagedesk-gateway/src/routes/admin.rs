//! Privileged user-administration endpoints
//!
//! Every handler resolves the caller from the bearer token and then
//! re-fetches the caller's role from the authoritative store. Nothing here
//! trusts a role claimed in the request body, a client header, or (for
//! mutations) the token's embedded claims.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

use pagedesk_core::{Feature, GlobalRole};

use crate::access::global_access;
use crate::error::GatewayError;
use crate::graph::PlatformClient;
use crate::identity::IdentityProvider;
use crate::state::AppState;
use crate::store::{
    AdminAction, AuditStore, IdentityUser, PageStore, RelationStore, RoleStore, TokenStore, UserId,
};

use super::auth::bearer_user;

/// Longest accepted search filter.
const MAX_SEARCH_LEN: usize = 200;

/// Resolve the caller and check their server-side role against a gate.
fn require_feature<D, G, I>(
    state: &AppState<D, G, I>,
    headers: &HeaderMap,
    feature: Feature,
) -> Result<UserId, GatewayError>
where
    D: RelationStore + PageStore + TokenStore + RoleStore + AuditStore,
    G: PlatformClient,
    I: IdentityProvider,
{
    let caller = bearer_user(state, headers)?;

    // Authoritative role, independent of the token's embedded claim. A
    // missing role row denies: fail closed.
    let role = state
        .store
        .global_role(&caller)?
        .ok_or(GatewayError::Forbidden)?;
    if !global_access(role, feature) {
        return Err(GatewayError::Forbidden);
    }
    Ok(caller)
}

fn audit<D, G, I>(
    state: &AppState<D, G, I>,
    admin_id: &UserId,
    action: &str,
    target: Option<&UserId>,
    details: serde_json::Value,
) -> Result<(), GatewayError>
where
    D: RelationStore + PageStore + TokenStore + RoleStore + AuditStore,
    G: PlatformClient,
    I: IdentityProvider,
{
    state.store.record_action(AdminAction {
        admin_id: admin_id.clone(),
        action: action.to_string(),
        target_user_id: target.cloned(),
        details,
        created_at: Utc::now(),
    })
}

#[derive(Deserialize, Default)]
pub struct ListUsersRequest {
    pub search: Option<String>,
}

#[derive(Serialize)]
pub struct ListUsersResponse {
    pub users: Vec<IdentityUser>,
}

/// POST /admin-list-users
pub async fn list_users<D, G, I>(
    State(state): State<Arc<AppState<D, G, I>>>,
    headers: HeaderMap,
    body: Option<Json<ListUsersRequest>>,
) -> Result<Json<ListUsersResponse>, GatewayError>
where
    D: RelationStore + PageStore + TokenStore + RoleStore + AuditStore,
    G: PlatformClient,
    I: IdentityProvider,
{
    require_feature(&state, &headers, Feature::Admin)?;

    let search = body.and_then(|Json(b)| b.search);
    if let Some(ref search) = search {
        if search.len() > MAX_SEARCH_LEN {
            return Err(GatewayError::Validation(
                "search filter too long".to_string(),
            ));
        }
    }

    let users = state.identity.list_users(search.as_deref()).await?;
    Ok(Json(ListUsersResponse { users }))
}

#[derive(Deserialize)]
pub struct DeleteUserRequest {
    pub user_id: String,
}

#[derive(Serialize)]
pub struct DeleteUserResponse {
    pub success: bool,
}

/// POST /admin-delete-user
pub async fn delete_user<D, G, I>(
    State(state): State<Arc<AppState<D, G, I>>>,
    headers: HeaderMap,
    Json(req): Json<DeleteUserRequest>,
) -> Result<Json<DeleteUserResponse>, GatewayError>
where
    D: RelationStore + PageStore + TokenStore + RoleStore + AuditStore,
    G: PlatformClient,
    I: IdentityProvider,
{
    let caller = require_feature(&state, &headers, Feature::Superadmin)?;
    let target = UserId(req.user_id);

    state.identity.delete_user(&target).await?;

    // Local cleanup: relations and live sessions go with the account.
    for relation in state.store.relations_for_user(&target)? {
        state
            .store
            .delete_relation(&relation.user_id, &relation.page_id)?;
    }
    state.store.delete_all_refresh(&target)?;

    audit(&state, &caller, "delete_user", Some(&target), json!({}))?;
    state.changes.publish("user_roles", target.0.clone());

    Ok(Json(DeleteUserResponse { success: true }))
}

#[derive(Deserialize)]
pub struct UpdateRoleRequest {
    pub user_id: String,
    pub role: String,
}

#[derive(Serialize)]
pub struct UpdateRoleResponse {
    pub success: bool,
    pub user_id: String,
    pub role: String,
}

/// POST /admin-update-user-role
pub async fn update_user_role<D, G, I>(
    State(state): State<Arc<AppState<D, G, I>>>,
    headers: HeaderMap,
    Json(req): Json<UpdateRoleRequest>,
) -> Result<Json<UpdateRoleResponse>, GatewayError>
where
    D: RelationStore + PageStore + TokenStore + RoleStore + AuditStore,
    G: PlatformClient,
    I: IdentityProvider,
{
    let caller = require_feature(&state, &headers, Feature::Superadmin)?;

    // Validate before any write.
    let role = GlobalRole::parse(&req.role)
        .map_err(|_| GatewayError::InvalidRole(req.role.clone()))?;
    let target = UserId(req.user_id.clone());

    state.store.set_global_role(&target, role)?;
    state.identity.set_role_metadata(&target, role).await?;

    audit(
        &state,
        &caller,
        "update_user_role",
        Some(&target),
        json!({ "role": role.as_str() }),
    )?;
    state.changes.publish("user_roles", target.0.clone());

    Ok(Json(UpdateRoleResponse {
        success: true,
        user_id: req.user_id,
        role: role.as_str().to_string(),
    }))
}
