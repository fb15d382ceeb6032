//! Connected-page and page-relation endpoints

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pagedesk_core::{ApprovalStatus, Feature, GlobalRole, RelationStatus};

use crate::access::{global_access, require_manage};
use crate::error::GatewayError;
use crate::graph::PlatformClient;
use crate::identity::IdentityProvider;
use crate::state::AppState;
use crate::store::{
    AuditStore, PageId, PageRelation, PageStore, RelationListing, RelationStore, RoleStore,
    TokenStore, UserId,
};

use super::auth::bearer_user;

/// A connected page as shown to clients. The stored access token is a
/// secret and is never part of this view.
#[derive(Serialize)]
pub struct PageView {
    pub page_id: String,
    pub name: String,
    pub category: Option<String>,
    pub instagram_business_account_id: Option<String>,
    pub is_connected: bool,
    pub connected_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct ListPagesResponse {
    pub pages: Vec<PageView>,
}

/// GET /pages
pub async fn list_pages<D, G, I>(
    State(state): State<Arc<AppState<D, G, I>>>,
    headers: HeaderMap,
) -> Result<Json<ListPagesResponse>, GatewayError>
where
    D: RelationStore + PageStore + TokenStore + RoleStore + AuditStore,
    G: PlatformClient,
    I: IdentityProvider,
{
    let user_id = bearer_user(&state, &headers)?;
    let pages = state
        .store
        .pages_for_user(&user_id)?
        .into_iter()
        .map(|p| PageView {
            page_id: p.page_id.0,
            name: p.name,
            category: p.category,
            instagram_business_account_id: p.instagram_business_account_id,
            is_connected: p.is_connected,
            connected_at: p.connected_at,
        })
        .collect();
    Ok(Json(ListPagesResponse { pages }))
}

#[derive(Deserialize)]
pub struct DisconnectRequest {
    pub page_id: String,
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// POST /pages-disconnect
pub async fn disconnect<D, G, I>(
    State(state): State<Arc<AppState<D, G, I>>>,
    headers: HeaderMap,
    Json(req): Json<DisconnectRequest>,
) -> Result<Json<SuccessResponse>, GatewayError>
where
    D: RelationStore + PageStore + TokenStore + RoleStore + AuditStore,
    G: PlatformClient,
    I: IdentityProvider,
{
    let caller = bearer_user(&state, &headers)?;
    let page_id = PageId(req.page_id);

    require_manage(&state.store, &caller, &page_id)?;

    // The page row is keyed by the connecting owner, which may differ from
    // a managing admin.
    let relation = state
        .store
        .get_relation(&caller, &page_id)?
        .ok_or_else(|| GatewayError::NotFound("relation".to_string()))?;
    state.store.disconnect_page(&relation.owner_id, &page_id)?;
    state.changes.publish("facebook_pages", page_id.0.clone());

    Ok(Json(SuccessResponse { success: true }))
}

#[derive(Deserialize)]
pub struct UpsertRelationRequest {
    pub page_id: String,
    pub user_id: String,
    pub roles: Vec<String>,
}

/// POST /page-relations-upsert
///
/// Grants or updates a member's page-scoped roles. Grants made by a page
/// manager are immediately active and accepted.
pub async fn upsert_relation<D, G, I>(
    State(state): State<Arc<AppState<D, G, I>>>,
    headers: HeaderMap,
    Json(req): Json<UpsertRelationRequest>,
) -> Result<Json<SuccessResponse>, GatewayError>
where
    D: RelationStore + PageStore + TokenStore + RoleStore + AuditStore,
    G: PlatformClient,
    I: IdentityProvider,
{
    let caller = bearer_user(&state, &headers)?;
    let page_id = PageId(req.page_id);

    require_manage(&state.store, &caller, &page_id)?;

    let caller_relation = state
        .store
        .get_relation(&caller, &page_id)?
        .ok_or_else(|| GatewayError::NotFound("relation".to_string()))?;

    let target = UserId(req.user_id);
    state.store.upsert_relation(PageRelation {
        user_id: target.clone(),
        page_id: page_id.clone(),
        roles: req.roles,
        owner_id: caller_relation.owner_id,
        relation_status: RelationStatus::Active,
        approval_status: ApprovalStatus::Accepted,
    })?;
    state
        .changes
        .publish("user_pages_relations", format!("{}:{}", target, page_id));

    Ok(Json(SuccessResponse { success: true }))
}

#[derive(Deserialize)]
pub struct RelationStatusRequest {
    pub page_id: String,
    pub user_id: String,
    pub relation_status: Option<String>,
    pub approval_status: Option<String>,
}

/// POST /page-relations-status
pub async fn update_relation_status<D, G, I>(
    State(state): State<Arc<AppState<D, G, I>>>,
    headers: HeaderMap,
    Json(req): Json<RelationStatusRequest>,
) -> Result<Json<SuccessResponse>, GatewayError>
where
    D: RelationStore + PageStore + TokenStore + RoleStore + AuditStore,
    G: PlatformClient,
    I: IdentityProvider,
{
    let caller = bearer_user(&state, &headers)?;
    let page_id = PageId(req.page_id);

    require_manage(&state.store, &caller, &page_id)?;

    let target = UserId(req.user_id);
    let relation = state
        .store
        .get_relation(&target, &page_id)?
        .ok_or_else(|| GatewayError::NotFound("relation".to_string()))?;

    // The owner row cannot be demoted by anyone but the owner.
    if relation.is_owner() && caller != relation.owner_id {
        return Err(GatewayError::Forbidden);
    }

    if let Some(status) = req.relation_status.as_deref() {
        let status = RelationStatus::parse(status).map_err(GatewayError::from)?;
        state.store.set_relation_status(&target, &page_id, status)?;
    }
    if let Some(status) = req.approval_status.as_deref() {
        let status = ApprovalStatus::parse(status).map_err(GatewayError::from)?;
        state.store.set_approval_status(&target, &page_id, status)?;
    }
    state
        .changes
        .publish("user_pages_relations", format!("{}:{}", target, page_id));

    Ok(Json(SuccessResponse { success: true }))
}

#[derive(Serialize)]
pub struct ListRelationsResponse {
    pub relations: Vec<RelationListing>,
}

/// GET /admin-list-relations
///
/// Privileged listing of every relation, joined with page display names
/// and resolving user ids to emails through the identity provider.
pub async fn list_all_relations<D, G, I>(
    State(state): State<Arc<AppState<D, G, I>>>,
    headers: HeaderMap,
) -> Result<Json<ListRelationsResponse>, GatewayError>
where
    D: RelationStore + PageStore + TokenStore + RoleStore + AuditStore,
    G: PlatformClient,
    I: IdentityProvider,
{
    let caller = bearer_user(&state, &headers)?;
    let role = state
        .store
        .global_role(&caller)?
        .unwrap_or(GlobalRole::Client);
    if !global_access(role, Feature::Admin) {
        return Err(GatewayError::Forbidden);
    }

    let emails: HashMap<String, String> = state
        .identity
        .list_users(None)
        .await?
        .into_iter()
        .map(|u| (u.id.0, u.email))
        .collect();

    let mut listings = Vec::new();
    for relation in state.store.list_all_relations()? {
        let page_name = state
            .store
            .get_page(&relation.owner_id, &relation.page_id)?
            .map(|p| p.name);
        listings.push(RelationListing {
            email: emails.get(&relation.user_id.0).cloned(),
            user_id: relation.user_id,
            page_id: relation.page_id,
            page_name,
            roles: relation.roles,
            relation_status: relation.relation_status,
            approval_status: relation.approval_status,
        });
    }

    Ok(Json(ListRelationsResponse {
        relations: listings,
    }))
}
