//! HTTP routes for the gateway

mod admin;
mod auth;
mod connect;
mod events;
mod pages;

use std::sync::Arc;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_cookies::CookieManagerLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::graph::PlatformClient;
use crate::identity::IdentityProvider;
use crate::state::AppState;
use crate::store::{AuditStore, PageStore, RelationStore, RoleStore, TokenStore};

pub use auth::bearer_user;

/// Create the router with all routes, CORS-gated to the given origins.
pub fn create_router<D, G, I>(state: Arc<AppState<D, G, I>>, allowed_origins: &[String]) -> Router
where
    D: RelationStore + PageStore + TokenStore + RoleStore + AuditStore + 'static,
    G: PlatformClient + 'static,
    I: IdentityProvider + 'static,
{
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .allow_credentials(true);

    Router::new()
        .route("/custom-jwt-auth-login", post(auth::login))
        .route("/custom-jwt-auth-refresh", post(auth::refresh))
        .route("/custom-jwt-auth-logout", post(auth::logout))
        .route("/facebook-oauth-callback", post(connect::oauth_callback))
        .route("/pages", get(pages::list_pages))
        .route("/pages-disconnect", post(pages::disconnect))
        .route("/page-relations-upsert", post(pages::upsert_relation))
        .route("/page-relations-status", post(pages::update_relation_status))
        .route("/admin-list-relations", get(pages::list_all_relations))
        .route("/admin-list-users", post(admin::list_users))
        .route("/admin-delete-user", post(admin::delete_user))
        .route("/admin-update-user-role", post(admin::update_user_role))
        .route("/automation-event", post(events::automation_event))
        .layer(CookieManagerLayer::new())
        .layer(cors)
        .with_state(state)
}
