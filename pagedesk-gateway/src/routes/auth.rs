//! Session token endpoints: login, refresh, logout

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tower_cookies::Cookies;

use pagedesk_core::{
    hash_refresh_token, issue_access_token, issue_refresh_token, verify_access_token, GlobalRole,
};

use crate::error::GatewayError;
use crate::graph::PlatformClient;
use crate::identity::IdentityProvider;
use crate::state::AppState;
use crate::store::{
    AuditStore, IdentityUser, PageStore, RefreshTokenRecord, RelationStore, RoleStore, TokenStore,
    UserId,
};

const SESSION_COOKIE: &str = "pagedesk_session";

/// Resolve the calling user from the `Authorization: Bearer` header.
///
/// Verifies signature and expiry of the access token; any failure is
/// `Unauthenticated` for missing credentials or `InvalidOrExpiredToken`
/// for bad ones.
pub fn bearer_user<D, G, I>(
    state: &AppState<D, G, I>,
    headers: &HeaderMap,
) -> Result<UserId, GatewayError>
where
    D: RelationStore + PageStore + TokenStore + RoleStore + AuditStore,
    G: PlatformClient,
    I: IdentityProvider,
{
    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(GatewayError::Unauthenticated)?;

    let claims = verify_access_token(token, &state.tokens)?;
    Ok(UserId(claims.sub))
}

/// The authoritative global role for a user, defaulting new users to client.
fn role_for<D, G, I>(
    state: &AppState<D, G, I>,
    user_id: &UserId,
) -> Result<GlobalRole, GatewayError>
where
    D: RelationStore + PageStore + TokenStore + RoleStore + AuditStore,
    G: PlatformClient,
    I: IdentityProvider,
{
    match state.store.global_role(user_id)? {
        Some(role) => Ok(role),
        None => {
            state.store.set_global_role(user_id, GlobalRole::Client)?;
            Ok(GlobalRole::Client)
        }
    }
}

fn set_session_cookie(cookies: &Cookies, token: &str) {
    use tower_cookies::Cookie;
    let cookie = Cookie::build((SESSION_COOKIE, token.to_string()))
        .path("/")
        .http_only(true)
        .build();
    cookies.add(cookie);
}

fn clear_session_cookie(cookies: &Cookies) {
    use tower_cookies::Cookie;
    let cookie = Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .http_only(true)
        .max_age(tower_cookies::cookie::time::Duration::ZERO)
        .build();
    cookies.add(cookie);
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub provider: Option<String>,
    pub oauth_token: Option<String>,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub refresh_token: String,
    pub user: IdentityUser,
}

/// POST /custom-jwt-auth-login
pub async fn login<D, G, I>(
    State(state): State<Arc<AppState<D, G, I>>>,
    cookies: Cookies,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, GatewayError>
where
    D: RelationStore + PageStore + TokenStore + RoleStore + AuditStore,
    G: PlatformClient,
    I: IdentityProvider,
{
    let (user, provider_name) = match (&req.email, &req.password, &req.provider, &req.oauth_token)
    {
        (Some(email), Some(password), _, _) => {
            let user = state.identity.authenticate(email, password).await?;
            (user, "password".to_string())
        }
        (_, _, Some(provider), Some(oauth_token)) => {
            let user = state.identity.verify_oauth(provider, oauth_token).await?;
            (user, provider.clone())
        }
        _ => {
            return Err(GatewayError::Validation(
                "either email/password or provider/oauth_token is required".to_string(),
            ));
        }
    };

    let role = role_for(&state, &user.id)?;

    let access = issue_access_token(&user.id.0, role, &state.tokens)?;
    let (refresh, refresh_hash) = issue_refresh_token(&user.id.0, role, &state.tokens)?;

    let now = Utc::now();
    state.store.insert_refresh(RefreshTokenRecord {
        user_id: user.id.clone(),
        provider: provider_name,
        token_hash: refresh_hash,
        issued_at: now,
        expires_at: now + Duration::days(state.tokens.refresh_ttl_days),
    })?;

    set_session_cookie(&cookies, &refresh);

    Ok(Json(LoginResponse {
        token: access,
        refresh_token: refresh,
        user,
    }))
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub token: String,
}

#[derive(Serialize)]
pub struct RefreshResponse {
    pub token: String,
    pub refresh_token: String,
}

/// POST /custom-jwt-auth-refresh
///
/// The presented refresh token must verify cryptographically AND match a
/// live store row. Rotation consumes the old row and writes the new one in
/// a single transition, so the consumed token can never refresh twice.
pub async fn refresh<D, G, I>(
    State(state): State<Arc<AppState<D, G, I>>>,
    cookies: Cookies,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<RefreshResponse>, GatewayError>
where
    D: RelationStore + PageStore + TokenStore + RoleStore + AuditStore,
    G: PlatformClient,
    I: IdentityProvider,
{
    let claims = verify_access_token(&req.token, &state.tokens)?;
    let user_id = UserId(claims.sub);
    let old_hash = hash_refresh_token(&req.token);

    // Roles can change between refreshes; re-read the authoritative copy.
    let role = role_for(&state, &user_id)?;

    let access = issue_access_token(&user_id.0, role, &state.tokens)?;
    let (new_refresh, new_hash) = issue_refresh_token(&user_id.0, role, &state.tokens)?;

    let now = Utc::now();
    state.store.rotate_refresh(
        &user_id,
        &old_hash,
        RefreshTokenRecord {
            user_id: user_id.clone(),
            provider: "pagedesk".to_string(),
            token_hash: new_hash,
            issued_at: now,
            expires_at: now + Duration::days(state.tokens.refresh_ttl_days),
        },
    )?;

    set_session_cookie(&cookies, &new_refresh);

    Ok(Json(RefreshResponse {
        token: access,
        refresh_token: new_refresh,
    }))
}

#[derive(Deserialize, Default)]
pub struct LogoutRequest {
    pub token: Option<String>,
}

#[derive(Serialize)]
pub struct LogoutResponse {
    pub message: String,
}

/// POST /custom-jwt-auth-logout
///
/// Accepts the token from the bearer header, the session cookie, or the
/// body, in that order. Deleting the store record makes a later refresh
/// with the same token fail.
pub async fn logout<D, G, I>(
    State(state): State<Arc<AppState<D, G, I>>>,
    headers: HeaderMap,
    cookies: Cookies,
    body: Option<Json<LogoutRequest>>,
) -> Result<Json<LogoutResponse>, GatewayError>
where
    D: RelationStore + PageStore + TokenStore + RoleStore + AuditStore,
    G: PlatformClient,
    I: IdentityProvider,
{
    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.to_string())
        .or_else(|| cookies.get(SESSION_COOKIE).map(|c| c.value().to_string()))
        .or_else(|| body.and_then(|Json(b)| b.token));

    if let Some(token) = token {
        if let Ok(claims) = verify_access_token(&token, &state.tokens) {
            let user_id = UserId(claims.sub);
            state
                .store
                .delete_refresh(&user_id, &hash_refresh_token(&token))?;
        }
    }

    clear_session_cookie(&cookies);

    Ok(Json(LogoutResponse {
        message: "Logged out".to_string(),
    }))
}
