//! End-to-end tests for the OAuth account-connection flow

mod common;

use common::{bearer, create_test_server, login_user};
use serde_json::{json, Value};

use pagedesk_gateway::store::{PageId, PageStore, RelationStore, UserId};

/// Two pages come back from the platform: one bare, one with a linked
/// Instagram business account.
#[tokio::test]
async fn test_connect_two_pages_with_and_without_instagram() {
    let (server, ctx) = create_test_server();
    let (access, _) = login_user(&server, &ctx, "user-a", "a@example.com", "hunter22").await;

    ctx.platform.add_page("p1", "First Page", None);
    ctx.platform.add_page("p2", "Second Page", Some(("ig1", "secondpage_official")));

    let (name, value) = bearer(&access);
    let response = server
        .post("/facebook-oauth-callback")
        .add_header(name, value)
        .json(&json!({ "code": "auth-code-1" }))
        .await;
    assert_eq!(response.status_code(), 200);

    let body: Value = response.json();
    assert_eq!(body["success"], true);
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);

    let p1 = results.iter().find(|r| r["page_id"] == "p1").unwrap();
    assert_eq!(p1["facebook"], "success");
    assert_eq!(p1["instagram"], "not_found");

    let p2 = results.iter().find(|r| r["page_id"] == "p2").unwrap();
    assert_eq!(p2["facebook"], "success");
    assert_eq!(p2["instagram"], "success");

    // Both pages persisted with long-lived tokens only.
    let user = UserId("user-a".to_string());
    let pages = ctx.state.store.pages_for_user(&user).unwrap();
    assert_eq!(pages.len(), 2);
    for page in &pages {
        assert!(
            page.access_token.starts_with("long-"),
            "stored token must be long-lived, got {}",
            page.access_token
        );
        assert!(page.is_connected);
    }

    // The connecting user holds an owner relation with management rights.
    let relation = ctx
        .state
        .store
        .get_relation(&user, &PageId("p1".to_string()))
        .unwrap()
        .expect("owner relation missing");
    assert!(relation.is_owner());
    assert!(relation.has_role("admin"));

    // Webhook subscriptions went out for both pages and the Instagram account.
    let subscribed = ctx.platform.subscribed.read().unwrap().clone();
    assert!(subscribed.contains(&"p1".to_string()));
    assert!(subscribed.contains(&"p2".to_string()));
    assert!(subscribed.contains(&"ig1".to_string()));
}

/// Re-running the flow upserts in place: same rows, refreshed token.
#[tokio::test]
async fn test_reconnect_is_idempotent() {
    let (server, ctx) = create_test_server();
    let (access, _) = login_user(&server, &ctx, "user-a", "a@example.com", "hunter22").await;

    ctx.platform.add_page("p1", "First Page", None);

    let (name, value) = bearer(&access);
    for code in ["code-1", "code-2"] {
        let response = server
            .post("/facebook-oauth-callback")
            .add_header(name.clone(), value.clone())
            .json(&json!({ "code": code }))
            .await;
        assert_eq!(response.status_code(), 200);
    }

    let user = UserId("user-a".to_string());
    let pages = ctx.state.store.pages_for_user(&user).unwrap();
    assert_eq!(pages.len(), 1, "reconnect must not duplicate rows");
    // The token reflects the latest exchange.
    assert_eq!(pages[0].access_token, "long-short-p1");
}

/// Webhook subscription failure is best-effort: the connection succeeds.
#[tokio::test]
async fn test_subscribe_failure_does_not_fail_connection() {
    let (server, ctx) = create_test_server();
    let (access, _) = login_user(&server, &ctx, "user-a", "a@example.com", "hunter22").await;

    ctx.platform.add_page("p1", "First Page", None);
    ctx.platform
        .fail_subscribe
        .store(true, std::sync::atomic::Ordering::SeqCst);

    let (name, value) = bearer(&access);
    let response = server
        .post("/facebook-oauth-callback")
        .add_header(name, value)
        .json(&json!({ "code": "auth-code-1" }))
        .await;
    assert_eq!(response.status_code(), 200);

    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["results"][0]["facebook"], "success");

    let user = UserId("user-a".to_string());
    assert_eq!(ctx.state.store.pages_for_user(&user).unwrap().len(), 1);
}

/// An empty page list is terminal and user-correctable.
#[tokio::test]
async fn test_no_pages_granted_is_not_found() {
    let (server, ctx) = create_test_server();
    let (access, _) = login_user(&server, &ctx, "user-a", "a@example.com", "hunter22").await;

    let (name, value) = bearer(&access);
    let response = server
        .post("/facebook-oauth-callback")
        .add_header(name, value)
        .json(&json!({ "code": "auth-code-1" }))
        .await;
    assert_eq!(response.status_code(), 404);

    let body: Value = response.json();
    assert_eq!(body["success"], false);
}

/// The flow requires an authenticated caller.
#[tokio::test]
async fn test_connect_requires_authentication() {
    let (server, ctx) = create_test_server();
    ctx.platform.add_page("p1", "First Page", None);

    let response = server
        .post("/facebook-oauth-callback")
        .json(&json!({ "code": "auth-code-1" }))
        .await;
    assert_eq!(response.status_code(), 401);
}

/// A failing code exchange surfaces as an upstream error.
#[tokio::test]
async fn test_exchange_failure_is_upstream_error() {
    let (server, ctx) = create_test_server();
    let (access, _) = login_user(&server, &ctx, "user-a", "a@example.com", "hunter22").await;

    ctx.platform
        .fail_exchange
        .store(true, std::sync::atomic::Ordering::SeqCst);

    let (name, value) = bearer(&access);
    let response = server
        .post("/facebook-oauth-callback")
        .add_header(name, value)
        .json(&json!({ "code": "bad-code" }))
        .await;
    assert_eq!(response.status_code(), 502);
}

/// The client-facing page listing never includes the stored access token.
#[tokio::test]
async fn test_page_listing_masks_access_token() {
    let (server, ctx) = create_test_server();
    let (access, _) = login_user(&server, &ctx, "user-a", "a@example.com", "hunter22").await;

    ctx.platform.add_page("p1", "First Page", None);

    let (name, value) = bearer(&access);
    server
        .post("/facebook-oauth-callback")
        .add_header(name.clone(), value.clone())
        .json(&json!({ "code": "auth-code-1" }))
        .await;

    let response = server.get("/pages").add_header(name, value).await;
    assert_eq!(response.status_code(), 200);

    let text = response.text();
    assert!(
        !text.contains("long-short-p1"),
        "page listing must not leak tokens: {}",
        text
    );
    let body: Value = response.json();
    assert_eq!(body["pages"][0]["page_id"], "p1");
}
