//! Common test utilities for gateway integration tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use axum::http::header::AUTHORIZATION;
use axum_test::TestServer;
use chrono::Utc;
use serde_json::{json, Value};

use pagedesk_core::{GlobalRole, TokenConfig};
use pagedesk_gateway::error::GatewayError;
use pagedesk_gateway::graph::{GraphPage, PlatformClient};
use pagedesk_gateway::identity::IdentityProvider;
use pagedesk_gateway::routes;
use pagedesk_gateway::store::{IdentityUser, MemoryStore, UserId};
use pagedesk_gateway::AppState;

/// Scriptable platform client capturing subscriptions.
#[derive(Default, Clone)]
pub struct MockPlatformClient {
    /// Pages returned by `list_pages`
    pub pages: Arc<RwLock<Vec<GraphPage>>>,
    /// page_id -> linked Instagram business account id
    pub instagram_links: Arc<RwLock<HashMap<String, String>>>,
    /// ig_id -> username
    pub instagram_usernames: Arc<RwLock<HashMap<String, String>>>,
    /// Recorded webhook subscriptions (page and Instagram ids)
    pub subscribed: Arc<RwLock<Vec<String>>>,
    /// When set, every subscription attempt fails
    pub fail_subscribe: Arc<AtomicBool>,
    /// When set, the code exchange fails
    pub fail_exchange: Arc<AtomicBool>,
}

impl MockPlatformClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_page(&self, id: &str, name: &str, instagram: Option<(&str, &str)>) {
        self.pages.write().unwrap().push(GraphPage {
            id: id.to_string(),
            name: name.to_string(),
            category: Some("Business".to_string()),
            access_token: format!("short-{}", id),
        });
        if let Some((ig_id, username)) = instagram {
            self.instagram_links
                .write()
                .unwrap()
                .insert(id.to_string(), ig_id.to_string());
            self.instagram_usernames
                .write()
                .unwrap()
                .insert(ig_id.to_string(), username.to_string());
        }
    }
}

#[async_trait]
impl PlatformClient for MockPlatformClient {
    async fn exchange_code(&self, code: &str) -> Result<String, GatewayError> {
        if self.fail_exchange.load(Ordering::SeqCst) {
            return Err(GatewayError::Upstream("token endpoint returned no token".to_string()));
        }
        Ok(format!("user-token-for-{}", code))
    }

    async fn list_pages(&self, _user_token: &str) -> Result<Vec<GraphPage>, GatewayError> {
        Ok(self.pages.read().unwrap().clone())
    }

    async fn exchange_long_lived(&self, token: &str) -> Result<String, GatewayError> {
        Ok(format!("long-{}", token))
    }

    async fn instagram_account(
        &self,
        page_id: &str,
        _page_token: &str,
    ) -> Result<Option<String>, GatewayError> {
        Ok(self.instagram_links.read().unwrap().get(page_id).cloned())
    }

    async fn instagram_username(
        &self,
        ig_id: &str,
        _page_token: &str,
    ) -> Result<String, GatewayError> {
        self.instagram_usernames
            .read()
            .unwrap()
            .get(ig_id)
            .cloned()
            .ok_or_else(|| GatewayError::Upstream("unknown Instagram account".to_string()))
    }

    async fn subscribe_page(&self, page_id: &str, _page_token: &str) -> Result<(), GatewayError> {
        if self.fail_subscribe.load(Ordering::SeqCst) {
            return Err(GatewayError::Upstream("subscribe rejected".to_string()));
        }
        self.subscribed.write().unwrap().push(page_id.to_string());
        Ok(())
    }

    async fn subscribe_instagram(
        &self,
        ig_id: &str,
        _page_token: &str,
    ) -> Result<(), GatewayError> {
        if self.fail_subscribe.load(Ordering::SeqCst) {
            return Err(GatewayError::Upstream("subscribe rejected".to_string()));
        }
        self.subscribed.write().unwrap().push(ig_id.to_string());
        Ok(())
    }
}

/// In-memory identity provider with registered users.
#[derive(Default, Clone)]
pub struct MockIdentityProvider {
    /// (user, password)
    pub users: Arc<RwLock<Vec<(IdentityUser, String)>>>,
    /// Ids deleted through the admin surface
    pub deleted: Arc<RwLock<Vec<String>>>,
    /// user id -> role string mirrored into provider metadata
    pub role_metadata: Arc<RwLock<HashMap<String, String>>>,
}

impl MockIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, id: &str, email: &str, password: &str) {
        self.users.write().unwrap().push((
            IdentityUser {
                id: UserId(id.to_string()),
                email: email.to_string(),
                created_at: Utc::now(),
            },
            password.to_string(),
        ));
    }
}

#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    async fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<IdentityUser, GatewayError> {
        self.users
            .read()
            .unwrap()
            .iter()
            .find(|(u, p)| u.email == email && p == password)
            .map(|(u, _)| u.clone())
            .ok_or(GatewayError::Unauthenticated)
    }

    async fn verify_oauth(
        &self,
        _provider: &str,
        oauth_token: &str,
    ) -> Result<IdentityUser, GatewayError> {
        // Token convention for tests: "oauth-<user id>"
        let id = oauth_token
            .strip_prefix("oauth-")
            .ok_or(GatewayError::Unauthenticated)?;
        self.users
            .read()
            .unwrap()
            .iter()
            .find(|(u, _)| u.id.0 == id)
            .map(|(u, _)| u.clone())
            .ok_or(GatewayError::Unauthenticated)
    }

    async fn list_users(&self, search: Option<&str>) -> Result<Vec<IdentityUser>, GatewayError> {
        let users = self.users.read().unwrap();
        Ok(users
            .iter()
            .map(|(u, _)| u.clone())
            .filter(|u| match search {
                Some(needle) => u.email.contains(needle),
                None => true,
            })
            .collect())
    }

    async fn delete_user(&self, user_id: &UserId) -> Result<(), GatewayError> {
        self.users.write().unwrap().retain(|(u, _)| u.id != *user_id);
        self.deleted.write().unwrap().push(user_id.0.clone());
        Ok(())
    }

    async fn set_role_metadata(
        &self,
        user_id: &UserId,
        role: GlobalRole,
    ) -> Result<(), GatewayError> {
        self.role_metadata
            .write()
            .unwrap()
            .insert(user_id.0.clone(), role.as_str().to_string());
        Ok(())
    }
}

/// Everything a test needs: the server, the shared state, and the mocks.
pub struct TestContext {
    pub state: Arc<AppState<MemoryStore, MockPlatformClient, MockIdentityProvider>>,
    pub platform: MockPlatformClient,
    pub identity: MockIdentityProvider,
}

pub const TEST_JWT_SECRET: &str = "integration-test-secret-long-enough-for-hmac";

/// Create a test server with mock collaborators.
pub fn create_test_server() -> (TestServer, TestContext) {
    let platform = MockPlatformClient::new();
    let identity = MockIdentityProvider::new();

    let state = Arc::new(AppState::new(
        MemoryStore::new(),
        platform.clone(),
        identity.clone(),
        TokenConfig::new(TEST_JWT_SECRET),
        vec!["hooks.zapier.com".to_string(), "localhost".to_string()],
    ));

    let app = routes::create_router(
        state.clone(),
        &["http://localhost:5173".to_string()],
    );
    let server = TestServer::new(app).expect("Failed to create test server");

    (
        server,
        TestContext {
            state,
            platform,
            identity,
        },
    )
}

/// Register a user with the mock identity provider and log in, returning
/// `(access_token, refresh_token)`.
pub async fn login_user(
    server: &TestServer,
    ctx: &TestContext,
    id: &str,
    email: &str,
    password: &str,
) -> (String, String) {
    ctx.identity.register(id, email, password);

    let response = server
        .post("/custom-jwt-auth-login")
        .json(&json!({ "email": email, "password": password }))
        .await;
    assert_eq!(response.status_code(), 200, "login failed: {}", response.text());

    let body: Value = response.json();
    (
        body["token"].as_str().expect("no access token").to_string(),
        body["refresh_token"]
            .as_str()
            .expect("no refresh token")
            .to_string(),
    )
}

/// Build a bearer header value for a token.
pub fn bearer(token: &str) -> (axum::http::HeaderName, axum::http::HeaderValue) {
    (
        AUTHORIZATION,
        format!("Bearer {}", token).parse().expect("invalid header"),
    )
}
