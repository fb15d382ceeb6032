//! Identity provider collaborator
//!
//! The gateway does not own user accounts: sign-in credentials and the
//! canonical user directory live in an external identity service.
//! [`IdentityProvider`] is the seam; the HTTP implementation calls the
//! provider's admin surface with a service key that must never reach
//! clients.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pagedesk_core::GlobalRole;
use serde::Deserialize;

use crate::error::GatewayError;
use crate::store::{IdentityUser, UserId};

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Verify email/password credentials; `Unauthenticated` when they fail
    async fn authenticate(&self, email: &str, password: &str)
        -> Result<IdentityUser, GatewayError>;

    /// Verify a third-party OAuth token and resolve the user it belongs to
    async fn verify_oauth(
        &self,
        provider: &str,
        oauth_token: &str,
    ) -> Result<IdentityUser, GatewayError>;

    /// List users, optionally filtered by an email substring. Pages through
    /// the admin API until exhausted; returns the minimized projection only.
    async fn list_users(&self, search: Option<&str>) -> Result<Vec<IdentityUser>, GatewayError>;

    /// Delete a user from the provider
    async fn delete_user(&self, user_id: &UserId) -> Result<(), GatewayError>;

    /// Mirror a global role change into provider account metadata
    async fn set_role_metadata(
        &self,
        user_id: &UserId,
        role: GlobalRole,
    ) -> Result<(), GatewayError>;
}

/// HTTP request timeout for identity API calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Page size for admin list pagination.
const LIST_PAGE_SIZE: usize = 50;

/// Reqwest-backed [`IdentityProvider`] against the provider's admin REST API.
pub struct HttpIdentityProvider {
    client: reqwest::Client,
    base_url: String,
    service_key: String,
}

#[derive(Deserialize)]
struct ProviderUser {
    id: String,
    email: String,
    created_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct UserPage {
    #[serde(default)]
    users: Vec<ProviderUser>,
}

impl HttpIdentityProvider {
    pub fn new(base_url: impl Into<String>, service_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build identity HTTP client");
        Self {
            client,
            base_url: base_url.into(),
            service_key: service_key.into(),
        }
    }

    fn minimize(user: ProviderUser) -> IdentityUser {
        IdentityUser {
            id: UserId(user.id),
            email: user.email,
            created_at: user.created_at,
        }
    }

    async fn check(response: reqwest::Response, what: &str) -> Result<reqwest::Response, GatewayError> {
        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(GatewayError::Unauthenticated);
        }
        if !response.status().is_success() {
            return Err(GatewayError::Upstream(format!(
                "identity API {} returned HTTP {}",
                what,
                response.status()
            )));
        }
        Ok(response)
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<IdentityUser, GatewayError> {
        let url = format!("{}/token?grant_type=password", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| GatewayError::Upstream(format!("identity API unreachable: {}", e)))?;

        // Bad credentials come back as 4xx, not as a transport error.
        if response.status().is_client_error() {
            return Err(GatewayError::Unauthenticated);
        }
        let response = Self::check(response, "password grant").await?;

        #[derive(Deserialize)]
        struct Grant {
            user: ProviderUser,
        }
        let grant: Grant = response
            .json()
            .await
            .map_err(|e| GatewayError::Upstream(format!("identity response malformed: {}", e)))?;
        Ok(Self::minimize(grant.user))
    }

    async fn verify_oauth(
        &self,
        provider: &str,
        oauth_token: &str,
    ) -> Result<IdentityUser, GatewayError> {
        let url = format!("{}/token?grant_type=oauth", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "provider": provider, "oauth_token": oauth_token }))
            .send()
            .await
            .map_err(|e| GatewayError::Upstream(format!("identity API unreachable: {}", e)))?;

        if response.status().is_client_error() {
            return Err(GatewayError::Unauthenticated);
        }
        let response = Self::check(response, "oauth grant").await?;

        #[derive(Deserialize)]
        struct Grant {
            user: ProviderUser,
        }
        let grant: Grant = response
            .json()
            .await
            .map_err(|e| GatewayError::Upstream(format!("identity response malformed: {}", e)))?;
        Ok(Self::minimize(grant.user))
    }

    async fn list_users(&self, search: Option<&str>) -> Result<Vec<IdentityUser>, GatewayError> {
        let url = format!("{}/admin/users", self.base_url);
        let mut users = Vec::new();
        let mut page = 1usize;

        // Page until the provider returns a short page.
        loop {
            let page_param = page.to_string();
            let per_page = LIST_PAGE_SIZE.to_string();
            let response = self
                .client
                .get(&url)
                .bearer_auth(&self.service_key)
                .query(&[("page", page_param.as_str()), ("per_page", per_page.as_str())])
                .send()
                .await
                .map_err(|e| GatewayError::Upstream(format!("identity API unreachable: {}", e)))?;
            let response = Self::check(response, "list users").await?;

            let body: UserPage = response
                .json()
                .await
                .map_err(|e| GatewayError::Upstream(format!("identity response malformed: {}", e)))?;

            let count = body.users.len();
            users.extend(body.users.into_iter().map(Self::minimize));
            if count < LIST_PAGE_SIZE {
                break;
            }
            page += 1;
        }

        if let Some(needle) = search {
            let needle = needle.to_ascii_lowercase();
            users.retain(|u| u.email.to_ascii_lowercase().contains(&needle));
        }
        Ok(users)
    }

    async fn delete_user(&self, user_id: &UserId) -> Result<(), GatewayError> {
        let url = format!("{}/admin/users/{}", self.base_url, user_id.0);
        let response = self
            .client
            .delete(&url)
            .bearer_auth(&self.service_key)
            .send()
            .await
            .map_err(|e| GatewayError::Upstream(format!("identity API unreachable: {}", e)))?;
        Self::check(response, "delete user").await?;
        Ok(())
    }

    async fn set_role_metadata(
        &self,
        user_id: &UserId,
        role: GlobalRole,
    ) -> Result<(), GatewayError> {
        let url = format!("{}/admin/users/{}", self.base_url, user_id.0);
        let response = self
            .client
            .put(&url)
            .bearer_auth(&self.service_key)
            .json(&serde_json::json!({ "app_metadata": { "role": role.as_str() } }))
            .send()
            .await
            .map_err(|e| GatewayError::Upstream(format!("identity API unreachable: {}", e)))?;
        Self::check(response, "update role metadata").await?;
        Ok(())
    }
}
