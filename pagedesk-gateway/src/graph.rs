//! Social platform Graph API client
//!
//! Everything the connection flow needs from the platform sits behind
//! [`PlatformClient`] so the orchestrator and tests never touch HTTP
//! directly. The HTTP implementation talks to a configurable Graph API
//! base URL.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::GatewayError;

/// A page as enumerated from the platform, with its page-scoped token.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphPage {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    pub access_token: String,
}

/// Operations against the platform's Graph API.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// Exchange an OAuth authorization code for a short-lived user token
    async fn exchange_code(&self, code: &str) -> Result<String, GatewayError>;

    /// Enumerate every page the user token grants access to
    async fn list_pages(&self, user_token: &str) -> Result<Vec<GraphPage>, GatewayError>;

    /// Upgrade a short-lived token to its long-lived variant
    async fn exchange_long_lived(&self, token: &str) -> Result<String, GatewayError>;

    /// The Instagram business account linked to a page, if any
    async fn instagram_account(
        &self,
        page_id: &str,
        page_token: &str,
    ) -> Result<Option<String>, GatewayError>;

    /// Public username of an Instagram business account
    async fn instagram_username(
        &self,
        ig_id: &str,
        page_token: &str,
    ) -> Result<String, GatewayError>;

    /// Subscribe the app to page webhooks. Idempotent on the platform side.
    async fn subscribe_page(&self, page_id: &str, page_token: &str) -> Result<(), GatewayError>;

    /// Subscribe the app to Instagram webhooks
    async fn subscribe_instagram(&self, ig_id: &str, page_token: &str)
        -> Result<(), GatewayError>;
}

/// HTTP request timeout for Graph API calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Reqwest-backed [`PlatformClient`].
pub struct HttpPlatformClient {
    client: reqwest::Client,
    base_url: String,
    app_id: String,
    app_secret: String,
    redirect_uri: String,
}

#[derive(Deserialize)]
struct AccessTokenResponse {
    access_token: Option<String>,
}

#[derive(Deserialize)]
struct PageListResponse {
    #[serde(default)]
    data: Vec<GraphPage>,
}

#[derive(Deserialize)]
struct LinkedInstagram {
    id: String,
}

#[derive(Deserialize)]
struct InstagramField {
    instagram_business_account: Option<LinkedInstagram>,
}

#[derive(Deserialize)]
struct UsernameField {
    username: Option<String>,
}

impl HttpPlatformClient {
    pub fn new(
        base_url: impl Into<String>,
        app_id: impl Into<String>,
        app_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build Graph API HTTP client");
        Self {
            client,
            base_url: base_url.into(),
            app_id: app_id.into(),
            app_secret: app_secret.into(),
            redirect_uri: redirect_uri.into(),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, GatewayError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| GatewayError::Upstream(format!("Graph API request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(GatewayError::Upstream(format!(
                "Graph API returned HTTP {} for {}",
                response.status(),
                url
            )));
        }

        response
            .json()
            .await
            .map_err(|e| GatewayError::Upstream(format!("Graph API response malformed: {}", e)))
    }
}

#[async_trait]
impl PlatformClient for HttpPlatformClient {
    async fn exchange_code(&self, code: &str) -> Result<String, GatewayError> {
        let url = format!("{}/oauth/access_token", self.base_url);
        let body: AccessTokenResponse = self
            .get_json(
                &url,
                &[
                    ("client_id", self.app_id.as_str()),
                    ("client_secret", self.app_secret.as_str()),
                    ("redirect_uri", self.redirect_uri.as_str()),
                    ("code", code),
                ],
            )
            .await?;
        body.access_token
            .ok_or_else(|| GatewayError::Upstream("token endpoint returned no token".to_string()))
    }

    async fn list_pages(&self, user_token: &str) -> Result<Vec<GraphPage>, GatewayError> {
        let url = format!("{}/me/accounts", self.base_url);
        let body: PageListResponse = self
            .get_json(&url, &[("access_token", user_token)])
            .await?;
        Ok(body.data)
    }

    async fn exchange_long_lived(&self, token: &str) -> Result<String, GatewayError> {
        let url = format!("{}/oauth/access_token", self.base_url);
        let body: AccessTokenResponse = self
            .get_json(
                &url,
                &[
                    ("grant_type", "fb_exchange_token"),
                    ("client_id", self.app_id.as_str()),
                    ("client_secret", self.app_secret.as_str()),
                    ("fb_exchange_token", token),
                ],
            )
            .await?;
        body.access_token.ok_or_else(|| {
            GatewayError::Upstream("long-lived exchange returned no token".to_string())
        })
    }

    async fn instagram_account(
        &self,
        page_id: &str,
        page_token: &str,
    ) -> Result<Option<String>, GatewayError> {
        let url = format!("{}/{}", self.base_url, page_id);
        let body: InstagramField = self
            .get_json(
                &url,
                &[
                    ("fields", "instagram_business_account"),
                    ("access_token", page_token),
                ],
            )
            .await?;
        Ok(body.instagram_business_account.map(|acct| acct.id))
    }

    async fn instagram_username(
        &self,
        ig_id: &str,
        page_token: &str,
    ) -> Result<String, GatewayError> {
        let url = format!("{}/{}", self.base_url, ig_id);
        let body: UsernameField = self
            .get_json(&url, &[("fields", "username"), ("access_token", page_token)])
            .await?;
        body.username
            .ok_or_else(|| GatewayError::Upstream("Instagram account has no username".to_string()))
    }

    async fn subscribe_page(&self, page_id: &str, page_token: &str) -> Result<(), GatewayError> {
        let url = format!("{}/{}/subscribed_apps", self.base_url, page_id);
        let response = self
            .client
            .post(&url)
            .query(&[
                ("subscribed_fields", "feed,messages"),
                ("access_token", page_token),
            ])
            .send()
            .await
            .map_err(|e| GatewayError::Upstream(format!("webhook subscribe failed: {}", e)))?;
        if !response.status().is_success() {
            return Err(GatewayError::Upstream(format!(
                "webhook subscribe returned HTTP {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn subscribe_instagram(
        &self,
        ig_id: &str,
        page_token: &str,
    ) -> Result<(), GatewayError> {
        let url = format!("{}/{}/subscribed_apps", self.base_url, ig_id);
        let response = self
            .client
            .post(&url)
            .query(&[
                ("subscribed_fields", "comments,messages"),
                ("access_token", page_token),
            ])
            .send()
            .await
            .map_err(|e| {
                GatewayError::Upstream(format!("Instagram webhook subscribe failed: {}", e))
            })?;
        if !response.status().is_success() {
            return Err(GatewayError::Upstream(format!(
                "Instagram webhook subscribe returned HTTP {}",
                response.status()
            )));
        }
        Ok(())
    }
}
