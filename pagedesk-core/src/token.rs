//! Application-issued session tokens
//!
//! Access tokens are HS256-signed JWTs carrying a [`Claims`] payload.
//! Refresh tokens are opaque random strings; only their SHA-256 hash is
//! persisted server-side, so a store leak does not compromise live sessions.

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::roles::GlobalRole;
use crate::Result;

/// Claims embedded in every access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject -- the user's identity-provider id.
    pub sub: String,
    /// The user's global role at issue time. Informational only for
    /// privileged mutations: those re-read the authoritative store.
    pub role: String,
    /// Expiration time (UTC Unix timestamp).
    pub exp: i64,
    /// Issued-at time (UTC Unix timestamp).
    pub iat: i64,
    /// Unique token identifier for audit.
    pub jti: String,
}

/// Access token lifetime in minutes.
const ACCESS_TTL_MINS: i64 = 15;
/// Refresh token lifetime in days.
const REFRESH_TTL_DAYS: i64 = 30;

/// Configuration for session token signing and verification.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    /// HMAC-SHA256 secret used to sign and verify tokens.
    pub secret: String,
    /// Access token lifetime in minutes.
    pub access_ttl_mins: i64,
    /// Refresh token lifetime in days.
    pub refresh_ttl_days: i64,
}

impl TokenConfig {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            access_ttl_mins: ACCESS_TTL_MINS,
            refresh_ttl_days: REFRESH_TTL_DAYS,
        }
    }

    /// Load from `PAGEDESK_JWT_SECRET`.
    ///
    /// # Panics
    ///
    /// Panics if the variable is unset or empty; the gateway must not start
    /// with an unsigned token path.
    pub fn from_env() -> Self {
        let secret = std::env::var("PAGEDESK_JWT_SECRET")
            .expect("PAGEDESK_JWT_SECRET must be set in the environment");
        assert!(!secret.is_empty(), "PAGEDESK_JWT_SECRET must not be empty");
        Self::new(secret)
    }
}

/// Sign an access token for the given user.
pub fn issue_access_token(user_id: &str, role: GlobalRole, config: &TokenConfig) -> Result<String> {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        role: role.as_str().to_string(),
        exp: now + config.access_ttl_mins * 60,
        iat: now,
        jti: Uuid::new_v4().to_string(),
    };

    let token = encode(
        &Header::default(), // HS256
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )?;
    Ok(token)
}

/// Verify signature and expiry of an access token, returning its [`Claims`].
pub fn verify_access_token(token: &str, config: &TokenConfig) -> Result<Claims> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &Validation::default(), // HS256, validates exp
    )?;
    Ok(data.claims)
}

/// Sign a refresh token for the given user.
///
/// Refresh tokens are JWTs so a presented token can be verified
/// cryptographically before the store is consulted. Returns
/// `(token, sha256_hex)`; the token goes to the client, only the hash may
/// be persisted.
pub fn issue_refresh_token(
    user_id: &str,
    role: GlobalRole,
    config: &TokenConfig,
) -> Result<(String, String)> {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        role: role.as_str().to_string(),
        exp: now + config.refresh_ttl_days * 24 * 3600,
        iat: now,
        jti: Uuid::new_v4().to_string(),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )?;
    let hash = hash_refresh_token(&token);
    Ok((token, hash))
}

/// SHA-256 hex digest of a refresh token, for at-rest storage and lookup.
pub fn hash_refresh_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}
