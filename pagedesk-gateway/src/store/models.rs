//! Data models for gateway storage

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pagedesk_core::{ApprovalStatus, RelationStatus};

/// Identity-provider-issued user identifier (opaque, stable)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

/// External page identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageId(pub String);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::fmt::Display for PageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// One user's relationship to one connected page.
///
/// Exactly one row exists per `(user_id, page_id)` pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRelation {
    pub user_id: UserId,
    pub page_id: PageId,
    /// Page-scoped role strings; membership tested by containment.
    pub roles: Vec<String>,
    /// The user who originally connected the page.
    pub owner_id: UserId,
    pub relation_status: RelationStatus,
    pub approval_status: ApprovalStatus,
}

impl PageRelation {
    pub fn is_owner(&self) -> bool {
        self.owner_id == self.user_id
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// A connected Facebook page tied to one connecting user.
///
/// The stored access token is always the long-lived variant; short-lived
/// tokens never reach the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectedPage {
    pub page_id: PageId,
    pub user_id: UserId,
    pub owner_id: UserId,
    pub name: String,
    pub category: Option<String>,
    pub access_token: String,
    pub instagram_business_account_id: Option<String>,
    pub is_connected: bool,
    pub connected_at: DateTime<Utc>,
}

/// An Instagram business account linked to a connected page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstagramAccount {
    pub ig_id: String,
    pub page_id: PageId,
    pub user_id: UserId,
    pub username: String,
    pub is_connected: bool,
}

/// A persisted refresh-token record. Holds the SHA-256 hash of the token,
/// never the plaintext.
#[derive(Debug, Clone)]
pub struct RefreshTokenRecord {
    pub user_id: UserId,
    pub provider: String,
    pub token_hash: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Immutable audit record appended by privileged mutations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminAction {
    pub admin_id: UserId,
    pub action: String,
    pub target_user_id: Option<UserId>,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Minimized projection of an identity-provider user record. This is the
/// only shape admin list operations may return.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityUser {
    pub id: UserId,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// A relation row joined with display data for the privileged listing.
#[derive(Debug, Clone, Serialize)]
pub struct RelationListing {
    pub user_id: UserId,
    pub email: Option<String>,
    pub page_id: PageId,
    pub page_name: Option<String>,
    pub roles: Vec<String>,
    pub relation_status: RelationStatus,
    pub approval_status: ApprovalStatus,
}
