//! Account-connection orchestration
//!
//! Drives the OAuth authorization-code flow: code exchange, page
//! enumeration, long-lived token upgrade, Instagram discovery, persistence,
//! and webhook subscription. Pages are processed independently so one
//! page's failure never aborts the others; webhook subscription is
//! best-effort and only ever logged.

use chrono::Utc;
use serde::Serialize;

use pagedesk_core::{ApprovalStatus, RelationStatus};

use crate::access::PAGE_ADMIN_ROLE;
use crate::error::GatewayError;
use crate::graph::{GraphPage, PlatformClient};
use crate::store::{
    ConnectedPage, InstagramAccount, PageId, PageRelation, PageStore, RelationStore, UserId,
};

/// Outcome of one side (Facebook or Instagram) of a page connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectStatus {
    Success,
    Error,
    NotFound,
    Skipped,
}

/// Per-page result entry in the connection report.
#[derive(Debug, Clone, Serialize)]
pub struct PageConnectResult {
    pub page_id: String,
    pub page_name: String,
    pub facebook: ConnectStatus,
    pub instagram: ConnectStatus,
}

/// Overall result of a connection flow. `success` reflects the shared
/// steps (code exchange, page enumeration); callers must inspect
/// `results` for per-page outcomes.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectReport {
    pub success: bool,
    pub results: Vec<PageConnectResult>,
}

/// Run the connection flow for an authenticated user.
///
/// Re-running with a fresh code re-upserts the same rows: the upsert key is
/// the natural `(user, page)` identity, so no duplicates are created and
/// tokens are refreshed in place.
pub async fn connect_account<D, G>(
    store: &D,
    platform: &G,
    user_id: &UserId,
    code: &str,
) -> Result<ConnectReport, GatewayError>
where
    D: PageStore + RelationStore + ?Sized,
    G: PlatformClient + ?Sized,
{
    let user_token = platform.exchange_code(code).await?;

    let pages = platform.list_pages(&user_token).await?;
    if pages.is_empty() {
        // Terminal and user-correctable: the grant did not include any
        // pages. Not retried here.
        return Err(GatewayError::NotFound(
            "no pages granted by the platform".to_string(),
        ));
    }

    let mut results = Vec::with_capacity(pages.len());
    for page in pages {
        results.push(connect_one_page(store, platform, user_id, page).await);
    }

    Ok(ConnectReport {
        success: true,
        results,
    })
}

/// Connect a single page. Never returns an error: failures are folded into
/// the per-page status so sibling pages keep going.
async fn connect_one_page<D, G>(
    store: &D,
    platform: &G,
    user_id: &UserId,
    page: GraphPage,
) -> PageConnectResult
where
    D: PageStore + RelationStore + ?Sized,
    G: PlatformClient + ?Sized,
{
    let mut result = PageConnectResult {
        page_id: page.id.clone(),
        page_name: page.name.clone(),
        facebook: ConnectStatus::Success,
        instagram: ConnectStatus::Skipped,
    };

    let long_lived = match platform.exchange_long_lived(&page.access_token).await {
        Ok(token) => token,
        Err(e) => {
            tracing::warn!(page = %page.id, error = %e, "Long-lived token exchange failed");
            result.facebook = ConnectStatus::Error;
            return result;
        }
    };

    let instagram_id = match platform.instagram_account(&page.id, &long_lived).await {
        Ok(id) => id,
        Err(e) => {
            // The page connection itself can still proceed.
            tracing::warn!(page = %page.id, error = %e, "Instagram lookup failed");
            result.instagram = ConnectStatus::Error;
            None
        }
    };

    let page_id = PageId(page.id.clone());
    let connected = ConnectedPage {
        page_id: page_id.clone(),
        user_id: user_id.clone(),
        owner_id: user_id.clone(),
        name: page.name.clone(),
        category: page.category.clone(),
        // Only the long-lived token is ever persisted.
        access_token: long_lived.clone(),
        instagram_business_account_id: instagram_id.clone(),
        is_connected: true,
        connected_at: Utc::now(),
    };
    if let Err(e) = store.upsert_page(connected) {
        tracing::error!(page = %page.id, error = %e, "Failed to persist connected page");
        result.facebook = ConnectStatus::Error;
        return result;
    }

    // The connecting user becomes the page owner with management rights.
    let owner_relation = PageRelation {
        user_id: user_id.clone(),
        page_id: page_id.clone(),
        roles: vec![PAGE_ADMIN_ROLE.to_string()],
        owner_id: user_id.clone(),
        relation_status: RelationStatus::Active,
        approval_status: ApprovalStatus::Accepted,
    };
    if let Err(e) = store.upsert_relation(owner_relation) {
        tracing::error!(page = %page.id, error = %e, "Failed to persist owner relation");
        result.facebook = ConnectStatus::Error;
        return result;
    }

    // Best effort: the connection stays valid without push delivery.
    if let Err(e) = platform.subscribe_page(&page.id, &long_lived).await {
        tracing::warn!(page = %page.id, error = %e, "Page webhook subscription failed");
    }

    match instagram_id {
        Some(ig_id) => {
            result.instagram = connect_instagram(store, platform, user_id, &page_id, &ig_id, &long_lived).await;
        }
        None if result.instagram == ConnectStatus::Error => {
            // Lookup already failed above; keep the error status.
        }
        None => {
            result.instagram = ConnectStatus::NotFound;
        }
    }

    result
}

async fn connect_instagram<D, G>(
    store: &D,
    platform: &G,
    user_id: &UserId,
    page_id: &PageId,
    ig_id: &str,
    page_token: &str,
) -> ConnectStatus
where
    D: PageStore + RelationStore + ?Sized,
    G: PlatformClient + ?Sized,
{
    let username = match platform.instagram_username(ig_id, page_token).await {
        Ok(username) => username,
        Err(e) => {
            tracing::warn!(ig = %ig_id, error = %e, "Instagram username fetch failed");
            return ConnectStatus::Error;
        }
    };

    let account = InstagramAccount {
        ig_id: ig_id.to_string(),
        page_id: page_id.clone(),
        user_id: user_id.clone(),
        username,
        is_connected: true,
    };
    if let Err(e) = store.upsert_instagram(account) {
        tracing::error!(ig = %ig_id, error = %e, "Failed to persist Instagram account");
        return ConnectStatus::Error;
    }

    if let Err(e) = platform.subscribe_instagram(ig_id, page_token).await {
        tracing::warn!(ig = %ig_id, error = %e, "Instagram webhook subscription failed");
    }

    ConnectStatus::Success
}
