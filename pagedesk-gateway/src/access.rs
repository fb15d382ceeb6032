//! Access-control evaluation
//!
//! Answers "can user U perform action A on resource R" from the global role
//! hierarchy and, for page resources, the stored page relation. Evaluation
//! is read-only and recomputed on every check; nothing here caches a
//! decision. Store read failures propagate as errors so callers deny access
//! rather than defaulting open.

use pagedesk_core::{Feature, GlobalRole, RelationStatus};

use crate::error::GatewayError;
use crate::store::{PageId, RelationStore, StoreResult, UserId};

/// Page-scoped role that grants management rights.
pub const PAGE_ADMIN_ROLE: &str = "admin";

/// Whether a global role passes a feature gate. Pure rank comparison.
pub fn global_access(role: GlobalRole, feature: Feature) -> bool {
    role.allows(feature)
}

/// Whether the user holds `required_role` on the page (or owns it).
///
/// False when no relation exists or the relation is not active. Ownership
/// implies every page-scoped role.
pub fn page_access<S>(
    store: &S,
    user_id: &UserId,
    page_id: &PageId,
    required_role: &str,
) -> StoreResult<bool>
where
    S: RelationStore + ?Sized,
{
    let Some(relation) = store.get_relation(user_id, page_id)? else {
        return Ok(false);
    };
    if relation.relation_status != RelationStatus::Active {
        return Ok(false);
    }
    Ok(relation.is_owner() || relation.has_role(required_role))
}

/// Whether the user may manage the page: owner, or active `admin` relation.
pub fn can_manage_page<S>(store: &S, user_id: &UserId, page_id: &PageId) -> StoreResult<bool>
where
    S: RelationStore + ?Sized,
{
    page_access(store, user_id, page_id, PAGE_ADMIN_ROLE)
}

/// Deny with `Forbidden` unless the user may manage the page.
pub fn require_manage<S>(store: &S, user_id: &UserId, page_id: &PageId) -> Result<(), GatewayError>
where
    S: RelationStore + ?Sized,
{
    if can_manage_page(store, user_id, page_id)? {
        Ok(())
    } else {
        Err(GatewayError::Forbidden)
    }
}
