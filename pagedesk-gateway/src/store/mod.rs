//! Storage abstractions for the gateway

pub mod memory;
pub mod models;
pub mod sqlite;

pub use memory::MemoryStore;
pub use models::*;
pub use sqlite::SqliteStore;

use pagedesk_core::{ApprovalStatus, GlobalRole, RelationStatus};

use crate::error::GatewayError;

/// Result type for store operations
pub type StoreResult<T> = Result<T, GatewayError>;

/// Page-relation rows: the access-control source of truth.
pub trait RelationStore: Send + Sync {
    /// Get the relation for one (user, page) pair
    fn get_relation(&self, user_id: &UserId, page_id: &PageId) -> StoreResult<Option<PageRelation>>;

    /// All relations held by a user
    fn relations_for_user(&self, user_id: &UserId) -> StoreResult<Vec<PageRelation>>;

    /// All relations attached to a page
    fn relations_for_page(&self, page_id: &PageId) -> StoreResult<Vec<PageRelation>>;

    /// Insert or replace the relation for its (user, page) key.
    /// Atomic per composite key; the incoming row is a full snapshot of the
    /// mutable fields.
    fn upsert_relation(&self, relation: PageRelation) -> StoreResult<()>;

    /// Update relation status for an existing row
    fn set_relation_status(
        &self,
        user_id: &UserId,
        page_id: &PageId,
        status: RelationStatus,
    ) -> StoreResult<()>;

    /// Update approval status for an existing row
    fn set_approval_status(
        &self,
        user_id: &UserId,
        page_id: &PageId,
        status: ApprovalStatus,
    ) -> StoreResult<()>;

    /// Remove a user from a page
    fn delete_relation(&self, user_id: &UserId, page_id: &PageId) -> StoreResult<()>;

    /// Every relation row (privileged listing)
    fn list_all_relations(&self) -> StoreResult<Vec<PageRelation>>;
}

/// Connected pages and their linked Instagram accounts.
pub trait PageStore: Send + Sync {
    /// Insert or replace a page keyed on (user_id, page_id)
    fn upsert_page(&self, page: ConnectedPage) -> StoreResult<()>;

    fn get_page(&self, user_id: &UserId, page_id: &PageId) -> StoreResult<Option<ConnectedPage>>;

    fn pages_for_user(&self, user_id: &UserId) -> StoreResult<Vec<ConnectedPage>>;

    /// Soft delete: mark the page disconnected, keep the row
    fn disconnect_page(&self, user_id: &UserId, page_id: &PageId) -> StoreResult<()>;

    fn upsert_instagram(&self, account: InstagramAccount) -> StoreResult<()>;
}

/// Refresh-token records, stored by hash.
pub trait TokenStore: Send + Sync {
    fn insert_refresh(&self, record: RefreshTokenRecord) -> StoreResult<()>;

    /// Look up a live (unexpired) record by user and token hash
    fn find_refresh(&self, user_id: &UserId, hash: &str) -> StoreResult<Option<RefreshTokenRecord>>;

    fn delete_refresh(&self, user_id: &UserId, hash: &str) -> StoreResult<()>;

    /// Consume `old_hash` and persist `new_record` as one transition.
    /// Fails with `InvalidOrExpiredToken` when `old_hash` does not match a
    /// live row; on failure nothing is written.
    fn rotate_refresh(
        &self,
        user_id: &UserId,
        old_hash: &str,
        new_record: RefreshTokenRecord,
    ) -> StoreResult<()>;

    /// Drop every refresh token a user holds (logout-everywhere, deletion)
    fn delete_all_refresh(&self, user_id: &UserId) -> StoreResult<()>;
}

/// Authoritative server-side copy of each user's global role.
pub trait RoleStore: Send + Sync {
    fn global_role(&self, user_id: &UserId) -> StoreResult<Option<GlobalRole>>;

    fn set_global_role(&self, user_id: &UserId, role: GlobalRole) -> StoreResult<()>;
}

/// Append-only audit log for privileged mutations.
pub trait AuditStore: Send + Sync {
    fn record_action(&self, action: AdminAction) -> StoreResult<()>;

    fn actions_for_admin(&self, admin_id: &UserId) -> StoreResult<Vec<AdminAction>>;
}
