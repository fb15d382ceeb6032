//! In-memory storage implementation

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;

use pagedesk_core::{ApprovalStatus, GlobalRole, RelationStatus};

use super::{
    AdminAction, AuditStore, ConnectedPage, InstagramAccount, PageId, PageRelation, PageStore,
    RefreshTokenRecord, RelationStore, RoleStore, StoreResult, TokenStore, UserId,
};
use crate::error::GatewayError;

/// In-memory store implementing every gateway store trait.
///
/// Used by tests and local development; each map is guarded by its own
/// lock, and composite-key operations take one write lock so upserts stay
/// atomic per key.
#[derive(Default)]
pub struct MemoryStore {
    relations: RwLock<HashMap<(UserId, PageId), PageRelation>>,
    pages: RwLock<HashMap<(UserId, PageId), ConnectedPage>>,
    instagram: RwLock<HashMap<(UserId, PageId), InstagramAccount>>,
    refresh: RwLock<HashMap<(UserId, String), RefreshTokenRecord>>,
    roles: RwLock<HashMap<UserId, GlobalRole>>,
    audit: RwLock<Vec<AdminAction>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RelationStore for MemoryStore {
    fn get_relation(
        &self,
        user_id: &UserId,
        page_id: &PageId,
    ) -> StoreResult<Option<PageRelation>> {
        let relations = self.relations.read().unwrap();
        Ok(relations.get(&(user_id.clone(), page_id.clone())).cloned())
    }

    fn relations_for_user(&self, user_id: &UserId) -> StoreResult<Vec<PageRelation>> {
        let relations = self.relations.read().unwrap();
        Ok(relations
            .values()
            .filter(|r| &r.user_id == user_id)
            .cloned()
            .collect())
    }

    fn relations_for_page(&self, page_id: &PageId) -> StoreResult<Vec<PageRelation>> {
        let relations = self.relations.read().unwrap();
        Ok(relations
            .values()
            .filter(|r| &r.page_id == page_id)
            .cloned()
            .collect())
    }

    fn upsert_relation(&self, relation: PageRelation) -> StoreResult<()> {
        let key = (relation.user_id.clone(), relation.page_id.clone());
        self.relations.write().unwrap().insert(key, relation);
        Ok(())
    }

    fn set_relation_status(
        &self,
        user_id: &UserId,
        page_id: &PageId,
        status: RelationStatus,
    ) -> StoreResult<()> {
        let mut relations = self.relations.write().unwrap();
        match relations.get_mut(&(user_id.clone(), page_id.clone())) {
            Some(rel) => {
                rel.relation_status = status;
                Ok(())
            }
            None => Err(GatewayError::NotFound("relation".to_string())),
        }
    }

    fn set_approval_status(
        &self,
        user_id: &UserId,
        page_id: &PageId,
        status: ApprovalStatus,
    ) -> StoreResult<()> {
        let mut relations = self.relations.write().unwrap();
        match relations.get_mut(&(user_id.clone(), page_id.clone())) {
            Some(rel) => {
                rel.approval_status = status;
                Ok(())
            }
            None => Err(GatewayError::NotFound("relation".to_string())),
        }
    }

    fn delete_relation(&self, user_id: &UserId, page_id: &PageId) -> StoreResult<()> {
        self.relations
            .write()
            .unwrap()
            .remove(&(user_id.clone(), page_id.clone()));
        Ok(())
    }

    fn list_all_relations(&self) -> StoreResult<Vec<PageRelation>> {
        Ok(self.relations.read().unwrap().values().cloned().collect())
    }
}

impl PageStore for MemoryStore {
    fn upsert_page(&self, page: ConnectedPage) -> StoreResult<()> {
        let key = (page.user_id.clone(), page.page_id.clone());
        self.pages.write().unwrap().insert(key, page);
        Ok(())
    }

    fn get_page(&self, user_id: &UserId, page_id: &PageId) -> StoreResult<Option<ConnectedPage>> {
        let pages = self.pages.read().unwrap();
        Ok(pages.get(&(user_id.clone(), page_id.clone())).cloned())
    }

    fn pages_for_user(&self, user_id: &UserId) -> StoreResult<Vec<ConnectedPage>> {
        let pages = self.pages.read().unwrap();
        Ok(pages
            .values()
            .filter(|p| &p.user_id == user_id)
            .cloned()
            .collect())
    }

    fn disconnect_page(&self, user_id: &UserId, page_id: &PageId) -> StoreResult<()> {
        let mut pages = self.pages.write().unwrap();
        match pages.get_mut(&(user_id.clone(), page_id.clone())) {
            Some(page) => {
                page.is_connected = false;
                Ok(())
            }
            None => Err(GatewayError::NotFound("page".to_string())),
        }
    }

    fn upsert_instagram(&self, account: InstagramAccount) -> StoreResult<()> {
        let key = (account.user_id.clone(), account.page_id.clone());
        self.instagram.write().unwrap().insert(key, account);
        Ok(())
    }
}

impl TokenStore for MemoryStore {
    fn insert_refresh(&self, record: RefreshTokenRecord) -> StoreResult<()> {
        let key = (record.user_id.clone(), record.token_hash.clone());
        self.refresh.write().unwrap().insert(key, record);
        Ok(())
    }

    fn find_refresh(
        &self,
        user_id: &UserId,
        hash: &str,
    ) -> StoreResult<Option<RefreshTokenRecord>> {
        let refresh = self.refresh.read().unwrap();
        Ok(refresh
            .get(&(user_id.clone(), hash.to_string()))
            .filter(|r| r.expires_at > Utc::now())
            .cloned())
    }

    fn delete_refresh(&self, user_id: &UserId, hash: &str) -> StoreResult<()> {
        self.refresh
            .write()
            .unwrap()
            .remove(&(user_id.clone(), hash.to_string()));
        Ok(())
    }

    fn rotate_refresh(
        &self,
        user_id: &UserId,
        old_hash: &str,
        new_record: RefreshTokenRecord,
    ) -> StoreResult<()> {
        // One write lock covers consume + insert, so there is no window
        // where both tokens are live.
        let mut refresh = self.refresh.write().unwrap();
        let old = refresh
            .remove(&(user_id.clone(), old_hash.to_string()))
            .filter(|r| r.expires_at > Utc::now());
        if old.is_none() {
            return Err(GatewayError::InvalidOrExpiredToken);
        }
        let key = (new_record.user_id.clone(), new_record.token_hash.clone());
        refresh.insert(key, new_record);
        Ok(())
    }

    fn delete_all_refresh(&self, user_id: &UserId) -> StoreResult<()> {
        self.refresh
            .write()
            .unwrap()
            .retain(|(uid, _), _| uid != user_id);
        Ok(())
    }
}

impl RoleStore for MemoryStore {
    fn global_role(&self, user_id: &UserId) -> StoreResult<Option<GlobalRole>> {
        Ok(self.roles.read().unwrap().get(user_id).copied())
    }

    fn set_global_role(&self, user_id: &UserId, role: GlobalRole) -> StoreResult<()> {
        self.roles.write().unwrap().insert(user_id.clone(), role);
        Ok(())
    }
}

impl AuditStore for MemoryStore {
    fn record_action(&self, action: AdminAction) -> StoreResult<()> {
        self.audit.write().unwrap().push(action);
        Ok(())
    }

    fn actions_for_admin(&self, admin_id: &UserId) -> StoreResult<Vec<AdminAction>> {
        let audit = self.audit.read().unwrap();
        Ok(audit
            .iter()
            .filter(|a| &a.admin_id == admin_id)
            .cloned()
            .collect())
    }
}
