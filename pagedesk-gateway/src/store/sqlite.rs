//! SQLite-based storage implementation

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use pagedesk_core::{ApprovalStatus, GlobalRole, RelationStatus};

use super::{
    AdminAction, AuditStore, ConnectedPage, InstagramAccount, PageId, PageRelation, PageStore,
    RefreshTokenRecord, RelationStore, RoleStore, StoreResult, TokenStore, UserId,
};
use crate::error::GatewayError;

/// Current schema version
const SCHEMA_VERSION: i32 = 1;

/// SQLite-based store implementing every gateway store trait
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

fn internal(e: impl std::fmt::Display) -> GatewayError {
    GatewayError::Internal(e.to_string())
}

impl SqliteStore {
    /// Open or create a SQLite database at the given path
    pub fn open(path: &str) -> Result<Self, GatewayError> {
        let conn = Connection::open(path).map_err(internal)?;

        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(internal)?;

        Self::migrate(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run database migrations
    fn migrate(conn: &Connection) -> Result<(), GatewayError> {
        let current_version = Self::get_schema_version(conn)?;

        if current_version < SCHEMA_VERSION {
            tracing::info!(
                current = current_version,
                target = SCHEMA_VERSION,
                "Running database migrations"
            );

            if current_version < 1 {
                Self::migrate_v1(conn)?;
            }

            conn.execute(
                "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
                params![SCHEMA_VERSION],
            )
            .map_err(internal)?;

            tracing::info!("Database migrations complete");
        }

        Ok(())
    }

    /// Get current schema version (0 if no schema exists)
    fn get_schema_version(conn: &Connection) -> Result<i32, GatewayError> {
        let table_exists: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
                [],
                |row| row.get(0),
            )
            .map_err(internal)?;

        if !table_exists {
            return Ok(0);
        }

        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
            row.get::<_, Option<i32>>(0).map(|v| v.unwrap_or(0))
        })
        .map_err(internal)
    }

    /// Migration to version 1: initial schema
    fn migrate_v1(conn: &Connection) -> Result<(), GatewayError> {
        conn.execute_batch(
            r#"
            -- Schema version tracking
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            );

            -- Global role per user (authoritative server-side copy)
            CREATE TABLE IF NOT EXISTS user_roles (
                user_id TEXT PRIMARY KEY,
                role TEXT NOT NULL
            );

            -- Audit log for privileged mutations (append only)
            CREATE TABLE IF NOT EXISTS admin_actions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                admin_id TEXT NOT NULL,
                action TEXT NOT NULL,
                target_user_id TEXT,
                details TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_admin_actions_admin ON admin_actions(admin_id);

            -- Connected Facebook pages, one row per (user, page)
            CREATE TABLE IF NOT EXISTS facebook_pages (
                user_id TEXT NOT NULL,
                page_id TEXT NOT NULL,
                owner_id TEXT NOT NULL,
                page_name TEXT NOT NULL,
                category TEXT,
                access_token TEXT NOT NULL,
                instagram_business_account_id TEXT,
                is_connected INTEGER NOT NULL DEFAULT 1,
                connected_at TEXT NOT NULL,
                PRIMARY KEY (user_id, page_id)
            );

            -- Linked Instagram business accounts
            CREATE TABLE IF NOT EXISTS instagram_accounts (
                user_id TEXT NOT NULL,
                page_id TEXT NOT NULL,
                ig_id TEXT NOT NULL,
                username TEXT NOT NULL,
                is_connected INTEGER NOT NULL DEFAULT 1,
                PRIMARY KEY (user_id, page_id)
            );

            -- Page relations: the access-control source of truth
            CREATE TABLE IF NOT EXISTS user_pages_relations (
                user_id TEXT NOT NULL,
                page_id TEXT NOT NULL,
                user_roles TEXT NOT NULL,
                owner_id TEXT NOT NULL,
                relation_status TEXT NOT NULL,
                approval_status TEXT NOT NULL,
                PRIMARY KEY (user_id, page_id)
            );
            CREATE INDEX IF NOT EXISTS idx_relations_page ON user_pages_relations(page_id);

            -- Refresh tokens, stored by SHA-256 hash
            CREATE TABLE IF NOT EXISTS user_oauth_tokens (
                user_id TEXT NOT NULL,
                provider TEXT NOT NULL,
                token_hash TEXT NOT NULL,
                issued_at TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                PRIMARY KEY (user_id, token_hash)
            );
            "#,
        )
        .map_err(internal)
    }
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, GatewayError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(internal)
}

/// Wrap a column-conversion failure so it can flow out of a row mapper.
fn column_err(
    idx: usize,
    e: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
}

impl SqliteStore {
    fn read_relation_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PageRelation> {
        let roles_json: String = row.get(2)?;
        let relation_status: String = row.get(4)?;
        let approval_status: String = row.get(5)?;
        Ok(PageRelation {
            user_id: UserId(row.get(0)?),
            page_id: PageId(row.get(1)?),
            roles: serde_json::from_str(&roles_json).map_err(|e| column_err(2, e))?,
            owner_id: UserId(row.get(3)?),
            relation_status: RelationStatus::parse(&relation_status)
                .map_err(|e| column_err(4, e))?,
            approval_status: ApprovalStatus::parse(&approval_status)
                .map_err(|e| column_err(5, e))?,
        })
    }

    fn read_page_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ConnectedPage> {
        let connected_at: String = row.get(8)?;
        Ok(ConnectedPage {
            user_id: UserId(row.get(0)?),
            page_id: PageId(row.get(1)?),
            owner_id: UserId(row.get(2)?),
            name: row.get(3)?,
            category: row.get(4)?,
            access_token: row.get(5)?,
            instagram_business_account_id: row.get(6)?,
            is_connected: row.get::<_, i64>(7)? != 0,
            connected_at: DateTime::parse_from_rfc3339(&connected_at)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| column_err(8, e))?,
        })
    }
}

const RELATION_COLUMNS: &str =
    "user_id, page_id, user_roles, owner_id, relation_status, approval_status";
const PAGE_COLUMNS: &str = "user_id, page_id, owner_id, page_name, category, access_token, \
     instagram_business_account_id, is_connected, connected_at";

impl RelationStore for SqliteStore {
    fn get_relation(
        &self,
        user_id: &UserId,
        page_id: &PageId,
    ) -> StoreResult<Option<PageRelation>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            &format!(
                "SELECT {RELATION_COLUMNS} FROM user_pages_relations WHERE user_id = ?1 AND page_id = ?2"
            ),
            params![user_id.0, page_id.0],
            Self::read_relation_row,
        )
        .optional()
        .map_err(internal)
    }

    fn relations_for_user(&self, user_id: &UserId) -> StoreResult<Vec<PageRelation>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {RELATION_COLUMNS} FROM user_pages_relations WHERE user_id = ?1"
            ))
            .map_err(internal)?;
        let rows = stmt
            .query_map(params![user_id.0], Self::read_relation_row)
            .map_err(internal)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(internal)
    }

    fn relations_for_page(&self, page_id: &PageId) -> StoreResult<Vec<PageRelation>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {RELATION_COLUMNS} FROM user_pages_relations WHERE page_id = ?1"
            ))
            .map_err(internal)?;
        let rows = stmt
            .query_map(params![page_id.0], Self::read_relation_row)
            .map_err(internal)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(internal)
    }

    fn upsert_relation(&self, relation: PageRelation) -> StoreResult<()> {
        let roles_json = serde_json::to_string(&relation.roles).map_err(internal)?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO user_pages_relations \
                 (user_id, page_id, user_roles, owner_id, relation_status, approval_status) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
             ON CONFLICT(user_id, page_id) DO UPDATE SET \
                 user_roles = excluded.user_roles, \
                 owner_id = excluded.owner_id, \
                 relation_status = excluded.relation_status, \
                 approval_status = excluded.approval_status",
            params![
                relation.user_id.0,
                relation.page_id.0,
                roles_json,
                relation.owner_id.0,
                relation.relation_status.as_str(),
                relation.approval_status.as_str(),
            ],
        )
        .map_err(internal)?;
        Ok(())
    }

    fn set_relation_status(
        &self,
        user_id: &UserId,
        page_id: &PageId,
        status: RelationStatus,
    ) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute(
                "UPDATE user_pages_relations SET relation_status = ?3 \
                 WHERE user_id = ?1 AND page_id = ?2",
                params![user_id.0, page_id.0, status.as_str()],
            )
            .map_err(internal)?;
        if changed == 0 {
            return Err(GatewayError::NotFound("relation".to_string()));
        }
        Ok(())
    }

    fn set_approval_status(
        &self,
        user_id: &UserId,
        page_id: &PageId,
        status: ApprovalStatus,
    ) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute(
                "UPDATE user_pages_relations SET approval_status = ?3 \
                 WHERE user_id = ?1 AND page_id = ?2",
                params![user_id.0, page_id.0, status.as_str()],
            )
            .map_err(internal)?;
        if changed == 0 {
            return Err(GatewayError::NotFound("relation".to_string()));
        }
        Ok(())
    }

    fn delete_relation(&self, user_id: &UserId, page_id: &PageId) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM user_pages_relations WHERE user_id = ?1 AND page_id = ?2",
            params![user_id.0, page_id.0],
        )
        .map_err(internal)?;
        Ok(())
    }

    fn list_all_relations(&self) -> StoreResult<Vec<PageRelation>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {RELATION_COLUMNS} FROM user_pages_relations"
            ))
            .map_err(internal)?;
        let rows = stmt
            .query_map([], Self::read_relation_row)
            .map_err(internal)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(internal)
    }
}

impl PageStore for SqliteStore {
    fn upsert_page(&self, page: ConnectedPage) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO facebook_pages \
                 (user_id, page_id, owner_id, page_name, category, access_token, \
                  instagram_business_account_id, is_connected, connected_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9) \
             ON CONFLICT(user_id, page_id) DO UPDATE SET \
                 owner_id = excluded.owner_id, \
                 page_name = excluded.page_name, \
                 category = excluded.category, \
                 access_token = excluded.access_token, \
                 instagram_business_account_id = excluded.instagram_business_account_id, \
                 is_connected = excluded.is_connected, \
                 connected_at = excluded.connected_at",
            params![
                page.user_id.0,
                page.page_id.0,
                page.owner_id.0,
                page.name,
                page.category,
                page.access_token,
                page.instagram_business_account_id,
                page.is_connected as i64,
                page.connected_at.to_rfc3339(),
            ],
        )
        .map_err(internal)?;
        Ok(())
    }

    fn get_page(&self, user_id: &UserId, page_id: &PageId) -> StoreResult<Option<ConnectedPage>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            &format!(
                "SELECT {PAGE_COLUMNS} FROM facebook_pages WHERE user_id = ?1 AND page_id = ?2"
            ),
            params![user_id.0, page_id.0],
            Self::read_page_row,
        )
        .optional()
        .map_err(internal)
    }

    fn pages_for_user(&self, user_id: &UserId) -> StoreResult<Vec<ConnectedPage>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {PAGE_COLUMNS} FROM facebook_pages WHERE user_id = ?1"
            ))
            .map_err(internal)?;
        let rows = stmt
            .query_map(params![user_id.0], Self::read_page_row)
            .map_err(internal)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(internal)
    }

    fn disconnect_page(&self, user_id: &UserId, page_id: &PageId) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute(
                "UPDATE facebook_pages SET is_connected = 0 \
                 WHERE user_id = ?1 AND page_id = ?2",
                params![user_id.0, page_id.0],
            )
            .map_err(internal)?;
        if changed == 0 {
            return Err(GatewayError::NotFound("page".to_string()));
        }
        Ok(())
    }

    fn upsert_instagram(&self, account: InstagramAccount) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO instagram_accounts (user_id, page_id, ig_id, username, is_connected) \
             VALUES (?1, ?2, ?3, ?4, ?5) \
             ON CONFLICT(user_id, page_id) DO UPDATE SET \
                 ig_id = excluded.ig_id, \
                 username = excluded.username, \
                 is_connected = excluded.is_connected",
            params![
                account.user_id.0,
                account.page_id.0,
                account.ig_id,
                account.username,
                account.is_connected as i64,
            ],
        )
        .map_err(internal)?;
        Ok(())
    }
}

impl TokenStore for SqliteStore {
    fn insert_refresh(&self, record: RefreshTokenRecord) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO user_oauth_tokens \
                 (user_id, provider, token_hash, issued_at, expires_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.user_id.0,
                record.provider,
                record.token_hash,
                record.issued_at.to_rfc3339(),
                record.expires_at.to_rfc3339(),
            ],
        )
        .map_err(internal)?;
        Ok(())
    }

    fn find_refresh(
        &self,
        user_id: &UserId,
        hash: &str,
    ) -> StoreResult<Option<RefreshTokenRecord>> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT user_id, provider, token_hash, issued_at, expires_at \
                 FROM user_oauth_tokens \
                 WHERE user_id = ?1 AND token_hash = ?2 AND expires_at > ?3",
                params![user_id.0, hash, Utc::now().to_rfc3339()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()
            .map_err(internal)?;
        match row {
            Some((user, provider, token_hash, issued_at, expires_at)) => {
                Ok(Some(RefreshTokenRecord {
                    user_id: UserId(user),
                    provider,
                    token_hash,
                    issued_at: parse_timestamp(&issued_at)?,
                    expires_at: parse_timestamp(&expires_at)?,
                }))
            }
            None => Ok(None),
        }
    }

    fn delete_refresh(&self, user_id: &UserId, hash: &str) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM user_oauth_tokens WHERE user_id = ?1 AND token_hash = ?2",
            params![user_id.0, hash],
        )
        .map_err(internal)?;
        Ok(())
    }

    fn rotate_refresh(
        &self,
        user_id: &UserId,
        old_hash: &str,
        new_record: RefreshTokenRecord,
    ) -> StoreResult<()> {
        // Delete + insert inside one transaction: the old token is consumed
        // and the new one created as a single transition.
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().map_err(internal)?;

        let consumed = tx
            .execute(
                "DELETE FROM user_oauth_tokens \
                 WHERE user_id = ?1 AND token_hash = ?2 AND expires_at > ?3",
                params![user_id.0, old_hash, Utc::now().to_rfc3339()],
            )
            .map_err(internal)?;
        if consumed == 0 {
            // Transaction rolls back on drop.
            return Err(GatewayError::InvalidOrExpiredToken);
        }

        tx.execute(
            "INSERT INTO user_oauth_tokens \
                 (user_id, provider, token_hash, issued_at, expires_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                new_record.user_id.0,
                new_record.provider,
                new_record.token_hash,
                new_record.issued_at.to_rfc3339(),
                new_record.expires_at.to_rfc3339(),
            ],
        )
        .map_err(internal)?;

        tx.commit().map_err(internal)
    }

    fn delete_all_refresh(&self, user_id: &UserId) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM user_oauth_tokens WHERE user_id = ?1",
            params![user_id.0],
        )
        .map_err(internal)?;
        Ok(())
    }
}

impl RoleStore for SqliteStore {
    fn global_role(&self, user_id: &UserId) -> StoreResult<Option<GlobalRole>> {
        let conn = self.conn.lock().unwrap();
        let role: Option<String> = conn
            .query_row(
                "SELECT role FROM user_roles WHERE user_id = ?1",
                params![user_id.0],
                |row| row.get(0),
            )
            .optional()
            .map_err(internal)?;
        match role {
            Some(role) => Ok(Some(GlobalRole::parse(&role).map_err(internal)?)),
            None => Ok(None),
        }
    }

    fn set_global_role(&self, user_id: &UserId, role: GlobalRole) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO user_roles (user_id, role) VALUES (?1, ?2) \
             ON CONFLICT(user_id) DO UPDATE SET role = excluded.role",
            params![user_id.0, role.as_str()],
        )
        .map_err(internal)?;
        Ok(())
    }
}

impl AuditStore for SqliteStore {
    fn record_action(&self, action: AdminAction) -> StoreResult<()> {
        let details = serde_json::to_string(&action.details).map_err(internal)?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO admin_actions (admin_id, action, target_user_id, details, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                action.admin_id.0,
                action.action,
                action.target_user_id.as_ref().map(|u| u.0.clone()),
                details,
                action.created_at.to_rfc3339(),
            ],
        )
        .map_err(internal)?;
        Ok(())
    }

    fn actions_for_admin(&self, admin_id: &UserId) -> StoreResult<Vec<AdminAction>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT admin_id, action, target_user_id, details, created_at \
                 FROM admin_actions WHERE admin_id = ?1 ORDER BY id",
            )
            .map_err(internal)?;
        let rows = stmt
            .query_map(params![admin_id.0], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })
            .map_err(internal)?;

        let mut actions = Vec::new();
        for row in rows {
            let (admin, action, target, details, created_at) = row.map_err(internal)?;
            actions.push(AdminAction {
                admin_id: UserId(admin),
                action,
                target_user_id: target.map(UserId),
                details: serde_json::from_str(&details).map_err(internal)?,
                created_at: parse_timestamp(&created_at)?,
            });
        }
        Ok(actions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_temp() -> (SqliteStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.db");
        let store = SqliteStore::open(path.to_str().unwrap()).unwrap();
        (store, dir)
    }

    #[test]
    fn test_migration_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.db");
        drop(SqliteStore::open(path.to_str().unwrap()).unwrap());
        // Re-opening the same file must not re-run migrations destructively.
        drop(SqliteStore::open(path.to_str().unwrap()).unwrap());
    }

    #[test]
    fn test_relation_round_trip() {
        let (store, _dir) = open_temp();
        let relation = PageRelation {
            user_id: UserId("u1".to_string()),
            page_id: PageId("p1".to_string()),
            roles: vec!["admin".to_string(), "editor".to_string()],
            owner_id: UserId("u1".to_string()),
            relation_status: RelationStatus::Active,
            approval_status: ApprovalStatus::Accepted,
        };
        store.upsert_relation(relation.clone()).unwrap();

        let loaded = store
            .get_relation(&relation.user_id, &relation.page_id)
            .unwrap()
            .unwrap();
        assert_eq!(loaded.roles, relation.roles);
        assert_eq!(loaded.relation_status, RelationStatus::Active);
        assert!(loaded.is_owner());
    }

    #[test]
    fn test_rotate_refresh_rejects_unknown_hash() {
        let (store, _dir) = open_temp();
        let user = UserId("u1".to_string());
        let now = Utc::now();
        let err = store
            .rotate_refresh(
                &user,
                "never-issued",
                RefreshTokenRecord {
                    user_id: user.clone(),
                    provider: "pagedesk".to_string(),
                    token_hash: "new".to_string(),
                    issued_at: now,
                    expires_at: now + chrono::Duration::days(30),
                },
            )
            .unwrap_err();
        assert!(matches!(err, GatewayError::InvalidOrExpiredToken));
        // The failed rotation must not have written the new token.
        assert!(store.find_refresh(&user, "new").unwrap().is_none());
    }

    #[test]
    fn test_page_upsert_replaces_token() {
        let (store, _dir) = open_temp();
        let user = UserId("u1".to_string());
        let page = |token: &str| ConnectedPage {
            page_id: PageId("p1".to_string()),
            user_id: user.clone(),
            owner_id: user.clone(),
            name: "My Page".to_string(),
            category: Some("Retail".to_string()),
            access_token: token.to_string(),
            instagram_business_account_id: None,
            is_connected: true,
            connected_at: Utc::now(),
        };

        store.upsert_page(page("token-1")).unwrap();
        store.upsert_page(page("token-2")).unwrap();

        let pages = store.pages_for_user(&user).unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].access_token, "token-2");
    }
}
