//! libSQL backend — async `Database` trait implementation.
//!
//! Supports local file and in-memory databases. A single connection is
//! reused for all operations; `libsql::Connection` is `Send + Sync` and
//! safe for concurrent async use.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::store::migrations;
use crate::store::model::{
    Account, AgentVariant, ChatMessage, ExportRow, ExtractedVariable, NewAccount, Role,
    SessionSummary,
};
use crate::store::traits::Database;

/// libSQL database backend.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;
        Self::from_db(db).await
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;
        Self::from_db(db).await
    }

    async fn from_db(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        // Cascade deletes from accounts to messages/variables.
        backend
            .conn
            .execute("PRAGMA foreign_keys = ON", ())
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to enable foreign keys: {e}")))?;
        Ok(backend)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

/// Convert `Option<&str>` to a libsql Value (NULL when absent).
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

fn parse_variant(s: &str) -> AgentVariant {
    s.parse().unwrap_or(AgentVariant::Basic)
}

fn parse_role(s: &str) -> Role {
    if s == "agent" { Role::Agent } else { Role::User }
}

/// Map a libsql row to an Account.
///
/// Column order matches ACCOUNT_COLUMNS:
/// 0:id, 1:username, 2:password_hash, 3:variant, 4:is_admin,
/// 5:active_session_id, 6:active_thread_id, 7:created_at
fn row_to_account(row: &libsql::Row) -> Result<Account, libsql::Error> {
    let variant_str: String = row.get(3)?;
    let is_admin: i64 = row.get(4)?;
    let created_str: String = row.get(7)?;

    Ok(Account {
        id: row.get(0)?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
        variant: parse_variant(&variant_str),
        is_admin: is_admin != 0,
        active_session_id: row.get::<String>(5).ok(),
        active_thread_id: row.get::<String>(6).ok(),
        created_at: parse_datetime(&created_str),
    })
}

fn row_to_message(row: &libsql::Row) -> Result<ChatMessage, libsql::Error> {
    let role_str: String = row.get(3)?;
    let created_str: String = row.get(5)?;
    Ok(ChatMessage {
        id: row.get(0)?,
        account_id: row.get(1)?,
        session_id: row.get(2)?,
        role: parse_role(&role_str),
        content: row.get(4)?,
        created_at: parse_datetime(&created_str),
    })
}

const ACCOUNT_COLUMNS: &str = "id, username, password_hash, variant, is_admin, \
     active_session_id, active_thread_id, created_at";

const MESSAGE_COLUMNS: &str = "id, account_id, session_id, role, content, created_at";

#[async_trait]
impl Database for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(&self.conn).await
    }

    // ── Accounts ────────────────────────────────────────────────────

    async fn create_account(&self, account: &NewAccount) -> Result<i64, DatabaseError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO accounts (username, password_hash, variant, is_admin, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                account.username.as_str(),
                account.password_hash.as_str(),
                account.variant.as_str(),
                account.is_admin as i64,
                Utc::now().to_rfc3339(),
            ],
        )
        .await
        .map_err(|e| {
            if e.to_string().contains("UNIQUE") {
                DatabaseError::Constraint(format!("username already exists: {}", account.username))
            } else {
                DatabaseError::Query(format!("create_account: {e}"))
            }
        })?;

        let id = conn.last_insert_rowid();
        debug!(account_id = id, username = %account.username, "Account created");
        Ok(id)
    }

    async fn create_accounts(&self, accounts: &[NewAccount]) -> Result<usize, DatabaseError> {
        let conn = self.conn();
        let tx = conn
            .transaction()
            .await
            .map_err(|e| DatabaseError::Query(format!("create_accounts begin: {e}")))?;

        let now = Utc::now().to_rfc3339();
        for account in accounts {
            let result = tx
                .execute(
                    "INSERT INTO accounts (username, password_hash, variant, is_admin, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        account.username.as_str(),
                        account.password_hash.as_str(),
                        account.variant.as_str(),
                        account.is_admin as i64,
                        now.as_str(),
                    ],
                )
                .await;
            if let Err(e) = result {
                tx.rollback()
                    .await
                    .map_err(|e| DatabaseError::Query(format!("create_accounts rollback: {e}")))?;
                return Err(DatabaseError::Query(format!(
                    "create_accounts ({}): {e}",
                    account.username
                )));
            }
        }

        tx.commit()
            .await
            .map_err(|e| DatabaseError::Query(format!("create_accounts commit: {e}")))?;
        Ok(accounts.len())
    }

    async fn get_account(&self, id: i64) -> Result<Option<Account>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?1"),
                params![id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_account: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_account(&row).map_err(|e| {
                DatabaseError::Query(format!("get_account row parse: {e}"))
            })?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_account: {e}"))),
        }
    }

    async fn get_account_by_username(
        &self,
        username: &str,
    ) -> Result<Option<Account>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE username = ?1"),
                params![username],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_account_by_username: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_account(&row).map_err(|e| {
                DatabaseError::Query(format!("get_account_by_username row parse: {e}"))
            })?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_account_by_username: {e}"))),
        }
    }

    async fn list_accounts(&self) -> Result<Vec<Account>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE is_admin = 0 ORDER BY id ASC"
                ),
                (),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_accounts: {e}")))?;

        let mut accounts = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            match row_to_account(&row) {
                Ok(account) => accounts.push(account),
                Err(e) => warn!("Skipping account row: {e}"),
            }
        }
        Ok(accounts)
    }

    async fn delete_account(&self, id: i64) -> Result<(), DatabaseError> {
        let affected = self
            .conn()
            .execute("DELETE FROM accounts WHERE id = ?1", params![id])
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_account: {e}")))?;
        if affected == 0 {
            return Err(DatabaseError::NotFound {
                entity: "account".into(),
                id: id.to_string(),
            });
        }
        debug!(account_id = id, "Account deleted (cascaded)");
        Ok(())
    }

    async fn set_active_session(
        &self,
        account_id: i64,
        session_id: Option<&str>,
        thread_id: Option<&str>,
    ) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "UPDATE accounts SET active_session_id = ?1, active_thread_id = ?2 WHERE id = ?3",
                params![opt_text(session_id), opt_text(thread_id), account_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("set_active_session: {e}")))?;
        debug!(account_id, session_id = ?session_id, "Active session rotated");
        Ok(())
    }

    async fn set_active_thread(
        &self,
        account_id: i64,
        thread_id: Option<&str>,
    ) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "UPDATE accounts SET active_thread_id = ?1 WHERE id = ?2",
                params![opt_text(thread_id), account_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("set_active_thread: {e}")))?;
        Ok(())
    }

    async fn set_password_hash(&self, account_id: i64, hash: &str) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "UPDATE accounts SET password_hash = ?1 WHERE id = ?2",
                params![hash, account_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("set_password_hash: {e}")))?;
        Ok(())
    }

    // ── Transcript ──────────────────────────────────────────────────

    async fn insert_message(
        &self,
        account_id: i64,
        session_id: &str,
        role: Role,
        content: &str,
    ) -> Result<String, DatabaseError> {
        let id = Uuid::new_v4().to_string();
        self.conn()
            .execute(
                "INSERT INTO messages (id, account_id, session_id, role, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    id.as_str(),
                    account_id,
                    session_id,
                    role.as_str(),
                    content,
                    Utc::now().to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("insert_message: {e}")))?;
        debug!(message_id = %id, account_id, role = role.as_str(), "Message inserted");
        Ok(id)
    }

    async fn record_exchange(
        &self,
        account_id: i64,
        session_id: &str,
        agent_content: &str,
        variables: &[(String, String)],
    ) -> Result<(), DatabaseError> {
        let conn = self.conn();
        let tx = conn
            .transaction()
            .await
            .map_err(|e| DatabaseError::Query(format!("record_exchange begin: {e}")))?;

        let now = Utc::now().to_rfc3339();
        let message_id = Uuid::new_v4().to_string();
        if let Err(e) = tx
            .execute(
                "INSERT INTO messages (id, account_id, session_id, role, content, created_at)
                 VALUES (?1, ?2, ?3, 'agent', ?4, ?5)",
                params![
                    message_id.as_str(),
                    account_id,
                    session_id,
                    agent_content,
                    now.as_str(),
                ],
            )
            .await
        {
            tx.rollback()
                .await
                .map_err(|e| DatabaseError::Query(format!("record_exchange rollback: {e}")))?;
            return Err(DatabaseError::Query(format!("record_exchange message: {e}")));
        }

        // Variables are a side-channel log: a failed row is skipped with a
        // warning, never failing the transcript write.
        for (name, value) in variables {
            let result = tx
                .execute(
                    "INSERT INTO variables (id, account_id, session_id, name, value, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        Uuid::new_v4().to_string(),
                        account_id,
                        session_id,
                        name.as_str(),
                        value.as_str(),
                        now.as_str(),
                    ],
                )
                .await;
            if let Err(e) = result {
                warn!(account_id, name = %name, error = %e, "Skipping variable row");
            }
        }

        tx.commit()
            .await
            .map_err(|e| DatabaseError::Query(format!("record_exchange commit: {e}")))?;
        Ok(())
    }

    async fn list_session_messages(
        &self,
        account_id: i64,
        session_id: &str,
    ) -> Result<Vec<ChatMessage>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {MESSAGE_COLUMNS} FROM messages
                     WHERE account_id = ?1 AND session_id = ?2
                     ORDER BY created_at ASC, rowid ASC"
                ),
                params![account_id, session_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_session_messages: {e}")))?;

        let mut messages = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            match row_to_message(&row) {
                Ok(msg) => messages.push(msg),
                Err(e) => warn!("Skipping message row: {e}"),
            }
        }
        Ok(messages)
    }

    async fn list_account_messages(
        &self,
        account_id: i64,
    ) -> Result<Vec<ChatMessage>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {MESSAGE_COLUMNS} FROM messages WHERE account_id = ?1
                     ORDER BY created_at ASC, rowid ASC"
                ),
                params![account_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_account_messages: {e}")))?;

        let mut messages = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            match row_to_message(&row) {
                Ok(msg) => messages.push(msg),
                Err(e) => warn!("Skipping message row: {e}"),
            }
        }
        Ok(messages)
    }

    async fn list_sessions(&self, account_id: i64) -> Result<Vec<SessionSummary>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT session_id, MAX(created_at) AS last_active FROM messages
                 WHERE account_id = ?1 GROUP BY session_id ORDER BY last_active DESC",
                params![account_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_sessions: {e}")))?;

        let mut sessions = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            let session_id: String = row
                .get(0)
                .map_err(|e| DatabaseError::Query(format!("list_sessions row: {e}")))?;
            let last_active: String = row
                .get(1)
                .map_err(|e| DatabaseError::Query(format!("list_sessions row: {e}")))?;
            sessions.push(SessionSummary {
                session_id,
                last_active: parse_datetime(&last_active),
            });
        }
        Ok(sessions)
    }

    async fn session_exists(
        &self,
        account_id: i64,
        session_id: &str,
    ) -> Result<bool, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT 1 FROM messages WHERE account_id = ?1 AND session_id = ?2 LIMIT 1",
                params![account_id, session_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("session_exists: {e}")))?;
        Ok(matches!(rows.next().await, Ok(Some(_))))
    }

    async fn delete_session_messages(
        &self,
        account_id: i64,
        session_id: &str,
    ) -> Result<usize, DatabaseError> {
        let affected = self
            .conn()
            .execute(
                "DELETE FROM messages WHERE account_id = ?1 AND session_id = ?2",
                params![account_id, session_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_session_messages: {e}")))?;
        debug!(account_id, session_id, deleted = affected, "Session messages deleted");
        Ok(affected as usize)
    }

    // ── Variables ───────────────────────────────────────────────────

    async fn list_account_variables(
        &self,
        account_id: i64,
    ) -> Result<Vec<ExtractedVariable>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id, account_id, session_id, name, value, created_at FROM variables
                 WHERE account_id = ?1 ORDER BY created_at DESC, rowid DESC",
                params![account_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_account_variables: {e}")))?;

        let mut variables = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            let created_str: String = row
                .get(5)
                .map_err(|e| DatabaseError::Query(format!("list_account_variables row: {e}")))?;
            variables.push(ExtractedVariable {
                id: row
                    .get(0)
                    .map_err(|e| DatabaseError::Query(format!("variable row: {e}")))?,
                account_id: row
                    .get(1)
                    .map_err(|e| DatabaseError::Query(format!("variable row: {e}")))?,
                session_id: row
                    .get(2)
                    .map_err(|e| DatabaseError::Query(format!("variable row: {e}")))?,
                name: row
                    .get(3)
                    .map_err(|e| DatabaseError::Query(format!("variable row: {e}")))?,
                value: row
                    .get(4)
                    .map_err(|e| DatabaseError::Query(format!("variable row: {e}")))?,
                created_at: parse_datetime(&created_str),
            });
        }
        Ok(variables)
    }

    // ── Export ──────────────────────────────────────────────────────

    async fn export_rows(&self) -> Result<Vec<ExportRow>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT m.created_at, m.session_id, a.username, m.role, '' AS name, m.content
                   FROM messages m JOIN accounts a ON a.id = m.account_id
                 UNION ALL
                 SELECT v.created_at, v.session_id, a.username, 'variable', v.name, v.value
                   FROM variables v JOIN accounts a ON a.id = v.account_id
                 ORDER BY 1 ASC",
                (),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("export_rows: {e}")))?;

        let mut out = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            let ts: String = row
                .get(0)
                .map_err(|e| DatabaseError::Query(format!("export row: {e}")))?;
            out.push(ExportRow {
                timestamp: parse_datetime(&ts),
                session_id: row
                    .get(1)
                    .map_err(|e| DatabaseError::Query(format!("export row: {e}")))?,
                username: row
                    .get(2)
                    .map_err(|e| DatabaseError::Query(format!("export row: {e}")))?,
                kind: row
                    .get(3)
                    .map_err(|e| DatabaseError::Query(format!("export row: {e}")))?,
                name: row
                    .get(4)
                    .map_err(|e| DatabaseError::Query(format!("export row: {e}")))?,
                content: row
                    .get(5)
                    .map_err(|e| DatabaseError::Query(format!("export row: {e}")))?,
            });
        }
        Ok(out)
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_db() -> LibSqlBackend {
        LibSqlBackend::new_memory().await.unwrap()
    }

    fn new_account(username: &str, variant: AgentVariant) -> NewAccount {
        NewAccount {
            username: username.to_string(),
            password_hash: "hash".to_string(),
            variant,
            is_admin: false,
        }
    }

    #[tokio::test]
    async fn account_round_trip() {
        let db = test_db().await;
        let id = db
            .create_account(&new_account("alice", AgentVariant::Primary))
            .await
            .unwrap();

        let loaded = db.get_account(id).await.unwrap().unwrap();
        assert_eq!(loaded.username, "alice");
        assert_eq!(loaded.variant, AgentVariant::Primary);
        assert!(!loaded.is_admin);
        assert!(loaded.active_session_id.is_none());
        assert!(loaded.active_thread_id.is_none());

        let by_name = db.get_account_by_username("alice").await.unwrap().unwrap();
        assert_eq!(by_name.id, id);
    }

    #[tokio::test]
    async fn duplicate_username_rejected() {
        let db = test_db().await;
        db.create_account(&new_account("bob", AgentVariant::Basic))
            .await
            .unwrap();
        let err = db
            .create_account(&new_account("bob", AgentVariant::Basic))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DatabaseError::Constraint(_) | DatabaseError::Query(_)
        ));
    }

    #[tokio::test]
    async fn batch_create_is_atomic() {
        let db = test_db().await;
        db.create_account(&new_account("taken", AgentVariant::Basic))
            .await
            .unwrap();

        // Second row collides — the whole batch must roll back.
        let batch = vec![
            new_account("fresh", AgentVariant::Basic),
            new_account("taken", AgentVariant::Basic),
        ];
        assert!(db.create_accounts(&batch).await.is_err());
        assert!(db.get_account_by_username("fresh").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rotate_session_updates_both_handles() {
        let db = test_db().await;
        let id = db
            .create_account(&new_account("carol", AgentVariant::Basic))
            .await
            .unwrap();

        db.set_active_session(id, Some("sess-1"), Some("thread-1"))
            .await
            .unwrap();
        let acct = db.get_account(id).await.unwrap().unwrap();
        assert_eq!(acct.active_session_id.as_deref(), Some("sess-1"));
        assert_eq!(acct.active_thread_id.as_deref(), Some("thread-1"));

        db.set_active_session(id, Some("sess-2"), None).await.unwrap();
        let acct = db.get_account(id).await.unwrap().unwrap();
        assert_eq!(acct.active_session_id.as_deref(), Some("sess-2"));
        assert!(acct.active_thread_id.is_none());
    }

    #[tokio::test]
    async fn messages_ordered_within_session() {
        let db = test_db().await;
        let id = db
            .create_account(&new_account("dave", AgentVariant::Basic))
            .await
            .unwrap();

        db.insert_message(id, "s1", Role::User, "first").await.unwrap();
        db.insert_message(id, "s1", Role::Agent, "second").await.unwrap();
        db.insert_message(id, "s2", Role::User, "other session")
            .await
            .unwrap();

        let msgs = db.list_session_messages(id, "s1").await.unwrap();
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].content, "first");
        assert_eq!(msgs[0].role, Role::User);
        assert_eq!(msgs[1].content, "second");
        assert_eq!(msgs[1].role, Role::Agent);

        let all = db.list_account_messages(id).await.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn record_exchange_writes_message_and_variables() {
        let db = test_db().await;
        let id = db
            .create_account(&new_account("erin", AgentVariant::Primary))
            .await
            .unwrap();

        let vars = vec![
            ("score".to_string(), "5".to_string()),
            ("phase".to_string(), "intro".to_string()),
        ];
        db.record_exchange(id, "s1", "Hi!", &vars).await.unwrap();

        let msgs = db.list_session_messages(id, "s1").await.unwrap();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].role, Role::Agent);
        assert_eq!(msgs[0].content, "Hi!");

        let stored = db.list_account_variables(id).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert!(stored.iter().any(|v| v.name == "score" && v.value == "5"));
    }

    #[tokio::test]
    async fn sessions_listed_most_recent_first() {
        let db = test_db().await;
        let id = db
            .create_account(&new_account("fay", AgentVariant::Basic))
            .await
            .unwrap();

        db.insert_message(id, "old", Role::User, "a").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        db.insert_message(id, "new", Role::User, "b").await.unwrap();

        let sessions = db.list_sessions(id).await.unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].session_id, "new");

        assert!(db.session_exists(id, "old").await.unwrap());
        assert!(!db.session_exists(id, "missing").await.unwrap());
    }

    #[tokio::test]
    async fn delete_account_cascades() {
        let db = test_db().await;
        let id = db
            .create_account(&new_account("gone", AgentVariant::Basic))
            .await
            .unwrap();
        db.insert_message(id, "s1", Role::User, "hello").await.unwrap();
        db.record_exchange(id, "s1", "hi", &[("k".into(), "v".into())])
            .await
            .unwrap();

        db.delete_account(id).await.unwrap();
        assert!(db.get_account(id).await.unwrap().is_none());
        assert!(db.list_account_messages(id).await.unwrap().is_empty());
        assert!(db.list_account_variables(id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn export_combines_messages_and_variables() {
        let db = test_db().await;
        let id = db
            .create_account(&new_account("heidi", AgentVariant::Primary))
            .await
            .unwrap();
        db.insert_message(id, "s1", Role::User, "hello").await.unwrap();
        db.record_exchange(id, "s1", "hi", &[("score".into(), "5".into())])
            .await
            .unwrap();

        let rows = db.export_rows().await.unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().any(|r| r.kind == "user" && r.content == "hello"));
        assert!(rows.iter().any(|r| r.kind == "agent" && r.content == "hi"));
        assert!(
            rows.iter()
                .any(|r| r.kind == "variable" && r.name == "score" && r.content == "5")
        );
        assert!(rows.iter().all(|r| r.username == "heidi"));
    }
}
