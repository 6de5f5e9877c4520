//! Unified `Database` trait — single async interface for all persistence.

use async_trait::async_trait;

use crate::error::DatabaseError;
use crate::store::model::{
    Account, ChatMessage, ExportRow, ExtractedVariable, NewAccount, Role, SessionSummary,
};

/// Backend-agnostic database trait covering accounts, transcript messages,
/// and extracted variables.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    // ── Accounts ────────────────────────────────────────────────────

    /// Insert a new account. Returns the assigned row id.
    async fn create_account(&self, account: &NewAccount) -> Result<i64, DatabaseError>;

    /// Insert a batch of accounts as one transaction. All-or-nothing:
    /// any failure rolls the whole batch back. Returns the count created.
    async fn create_accounts(&self, accounts: &[NewAccount]) -> Result<usize, DatabaseError>;

    /// Get an account by row id.
    async fn get_account(&self, id: i64) -> Result<Option<Account>, DatabaseError>;

    /// Get an account by its unique username.
    async fn get_account_by_username(
        &self,
        username: &str,
    ) -> Result<Option<Account>, DatabaseError>;

    /// List all non-admin accounts, oldest first.
    async fn list_accounts(&self) -> Result<Vec<Account>, DatabaseError>;

    /// Delete an account. Cascades to its messages and variables.
    async fn delete_account(&self, id: i64) -> Result<(), DatabaseError>;

    /// Replace the account's active session id and thread id together.
    /// Rotation is a single UPDATE so the two handles can never be
    /// observed half-switched.
    async fn set_active_session(
        &self,
        account_id: i64,
        session_id: Option<&str>,
        thread_id: Option<&str>,
    ) -> Result<(), DatabaseError>;

    /// Replace only the active remote-thread id.
    async fn set_active_thread(
        &self,
        account_id: i64,
        thread_id: Option<&str>,
    ) -> Result<(), DatabaseError>;

    /// Replace the account's credential hash.
    async fn set_password_hash(&self, account_id: i64, hash: &str) -> Result<(), DatabaseError>;

    // ── Transcript ──────────────────────────────────────────────────

    /// Append one transcript message. Returns the generated message id.
    async fn insert_message(
        &self,
        account_id: i64,
        session_id: &str,
        role: Role,
        content: &str,
    ) -> Result<String, DatabaseError>;

    /// Record the outbound half of a turn: the agent message and the
    /// extracted variables. The message write is transactional; a variable
    /// row that fails to serialize is logged and skipped, never failing
    /// the message (side-channel degradation policy).
    async fn record_exchange(
        &self,
        account_id: i64,
        session_id: &str,
        agent_content: &str,
        variables: &[(String, String)],
    ) -> Result<(), DatabaseError>;

    /// Messages of one session, oldest first (timestamp, then insertion).
    async fn list_session_messages(
        &self,
        account_id: i64,
        session_id: &str,
    ) -> Result<Vec<ChatMessage>, DatabaseError>;

    /// All messages of an account across sessions, oldest first.
    async fn list_account_messages(
        &self,
        account_id: i64,
    ) -> Result<Vec<ChatMessage>, DatabaseError>;

    /// Sessions that own at least one message, most recently active first.
    async fn list_sessions(&self, account_id: i64) -> Result<Vec<SessionSummary>, DatabaseError>;

    /// Whether the account owns any message under this session id.
    async fn session_exists(
        &self,
        account_id: i64,
        session_id: &str,
    ) -> Result<bool, DatabaseError>;

    /// Delete all messages of one session.
    async fn delete_session_messages(
        &self,
        account_id: i64,
        session_id: &str,
    ) -> Result<usize, DatabaseError>;

    // ── Variables ───────────────────────────────────────────────────

    /// All extracted variables of an account, newest first.
    async fn list_account_variables(
        &self,
        account_id: i64,
    ) -> Result<Vec<ExtractedVariable>, DatabaseError>;

    // ── Export ──────────────────────────────────────────────────────

    /// Flattened, timestamp-ordered rows combining every account's
    /// messages and extracted variables.
    async fn export_rows(&self) -> Result<Vec<ExportRow>, DatabaseError>;
}
