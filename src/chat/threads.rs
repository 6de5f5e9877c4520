//! Thread lifecycle — owns the remote-thread handle bound to an account.

use std::sync::Arc;

use tracing::info;

use crate::assistant::client::AgentProvider;
use crate::error::{DatabaseError, GatewayError};
use crate::store::Database;
use crate::store::model::Account;

/// Errors from thread creation or persistence.
#[derive(Debug, thiserror::Error)]
pub enum ThreadError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Creates and rotates remote threads, persisting the handle on the
/// account. Read-then-replace: a stored thread id is never overwritten
/// until its replacement is confirmed created remotely.
pub struct ThreadLifecycle {
    store: Arc<dyn Database>,
    provider: Option<Arc<dyn AgentProvider>>,
}

impl ThreadLifecycle {
    pub fn new(store: Arc<dyn Database>, provider: Option<Arc<dyn AgentProvider>>) -> Self {
        Self { store, provider }
    }

    fn provider(&self) -> Result<&Arc<dyn AgentProvider>, ThreadError> {
        self.provider
            .as_ref()
            .ok_or_else(|| GatewayError::Configuration("provider credential missing".into()).into())
    }

    /// Return the account's active thread id, creating and persisting one
    /// first if none exists.
    pub async fn ensure_thread(&self, account: &Account) -> Result<String, ThreadError> {
        if let Some(thread_id) = &account.active_thread_id {
            return Ok(thread_id.clone());
        }

        let thread_id = self.provider()?.create_thread().await?;
        self.store
            .set_active_thread(account.id, Some(&thread_id))
            .await?;
        info!(account_id = account.id, thread_id = %thread_id, "Thread created");
        Ok(thread_id)
    }

    /// Unconditionally create a fresh remote thread and replace the stored
    /// id, discarding the agent's conversational context. On failure the
    /// previous id is left untouched.
    pub async fn rotate_thread(&self, account: &Account) -> Result<String, ThreadError> {
        let thread_id = self.provider()?.create_thread().await?;
        self.store
            .set_active_thread(account.id, Some(&thread_id))
            .await?;
        info!(account_id = account.id, thread_id = %thread_id, "Thread rotated");
        Ok(thread_id)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::assistant::client::RunStatus;
    use crate::store::LibSqlBackend;
    use crate::store::model::{AgentVariant, NewAccount};

    struct CountingProvider {
        created: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl AgentProvider for CountingProvider {
        async fn create_thread(&self) -> Result<String, GatewayError> {
            if self.fail {
                return Err(GatewayError::Busy("connection refused".into()));
            }
            let n = self.created.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format!("thread-{n}"))
        }

        async fn add_user_message(&self, _: &str, _: &str) -> Result<(), GatewayError> {
            Ok(())
        }

        async fn create_run(&self, _: &str, _: &str) -> Result<String, GatewayError> {
            Ok("run".into())
        }

        async fn run_status(&self, _: &str, _: &str) -> Result<RunStatus, GatewayError> {
            Ok(RunStatus::Completed)
        }

        async fn latest_message_text(&self, _: &str) -> Result<String, GatewayError> {
            Ok(String::new())
        }
    }

    async fn setup(fail: bool) -> (Arc<LibSqlBackend>, ThreadLifecycle, i64) {
        let store = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let provider = Arc::new(CountingProvider {
            created: AtomicUsize::new(0),
            fail,
        });
        let lifecycle = ThreadLifecycle::new(store.clone(), Some(provider));
        let id = store
            .create_account(&NewAccount {
                username: "alice".into(),
                password_hash: "h".into(),
                variant: AgentVariant::Basic,
                is_admin: false,
            })
            .await
            .unwrap();
        (store, lifecycle, id)
    }

    #[tokio::test]
    async fn ensure_creates_once_then_reuses() {
        let (store, lifecycle, id) = setup(false).await;

        let account = store.get_account(id).await.unwrap().unwrap();
        let first = lifecycle.ensure_thread(&account).await.unwrap();
        assert_eq!(first, "thread-1");

        let account = store.get_account(id).await.unwrap().unwrap();
        assert_eq!(account.active_thread_id.as_deref(), Some("thread-1"));
        let second = lifecycle.ensure_thread(&account).await.unwrap();
        assert_eq!(second, "thread-1");
    }

    #[tokio::test]
    async fn rotate_replaces_stored_id() {
        let (store, lifecycle, id) = setup(false).await;

        let account = store.get_account(id).await.unwrap().unwrap();
        lifecycle.ensure_thread(&account).await.unwrap();

        let account = store.get_account(id).await.unwrap().unwrap();
        let rotated = lifecycle.rotate_thread(&account).await.unwrap();
        assert_eq!(rotated, "thread-2");

        let account = store.get_account(id).await.unwrap().unwrap();
        assert_eq!(account.active_thread_id.as_deref(), Some("thread-2"));
    }

    #[tokio::test]
    async fn failed_rotation_leaves_previous_id() {
        let (store, lifecycle, id) = setup(false).await;
        let account = store.get_account(id).await.unwrap().unwrap();
        lifecycle.ensure_thread(&account).await.unwrap();

        // Same store, failing provider.
        let failing = ThreadLifecycle::new(
            store.clone(),
            Some(Arc::new(CountingProvider {
                created: AtomicUsize::new(0),
                fail: true,
            })),
        );
        let account = store.get_account(id).await.unwrap().unwrap();
        assert!(failing.rotate_thread(&account).await.is_err());

        let account = store.get_account(id).await.unwrap().unwrap();
        assert_eq!(account.active_thread_id.as_deref(), Some("thread-1"));
    }

    #[tokio::test]
    async fn unconfigured_provider_fails_ensure() {
        let store = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let lifecycle = ThreadLifecycle::new(store.clone(), None);
        let id = store
            .create_account(&NewAccount {
                username: "bob".into(),
                password_hash: "h".into(),
                variant: AgentVariant::Basic,
                is_admin: false,
            })
            .await
            .unwrap();
        let account = store.get_account(id).await.unwrap().unwrap();
        assert!(lifecycle.ensure_thread(&account).await.is_err());
    }
}
