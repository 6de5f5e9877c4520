//! Chat orchestrator — composes authorization, session continuity,
//! attachment handling, the assistant gateway, and transcript persistence
//! into one turn.

use std::sync::Arc;

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::assistant::AssistantGateway;
use crate::chat::splitter;
use crate::chat::threads::{ThreadError, ThreadLifecycle};
use crate::chat::uploads::{Attachment, UploadStore};
use crate::error::ChatError;
use crate::store::Database;
use crate::store::model::{Account, AgentVariant, Role};

/// Orchestrates one conversational turn end to end.
pub struct ChatOrchestrator {
    store: Arc<dyn Database>,
    gateway: AssistantGateway,
    threads: ThreadLifecycle,
    uploads: UploadStore,
}

impl ChatOrchestrator {
    pub fn new(store: Arc<dyn Database>, gateway: AssistantGateway, uploads: UploadStore) -> Self {
        let threads = ThreadLifecycle::new(store.clone(), gateway.provider());
        Self {
            store,
            gateway,
            threads,
            uploads,
        }
    }

    /// Handle one turn against the agent variant behind `variant`'s
    /// endpoint. Returns the display text of the agent's reply.
    ///
    /// Guarantees:
    /// - the inbound message is committed before the gateway is invoked;
    /// - gateway failures become a persisted fallback reply, never an
    ///   error to the caller;
    /// - the persisted agent message is display text only — the structured
    ///   segment never reaches the transcript.
    pub async fn handle_turn(
        &self,
        account: &Account,
        variant: AgentVariant,
        text: &str,
        attachment: Option<Attachment>,
    ) -> Result<String, ChatError> {
        if !account.is_admin && account.variant != variant {
            return Err(ChatError::Forbidden {
                username: account.username.clone(),
            });
        }

        let text = text.trim();
        if text.is_empty() && attachment.is_none() {
            return Err(ChatError::EmptyTurn);
        }

        let session_id = self.ensure_session(account).await?;

        // Attachment: markup goes into the transcript, a plain-text note
        // goes to the agent. A disallowed file is dropped with a warning;
        // the turn itself proceeds.
        let mut transcript_content = text.to_string();
        let mut agent_text = text.to_string();
        if let Some(attachment) = attachment {
            if UploadStore::is_allowed(&attachment.filename) {
                let stored = self.uploads.store(&attachment).await?;
                transcript_content.push_str(&stored.markup);
                agent_text.push_str(&stored.agent_note);
            } else {
                warn!(filename = %attachment.filename, "Dropping attachment with disallowed extension");
            }
        }

        // Committed before the gateway call so the user's turn survives
        // any downstream failure.
        self.store
            .insert_message(account.id, &session_id, Role::User, &transcript_content)
            .await?;

        let raw_reply = match self.obtain_reply(account, variant, &agent_text).await {
            Ok(reply) => reply,
            Err(fallback) => fallback,
        };

        let split = splitter::split(&raw_reply);
        if !split.variables.is_empty() {
            info!(
                account_id = account.id,
                count = split.variables.len(),
                "Variables extracted from reply"
            );
        }

        self.store
            .record_exchange(account.id, &session_id, &split.display_text, &split.variables)
            .await?;

        Ok(split.display_text)
    }

    /// Run the gateway round trip. Failures come back as `Err(display
    /// string)` — the fail-soft text persisted in place of a real reply.
    async fn obtain_reply(
        &self,
        account: &Account,
        variant: AgentVariant,
        agent_text: &str,
    ) -> Result<String, String> {
        let thread_id = match self.threads.ensure_thread(account).await {
            Ok(id) => id,
            Err(ThreadError::Gateway(e)) => {
                warn!(account_id = account.id, error = %e, "Thread creation failed");
                return Err(e.user_facing_text());
            }
            Err(ThreadError::Database(e)) => {
                error!(account_id = account.id, error = %e, "Thread handle persistence failed");
                return Err(
                    "The system is busy or the AI connection failed. Please try again.".to_string(),
                );
            }
        };

        self.gateway
            .get_reply(agent_text, variant, &thread_id)
            .await
            .map_err(|e| {
                warn!(account_id = account.id, error = %e, "Gateway reply failed");
                e.user_facing_text()
            })
    }

    /// The account's active session id, minting and persisting one first
    /// if none exists — every message gets a valid session id.
    pub async fn ensure_session(&self, account: &Account) -> Result<String, ChatError> {
        if let Some(session_id) = &account.active_session_id {
            return Ok(session_id.clone());
        }

        let session_id = Uuid::new_v4().to_string();
        self.store
            .set_active_session(
                account.id,
                Some(&session_id),
                account.active_thread_id.as_deref(),
            )
            .await?;
        info!(account_id = account.id, session_id = %session_id, "Session minted");
        Ok(session_id)
    }

    /// Start a fresh conversation: a new session id and a rotated remote
    /// thread, together. If the remote thread cannot be created the
    /// session still rotates with the thread handle cleared — the next
    /// turn mints a fresh one — and the failure is only logged.
    pub async fn start_new_session(&self, account: &Account) -> Result<String, ChatError> {
        let session_id = Uuid::new_v4().to_string();

        let thread_id = match self.threads.rotate_thread(account).await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(account_id = account.id, error = %e, "Thread rotation failed; clearing handle");
                None
            }
        };

        self.store
            .set_active_session(account.id, Some(&session_id), thread_id.as_deref())
            .await?;
        info!(account_id = account.id, session_id = %session_id, "New session started");
        Ok(session_id)
    }

    /// Switch the active session to a previously retired one. Only
    /// sessions that own at least one of the account's messages qualify;
    /// the remote thread handle is left as is.
    pub async fn switch_session(
        &self,
        account: &Account,
        session_id: &str,
    ) -> Result<(), ChatError> {
        if !self.store.session_exists(account.id, session_id).await? {
            return Err(ChatError::SessionNotFound(session_id.to_string()));
        }
        self.store
            .set_active_session(
                account.id,
                Some(session_id),
                account.active_thread_id.as_deref(),
            )
            .await?;
        Ok(())
    }

    /// Delete a session's transcript. Deleting the active session starts
    /// a new one (rotating both handles).
    pub async fn delete_session(
        &self,
        account: &Account,
        session_id: &str,
    ) -> Result<(), ChatError> {
        let deleted = self
            .store
            .delete_session_messages(account.id, session_id)
            .await?;
        info!(account_id = account.id, session_id, deleted, "Session deleted");

        if account.active_session_id.as_deref() == Some(session_id) {
            self.start_new_session(account).await?;
        }
        Ok(())
    }
}
