//! Assistant gateway — submits a message to the remote agent and waits
//! for the reply.
//!
//! Protocol per turn: post the user's text to the thread, start a run of
//! the variant's agent, poll run status on a fixed interval while it is
//! pending, then fetch the newest message. Any non-`completed` terminal
//! status is a provider error carrying the status string. The poll loop is
//! bounded by an overall reply timeout rather than blocking indefinitely.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::assistant::client::AgentProvider;
use crate::config::ProviderConfig;
use crate::error::GatewayError;
use crate::store::model::AgentVariant;

/// Synchronous (from the caller's view) client for one reply round trip.
pub struct AssistantGateway {
    provider: Option<Arc<dyn AgentProvider>>,
    config: ProviderConfig,
}

impl AssistantGateway {
    /// `provider` is `None` when the credential is unconfigured; every
    /// reply then fails with a configuration error, which the orchestrator
    /// converts to a user-visible diagnostic.
    pub fn new(provider: Option<Arc<dyn AgentProvider>>, config: ProviderConfig) -> Self {
        Self { provider, config }
    }

    /// Access to the underlying provider (for thread lifecycle management).
    pub fn provider(&self) -> Option<Arc<dyn AgentProvider>> {
        self.provider.clone()
    }

    /// Submit `text` to `thread_id` and block until the agent's reply (or
    /// a failure) is available.
    pub async fn get_reply(
        &self,
        text: &str,
        variant: AgentVariant,
        thread_id: &str,
    ) -> Result<String, GatewayError> {
        let provider = self
            .provider
            .as_ref()
            .ok_or_else(|| GatewayError::Configuration("provider credential missing".into()))?;
        let agent_id = self.config.agent_id(variant).ok_or_else(|| {
            GatewayError::Configuration(format!("no agent id configured for variant {variant}"))
        })?;

        provider.add_user_message(thread_id, text).await?;
        let run_id = provider.create_run(thread_id, agent_id).await?;
        debug!(thread_id, run_id = %run_id, variant = %variant, "Run started");

        let deadline = tokio::time::Instant::now() + self.config.reply_timeout;
        loop {
            let status = provider.run_status(thread_id, &run_id).await?;
            if !status.is_pending() {
                return match status {
                    crate::assistant::client::RunStatus::Completed => {
                        provider.latest_message_text(thread_id).await
                    }
                    crate::assistant::client::RunStatus::Other(s) => {
                        warn!(thread_id, run_id = %run_id, status = %s, "Run ended abnormally");
                        Err(GatewayError::Provider(s))
                    }
                    // Pending statuses are excluded above.
                    _ => unreachable!("pending status treated as terminal"),
                };
            }
            if tokio::time::Instant::now() >= deadline {
                warn!(thread_id, run_id = %run_id, "Reply timed out");
                return Err(GatewayError::Timeout(self.config.reply_timeout));
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }
}
