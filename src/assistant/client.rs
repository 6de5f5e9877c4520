//! Remote agent provider boundary.
//!
//! The provider exposes an Assistants-style REST surface: opaque threads
//! holding conversational context, and runs that execute a named agent
//! against a thread. `AgentProvider` is the seam the gateway and thread
//! lifecycle are written against; `OpenAiAssistants` is the production
//! implementation.

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::Deserialize;

use crate::config::ProviderConfig;
use crate::error::GatewayError;

/// Status of a run as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Queued,
    InProgress,
    Completed,
    /// Any other terminal status (`failed`, `cancelled`, `expired`, ...),
    /// carrying the provider's status string.
    Other(String),
}

impl RunStatus {
    /// Whether the run is still in the pending set and worth polling.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Queued | Self::InProgress)
    }

    fn from_str(s: &str) -> Self {
        match s {
            "queued" => Self::Queued,
            "in_progress" => Self::InProgress,
            "completed" => Self::Completed,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Operations the remote agent provider offers.
#[async_trait]
pub trait AgentProvider: Send + Sync {
    /// Create a fresh thread; returns its opaque id.
    async fn create_thread(&self) -> Result<String, GatewayError>;

    /// Append a user message to a thread.
    async fn add_user_message(&self, thread_id: &str, text: &str) -> Result<(), GatewayError>;

    /// Start a run of `agent_id` against the thread; returns the run id.
    async fn create_run(&self, thread_id: &str, agent_id: &str) -> Result<String, GatewayError>;

    /// Fetch the current status of a run.
    async fn run_status(&self, thread_id: &str, run_id: &str) -> Result<RunStatus, GatewayError>;

    /// Text content of the most recent message in the thread.
    async fn latest_message_text(&self, thread_id: &str) -> Result<String, GatewayError>;
}

// ── HTTP implementation ─────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ObjectWithId {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RunObject {
    status: String,
}

#[derive(Debug, Deserialize)]
struct MessageList {
    data: Vec<MessageObject>,
}

#[derive(Debug, Deserialize)]
struct MessageObject {
    content: Vec<MessageContent>,
}

#[derive(Debug, Deserialize)]
struct MessageContent {
    #[serde(default)]
    text: Option<MessageText>,
}

#[derive(Debug, Deserialize)]
struct MessageText {
    value: String,
}

/// Assistants v2 REST client.
#[derive(Debug)]
pub struct OpenAiAssistants {
    client: reqwest::Client,
    base_url: String,
    api_key: secrecy::SecretString,
}

impl OpenAiAssistants {
    /// Build a client from provider configuration. Returns a configuration
    /// error when the credential is absent.
    pub fn from_config(config: &ProviderConfig) -> Result<Self, GatewayError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| GatewayError::Configuration("CHATCLASS_API_KEY is not set".into()))?;
        Ok(Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .bearer_auth(self.api_key.expose_secret())
            .header("OpenAI-Beta", "assistants=v2")
    }

    /// POST a JSON body and deserialize the JSON response.
    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T, GatewayError> {
        let resp = self
            .request(self.client.post(self.url(path)))
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::Busy(format!("POST {path}: {e}")))?;
        Self::read_json(path, resp).await
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<T, GatewayError> {
        let resp = self
            .request(self.client.get(self.url(path)))
            .send()
            .await
            .map_err(|e| GatewayError::Busy(format!("GET {path}: {e}")))?;
        Self::read_json(path, resp).await
    }

    async fn read_json<T: serde::de::DeserializeOwned>(
        path: &str,
        resp: reqwest::Response,
    ) -> Result<T, GatewayError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GatewayError::Busy(format!("{path} returned {status}: {body}")));
        }
        resp.json::<T>()
            .await
            .map_err(|e| GatewayError::Busy(format!("{path} response parse: {e}")))
    }
}

#[async_trait]
impl AgentProvider for OpenAiAssistants {
    async fn create_thread(&self) -> Result<String, GatewayError> {
        let thread: ObjectWithId = self.post_json("/threads", serde_json::json!({})).await?;
        tracing::debug!(thread_id = %thread.id, "Remote thread created");
        Ok(thread.id)
    }

    async fn add_user_message(&self, thread_id: &str, text: &str) -> Result<(), GatewayError> {
        let _: ObjectWithId = self
            .post_json(
                &format!("/threads/{thread_id}/messages"),
                serde_json::json!({ "role": "user", "content": text }),
            )
            .await?;
        Ok(())
    }

    async fn create_run(&self, thread_id: &str, agent_id: &str) -> Result<String, GatewayError> {
        let run: ObjectWithId = self
            .post_json(
                &format!("/threads/{thread_id}/runs"),
                serde_json::json!({ "assistant_id": agent_id }),
            )
            .await?;
        Ok(run.id)
    }

    async fn run_status(&self, thread_id: &str, run_id: &str) -> Result<RunStatus, GatewayError> {
        let run: RunObject = self
            .get_json(&format!("/threads/{thread_id}/runs/{run_id}"))
            .await?;
        Ok(RunStatus::from_str(&run.status))
    }

    async fn latest_message_text(&self, thread_id: &str) -> Result<String, GatewayError> {
        let list: MessageList = self
            .get_json(&format!("/threads/{thread_id}/messages?order=desc&limit=1"))
            .await?;
        let text = list
            .data
            .first()
            .and_then(|m| m.content.iter().find_map(|c| c.text.as_ref()))
            .map(|t| t.value.clone())
            .ok_or_else(|| GatewayError::Busy("thread has no text message".into()))?;
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_status_pending_set() {
        assert!(RunStatus::from_str("queued").is_pending());
        assert!(RunStatus::from_str("in_progress").is_pending());
        assert!(!RunStatus::from_str("completed").is_pending());
        assert!(!RunStatus::from_str("failed").is_pending());
        assert_eq!(
            RunStatus::from_str("expired"),
            RunStatus::Other("expired".into())
        );
    }

    #[test]
    fn missing_credential_is_configuration_error() {
        let cfg = ProviderConfig::default();
        let err = OpenAiAssistants::from_config(&cfg).unwrap_err();
        assert!(matches!(err, GatewayError::Configuration(_)));
    }

    #[test]
    fn message_list_parses_text_content() {
        let json = r#"{"data":[{"content":[{"text":{"value":"Hi!"}}]}]}"#;
        let list: MessageList = serde_json::from_str(json).unwrap();
        assert_eq!(list.data[0].content[0].text.as_ref().unwrap().value, "Hi!");
    }
}
