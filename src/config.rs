//! Configuration types — env-driven, `CHATCLASS_*` variables.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::store::model::AgentVariant;

/// Remote agent provider configuration.
///
/// The credential and the two agent-variant identifiers are supplied
/// out-of-band; absence of either is surfaced as a configuration error at
/// reply time, never as a startup crash (accounts on the other variant keep
/// working).
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// API credential. `None` means the provider is unconfigured.
    pub api_key: Option<SecretString>,
    /// Base URL of the provider REST surface.
    pub base_url: String,
    /// Agent identifier for the `primary` variant.
    pub primary_agent_id: Option<String>,
    /// Agent identifier for the `basic` variant.
    pub basic_agent_id: Option<String>,
    /// Fixed run-status poll interval.
    pub poll_interval: Duration,
    /// Overall bound on one reply round trip.
    pub reply_timeout: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            primary_agent_id: None,
            basic_agent_id: None,
            poll_interval: Duration::from_millis(500),
            reply_timeout: Duration::from_secs(120),
        }
    }
}

impl ProviderConfig {
    /// Resolve the agent identifier assigned to a variant.
    pub fn agent_id(&self, variant: AgentVariant) -> Option<&str> {
        match variant {
            AgentVariant::Primary => self.primary_agent_id.as_deref(),
            AgentVariant::Basic => self.basic_agent_id.as_deref(),
        }
    }
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// HTTP listen port.
    pub port: u16,
    /// Path to the libSQL database file.
    pub db_path: String,
    /// Writable directory for chat attachments.
    pub upload_root: PathBuf,
    /// Default password assigned to imported accounts with a blank
    /// password column.
    pub default_password: String,
    pub provider: ProviderConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            db_path: "./data/chatclass.db".to_string(),
            upload_root: PathBuf::from("./data/uploads"),
            default_password: "123456".to_string(),
            provider: ProviderConfig::default(),
        }
    }
}

impl AppConfig {
    /// Build configuration from `CHATCLASS_*` environment variables,
    /// falling back to defaults for anything unset.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let provider = ProviderConfig {
            api_key: std::env::var("CHATCLASS_API_KEY")
                .ok()
                .filter(|k| !k.is_empty())
                .map(SecretString::from),
            base_url: env_or("CHATCLASS_PROVIDER_URL", &defaults.provider.base_url),
            primary_agent_id: std::env::var("CHATCLASS_PRIMARY_AGENT_ID").ok(),
            basic_agent_id: std::env::var("CHATCLASS_BASIC_AGENT_ID").ok(),
            poll_interval: Duration::from_millis(env_parsed(
                "CHATCLASS_POLL_INTERVAL_MS",
                defaults.provider.poll_interval.as_millis() as u64,
            )),
            reply_timeout: Duration::from_secs(env_parsed(
                "CHATCLASS_REPLY_TIMEOUT_SECS",
                defaults.provider.reply_timeout.as_secs(),
            )),
        };

        Self {
            port: env_parsed("CHATCLASS_PORT", defaults.port),
            db_path: env_or("CHATCLASS_DB_PATH", &defaults.db_path),
            upload_root: std::env::var("CHATCLASS_UPLOAD_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_root),
            default_password: env_or("CHATCLASS_DEFAULT_PASSWORD", &defaults.default_password),
            provider,
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parsed<T: std::str::FromStr + Copy>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.default_password, "123456");
        assert_eq!(cfg.provider.poll_interval, Duration::from_millis(500));
        assert!(cfg.provider.api_key.is_none());
    }

    #[test]
    fn agent_id_by_variant() {
        let cfg = ProviderConfig {
            primary_agent_id: Some("agent-p".into()),
            basic_agent_id: Some("agent-b".into()),
            ..ProviderConfig::default()
        };
        assert_eq!(cfg.agent_id(AgentVariant::Primary), Some("agent-p"));
        assert_eq!(cfg.agent_id(AgentVariant::Basic), Some("agent-b"));
    }
}
