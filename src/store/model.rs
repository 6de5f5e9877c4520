//! Domain records owned by the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which remote dialogue agent persona handles an account's conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentVariant {
    /// Full-powered coaching agent.
    Primary,
    /// Baseline scripted agent.
    Basic,
}

impl AgentVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Basic => "basic",
        }
    }
}

impl std::str::FromStr for AgentVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "primary" => Ok(Self::Primary),
            "basic" => Ok(Self::Basic),
            other => Err(format!("unknown agent variant: {other}")),
        }
    }
}

impl std::fmt::Display for AgentVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user account with its resumable conversation handles.
#[derive(Debug, Clone, Serialize)]
pub struct Account {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub variant: AgentVariant,
    pub is_admin: bool,
    /// Current conversation-session id (groups transcript rows).
    pub active_session_id: Option<String>,
    /// Current remote-thread id (the provider's context handle).
    pub active_thread_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Sender of a transcript message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Agent => "agent",
        }
    }
}

/// One transcript row. Immutable once written.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub id: String,
    pub account_id: i64,
    pub session_id: String,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A name/value pair parsed out of an agent reply's structured segment.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractedVariable {
    pub id: String,
    pub account_id: i64,
    pub session_id: String,
    pub name: String,
    pub value: String,
    pub created_at: DateTime<Utc>,
}

/// One conversation-session as listed in the history sidebar.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub last_active: DateTime<Utc>,
}

/// Provisioning input for a new account.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub password_hash: String,
    pub variant: AgentVariant,
    pub is_admin: bool,
}

/// One row of the flattened admin transcript export.
#[derive(Debug, Clone)]
pub struct ExportRow {
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    pub username: String,
    /// `"user"`/`"agent"` for messages, `"variable"` for extracted variables.
    pub kind: String,
    /// Variable name; empty for messages.
    pub name: String,
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variant_round_trip() {
        for v in [AgentVariant::Primary, AgentVariant::Basic] {
            assert_eq!(v.as_str().parse::<AgentVariant>().unwrap(), v);
        }
        assert!("gofai".parse::<AgentVariant>().is_err());
    }

    #[test]
    fn role_strings() {
        assert_eq!(Role::User.as_str(), "user");
        assert_eq!(Role::Agent.as_str(), "agent");
    }
}
