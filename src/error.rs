//! Error types for chatclass.

/// Top-level error type for the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Chat error: {0}")]
    Chat(#[from] ChatError),

    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    #[error("Import error: {0}")]
    Import(#[from] ImportError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Migration failed: {0}")]
    Migration(String),
}

/// Remote agent provider / gateway errors.
///
/// These never propagate past the chat orchestrator as hard failures —
/// each maps to a user-visible diagnostic via [`GatewayError::user_facing_text`].
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Provider not configured: {0}")]
    Configuration(String),

    #[error("Provider returned terminal status: {0}")]
    Provider(String),

    #[error("Provider request failed: {0}")]
    Busy(String),

    #[error("Reply not ready after {0:?}")]
    Timeout(std::time::Duration),
}

impl GatewayError {
    /// The fail-soft string shown to the end user (and persisted as the
    /// agent's message) when a reply could not be obtained.
    pub fn user_facing_text(&self) -> String {
        match self {
            Self::Configuration(_) => {
                "Error: the assistant API key or agent ID is not configured.".to_string()
            }
            Self::Provider(status) => format!("AI Error Status: {status}"),
            Self::Busy(_) | Self::Timeout(_) => {
                "The system is busy or the AI connection failed. Please try again.".to_string()
            }
        }
    }
}

/// Chat orchestration errors.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Account {username} is not assigned to this agent")]
    Forbidden { username: String },

    #[error("Turn has neither text nor attachment")]
    EmptyTurn,

    #[error("Session {0} not found for this account")]
    SessionNotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),
}

/// Attachment handling errors.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("File extension not allowed: {0}")]
    DisallowedExtension(String),

    #[error("Filename unusable after sanitization: {0:?}")]
    UnusableFilename(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Bulk provisioning errors. The import boundary converts these to a
/// diagnostic string; they never abort the request.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("Could not decode file as text: {0}")]
    Decode(String),

    #[error("Could not parse delimited rows: {0}")]
    Parse(String),

    #[error("Database error during import: {0}")]
    Database(#[from] DatabaseError),
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;
