//! Error types for autoapply.

use std::time::Duration;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Job board error: {0}")]
    JobBoard(#[from] JobBoardError),

    #[error("Profile error: {0}")]
    Profile(#[from] ProfileError),

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("Supervisor error: {0}")]
    Supervisor(#[from] SupervisorError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Generation / embedding provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Provider {provider} did not answer within {timeout:?}")]
    Timeout { provider: String, timeout: Duration },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors fetching the posting queue from the job board.
#[derive(Debug, thiserror::Error)]
pub enum JobBoardError {
    #[error("Job board request failed: {0}")]
    Request(String),

    #[error("Job board returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid job board response: {0}")]
    InvalidResponse(String),
}

/// Classified submission failure.
///
/// The submission coordinator branches on the variant, never on the message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    #[error("Already applied to this posting")]
    Duplicate,

    #[error("Rate limited by job board (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("{0}")]
    Transient(String),
}

/// Invalid candidate profile.
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("Duplicate fact bank id: {0}")]
    DuplicateFactId(String),

    #[error("Duplicate proof url: {0}")]
    DuplicateProofUrl(String),

    #[error("Fact bank entry has an empty id")]
    EmptyFactId,
}

/// Run-level failures that end a workflow run.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("Failed to fetch posting queue: {0}")]
    Fetch(#[from] JobBoardError),

    #[error("Invalid run state: {0}")]
    InvalidState(String),

    #[error("Run panicked: {0}")]
    Panicked(String),
}

/// Run supervisor errors.
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("A run for subject {subject} is already running")]
    AlreadyRunning { subject: String },

    #[error("No run found for subject {subject}")]
    NotFound { subject: String },

    #[error("Invalid profile: {0}")]
    InvalidProfile(#[from] ProfileError),

    #[error("Store error: {0}")]
    Database(#[from] DatabaseError),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
