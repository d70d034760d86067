use crate::llm::LlmError;
use thiserror::Error;

/// Missing or invalid configuration. Raised before any request is served.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("missing required setting `{0}`")]
    Missing(&'static str),
    #[error("invalid setting `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// The language-model backend could not produce a reply.
#[derive(Debug, Error)]
#[error("SQL generation failed after {attempts} attempt(s): {source}")]
pub struct GenerationError {
    pub attempts: u32,
    #[source]
    pub source: LlmError,
}

/// The generated SQL was handed to the database and failed there.
#[derive(Debug, Clone, Error)]
#[error("error running SQL: {message}")]
pub struct QueryExecutionError {
    pub sql: String,
    pub message: String,
}

impl QueryExecutionError {
    pub fn new(sql: impl Into<String>, message: impl ToString) -> Self {
        Self {
            sql: sql.into(),
            message: message.to_string(),
        }
    }
}

/// Database failures outside of running a generated statement.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("database connection error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("database error: {0}")]
    DuckDb(#[from] duckdb::Error),
    #[error("database task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
