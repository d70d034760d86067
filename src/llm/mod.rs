pub mod extract;
pub mod generator;
pub mod prompt;
pub mod providers;
pub mod retry;

use crate::config::{LlmBackendKind, LlmConfig};
use crate::error::ConfigurationError;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM connection error: {0}")]
    ConnectionError(String),
    #[error("LLM request timed out: {0}")]
    Timeout(String),
    #[error("LLM API responded with status code {status}: {body}")]
    Status { status: u16, body: String },
    #[error("LLM response error: {0}")]
    ResponseError(String),
}

impl LlmError {
    /// Whether a fresh attempt could reasonably succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::ConnectionError(_) | LlmError::Timeout(_) | LlmError::ResponseError(_) => {
                true
            }
            LlmError::Status { status, .. } => *status == 429 || *status >= 500,
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LlmError::Timeout(e.to_string())
        } else if e.is_decode() {
            LlmError::ResponseError(e.to_string())
        } else {
            LlmError::ConnectionError(e.to_string())
        }
    }
}

/// A text-in, text-out language model.
#[async_trait]
pub trait TextGenerationBackend: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;

    fn name(&self) -> &str;
}

pub fn backend_from_config(
    config: &LlmConfig,
) -> Result<Arc<dyn TextGenerationBackend>, ConfigurationError> {
    let backend: Arc<dyn TextGenerationBackend> = match config.backend {
        LlmBackendKind::Remote => Arc::new(providers::remote::RemoteLlmProvider::new(config)?),
        LlmBackendKind::Ollama => Arc::new(providers::ollama::OllamaProvider::new(config)?),
    };

    Ok(backend)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_failures_are_permanent() {
        let err = LlmError::Status {
            status: 401,
            body: "invalid api key".to_string(),
        };
        assert!(!err.is_transient());
    }

    #[test]
    fn overload_and_network_failures_are_transient() {
        assert!(LlmError::Status { status: 503, body: String::new() }.is_transient());
        assert!(LlmError::Status { status: 429, body: String::new() }.is_transient());
        assert!(LlmError::ConnectionError("reset".to_string()).is_transient());
        assert!(LlmError::ResponseError("missing field `response`".to_string()).is_transient());
    }
}
