use crate::config::LlmConfig;
use crate::error::GenerationError;
use crate::llm::retry::{Backoff, RetryExhausted, RetryPolicy};
use crate::llm::{LlmError, TextGenerationBackend};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Sends prompts to a backend, retrying transient failures.
pub struct SqlGenerator {
    backend: Arc<dyn TextGenerationBackend>,
    policy: RetryPolicy,
}

impl SqlGenerator {
    pub fn new(backend: Arc<dyn TextGenerationBackend>, policy: RetryPolicy) -> Self {
        Self { backend, policy }
    }

    pub fn from_config(backend: Arc<dyn TextGenerationBackend>, config: &LlmConfig) -> Self {
        let backoff = if config.backoff_factor > 1 {
            Backoff::Exponential {
                factor: config.backoff_factor,
            }
        } else {
            Backoff::Fixed
        };
        let policy = RetryPolicy::new(
            config.max_attempts,
            Duration::from_millis(config.retry_delay_ms),
            backoff,
        );
        Self::new(backend, policy)
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Returns the backend's raw reply to `prompt`.
    pub async fn generate_sql(&self, prompt: &str) -> Result<String, GenerationError> {
        info!("Sending prompt to {} backend", self.backend.name());
        debug!("Prompt: {}", prompt);

        let result = self
            .policy
            .run(
                |attempt| {
                    debug!("Generation attempt {}", attempt);
                    self.backend.generate(prompt)
                },
                LlmError::is_transient,
            )
            .await;

        match result {
            Ok(response) => {
                debug!("Raw response: {}", response);
                Ok(response)
            }
            Err(RetryExhausted {
                attempts,
                last_error,
            }) => {
                error!(
                    "SQL generation failed after {} attempt(s): {}",
                    attempts, last_error
                );
                Err(GenerationError {
                    attempts,
                    source: last_error,
                })
            }
        }
    }
}
