use crate::config::LlmConfig;
use crate::error::ConfigurationError;
use crate::llm::{LlmError, TextGenerationBackend};
use async_trait::async_trait;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info};

const DEFAULT_API_URL: &str = "http://localhost:11434/api/generate";

/// Local inference server speaking the Ollama `/api/generate` protocol.
pub struct OllamaProvider {
    client: OnceCell<reqwest::Client>,
    timeout: Duration,
    api_url: String,
    model: String,
}

#[derive(Serialize, Debug)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize, Debug)]
struct OllamaResponse {
    response: String,
}

impl OllamaProvider {
    pub fn new(config: &LlmConfig) -> Result<Self, ConfigurationError> {
        let api_url = config
            .api_url
            .clone()
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        if !api_url.starts_with("http://") && !api_url.starts_with("https://") {
            return Err(ConfigurationError::Invalid {
                key: "llm.api_url",
                reason: format!("expected an http(s) URL, got `{}`", api_url),
            });
        }

        Ok(Self {
            client: OnceCell::new(),
            timeout: config.timeout(),
            api_url,
            model: config.model.clone(),
        })
    }

    fn client(&self) -> Result<&reqwest::Client, LlmError> {
        self.client.get_or_try_init(|| {
            reqwest::Client::builder()
                .timeout(self.timeout)
                .build()
                .map_err(|e| LlmError::ConnectionError(e.to_string()))
        })
    }
}

#[async_trait]
impl TextGenerationBackend for OllamaProvider {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        info!("Sending request to Ollama with model: {}", self.model);
        debug!("API URL: {}", self.api_url);

        let request = OllamaRequest {
            model: &self.model,
            prompt,
            stream: false,
        };

        let response = self
            .client()?
            .post(&self.api_url)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Ollama API responded with status code: {} - {}", status, body);
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        // Read the raw text first so a bad payload can be logged verbatim.
        let response_text = response.text().await?;
        debug!("Raw response from Ollama: {}", response_text);

        let ollama_response: OllamaResponse =
            serde_json::from_str(&response_text).map_err(|e| {
                error!("Failed to parse Ollama response: {} - Response was: {}", e, response_text);
                LlmError::ResponseError(format!("Failed to parse Ollama response: {}", e))
            })?;

        Ok(ollama_response.response)
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LlmBackendKind;
    use crate::llm::generator::SqlGenerator;
    use crate::llm::retry::{Backoff, RetryPolicy};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn config(api_url: String) -> LlmConfig {
        LlmConfig {
            backend: LlmBackendKind::Ollama,
            model: "llama3.2".to_string(),
            api_key: None,
            api_url: Some(api_url),
            temperature: 0.0,
            timeout_secs: 5,
            max_attempts: 3,
            retry_delay_ms: 0,
            backoff_factor: 1,
        }
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/api/generate", addr)
    }

    #[test]
    fn rejects_non_http_url() {
        assert!(OllamaProvider::new(&config("localhost:11434".to_string())).is_err());
    }

    #[tokio::test]
    async fn posts_generate_request_without_streaming() {
        let router = Router::new().route(
            "/api/generate",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["model"], "llama3.2");
                assert_eq!(body["stream"], false);
                Json(json!({
                    "model": "llama3.2",
                    "response": format!("```sql\n{}\n```", body["prompt"].as_str().unwrap_or_default()),
                    "done": true
                }))
            }),
        );
        let provider = OllamaProvider::new(&config(serve(router).await)).unwrap();

        let reply = provider.generate("SELECT 42").await.unwrap();

        assert_eq!(reply, "```sql\nSELECT 42\n```");
    }

    #[tokio::test]
    async fn missing_response_field_is_retried_then_reported() {
        let hits = Arc::new(AtomicU32::new(0));
        let counter = hits.clone();
        let router = Router::new().route(
            "/api/generate",
            post(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Json(json!({"done": true}))
                }
            }),
        );
        let provider = OllamaProvider::new(&config(serve(router).await)).unwrap();
        let generator = SqlGenerator::new(
            Arc::new(provider),
            RetryPolicy::new(3, Duration::ZERO, Backoff::Fixed),
        );

        let err = generator.generate_sql("prompt").await.unwrap_err();

        assert_eq!(err.attempts, 3);
        assert!(matches!(err.source, LlmError::ResponseError(_)));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn unreachable_server_is_a_connection_error() {
        // Bind then drop to get a port nothing listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let provider =
            OllamaProvider::new(&config(format!("http://{}/api/generate", addr))).unwrap();

        let err = provider.generate("prompt").await.unwrap_err();
        assert!(err.is_transient());
    }
}
