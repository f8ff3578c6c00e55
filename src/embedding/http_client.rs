//! HTTP embedding client for a local Ollama-compatible generator service.
//!
//! Thin reqwest client over `POST {endpoint}/api/embeddings`. Transient
//! failures (timeouts, connect errors, 5xx, 429) are retried with exponential
//! backoff and feed the circuit breaker; other 4xx responses and malformed
//! payloads are treated as generator misconfiguration and surfaced without
//! tripping the breaker.

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::config::EmbeddingConfig;
use crate::embedding::circuit::{CallPermit, CircuitBreaker, CircuitSettings};
use crate::embedding::EmbeddingProvider;
use crate::error::{DocsError, Result};
use crate::types::EMBEDDING_DIMENSION;

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    embedding: Vec<f32>,
}

/// How a failed attempt should be handled
enum AttemptError {
    /// Worth retrying; counts toward the circuit breaker
    Transient(String),
    /// Misconfiguration; retrying cannot help
    Permanent(String),
}

/// Embedding client backed by a local HTTP generator service
pub struct HttpEmbeddingClient {
    client: reqwest::Client,
    url_embeddings: String,
    model: String,
    retry_attempts: u32,
    breaker: Arc<CircuitBreaker>,
}

impl HttpEmbeddingClient {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let endpoint = config.endpoint.trim().trim_end_matches('/');
        if endpoint.is_empty()
            || !(endpoint.starts_with("http://") || endpoint.starts_with("https://"))
        {
            return Err(DocsError::ConfigInvalid(format!(
                "invalid embedding endpoint: {}",
                config.endpoint
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DocsError::ConfigInvalid(format!("failed to build HTTP client: {e}")))?;

        let breaker = Arc::new(CircuitBreaker::new(CircuitSettings {
            failure_threshold: config.failure_threshold,
            failure_window: Duration::from_secs(config.failure_window_secs),
            break_duration: Duration::from_secs(config.break_duration_secs),
        }));

        Ok(Self {
            client,
            url_embeddings: format!("{endpoint}/api/embeddings"),
            model: config.model.clone(),
            retry_attempts: config.retry_attempts.max(1),
            breaker,
        })
    }

    /// The breaker is shared with the health monitor and the file watcher
    pub fn breaker(&self) -> Arc<CircuitBreaker> {
        Arc::clone(&self.breaker)
    }

    async fn attempt(&self, text: &str) -> std::result::Result<Vec<f32>, AttemptError> {
        let body = EmbeddingsRequest {
            model: &self.model,
            prompt: text,
        };

        let response = self
            .client
            .post(&self.url_embeddings)
            .json(&body)
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let snippet = response
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(200)
                .collect::<String>();
            return Err(classify_status(status, &snippet));
        }

        let parsed: EmbeddingsResponse = response.json().await.map_err(|e| {
            AttemptError::Permanent(format!("failed to decode embeddings response: {e}"))
        })?;

        if parsed.embedding.len() != EMBEDDING_DIMENSION {
            return Err(AttemptError::Permanent(format!(
                "embedding dimension mismatch: expected {}, got {} (check the generator model)",
                EMBEDDING_DIMENSION,
                parsed.embedding.len()
            )));
        }

        Ok(parsed.embedding)
    }

    fn unavailable(&self, hint: Option<String>) -> DocsError {
        DocsError::EmbeddingUnavailable {
            state: self.breaker.state(),
            retry_after_seconds: self.breaker.retry_after_seconds(),
            hint,
        }
    }
}

fn classify_reqwest_error(err: reqwest::Error) -> AttemptError {
    if err.is_timeout() || err.is_connect() {
        let mut msg = format!("embedding service unreachable: {err}");
        if err.is_connect() && cfg!(all(target_os = "macos", target_arch = "aarch64")) {
            msg.push_str(" (on Apple Silicon, run the generator natively, not under Rosetta)");
        }
        AttemptError::Transient(msg)
    } else if err.is_request() || err.is_builder() {
        AttemptError::Permanent(format!("embedding request invalid: {err}"))
    } else {
        AttemptError::Transient(format!("embedding transport error: {err}"))
    }
}

fn classify_status(status: StatusCode, snippet: &str) -> AttemptError {
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        AttemptError::Transient(format!("embedding service returned {status}: {snippet}"))
    } else {
        AttemptError::Permanent(format!("embedding service rejected request ({status}): {snippet}"))
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for HttpEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(DocsError::invalid_argument(
                "cannot embed empty text".to_string(),
            ));
        }

        match self.breaker.check() {
            CallPermit::Allowed => {}
            CallPermit::Rejected {
                retry_after_seconds,
            } => {
                return Err(DocsError::EmbeddingUnavailable {
                    state: self.breaker.state(),
                    retry_after_seconds,
                    hint: None,
                });
            }
        }

        let mut backoff = Duration::from_millis(200);
        let mut last_transient: Option<String> = None;

        for attempt in 1..=self.retry_attempts {
            match self.attempt(text).await {
                Ok(vector) => {
                    self.breaker.record_success();
                    return Ok(vector);
                }
                Err(AttemptError::Permanent(msg)) => {
                    // Misconfiguration: do not count against the breaker
                    tracing::error!("Embedding call failed permanently: {}", msg);
                    return Err(self.unavailable(Some(msg)));
                }
                Err(AttemptError::Transient(msg)) => {
                    tracing::warn!(
                        "Embedding attempt {}/{} failed: {}",
                        attempt,
                        self.retry_attempts,
                        msg
                    );
                    last_transient = Some(msg);
                    if attempt < self.retry_attempts {
                        tokio::time::sleep(backoff).await;
                        backoff *= 2;
                    }
                }
            }
        }

        self.breaker.record_failure();
        Err(self.unavailable(last_transient))
    }

    fn dimension(&self) -> usize {
        EMBEDDING_DIMENSION
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
