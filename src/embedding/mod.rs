mod circuit;
mod http_client;

pub use circuit::{CallPermit, CircuitBreaker, CircuitSettings, CircuitState};
pub use http_client::HttpEmbeddingClient;

use crate::error::Result;

/// Trait for embedding generation
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Convert one input text to a fixed-dimension vector
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Get the dimension of the embeddings
    fn dimension(&self) -> usize;

    /// Get the model name
    fn model_name(&self) -> &str;
}
