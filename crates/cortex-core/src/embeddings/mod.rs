//! Semantic embeddings (spec §5, Embedding Provider capability).
//!
//! Wraps the local fastembed-backed [`local::EmbeddingService`] behind the
//! [`crate::providers::EmbeddingProvider`] trait so it composes with the
//! cascade/cache/null provider machinery like any other embedding backend.
//! 100% local, no external API calls.

mod local;

pub use local::{
    cosine_similarity, dot_product, euclidean_distance, matryoshka_truncate, Embedding,
    EmbeddingError, EmbeddingService, BATCH_SIZE, EMBEDDING_DIMENSIONS, MAX_TEXT_LENGTH,
};

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::providers::{EmbeddingProvider, ProviderResult};

/// [`EmbeddingProvider`] backed by a local ONNX model via fastembed. Model
/// inference is synchronous and CPU-bound, so calls are dispatched through
/// [`tokio::task::spawn_blocking`] rather than blocking the async executor.
pub struct LocalEmbeddingProvider {
    service: EmbeddingService,
}

impl LocalEmbeddingProvider {
    pub fn new() -> Self {
        Self {
            service: EmbeddingService::new(),
        }
    }

    /// Eagerly download/initialize the model instead of paying the cost on
    /// the first `embed` call.
    pub fn warm_up(&self) -> Result<(), EmbeddingError> {
        self.service.init()
    }
}

impl Default for LocalEmbeddingProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for LocalEmbeddingProvider {
    async fn embed(&self, text: &str) -> ProviderResult<Vec<f32>> {
        let text = text.to_string();
        let result = tokio::task::spawn_blocking(move || {
            let service = EmbeddingService::new();
            service.embed(&text)
        })
        .await
        .map_err(|e| ProviderError::Unavailable(format!("embedding task panicked: {e}")))?;

        result
            .map(|embedding| embedding.vector)
            .map_err(|e| match e {
                EmbeddingError::InvalidInput(msg) => ProviderError::InvalidResponse(msg),
                other => ProviderError::Unavailable(other.to_string()),
            })
    }

    async fn embed_query(&self, text: &str) -> ProviderResult<Vec<f32>> {
        let text = text.to_string();
        let result = tokio::task::spawn_blocking(move || {
            let service = EmbeddingService::new();
            service.embed_query(&text)
        })
        .await
        .map_err(|e| ProviderError::Unavailable(format!("embedding task panicked: {e}")))?;

        result
            .map(|embedding| embedding.vector)
            .map_err(|e| match e {
                EmbeddingError::InvalidInput(msg) => ProviderError::InvalidResponse(msg),
                other => ProviderError::Unavailable(other.to_string()),
            })
    }

    fn dimensions(&self) -> usize {
        EMBEDDING_DIMENSIONS
    }

    fn name(&self) -> &str {
        "fastembed-nomic-embed-text-v1.5"
    }
}
