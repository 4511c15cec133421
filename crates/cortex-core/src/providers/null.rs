//! Degrade-gracefully providers (spec §7 "degradation rule"): a chat/reranker
//! call on a null provider always reports unavailable; an embedding call
//! returns a zero vector so dedup/search code can treat it as "no signal"
//! without special-casing `Option`.

use async_trait::async_trait;

use super::{ChatProvider, ChatRequest, EmbeddingProvider, ProviderResult, RerankerProvider};
use crate::error::ProviderError;

pub struct NullChat;

#[async_trait]
impl ChatProvider for NullChat {
    async fn complete(&self, _request: ChatRequest) -> ProviderResult<String> {
        Err(ProviderError::Unavailable("no chat provider configured".into()))
    }

    fn name(&self) -> &str {
        "null"
    }
}

pub struct NullEmbedding {
    dimensions: usize,
}

impl NullEmbedding {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

#[async_trait]
impl EmbeddingProvider for NullEmbedding {
    async fn embed(&self, _text: &str) -> ProviderResult<Vec<f32>> {
        Ok(vec![0.0; self.dimensions])
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "null"
    }
}

pub struct NullReranker;

#[async_trait]
impl RerankerProvider for NullReranker {
    async fn rerank(&self, _query: &str, _candidates: &[String]) -> ProviderResult<Vec<f32>> {
        Err(ProviderError::Unavailable("no reranker provider configured".into()))
    }

    fn name(&self) -> &str {
        "null"
    }
}
