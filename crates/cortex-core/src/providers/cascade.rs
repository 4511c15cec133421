//! Cascading fallback: primary provider → secondary → ... → first success
//! wins (spec §5 "Backpressure": "Provider adapters implement cascading
//! fallback: primary provider → secondary → null").

use async_trait::async_trait;
use tracing::warn;

use super::{ChatProvider, ChatRequest, EmbeddingProvider, ProviderResult, RerankerProvider};
use crate::error::ProviderError;

pub struct CascadeChat {
    members: Vec<Box<dyn ChatProvider>>,
}

impl CascadeChat {
    pub fn new(members: Vec<Box<dyn ChatProvider>>) -> Self {
        Self { members }
    }
}

#[async_trait]
impl ChatProvider for CascadeChat {
    async fn complete(&self, request: ChatRequest) -> ProviderResult<String> {
        let mut last_err = ProviderError::Unavailable("no chat providers configured".into());
        for member in &self.members {
            match member.complete(ChatRequest {
                messages: request.messages.clone(),
                max_tokens: request.max_tokens,
                temperature: request.temperature,
            }).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    warn!(provider = member.name(), error = %e, "chat provider failed, falling back");
                    last_err = e;
                }
            }
        }
        Err(last_err)
    }

    fn name(&self) -> &str {
        "cascade"
    }
}

pub struct CascadeEmbedding {
    members: Vec<Box<dyn EmbeddingProvider>>,
}

impl CascadeEmbedding {
    pub fn new(members: Vec<Box<dyn EmbeddingProvider>>) -> Self {
        Self { members }
    }
}

#[async_trait]
impl EmbeddingProvider for CascadeEmbedding {
    async fn embed(&self, text: &str) -> ProviderResult<Vec<f32>> {
        let mut last_err = ProviderError::Unavailable("no embedding providers configured".into());
        for member in &self.members {
            match member.embed(text).await {
                Ok(v) => return Ok(v),
                Err(e) => {
                    warn!(provider = member.name(), error = %e, "embedding provider failed, falling back");
                    last_err = e;
                }
            }
        }
        Err(last_err)
    }

    async fn embed_query(&self, text: &str) -> ProviderResult<Vec<f32>> {
        let mut last_err = ProviderError::Unavailable("no embedding providers configured".into());
        for member in &self.members {
            match member.embed_query(text).await {
                Ok(v) => return Ok(v),
                Err(e) => {
                    warn!(provider = member.name(), error = %e, "embedding provider failed, falling back");
                    last_err = e;
                }
            }
        }
        Err(last_err)
    }

    fn dimensions(&self) -> usize {
        self.members.first().map(|m| m.dimensions()).unwrap_or(0)
    }

    fn name(&self) -> &str {
        "cascade"
    }
}

pub struct CascadeReranker {
    members: Vec<Box<dyn RerankerProvider>>,
}

impl CascadeReranker {
    pub fn new(members: Vec<Box<dyn RerankerProvider>>) -> Self {
        Self { members }
    }
}

#[async_trait]
impl RerankerProvider for CascadeReranker {
    async fn rerank(&self, query: &str, candidates: &[String]) -> ProviderResult<Vec<f32>> {
        let mut last_err = ProviderError::Unavailable("no reranker providers configured".into());
        for member in &self.members {
            match member.rerank(query, candidates).await {
                Ok(scores) => return Ok(scores),
                Err(e) => {
                    warn!(provider = member.name(), error = %e, "reranker provider failed, falling back");
                    last_err = e;
                }
            }
        }
        Err(last_err)
    }

    fn name(&self) -> &str {
        "cascade"
    }
}
