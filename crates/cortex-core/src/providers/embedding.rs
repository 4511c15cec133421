//! Embedding capability, plus the content-hash-keyed cache wrapper (spec §5
//! "The embedding cache is an in-process LRU keyed by content hash").

use std::sync::Arc;

use async_trait::async_trait;

use crate::cache::EmbeddingCache;

use super::ProviderResult;

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a document/passage meant to be stored and later retrieved.
    async fn embed(&self, text: &str) -> ProviderResult<Vec<f32>>;

    /// Embed a search query. Asymmetric models (e.g. Nomic Embed Text)
    /// encode queries differently from documents; providers without that
    /// distinction can leave the default, which just calls [`Self::embed`].
    async fn embed_query(&self, text: &str) -> ProviderResult<Vec<f32>> {
        self.embed(text).await
    }

    fn dimensions(&self) -> usize;

    fn name(&self) -> &str;
}

/// Wraps any `EmbeddingProvider` with an LRU cache so repeated embedding of
/// identical content (exact-duplicate checks, repeated recall queries) never
/// re-invokes the backing provider (spec §5 "CachedEmbeddingProvider wraps
/// the chain to limit fan-out").
pub struct CachedEmbeddingProvider<P> {
    inner: P,
    cache: Arc<EmbeddingCache>,
}

impl<P: EmbeddingProvider> CachedEmbeddingProvider<P> {
    pub fn new(inner: P, cache: Arc<EmbeddingCache>) -> Self {
        Self { inner, cache }
    }
}

#[async_trait]
impl<P: EmbeddingProvider> EmbeddingProvider for CachedEmbeddingProvider<P> {
    async fn embed(&self, text: &str) -> ProviderResult<Vec<f32>> {
        if let Some(cached) = self.cache.get(text) {
            return Ok(cached);
        }
        let embedding = self.inner.embed(text).await?;
        self.cache.put(text, embedding.clone());
        Ok(embedding)
    }

    async fn embed_query(&self, text: &str) -> ProviderResult<Vec<f32>> {
        // Asymmetric providers encode the same string differently as a query
        // vs. a document, so the cache key must not collide with `embed`'s.
        let cache_key = format!("query\u{0}{text}");
        if let Some(cached) = self.cache.get(&cache_key) {
            return Ok(cached);
        }
        let embedding = self.inner.embed_query(text).await?;
        self.cache.put(&cache_key, embedding.clone());
        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
