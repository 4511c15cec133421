//! Reranker capability, backing Gate's optional rerank-fusion step (spec
//! §4.7 step 6).

use async_trait::async_trait;

use super::ProviderResult;

#[async_trait]
pub trait RerankerProvider: Send + Sync {
    /// Scores each candidate's relevance to `query`, one score per candidate,
    /// in the same order. Higher is more relevant; scale is provider-defined.
    async fn rerank(&self, query: &str, candidates: &[String]) -> ProviderResult<Vec<f32>>;

    fn name(&self) -> &str;
}
