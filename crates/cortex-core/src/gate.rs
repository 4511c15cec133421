//! Gate (spec §4.7): recall. Sanitizes the query, optionally expands it into
//! variants, runs [`crate::search::HybridSearch`] across each variant, fuses
//! the results, optionally reranks, and formats the top results for prompt
//! injection.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::error::Result;
use crate::memory::{Category, Layer, Memory};
use crate::providers::{ChatProvider, ChatRequest, RerankerProvider};
use crate::search::{format_for_injection, HybridSearch, SearchFilters};
use crate::signal::SignalDetector;

const QUERY_EXPANSION_LEN_THRESHOLD: usize = 8;
const VARIANT_SEARCH_LIMIT: usize = 15;

#[derive(Debug, Clone)]
pub struct RecallRequest {
    pub agent_id: String,
    pub query: String,
    pub layers: Option<Vec<Layer>>,
    pub categories: Option<Vec<Category>>,
    pub max_tokens: usize,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct RecallResult {
    pub injected_text: String,
    pub memories_injected: usize,
    pub skipped_small_talk: bool,
    pub variants_used: usize,
    pub elapsed_ms: u64,
}

struct FusedCandidate {
    memory: Memory,
    best_score: f64,
    hit_count: usize,
}

pub struct Gate {
    search: Arc<HybridSearch>,
    chat: Option<Arc<dyn ChatProvider>>,
    reranker: Option<Arc<dyn RerankerProvider>>,
    config: Arc<Config>,
    signals: SignalDetector,
}

impl Gate {
    pub fn new(
        search: Arc<HybridSearch>,
        chat: Option<Arc<dyn ChatProvider>>,
        reranker: Option<Arc<dyn RerankerProvider>>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            search,
            chat,
            reranker,
            config,
            signals: SignalDetector,
        }
    }

    pub async fn recall(&self, req: RecallRequest) -> Result<RecallResult> {
        let start = Instant::now();
        let sanitized_query = self.signals.sanitize(&req.query);

        if self.signals.is_small_talk(&sanitized_query) {
            return Ok(RecallResult {
                injected_text: String::new(),
                memories_injected: 0,
                skipped_small_talk: true,
                variants_used: 0,
                elapsed_ms: start.elapsed().as_millis() as u64,
            });
        }

        let variants = self.build_variants(&sanitized_query).await;
        let filters = SearchFilters {
            agent_id: req.agent_id.clone(),
            layers: req.layers.clone(),
            categories: req.categories.clone(),
        };

        let mut fused: HashMap<String, FusedCandidate> = HashMap::new();
        for variant in &variants {
            let (results, _) = self
                .search
                .search(variant, &filters, VARIANT_SEARCH_LIMIT, false)
                .await?;
            for result in results {
                fused
                    .entry(result.memory.id.clone())
                    .and_modify(|c| {
                        c.best_score = c.best_score.max(result.final_score);
                        c.hit_count += 1;
                    })
                    .or_insert(FusedCandidate {
                        memory: result.memory.clone(),
                        best_score: result.final_score,
                        hit_count: 1,
                    });
            }
        }

        let mut scored: Vec<(Memory, f64)> = fused
            .into_values()
            .map(|c| {
                let boosted = c.best_score * (1.0 + 0.1 * (c.hit_count.saturating_sub(1) as f64));
                (c.memory, boosted)
            })
            .collect();

        if let Some(reranker) = &self.reranker {
            scored = self.apply_reranker(reranker.as_ref(), &sanitized_query, scored).await;
        }

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.id.cmp(&b.0.id))
        });

        let results: Vec<crate::search::SearchResult> = scored
            .into_iter()
            .map(|(memory, final_score)| crate::search::SearchResult {
                memory,
                final_score,
                text_score: 0.0,
                vector_score: 0.0,
            })
            .collect();

        let (injected_text, memories_injected) = format_for_injection(&results, req.max_tokens);

        Ok(RecallResult {
            injected_text,
            memories_injected,
            skipped_small_talk: false,
            variants_used: variants.len(),
            elapsed_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Expand the sanitized query into up to 2 additional variants via a
    /// short LLM call (spec §4.7 step 3). Short queries (<=8 chars) get a
    /// single enriched variant; longer queries get up to 2. Falls back to
    /// the original query alone on any failure.
    async fn build_variants(&self, query: &str) -> Vec<String> {
        let mut variants = vec![query.to_string()];

        let Some(chat) = &self.chat else {
            return variants;
        };

        let target_count = if query.chars().count() <= QUERY_EXPANSION_LEN_THRESHOLD {
            1
        } else {
            2
        };

        let prompt = format!(
            "Rewrite this search query into {target_count} alternative phrasing(s) that \
             would retrieve the same information, one per line, no numbering: \"{query}\""
        );

        if let Ok(response) = chat.complete(ChatRequest::single_user_message(prompt)).await {
            for line in response.lines() {
                let trimmed = line.trim();
                if !trimmed.is_empty() && variants.len() <= target_count {
                    variants.push(trimmed.to_string());
                }
            }
        }

        variants
    }

    /// Fuse reranker scores with the already-normalized fused score (spec
    /// §4.7 step 6): `final = w*rerank + (1-w)*normalizedOriginal`.
    async fn apply_reranker(
        &self,
        reranker: &dyn RerankerProvider,
        query: &str,
        candidates: Vec<(Memory, f64)>,
    ) -> Vec<(Memory, f64)> {
        if candidates.is_empty() {
            return candidates;
        }

        let contents: Vec<String> = candidates.iter().map(|(m, _)| m.content.clone()).collect();
        let Ok(rerank_scores) = reranker.rerank(query, &contents).await else {
            return candidates;
        };
        if rerank_scores.len() != candidates.len() {
            return candidates;
        }

        let max_original = candidates
            .iter()
            .map(|(_, s)| *s)
            .fold(0.0_f64, f64::max)
            .max(1e-9);
        let max_rerank = rerank_scores.iter().cloned().fold(0.0_f32, f32::max).max(1e-9);
        let w = self.config.rerank_weight as f64;

        candidates
            .into_iter()
            .zip(rerank_scores)
            .map(|((memory, original), rerank)| {
                let normalized_original = original / max_original;
                let normalized_rerank = rerank as f64 / max_rerank as f64;
                let fused = w * normalized_rerank + (1.0 - w) * normalized_original;
                (memory, fused)
            })
            .collect()
    }
}
