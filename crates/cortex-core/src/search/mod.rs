//! HybridSearch (spec §4.4): fuses full-text and vector search into one
//! ranked list, then formats the result for prompt injection.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::clock::Clock;
use crate::config::Config;
use crate::error::Result;
use crate::memory::{Category, Layer, Memory};
use crate::providers::EmbeddingProvider;
use crate::storage::Store;
use crate::vector::VectorIndex;

/// Filters applied during fusion (spec §4.4 step 4).
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub agent_id: String,
    pub layers: Option<Vec<Layer>>,
    pub categories: Option<Vec<Category>>,
}

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub memory: Memory,
    pub final_score: f64,
    pub text_score: f64,
    pub vector_score: f64,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct SearchDebug {
    pub text_hits: usize,
    pub vector_hits: usize,
    pub fused_count: usize,
    pub elapsed_ms: u64,
}

const RECENCY_WINDOW_DAYS: f64 = 7.0;

pub struct HybridSearch {
    store: Arc<Store>,
    vector_index: Arc<VectorIndex>,
    embeddings: Arc<dyn EmbeddingProvider>,
    config: Arc<Config>,
    clock: Arc<dyn Clock>,
}

impl HybridSearch {
    pub fn new(
        store: Arc<Store>,
        vector_index: Arc<VectorIndex>,
        embeddings: Arc<dyn EmbeddingProvider>,
        config: Arc<Config>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            vector_index,
            embeddings,
            config,
            clock,
        }
    }

    pub async fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
        limit: usize,
        debug: bool,
    ) -> Result<(Vec<SearchResult>, Option<SearchDebug>)> {
        let start = Instant::now();
        let sanitized = sanitize_fts5_query(query);
        let source_limit = (limit * 3).max(15) as i64;

        // Step 1: text and vector search. Vector side degrades to empty on
        // embedding failure rather than failing the whole call (spec §4.2).
        let text_hits = self
            .store
            .search_fulltext(&sanitized, &filters.agent_id, source_limit)?;

        let vector_hits = match self.embeddings.embed_query(query).await {
            Ok(v) => self
                .vector_index
                .search(&v, source_limit as usize, Some(&filters.agent_id))
                .unwrap_or_default(),
            Err(_) => Vec::new(),
        };

        // Step 2: normalize.
        let max_rank = text_hits.iter().map(|(_, r)| *r).max().unwrap_or(0) as f64;
        let max_distance = vector_hits
            .iter()
            .map(|h| h.distance)
            .fold(0.0_f32, f32::max) as f64;

        let mut fused: HashMap<String, (Memory, f64, f64)> = HashMap::new();

        for (memory, rank) in &text_hits {
            let text_score = 1.0 - (*rank as f64).abs() / (max_rank + 1.0);
            fused.insert(memory.id.clone(), (memory.clone(), text_score, 0.0));
        }

        for hit in &vector_hits {
            let vector_score = 1.0 - (hit.distance as f64) / (max_distance + 1e-9);
            match fused.get_mut(&hit.id) {
                Some(entry) => entry.2 = vector_score,
                None => {
                    if let Some(memory) = self.store.get_memory(&hit.id)? {
                        fused.insert(hit.id.clone(), (memory, 0.0, vector_score));
                    }
                }
            }
        }

        let text_hit_count = text_hits.len();
        let vector_hit_count = vector_hits.len();

        // Step 4: filters, expiry, supersession.
        let now = self.clock.now();
        let candidates: Vec<(Memory, f64, f64)> = fused
            .into_values()
            .filter(|(m, _, _)| m.agent_id == filters.agent_id)
            .filter(|(m, _, _)| m.is_active(now))
            .filter(|(m, _, _)| {
                filters
                    .layers
                    .as_ref()
                    .map(|ls| ls.contains(&m.layer))
                    .unwrap_or(true)
            })
            .filter(|(m, _, _)| {
                filters
                    .categories
                    .as_ref()
                    .map(|cs| cs.contains(&m.category))
                    .unwrap_or(true)
            })
            .collect();

        let fused_count = candidates.len();

        // Step 5: weight.
        let mut scored: Vec<SearchResult> = candidates
            .into_iter()
            .map(|(memory, text_score, vector_score)| {
                let fused_score = self.config.vector_weight as f64 * vector_score
                    + self.config.text_weight as f64 * text_score;
                let layer_weight = memory.layer.weight() as f64;

                let age_days = (now - memory.created_at).num_seconds() as f64 / 86_400.0;
                let recency_boost = if age_days <= RECENCY_WINDOW_DAYS {
                    1.0 + 0.1 * ((RECENCY_WINDOW_DAYS - age_days).max(0.0) / RECENCY_WINDOW_DAYS)
                } else {
                    1.0
                };

                let access_boost = 1.0
                    + 0.05 * (memory.access_count.min(self.config.access_boost_cap) as f64);

                let final_score =
                    fused_score * layer_weight * recency_boost * access_boost * memory.decay_score;

                SearchResult {
                    memory,
                    final_score,
                    text_score,
                    vector_score,
                }
            })
            .collect();

        // Step 6: sort, truncate. Tie-break by id for determinism (spec §5).
        scored.sort_by(|a, b| {
            b.final_score
                .partial_cmp(&a.final_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.memory.id.cmp(&b.memory.id))
        });
        scored.truncate(limit);

        // Step 7: best-effort access bump.
        for result in &scored {
            let _ = self
                .store
                .bump_access(&result.memory.id, &filters.agent_id, "search");
        }

        let debug_info = debug.then(|| SearchDebug {
            text_hits: text_hit_count,
            vector_hits: vector_hit_count,
            fused_count,
            elapsed_ms: start.elapsed().as_millis() as u64,
        });

        Ok((scored, debug_info))
    }
}

/// Rough token estimate: ~1 token per 4 ASCII chars, ~1 per 1.5 CJK chars
/// (spec §4.4 `formatForInjection`).
pub fn estimate_tokens(text: &str) -> usize {
    let mut tokens = 0.0_f64;
    for ch in text.chars() {
        if is_cjk(ch) {
            tokens += 1.0 / 1.5;
        } else {
            tokens += 1.0 / 4.0;
        }
    }
    tokens.ceil() as usize
}

fn is_cjk(ch: char) -> bool {
    let c = ch as u32;
    (0x4E00..=0x9FFF).contains(&c)
        || (0x3040..=0x30FF).contains(&c)
        || (0xAC00..=0xD7A3).contains(&c)
        || (0x3400..=0x4DBF).contains(&c)
}

/// Concatenate the top results into `<cortex_memory>` blocks bounded by a
/// token budget (spec §4.4).
pub fn format_for_injection(results: &[SearchResult], max_tokens: usize) -> (String, usize) {
    let mut lines = Vec::new();
    let mut used_tokens = 0usize;
    let mut injected = 0usize;

    for result in results {
        let label = result.memory.layer.injection_label();
        let line = format!("[{label}] {}", result.memory.content);
        let line_tokens = estimate_tokens(&line);
        if used_tokens + line_tokens > max_tokens && injected > 0 {
            break;
        }
        used_tokens += line_tokens;
        lines.push(line);
        injected += 1;
    }

    let body = lines.join("\n");
    (format!("<cortex_memory>\n{body}\n</cortex_memory>"), injected)
}

const FTS5_BOOLEAN_OPERATORS: [&str; 3] = ["AND", "OR", "NOT"];

/// Sanitize a raw query string for safe use as an FTS5 MATCH expression
/// (spec §4.1). Returns an empty string if nothing usable remains.
pub fn sanitize_fts5_query(query: &str) -> String {
    let stripped: String = query
        .chars()
        .filter(|c| {
            c.is_alphanumeric() || c.is_whitespace() || is_cjk(*c)
        })
        .collect();

    let collapsed = stripped
        .split_whitespace()
        .filter(|tok| !FTS5_BOOLEAN_OPERATORS.contains(&tok.to_uppercase().as_str()))
        .map(|tok| tok.trim_start_matches('-'))
        .filter(|tok| !tok.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    let truncated: String = collapsed.chars().take(500).collect();

    if truncated.chars().count() < 2 {
        String::new()
    } else {
        truncated
    }
}
