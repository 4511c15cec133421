//! LifecycleEngine (spec §4.10): background maintenance run as one ordered
//! sweep of seven phases — expire, promote, dedup, archive, compress, decay
//! scoring, profile synthesis. Guarded by a process-wide single-runner mutex
//! so two sweeps never execute concurrently.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::clock::Clock;
use crate::config::Config;
use crate::error::{CortexError, Result};
use crate::memory::{Category, Layer, MemoryPatch, NewMemory};
use crate::providers::{ChatProvider, ChatRequest, EmbeddingProvider};
use crate::storage::Store;
use crate::vector::VectorIndex;

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct LifecycleReport {
    pub dry_run: bool,
    pub expired: usize,
    pub promoted: usize,
    pub deduped: usize,
    pub archived: usize,
    pub compressed: usize,
    pub decay_updated: usize,
    pub profiles_synthesized: usize,
    pub already_running: bool,
}

pub struct LifecycleEngine {
    store: Arc<Store>,
    vector_index: Arc<VectorIndex>,
    embeddings: Arc<dyn EmbeddingProvider>,
    chat: Option<Arc<dyn ChatProvider>>,
    config: Arc<Config>,
    clock: Arc<dyn Clock>,
    running: AtomicBool,
}

impl LifecycleEngine {
    pub fn new(
        store: Arc<Store>,
        vector_index: Arc<VectorIndex>,
        embeddings: Arc<dyn EmbeddingProvider>,
        chat: Option<Arc<dyn ChatProvider>>,
        config: Arc<Config>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            vector_index,
            embeddings,
            chat,
            config,
            clock,
            running: AtomicBool::new(false),
        }
    }

    pub async fn run(&self, dry_run: bool) -> Result<LifecycleReport> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Ok(LifecycleReport {
                dry_run,
                already_running: true,
                ..Default::default()
            });
        }

        let result = self.run_phases(dry_run).await;
        self.running.store(false, Ordering::SeqCst);
        result
    }

    async fn run_phases(&self, dry_run: bool) -> Result<LifecycleReport> {
        let mut report = LifecycleReport {
            dry_run,
            ..Default::default()
        };

        let agents = self.store.list_agents()?;
        let now = self.clock.now();

        for agent in &agents {
            report.expired += self.expire_working(&agent.id, now, dry_run)?;
            report.promoted += self.promote_working(&agent.id, now, dry_run).await?;
            report.deduped += self.dedup_core(&agent.id, dry_run)?;
            report.archived += self.archive_stale(&agent.id, now, dry_run)?;
            report.compressed += self.compress_archive(&agent.id, now, dry_run).await?;
            report.decay_updated += self.update_decay_scores(&agent.id, now, dry_run)?;
            if self.synthesize_profile(&agent.id, now, dry_run).await? {
                report.profiles_synthesized += 1;
            }
        }

        Ok(report)
    }

    /// Phase 1: delete expired working memories and their vectors.
    fn expire_working(&self, agent_id: &str, now: DateTime<Utc>, dry_run: bool) -> Result<usize> {
        let memories = self.store.list_active_memories(agent_id, Some(&[Layer::Working]), 10_000)?;
        let expired: Vec<_> = memories
            .into_iter()
            .filter(|m| m.expires_at.map(|e| e < now).unwrap_or(false))
            .collect();

        if dry_run {
            return Ok(expired.len());
        }

        for memory in &expired {
            self.store.delete_memory(&memory.id)?;
            self.vector_index.delete(&[memory.id.clone()]);
            self.store
                .append_lifecycle_log(&memory.id, agent_id, "expire", None)?;
        }
        Ok(expired.len())
    }

    /// Phase 2: promote aged-in working memories scoring above the threshold.
    async fn promote_working(&self, agent_id: &str, now: DateTime<Utc>, dry_run: bool) -> Result<usize> {
        let memories = self.store.list_active_memories(agent_id, Some(&[Layer::Working]), 10_000)?;
        let mut promoted = 0usize;

        for memory in memories {
            let age = now - memory.created_at;
            if age < chrono::Duration::hours(24) {
                continue;
            }

            let access_term = (1.0 + memory.access_count as f64).ln() / (1.0 + 10.0_f64).ln();
            let score = 0.3 * memory.category.base_importance() + 0.4 * access_term + 0.3 * memory.importance;

            if score < self.config.promotion_threshold {
                continue;
            }

            if dry_run {
                promoted += 1;
                continue;
            }

            let new_importance = memory.importance.max(0.6);
            let new_memory = self.store.insert_memory(NewMemory {
                layer: Layer::Core,
                category: memory.category,
                content: memory.content.clone(),
                source: "lifecycle:promotion".to_string(),
                agent_id: agent_id.to_string(),
                importance: new_importance,
                confidence: memory.confidence,
                expires_at: None,
                is_pinned: false,
                metadata: memory.metadata.clone(),
            })?;

            self.store.update_memory(
                &memory.id,
                MemoryPatch {
                    superseded_by: Some(Some(new_memory.id.clone())),
                    ..Default::default()
                },
            )?;
            self.vector_index.delete(&[memory.id.clone()]);

            if let Ok(vector) = self.embeddings.embed(&new_memory.content).await {
                let _ = self.vector_index.upsert(&new_memory.id, &vector, agent_id);
            }

            self.store.append_lifecycle_log(
                &new_memory.id,
                agent_id,
                "promote",
                Some(serde_json::json!({ "from": memory.id, "score": score })),
            )?;
            promoted += 1;
        }

        Ok(promoted)
    }

    /// Phase 3: merge near-duplicate core memories by trigram Jaccard similarity.
    fn dedup_core(&self, agent_id: &str, dry_run: bool) -> Result<usize> {
        let jaccard_threshold = self.config.dedup_jaccard_threshold;

        let mut memories = self.store.list_active_memories(agent_id, Some(&[Layer::Core]), 10_000)?;
        memories.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let mut superseded: HashSet<String> = HashSet::new();
        let mut deduped = 0usize;

        for i in 0..memories.len() {
            if superseded.contains(&memories[i].id) {
                continue;
            }
            let newer_trigrams = trigrams(&strip_dedup_prefixes(&memories[i].content, &self.config.dedup_strip_prefixes));
            for j in (i + 1)..memories.len() {
                if superseded.contains(&memories[j].id) || memories[j].is_pinned {
                    continue;
                }
                let older_trigrams = trigrams(&strip_dedup_prefixes(&memories[j].content, &self.config.dedup_strip_prefixes));
                if jaccard(&newer_trigrams, &older_trigrams) > jaccard_threshold {
                    superseded.insert(memories[j].id.clone());
                    deduped += 1;

                    if dry_run {
                        continue;
                    }

                    self.store.update_memory(
                        &memories[j].id,
                        MemoryPatch {
                            superseded_by: Some(Some(memories[i].id.clone())),
                            ..Default::default()
                        },
                    )?;
                    self.vector_index.delete(&[memories[j].id.clone()]);
                    self.store.append_lifecycle_log(
                        &memories[j].id,
                        agent_id,
                        "dedup",
                        Some(serde_json::json!({ "merged_into": memories[i].id })),
                    )?;
                }
            }
        }

        Ok(deduped)
    }

    /// Phase 4: archive core memories whose decay score has dropped too low.
    fn archive_stale(&self, agent_id: &str, now: DateTime<Utc>, dry_run: bool) -> Result<usize> {
        let memories = self.store.list_active_memories(agent_id, Some(&[Layer::Core]), 10_000)?;
        let stale: Vec<_> = memories
            .into_iter()
            .filter(|m| !m.is_pinned && m.decay_score < self.config.archive_threshold)
            .collect();

        if dry_run {
            return Ok(stale.len());
        }

        for memory in &stale {
            let expires_at = now + chrono::Duration::days(self.config.archive_ttl_days);
            self.store.update_memory(
                &memory.id,
                MemoryPatch {
                    layer: Some(Layer::Archive),
                    expires_at: Some(Some(expires_at)),
                    ..Default::default()
                },
            )?;
            self.store
                .append_lifecycle_log(&memory.id, agent_id, "archive", None)?;
        }

        Ok(stale.len())
    }

    /// Phase 5: bundle expired archive memories into an LLM super-summary.
    async fn compress_archive(&self, agent_id: &str, now: DateTime<Utc>, dry_run: bool) -> Result<usize> {
        if !self.config.compress_back_to_core {
            return Ok(0);
        }
        let Some(chat) = &self.chat else {
            return Ok(0);
        };

        let memories = self.store.list_active_memories(agent_id, Some(&[Layer::Archive]), 10_000)?;
        let expired: Vec<_> = memories
            .into_iter()
            .filter(|m| m.expires_at.map(|e| e < now).unwrap_or(false))
            .collect();

        if expired.is_empty() {
            return Ok(0);
        }
        if dry_run {
            return Ok(1);
        }

        let bullet_list: String = expired
            .iter()
            .map(|m| format!("- {}", m.content))
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = format!(
            "Write a 2-5 sentence summary covering these archived notes:\n{bullet_list}"
        );
        let Ok(summary) = chat.complete(ChatRequest::single_user_message(prompt)).await else {
            return Ok(0);
        };
        if summary.trim().is_empty() {
            return Ok(0);
        }

        let new_memory = self.store.insert_memory(NewMemory {
            layer: Layer::Core,
            category: Category::Summary,
            content: summary,
            source: "lifecycle:compress".to_string(),
            agent_id: agent_id.to_string(),
            importance: Category::Summary.base_importance(),
            confidence: 0.6,
            expires_at: None,
            is_pinned: false,
            metadata: serde_json::json!({}),
        })?;

        for memory in &expired {
            self.store.update_memory(
                &memory.id,
                MemoryPatch {
                    superseded_by: Some(Some(new_memory.id.clone())),
                    ..Default::default()
                },
            )?;
            self.vector_index.delete(&[memory.id.clone()]);
        }

        if let Ok(vector) = self.embeddings.embed(&new_memory.content).await {
            let _ = self.vector_index.upsert(&new_memory.id, &vector, agent_id);
        }

        self.store.append_lifecycle_log(
            &new_memory.id,
            agent_id,
            "compress",
            Some(serde_json::json!({ "inputs": expired.iter().map(|m| &m.id).collect::<Vec<_>>() })),
        )?;

        Ok(1)
    }

    /// Phase 6: recompute decay scores for every active memory.
    fn update_decay_scores(&self, agent_id: &str, now: DateTime<Utc>, dry_run: bool) -> Result<usize> {
        let memories = self.store.list_active_memories(agent_id, None, 10_000)?;
        let mut updated = 0usize;

        for memory in &memories {
            let since = memory.last_accessed.unwrap_or(memory.created_at);
            let days_since_access = (now - since).num_seconds() as f64 / 86_400.0;
            let recency_factor = (-self.config.decay_lambda * days_since_access.max(0.0)).exp();
            let access_freq = (1.0 + memory.access_count as f64).ln() / (1.0 + 20.0_f64).ln();

            let decay_score = (memory.category.base_importance() * access_freq
                + recency_factor * memory.importance)
                .clamp(0.0, 1.0);

            if dry_run {
                updated += 1;
                continue;
            }

            self.store.update_memory(
                &memory.id,
                MemoryPatch {
                    decay_score: Some(decay_score),
                    ..Default::default()
                },
            )?;
            updated += 1;
        }

        Ok(updated)
    }

    /// Phase 7: synthesize a per-agent profile from the highest-importance
    /// core memories, cached for `profileCacheTtlHours`.
    async fn synthesize_profile(&self, agent_id: &str, now: DateTime<Utc>, dry_run: bool) -> Result<bool> {
        let Some(chat) = &self.chat else {
            return Ok(false);
        };

        let agent = self
            .store
            .get_agent(agent_id)?
            .ok_or_else(|| CortexError::not_found(format!("agent {agent_id} vanished")))?;

        if let Some(updated_at) = agent.profile_updated_at {
            let ttl = chrono::Duration::hours(self.config.profile_cache_ttl_hours);
            if now - updated_at < ttl {
                return Ok(false);
            }
        }

        let mut memories = self.store.list_active_memories(agent_id, Some(&[Layer::Core]), 10_000)?;
        memories.retain(|m| !matches!(m.category, Category::Context | Category::Summary));
        memories.sort_by(|a, b| b.importance.partial_cmp(&a.importance).unwrap_or(std::cmp::Ordering::Equal));
        memories.truncate(30);

        if memories.is_empty() {
            return Ok(false);
        }
        if dry_run {
            return Ok(true);
        }

        let mut by_category: HashMap<&'static str, Vec<&str>> = HashMap::new();
        for memory in &memories {
            by_category
                .entry(memory.category.as_str())
                .or_default()
                .push(memory.content.as_str());
        }

        let grouped = by_category
            .iter()
            .map(|(cat, items)| format!("{cat}:\n{}", items.join("\n")))
            .collect::<Vec<_>>()
            .join("\n\n");
        let prompt = format!(
            "Summarize this agent's known profile as compact JSON (identity, preferences, \
             skills, goals): \n\n{grouped}"
        );

        let Ok(response) = chat.complete(ChatRequest::single_user_message(prompt)).await else {
            return Ok(false);
        };

        let profile = serde_json::from_str::<serde_json::Value>(&response)
            .unwrap_or_else(|_| serde_json::json!({ "summary": response }));

        self.store.update_agent_profile(agent_id, profile)?;
        self.store
            .append_lifecycle_log(agent_id, agent_id, "profile_synthesis", None)?;
        Ok(true)
    }
}

/// Strip a configured boilerplate prefix (e.g. "User said:") before
/// similarity comparison so repeated framing text doesn't inflate Jaccard
/// scores between otherwise-unrelated memories (open question resolution,
/// lifecycle dedup).
fn strip_dedup_prefixes<'a>(content: &'a str, prefixes: &[String]) -> &'a str {
    let trimmed = content.trim_start();
    for prefix in prefixes {
        if let Some(rest) = trimmed.strip_prefix(prefix.as_str()) {
            return rest.trim_start();
        }
    }
    trimmed
}

fn trigrams(text: &str) -> HashSet<String> {
    let chars: Vec<char> = text.to_lowercase().chars().collect();
    if chars.len() < 3 {
        return HashSet::from([chars.iter().collect::<String>()]);
    }
    chars
        .windows(3)
        .map(|w| w.iter().collect::<String>())
        .collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    if union == 0.0 {
        0.0
    } else {
        intersection / union
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::providers::ProviderResult;
    use crate::vector::VectorIndexConfig;
    use async_trait::async_trait;

    struct StubEmbedding;

    #[async_trait]
    impl EmbeddingProvider for StubEmbedding {
        async fn embed(&self, _text: &str) -> ProviderResult<Vec<f32>> {
            Ok(vec![0.1; 8])
        }
        fn dimensions(&self) -> usize {
            8
        }
        fn name(&self) -> &str {
            "stub"
        }
    }

    fn engine_at(
        now: DateTime<Utc>,
    ) -> (LifecycleEngine, Arc<Store>, Arc<FixedClock>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::open(Some(dir.path().join("t.db"))).unwrap());
        let vector_index = Arc::new(VectorIndex::new(VectorIndexConfig {
            dimensions: 8,
            ..VectorIndexConfig::default()
        }));
        let config = Arc::new(Config::default());
        let clock = Arc::new(FixedClock::new(now));
        let engine = LifecycleEngine::new(
            store.clone(),
            vector_index,
            Arc::new(StubEmbedding),
            None,
            config,
            clock.clone(),
        );
        (engine, store, clock, dir)
    }

    #[tokio::test]
    async fn expires_stale_working_memories() {
        let now = Utc::now();
        let (engine, store, _clock, _dir) = engine_at(now);
        store.ensure_agent("agent-a").unwrap();
        store
            .insert_memory(NewMemory {
                layer: Layer::Working,
                category: Category::Fact,
                content: "temp note".to_string(),
                source: "test".to_string(),
                agent_id: "agent-a".to_string(),
                importance: 0.3,
                confidence: 0.5,
                expires_at: Some(now - chrono::Duration::hours(1)),
                is_pinned: false,
                metadata: serde_json::json!({}),
            })
            .unwrap();

        let report = engine.run(false).await.unwrap();
        assert_eq!(report.expired, 1);
    }

    #[tokio::test]
    async fn promotes_high_scoring_aged_working_memory() {
        let now = Utc::now();
        let (engine, store, clock, _dir) = engine_at(now);
        store.ensure_agent("agent-a").unwrap();
        store
            .insert_memory(NewMemory {
                layer: Layer::Working,
                category: Category::Identity,
                content: "user's name is Jamie".to_string(),
                source: "test".to_string(),
                agent_id: "agent-a".to_string(),
                importance: 0.9,
                confidence: 0.9,
                expires_at: None,
                is_pinned: false,
                metadata: serde_json::json!({}),
            })
            .unwrap();

        clock.advance(chrono::Duration::hours(25));
        let report = engine.run(false).await.unwrap();
        assert_eq!(report.promoted, 1);

        let promoted = store
            .list_active_memories("agent-a", Some(&[Layer::Core]), 10)
            .unwrap();
        assert_eq!(promoted.len(), 1);
    }

    #[test]
    fn trigram_jaccard_detects_near_duplicates() {
        let a = trigrams("the sky is blue today");
        let b = trigrams("the sky is blue again today");
        assert!(jaccard(&a, &b) > 0.5);
    }

    #[test]
    fn trigram_jaccard_rejects_unrelated_text() {
        let a = trigrams("the sky is blue today");
        let b = trigrams("quarterly revenue exceeded projections");
        assert!(jaccard(&a, &b) < 0.2);
    }
}
