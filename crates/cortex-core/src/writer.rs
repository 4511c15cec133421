//! MemoryWriter (spec §4.9): the single path every extraction — fast
//! channel, deep channel, Flush, or a direct `remember` call — goes through
//! before anything reaches the Store. Owns dedup, SmartUpdate, and layer
//! placement; never bypassed.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::config::Config;
use crate::error::Result;
use crate::memory::{Category, Layer, Memory, NewMemory};
use crate::providers::{ChatProvider, ChatRequest, EmbeddingProvider};
use crate::storage::Store;
use crate::vector::VectorIndex;

const NEAREST_CANDIDATE_COUNT: usize = 3;
const CONFIDENCE_BUMP: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmartUpdateType {
    Replace,
    Merge,
    Conflict,
}

impl SmartUpdateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SmartUpdateType::Replace => "replace",
            SmartUpdateType::Merge => "merge",
            SmartUpdateType::Conflict => "conflict",
        }
    }
}

/// What the fast/deep channel or Flush hands to the writer (spec §4.9).
#[derive(Debug, Clone)]
pub struct WriteRequest {
    pub content: String,
    pub category: Category,
    pub importance: f64,
    pub confidence: f64,
    /// Free-text provenance tag persisted as `Memory.source`.
    pub source_tag: String,
}

#[derive(Debug, Clone)]
pub enum WriteOutcome {
    /// Exact duplicate of an existing memory; the candidate was reinforced
    /// instead of a new row being written.
    ExactDuplicate { candidate_id: String },
    /// SmartUpdate (or the legacy rule) decided the existing memory already
    /// covers the new content.
    Kept { candidate_id: String },
    /// A new memory was written with no supersession.
    Inserted { memory: Memory },
    /// A new memory was written and it supersedes an existing one.
    Superseded {
        memory: Memory,
        superseded_id: String,
        smart_update_type: SmartUpdateType,
    },
}

pub struct MemoryWriter {
    store: Arc<Store>,
    vector_index: Arc<VectorIndex>,
    embeddings: Arc<dyn EmbeddingProvider>,
    chat: Option<Arc<dyn ChatProvider>>,
    config: Arc<Config>,
    clock: Arc<dyn Clock>,
}

impl MemoryWriter {
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
        }
    }

    pub async fn write(&self, agent_id: &str, req: WriteRequest) -> Result<WriteOutcome> {
        self.store.ensure_agent(agent_id)?;

        // Step 1: embed (cache-backed via the wrapped provider). On failure,
        // skip dedup entirely and fall through to a plain insert.
        let embedding = self.embeddings.embed(&req.content).await.ok();

        // Step 2/3: nearest active, non-pinned candidates.
        let closest = match &embedding {
            Some(vector) => self.nearest_eligible_candidate(agent_id, vector)?,
            None => None,
        };

        match closest {
            Some((candidate, distance)) if distance < self.config.exact_dup_threshold => {
                self.reinforce_exact_duplicate(&candidate, req.importance, req.confidence)?;
                Ok(WriteOutcome::ExactDuplicate {
                    candidate_id: candidate.id,
                })
            }
            Some((candidate, distance)) if distance < self.config.similarity_threshold => {
                self.resolve_near_duplicate(agent_id, candidate, distance, req, embedding).await
            }
            _ => {
                let memory = self.insert_new(agent_id, req, embedding, None, None)?;
                Ok(WriteOutcome::Inserted { memory })
            }
        }
    }

    fn nearest_eligible_candidate(
        &self,
        agent_id: &str,
        vector: &[f32],
    ) -> Result<Option<(Memory, f64)>> {
        let hits = self
            .vector_index
            .search(vector, NEAREST_CANDIDATE_COUNT * 4, Some(agent_id))
            .unwrap_or_default();

        let now = self.clock.now();
        for hit in hits {
            let Some(memory) = self.store.get_memory(&hit.id)? else {
                continue;
            };
            if memory.is_active(now) && !memory.is_pinned {
                return Ok(Some((memory, hit.distance as f64)));
            }
        }
        Ok(None)
    }

    fn reinforce_exact_duplicate(
        &self,
        candidate: &Memory,
        new_importance: f64,
        _new_confidence: f64,
    ) -> Result<()> {
        use crate::memory::MemoryPatch;
        let bumped_confidence = (candidate.confidence + CONFIDENCE_BUMP).min(1.0);
        self.store.update_memory(
            &candidate.id,
            MemoryPatch {
                importance: Some(candidate.importance.max(new_importance)),
                confidence: Some(bumped_confidence),
                ..Default::default()
            },
        )?;
        Ok(())
    }

    async fn resolve_near_duplicate(
        &self,
        agent_id: &str,
        candidate: Memory,
        distance: f64,
        req: WriteRequest,
        embedding: Option<Vec<f32>>,
    ) -> Result<WriteOutcome> {
        if !self.config.smart_update_enabled {
            return if distance < self.config.legacy_dedup_threshold {
                Ok(WriteOutcome::Kept {
                    candidate_id: candidate.id,
                })
            } else {
                let memory = self.insert_new(agent_id, req, embedding, None, None)?;
                Ok(WriteOutcome::Inserted { memory })
            };
        }

        let decision = match &self.chat {
            Some(chat) => smart_update(chat.as_ref(), &candidate.content, &req.content)
                .await
                .unwrap_or(SmartUpdateDecision::Keep),
            None => SmartUpdateDecision::Keep,
        };

        match decision {
            SmartUpdateDecision::Keep => Ok(WriteOutcome::Kept {
                candidate_id: candidate.id,
            }),
            SmartUpdateDecision::Replace => {
                let memory = self.insert_new(
                    agent_id,
                    req,
                    embedding,
                    Some(candidate.id.clone()),
                    Some(SmartUpdateType::Replace),
                )?;
                Ok(WriteOutcome::Superseded {
                    memory,
                    superseded_id: candidate.id,
                    smart_update_type: SmartUpdateType::Replace,
                })
            }
            SmartUpdateDecision::Merge(merged_content) => {
                let mut merged_req = req;
                merged_req.content = merged_content;
                let memory = self.insert_new(
                    agent_id,
                    merged_req,
                    embedding,
                    Some(candidate.id.clone()),
                    Some(SmartUpdateType::Merge),
                )?;
                Ok(WriteOutcome::Superseded {
                    memory,
                    superseded_id: candidate.id,
                    smart_update_type: SmartUpdateType::Merge,
                })
            }
            SmartUpdateDecision::Conflict => {
                let memory = self.insert_new(
                    agent_id,
                    req,
                    embedding,
                    Some(candidate.id.clone()),
                    Some(SmartUpdateType::Conflict),
                )?;
                Ok(WriteOutcome::Superseded {
                    memory,
                    superseded_id: candidate.id,
                    smart_update_type: SmartUpdateType::Conflict,
                })
            }
        }
    }

    fn insert_new(
        &self,
        agent_id: &str,
        req: WriteRequest,
        embedding: Option<Vec<f32>>,
        supersedes: Option<String>,
        smart_update_type: Option<SmartUpdateType>,
    ) -> Result<Memory> {
        let layer = if req.importance >= 0.8 {
            Layer::Core
        } else {
            Layer::Working
        };
        let expires_at = (layer == Layer::Working).then(|| {
            self.clock.now() + chrono::Duration::hours(self.config.working_memory_ttl_hours)
        });

        let mut metadata = serde_json::json!({});
        if let Some(kind) = smart_update_type {
            metadata["smart_update_type"] = serde_json::json!(kind.as_str());
        }

        let memory = self.store.insert_memory(NewMemory {
            layer,
            category: req.category,
            content: req.content,
            source: req.source_tag,
            agent_id: agent_id.to_string(),
            importance: req.importance,
            confidence: req.confidence,
            expires_at,
            is_pinned: false,
            metadata,
        })?;

        if let Some(old_id) = supersedes {
            use crate::memory::MemoryPatch;
            self.store.update_memory(
                &old_id,
                MemoryPatch {
                    superseded_by: Some(Some(memory.id.clone())),
                    ..Default::default()
                },
            )?;
            self.vector_index.delete(&[old_id]);
        }

        if let Some(vector) = embedding {
            let _ = self.vector_index.upsert(&memory.id, &vector, agent_id);
        }

        Ok(memory)
    }
}

enum SmartUpdateDecision {
    Keep,
    Replace,
    Merge(String),
    Conflict,
}

/// Spec §4.5.1: a short LLM call deciding how new content relates to an
/// existing near-duplicate memory.
async fn smart_update(
    chat: &dyn ChatProvider,
    existing_content: &str,
    new_content: &str,
) -> crate::error::Result<SmartUpdateDecision> {
    let prompt = format!(
        "Existing memory: \"{existing_content}\"\nNew statement: \"{new_content}\"\n\
         Respond with exactly one of: KEEP, REPLACE, CONFLICT, or MERGE: <merged content>."
    );
    let response = chat
        .complete(ChatRequest::single_user_message(&prompt))
        .await?;

    let trimmed = response.trim();
    let upper = trimmed.to_uppercase();

    if upper.starts_with("REPLACE") {
        Ok(SmartUpdateDecision::Replace)
    } else if upper.starts_with("CONFLICT") {
        Ok(SmartUpdateDecision::Conflict)
    } else if upper.starts_with("MERGE") {
        let merged = trimmed.splitn(2, ':').nth(1).unwrap_or(trimmed).trim();
        Ok(SmartUpdateDecision::Merge(merged.to_string()))
    } else {
        Ok(SmartUpdateDecision::Keep)
    }
}
