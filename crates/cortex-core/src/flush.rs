//! Flush (spec §4.8): session-boundary distillation. Collapses an entire
//! conversation into a short highlights summary plus a handful of durable
//! core memories, falling back to a single working-layer summary memory
//! when nothing extractable survives.

use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use crate::memory::{Category, ExtractionChannel, Layer, NewMemory, ParsedExtraction};
use crate::sieve::{validate_memory, validate_relation};
use crate::providers::{ChatProvider, ChatRequest};
use crate::storage::Store;
use crate::writer::{MemoryWriter, WriteOutcome, WriteRequest};

const MIN_LINE_LEN: usize = 10;
const MAX_TRANSCRIPT_CHARS: usize = 12_000;

#[derive(Debug, Clone)]
pub struct FlushRequest {
    pub agent_id: String,
    pub session_id: String,
    /// (role, content) pairs, oldest first.
    pub messages: Vec<(String, String)>,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct FlushResult {
    pub highlights: String,
    pub memories_written: usize,
    pub memories_deduped: usize,
    pub relations_written: usize,
    pub used_fallback_summary: bool,
}

pub struct Flush {
    store: Arc<Store>,
    writer: Arc<MemoryWriter>,
    chat: Option<Arc<dyn ChatProvider>>,
    #[allow(dead_code)]
    config: Arc<Config>,
}

impl Flush {
    pub fn new(
        store: Arc<Store>,
        writer: Arc<MemoryWriter>,
        chat: Option<Arc<dyn ChatProvider>>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            store,
            writer,
            chat,
            config,
        }
    }

    pub async fn flush(&self, req: FlushRequest) -> Result<FlushResult> {
        self.store.ensure_agent(&req.agent_id)?;

        let transcript = build_transcript(&req.messages);
        if transcript.is_empty() {
            return Ok(FlushResult::default());
        }

        let Some(chat) = &self.chat else {
            return self.write_fallback_summary(&req, String::new()).await;
        };

        let highlights = self.generate_highlights(chat.as_ref(), &transcript).await;
        let envelope = self.generate_core_items(chat.as_ref(), &transcript).await;

        if envelope.nothing_extracted || envelope.is_empty() {
            return self.write_fallback_summary(&req, highlights).await;
        }

        let mut result = FlushResult {
            highlights: highlights.clone(),
            ..Default::default()
        };

        // Relations are siblings of the memory array (spec §4.5 step 3), so
        // they anchor to the first memory this flush successfully writes,
        // same as the Sieve deep channel.
        let mut anchor_memory_id: Option<String> = None;

        for memory in &envelope.memories {
            if !validate_memory(memory) {
                continue;
            }

            let write_req = WriteRequest {
                content: memory.content.clone(),
                category: memory.category,
                importance: memory.importance,
                confidence: memory.source.confidence_multiplier(),
                source_tag: format!("flush:{}", req.session_id),
            };

            let outcome = self.writer.write(&req.agent_id, write_req).await;
            let memory_id = match outcome {
                Ok(WriteOutcome::Inserted { memory }) | Ok(WriteOutcome::Superseded { memory, .. }) => {
                    result.memories_written += 1;
                    Some(memory.id.clone())
                }
                Ok(WriteOutcome::ExactDuplicate { .. }) | Ok(WriteOutcome::Kept { .. }) => {
                    result.memories_deduped += 1;
                    None
                }
                Err(_) => None,
            };

            let _ = self.store.append_extraction_log(
                &req.agent_id,
                ExtractionChannel::Flush.as_str(),
                memory_id.as_deref(),
                memory.category.as_str(),
                memory.source.as_str(),
                memory.importance,
            );

            if anchor_memory_id.is_none() {
                anchor_memory_id = memory_id;
            }
        }

        for relation in &envelope.relations {
            if !validate_relation(relation) {
                continue;
            }
            if self
                .store
                .upsert_relation(
                    &req.agent_id,
                    &relation.subject,
                    relation.predicate,
                    &relation.object,
                    relation.confidence,
                    &format!("flush:{}", req.session_id),
                    anchor_memory_id.as_deref(),
                    relation.expired,
                )
                .is_ok()
            {
                result.relations_written += 1;
            }
        }

        Ok(result)
    }

    async fn write_fallback_summary(
        &self,
        req: &FlushRequest,
        highlights: String,
    ) -> Result<FlushResult> {
        let content = if highlights.trim().is_empty() {
            "Session ended with no extractable memories.".to_string()
        } else {
            highlights.clone()
        };

        let memory = self.store.insert_memory(NewMemory {
            layer: Layer::Working,
            category: Category::Summary,
            content,
            source: format!("flush:{}", req.session_id),
            agent_id: req.agent_id.clone(),
            importance: Category::Summary.base_importance(),
            confidence: 0.5,
            expires_at: None,
            is_pinned: false,
            metadata: serde_json::json!({ "fallback": true }),
        })?;

        let _ = self.store.append_extraction_log(
            &req.agent_id,
            ExtractionChannel::Flush.as_str(),
            Some(&memory.id),
            Category::Summary.as_str(),
            crate::memory::ExtractionSource::SystemDefined.as_str(),
            0.5,
        );

        Ok(FlushResult {
            highlights,
            memories_written: 1,
            used_fallback_summary: true,
            ..Default::default()
        })
    }

    async fn generate_highlights(&self, chat: &dyn ChatProvider, transcript: &str) -> String {
        let prompt = format!(
            "Summarize the key points of this conversation as a short bullet list:\n\n{transcript}"
        );
        chat.complete(ChatRequest::single_user_message(prompt))
            .await
            .unwrap_or_default()
    }

    async fn generate_core_items(&self, chat: &dyn ChatProvider, transcript: &str) -> ParsedExtraction {
        let prompt = format!(
            "Extract durable facts and relations from this conversation worth remembering \
             long-term, as a single strict JSON object: {{\"memories\": [{{\"category\": ..., \
             \"content\": ..., \"source\": ..., \"importance\": 0.0-1.0, \"reasoning\": ...}}], \
             \"relations\": [{{\"subject\": \"1-5 words\", \"predicate\": ..., \"object\": \"1-5 words\", \
             \"confidence\": 0.0-1.0, \"expired\": false}}], \"nothingExtracted\": false}}. \
             If nothing is worth remembering, return \
             {{\"memories\": [], \"relations\": [], \"nothingExtracted\": true}}.\n\n{transcript}"
        );
        let Ok(response) = chat.complete(ChatRequest::single_user_message(prompt)).await else {
            return ParsedExtraction::default();
        };

        crate::sieve::parse_extraction_envelope(&response)
    }
}

/// Join sanitized `role: content` lines longer than [`MIN_LINE_LEN`], bounded
/// to [`MAX_TRANSCRIPT_CHARS`] (spec §4.8 step 1).
fn build_transcript(messages: &[(String, String)]) -> String {
    let mut lines = Vec::new();
    for (role, content) in messages {
        let sanitized = crate::signal::sanitize(content);
        if sanitized.chars().count() > MIN_LINE_LEN {
            lines.push(format!("{role}: {sanitized}"));
        }
    }
    let joined = lines.join("\n");
    joined.chars().take(MAX_TRANSCRIPT_CHARS).collect()
}
