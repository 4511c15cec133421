//! Sieve (spec §4.5): per-turn ingestion. A fast regex-driven channel runs
//! unconditionally; an optional LLM-backed deep channel runs alongside it,
//! either in parallel or sequentially depending on config. Both funnel every
//! candidate through [`crate::writer::MemoryWriter`] — Sieve never writes to
//! the Store directly.

use std::sync::Arc;

use regex::Regex;
use std::sync::OnceLock;

use crate::config::Config;
use crate::memory::{ExtractionChannel, ExtractionSource, ParsedExtraction, ParsedMemory, ParsedRelation};
use crate::providers::ChatProvider;
use crate::signal::SignalDetector;
use crate::storage::Store;
use crate::writer::{MemoryWriter, WriteOutcome, WriteRequest};

#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub agent_id: String,
    pub user_message: String,
    pub assistant_message: String,
    /// Recent turns preceding this exchange, oldest first, used as deep
    /// channel context (spec §4.5 step 3, bounded by
    /// `deepChannelContextMessages`).
    pub recent_context: Vec<(String, String)>,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct IngestResult {
    pub fast_channel_writes: usize,
    pub deep_channel_writes: usize,
    pub relations_written: usize,
    pub deep_channel_failed: bool,
}

pub struct Sieve {
    store: Arc<Store>,
    writer: Arc<MemoryWriter>,
    chat: Option<Arc<dyn ChatProvider>>,
    config: Arc<Config>,
    signals: SignalDetector,
}

impl Sieve {
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
            signals: SignalDetector,
        }
    }

    pub async fn ingest(&self, req: IngestRequest) -> IngestResult {
        self.store.ensure_agent(&req.agent_id).ok();

        if self.config.parallel_channels && self.chat.is_some() {
            let (fast, deep) = tokio::join!(
                self.run_fast_channel(&req),
                self.run_deep_channel(&req),
            );
            merge(fast, deep)
        } else {
            let fast = self.run_fast_channel(&req).await;
            let deep = self.run_deep_channel(&req).await;
            merge(fast, deep)
        }
    }

    async fn run_fast_channel(&self, req: &IngestRequest) -> IngestResult {
        let mut result = IngestResult::default();
        let signals = self.signals.detect(&req.user_message, &req.assistant_message);

        for signal in signals {
            let write_req = WriteRequest {
                content: signal.content.clone(),
                category: signal.category,
                importance: signal.importance,
                confidence: signal.confidence,
                source_tag: "ingest:fast".to_string(),
            };

            let outcome = self.writer.write(&req.agent_id, write_req).await;
            let memory_id = match &outcome {
                Ok(WriteOutcome::Inserted { memory }) | Ok(WriteOutcome::Superseded { memory, .. }) => {
                    result.fast_channel_writes += 1;
                    Some(memory.id.clone())
                }
                _ => None,
            };

            let _ = self.store.append_extraction_log(
                &req.agent_id,
                ExtractionChannel::Fast.as_str(),
                memory_id.as_deref(),
                signal.category.as_str(),
                ExtractionSource::UserStated.as_str(),
                signal.confidence,
            );
        }

        result
    }

    async fn run_deep_channel(&self, req: &IngestRequest) -> IngestResult {
        let mut result = IngestResult::default();
        let Some(chat) = &self.chat else {
            return result;
        };

        let prompt = build_deep_channel_prompt(req, self.config.deep_channel_context_messages);
        let response = match chat
            .complete(crate::providers::ChatRequest::single_user_message(prompt))
            .await
        {
            Ok(r) => r,
            Err(_) => {
                result.deep_channel_failed = true;
                return result;
            }
        };

        let envelope = parse_extraction_envelope(&response);
        if envelope.nothing_extracted || envelope.is_empty() {
            // The model explicitly found nothing worth remembering, or the
            // response didn't parse into anything usable (spec §4.5 step 5).
            return result;
        }

        // Relations have no memory index to anchor to (spec §4.5 step 3): the
        // first memory this batch successfully writes stands in for
        // `source_memory_id`, falling back to `None` for relation-only batches.
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
                source_tag: "ingest:deep".to_string(),
            };

            let outcome = self.writer.write(&req.agent_id, write_req).await;
            let memory_id = match &outcome {
                Ok(WriteOutcome::Inserted { memory }) | Ok(WriteOutcome::Superseded { memory, .. }) => {
                    result.deep_channel_writes += 1;
                    Some(memory.id.clone())
                }
                _ => None,
            };

            let _ = self.store.append_extraction_log(
                &req.agent_id,
                ExtractionChannel::Deep.as_str(),
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
                    "sieve:deep",
                    anchor_memory_id.as_deref(),
                    relation.expired,
                )
                .is_ok()
            {
                result.relations_written += 1;
            }
        }

        result
    }
}

fn merge(fast: IngestResult, deep: IngestResult) -> IngestResult {
    IngestResult {
        fast_channel_writes: fast.fast_channel_writes,
        deep_channel_writes: deep.deep_channel_writes,
        relations_written: fast.relations_written + deep.relations_written,
        deep_channel_failed: deep.deep_channel_failed,
    }
}

fn build_deep_channel_prompt(req: &IngestRequest, context_messages: usize) -> String {
    let mut context = String::new();
    for (user, assistant) in req.recent_context.iter().rev().take(context_messages).rev() {
        context.push_str(&format!("User: {user}\nAssistant: {assistant}\n"));
    }
    format!(
        "Recent context:\n{context}\n\
         Current exchange:\nUser: {}\nAssistant: {}\n\n\
         Extract durable facts and relations worth remembering as a single JSON object: \
         {{\"memories\": [{{\"category\": ..., \"content\": ..., \"source\": ..., \
         \"importance\": 0.0-1.0, \"reasoning\": ...}}], \
         \"relations\": [{{\"subject\": \"1-5 words\", \"predicate\": ..., \"object\": \"1-5 words\", \
         \"confidence\": 0.0-1.0, \"expired\": false}}], \
         \"nothingExtracted\": false}}. \
         If nothing in this exchange is worth remembering, return \
         {{\"memories\": [], \"relations\": [], \"nothingExtracted\": true}}.",
        req.user_message, req.assistant_message,
    )
}

/// Tolerant JSON extraction: fenced code block, then the first balanced
/// object containing `"memories"`, else an empty envelope (spec §4.5 step 4
/// "deep channel parsing is tolerant of malformed LLM output").
pub(crate) fn parse_extraction_envelope(response: &str) -> ParsedExtraction {
    let candidates = [
        extract_fenced_block(response),
        extract_balanced_object(response),
    ];

    for candidate in candidates.into_iter().flatten() {
        if let Ok(mut envelope) = serde_json::from_str::<ParsedExtraction>(&candidate) {
            envelope.memories = filter_extractable(envelope.memories);
            return envelope;
        }
    }

    ParsedExtraction::default()
}

fn filter_extractable(memories: Vec<ParsedMemory>) -> Vec<ParsedMemory> {
    memories
        .into_iter()
        .filter(|m| m.category.is_llm_extractable())
        .collect()
}

fn extract_fenced_block(text: &str) -> Option<String> {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    let re = FENCE.get_or_init(|| {
        Regex::new(r"(?s)```(?:json)?\s*(\{.*?\}|\[.*?\])\s*```").expect("static regex")
    });
    re.captures(text).map(|c| c[1].to_string())
}

fn extract_balanced_object(text: &str) -> Option<String> {
    let start = text.find("{\"memories\"").or_else(|| text.find("{ \"memories\""))?;
    let bytes = text.as_bytes();
    let mut depth = 0i32;
    for (offset, &b) in bytes[start..].iter().enumerate() {
        match b {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(text[start..start + offset + 1].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

const MAX_SENSITIVE_CONTENT_LEN: usize = 4000;

/// Reject memory extractions that fail basic sanity or leak sensitive
/// strings (spec §4.5 step 4 validation rules).
pub(crate) fn validate_memory(memory: &ParsedMemory) -> bool {
    if memory.content.trim().chars().count() < 3 {
        return false;
    }
    if memory.content.len() > MAX_SENSITIVE_CONTENT_LEN {
        return false;
    }
    if !(0.0..=1.0).contains(&memory.importance) {
        return false;
    }
    !contains_sensitive_data(&memory.content)
}

/// Reject relation extractions outside the bounds spec §4.5 step 4 sets for
/// entity length and confidence, or that leak sensitive strings.
pub(crate) fn validate_relation(relation: &ParsedRelation) -> bool {
    let subject_len = relation.subject.trim().chars().count();
    let object_len = relation.object.trim().chars().count();
    if !(1..=100).contains(&subject_len) || !(1..=100).contains(&object_len) {
        return false;
    }
    if relation.confidence < 0.5 || relation.confidence > 1.0 {
        return false;
    }
    !contains_sensitive_data(&relation.subject) && !contains_sensitive_data(&relation.object)
}

fn contains_sensitive_data(text: &str) -> bool {
    static SENSITIVE: OnceLock<Vec<Regex>> = OnceLock::new();
    let patterns = SENSITIVE.get_or_init(|| {
        [
            r"(?i)\bsk-[a-z0-9]{20,}\b",
            r"(?i)\bAKIA[0-9A-Z]{16}\b",
            r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b",
            r"\b(?:\d{1,3}\.){3}\d{1,3}\b",
            r"-----BEGIN [A-Z ]*PRIVATE KEY-----",
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
    });
    patterns.iter().any(|re| re.is_match(text))
}
