//! E4 — SmartUpdate conflict (spec.md §8): a deep-channel extraction that
//! contradicts an existing memory inserts a new core memory superseding it,
//! tagged with the SmartUpdate disposition the LLM call returned.

use std::sync::Arc;

use cortex_core::providers::ChatProvider;
use cortex_core::{
    Category, Config, IngestRequest, Layer, MemoryWriter, NewMemory, Sieve, Store, SystemClock,
    VectorIndex, VectorIndexConfig,
};
use cortex_e2e_tests::mocks::{KeyedEmbedding, StubChat};

const TEST_DIMENSIONS: usize = 4;
const OLD_CONTENT: &str = "uses Nginx as reverse proxy";
const NEW_CONTENT: &str = "决定将反向代理从 Nginx 切换为 Caddy";

const DEEP_CHANNEL_RESPONSE: &str = r#"{"memories": [{"category": "decision", "content": "决定将反向代理从 Nginx 切换为 Caddy", "source": "user_stated", "importance": 0.8, "reasoning": "user announced a switch"}], "relations": [], "nothingExtracted": false}"#;

#[tokio::test]
async fn conflicting_decision_supersedes_the_old_memory() {
    let temp_dir = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(Store::open(Some(temp_dir.path().join("cortex.db"))).expect("open store"));
    let agent_id = "agent-e4";
    store.ensure_agent(agent_id).expect("ensure agent");

    let old = store
        .insert_memory(NewMemory {
            layer: Layer::Core,
            category: Category::Fact,
            content: OLD_CONTENT.to_string(),
            source: "seed".to_string(),
            agent_id: agent_id.to_string(),
            importance: 0.6,
            confidence: 0.8,
            expires_at: None,
            is_pinned: false,
            metadata: serde_json::json!({}),
        })
        .expect("seed existing memory");

    // Chosen so cosine distance lands in (exact_dup_threshold, similarity_threshold)
    // i.e. (0.08, 0.35) — near-duplicate, not exact-dup, not a plain insert.
    let old_vector = vec![1.0, 0.0, 0.0, 0.0];
    let new_vector = vec![0.9, 0.435_889_9, 0.0, 0.0];

    let vector_index = Arc::new(VectorIndex::new(VectorIndexConfig {
        dimensions: TEST_DIMENSIONS,
        ..VectorIndexConfig::default()
    }));
    vector_index
        .upsert(&old.id, &old_vector, agent_id)
        .expect("seed vector");

    let embeddings = Arc::new(KeyedEmbedding::new(TEST_DIMENSIONS).with(NEW_CONTENT, new_vector));
    let config = Arc::new(Config::default());
    let clock: Arc<dyn cortex_core::Clock> = Arc::new(SystemClock::default());

    // Two independent chat providers: the writer's SmartUpdate decision call
    // and the Sieve deep channel's extraction call have unrelated prompts,
    // so each gets its own canned response.
    let writer_chat: Arc<dyn ChatProvider> = Arc::new(StubChat::new("CONFLICT"));
    let sieve_chat: Arc<dyn ChatProvider> = Arc::new(StubChat::new(DEEP_CHANNEL_RESPONSE));

    let writer = Arc::new(MemoryWriter::new(
        store.clone(),
        vector_index,
        embeddings,
        Some(writer_chat),
        config.clone(),
        clock,
    ));
    let sieve = Sieve::new(store.clone(), writer, Some(sieve_chat), config);

    let result = sieve
        .ingest(IngestRequest {
            agent_id: agent_id.to_string(),
            user_message: "以后反代全部换成 Caddy".to_string(),
            assistant_message: "好的".to_string(),
            recent_context: Vec::new(),
        })
        .await;

    assert!(
        result.deep_channel_writes >= 1,
        "expected the deep channel to write the new decision: {result:?}"
    );

    let new_memory = store
        .list_active_memories(agent_id, Some(&[Layer::Core]), 100)
        .expect("list core memories")
        .into_iter()
        .find(|m| m.content == NEW_CONTENT)
        .expect("new decision memory should exist");

    assert_eq!(new_memory.category, Category::Decision);
    let smart_update_type = new_memory
        .metadata
        .get("smart_update_type")
        .and_then(|v| v.as_str())
        .unwrap_or_default();
    assert!(
        smart_update_type == "replace" || smart_update_type == "conflict",
        "expected a replace/conflict disposition, got {smart_update_type:?}"
    );

    let old_after = store
        .get_memory(&old.id)
        .expect("get memory")
        .expect("old memory still exists");
    assert_eq!(old_after.superseded_by, Some(new_memory.id));
}
