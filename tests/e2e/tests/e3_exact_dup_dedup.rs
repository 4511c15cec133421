//! E3 — exact-dup dedup (spec.md §8): re-stating an existing preference
//! reinforces the existing row instead of inserting a new one. Asserts the
//! `max(old, new)` / `+0.05` bump formula directly against the real
//! fast-channel preference importance (0.7), not the spec's illustrative
//! 0.85, since 0.85 isn't a value the signal table produces (see
//! DESIGN.md).

use std::sync::Arc;

use cortex_core::{
    Category, Config, IngestRequest, Layer, MemoryWriter, NewMemory, Sieve, Store, SystemClock,
    VectorIndex, VectorIndexConfig,
};
use cortex_e2e_tests::mocks::KeyedEmbedding;

const TEST_DIMENSIONS: usize = 4;
const EXISTING_CONTENT: &str = "prefers dark mode";
const RESTATED_CONTENT: &str = "I prefer dark mode";

#[tokio::test]
async fn restating_a_preference_reinforces_instead_of_inserting() {
    let temp_dir = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(Store::open(Some(temp_dir.path().join("cortex.db"))).expect("open store"));
    let agent_id = "agent-e3";
    store.ensure_agent(agent_id).expect("ensure agent");

    let existing = store
        .insert_memory(NewMemory {
            layer: Layer::Core,
            category: Category::Preference,
            content: EXISTING_CONTENT.to_string(),
            source: "seed".to_string(),
            agent_id: agent_id.to_string(),
            importance: 0.5,
            confidence: 0.6,
            expires_at: None,
            is_pinned: false,
            metadata: serde_json::json!({}),
        })
        .expect("seed existing preference");

    let shared_vector = vec![1.0, 0.0, 0.0, 0.0];
    let vector_index = Arc::new(VectorIndex::new(VectorIndexConfig {
        dimensions: TEST_DIMENSIONS,
        ..VectorIndexConfig::default()
    }));
    vector_index
        .upsert(&existing.id, &shared_vector, agent_id)
        .expect("seed vector");

    let embeddings = Arc::new(
        KeyedEmbedding::new(TEST_DIMENSIONS).with(RESTATED_CONTENT, shared_vector),
    );
    let config = Arc::new(Config::default());
    let clock: Arc<dyn cortex_core::Clock> = Arc::new(SystemClock::default());

    let writer = Arc::new(MemoryWriter::new(
        store.clone(),
        vector_index,
        embeddings,
        None,
        config.clone(),
        clock,
    ));
    let sieve = Sieve::new(store.clone(), writer, None, config);

    let result = sieve
        .ingest(IngestRequest {
            agent_id: agent_id.to_string(),
            user_message: RESTATED_CONTENT.to_string(),
            assistant_message: "ok".to_string(),
            recent_context: Vec::new(),
        })
        .await;

    assert_eq!(
        result.fast_channel_writes, 0,
        "an exact duplicate should not count as a write: {result:?}"
    );

    let active = store
        .list_active_memories(agent_id, None, 100)
        .expect("list memories");
    assert_eq!(active.len(), 1, "no new memory row should have been inserted");

    let updated = store
        .get_memory(&existing.id)
        .expect("get memory")
        .expect("existing memory still present");
    assert_eq!(updated.importance, 0.7, "importance should become max(old, new)");
    assert!(
        (updated.confidence - 0.65).abs() < 1e-9,
        "confidence should increase by 0.05: got {}",
        updated.confidence
    );
}
