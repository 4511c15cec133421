//! E5 — lifecycle promote (spec.md §8): a well-established working memory
//! gets promoted to core during a lifecycle sweep, logged with a reference
//! back to the memory it superseded.

use std::sync::Arc;

use cortex_core::providers::{EmbeddingProvider, NullEmbedding};
use cortex_core::{
    Category, LifecycleEngine, Layer, NewMemory, Config, Store, FixedClock, VectorIndex,
    VectorIndexConfig,
};

const TEST_DIMENSIONS: usize = 8;
const CONTENT: &str = "user's name is Harry";

#[tokio::test]
async fn well_established_working_memory_is_promoted_to_core() {
    let temp_dir = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(Store::open(Some(temp_dir.path().join("cortex.db"))).expect("open store"));
    let agent_id = "agent-e5";
    store.ensure_agent(agent_id).expect("ensure agent");

    let now = chrono::Utc::now();
    let clock = Arc::new(FixedClock::new(now));

    let original = store
        .insert_memory(NewMemory {
            layer: Layer::Working,
            category: Category::Identity,
            content: CONTENT.to_string(),
            source: "seed".to_string(),
            agent_id: agent_id.to_string(),
            importance: 0.9,
            confidence: 0.9,
            expires_at: None,
            is_pinned: false,
            metadata: serde_json::json!({}),
        })
        .expect("seed working memory");

    for _ in 0..8 {
        store
            .bump_access(&original.id, agent_id, "test")
            .expect("bump access");
    }

    clock.advance(chrono::Duration::hours(30));

    let vector_index = Arc::new(VectorIndex::new(VectorIndexConfig {
        dimensions: TEST_DIMENSIONS,
        ..VectorIndexConfig::default()
    }));
    let embeddings: Arc<dyn EmbeddingProvider> = Arc::new(NullEmbedding::new(TEST_DIMENSIONS));
    let config = Arc::new(Config::default());

    let engine = LifecycleEngine::new(store.clone(), vector_index, embeddings, None, config, clock);

    let report = engine.run(false).await.expect("lifecycle run");
    assert_eq!(report.promoted, 1, "expected exactly one promotion: {report:?}");

    let promoted = store
        .list_active_memories(agent_id, Some(&[Layer::Core]), 100)
        .expect("list core memories");
    assert_eq!(promoted.len(), 1);
    let new_memory = &promoted[0];
    assert_eq!(new_memory.content, CONTENT);
    assert!(new_memory.importance >= 0.6);

    let old_after = store
        .get_memory(&original.id)
        .expect("get memory")
        .expect("original memory still exists");
    assert_eq!(old_after.superseded_by, Some(new_memory.id.clone()));

    let log = store
        .list_lifecycle_log(agent_id, 10)
        .expect("list lifecycle log");
    assert!(
        log.iter().any(|entry| {
            entry.action == "promote"
                && entry.memory_id == new_memory.id
                && entry
                    .detail
                    .as_ref()
                    .and_then(|d| d.get("from"))
                    .and_then(|v| v.as_str())
                    == Some(original.id.as_str())
        }),
        "expected a promote log entry referencing both ids: {log:?}"
    );
}
