//! E1 — identity capture (spec.md §8): ingesting a self-introduction writes
//! an identity memory and a `lives_in` relation in the same turn.

use std::sync::Arc;

use cortex_core::providers::{ChatProvider, EmbeddingProvider, NullEmbedding};
use cortex_core::{
    Category, Config, IngestRequest, MemoryWriter, Predicate, Sieve, Store, SystemClock,
    VectorIndex, VectorIndexConfig,
};
use cortex_e2e_tests::mocks::StubChat;

const TEST_DIMENSIONS: usize = 8;

const DEEP_CHANNEL_RESPONSE: &str = r#"{"memories": [], "relations": [{"subject": "Harry", "predicate": "lives_in", "object": "东京", "confidence": 0.8, "expired": false}], "nothingExtracted": false}"#;

#[tokio::test]
async fn identity_capture_writes_memory_and_relation() {
    let temp_dir = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(Store::open(Some(temp_dir.path().join("cortex.db"))).expect("open store"));

    let vector_index = Arc::new(VectorIndex::new(VectorIndexConfig {
        dimensions: TEST_DIMENSIONS,
        ..VectorIndexConfig::default()
    }));
    vector_index
        .initialize(vector_index.dimensions())
        .expect("init vector index");

    let embeddings: Arc<dyn EmbeddingProvider> = Arc::new(NullEmbedding::new(TEST_DIMENSIONS));
    let config = Arc::new(Config::default());
    let clock: Arc<dyn cortex_core::Clock> = Arc::new(SystemClock::default());
    let chat: Arc<dyn ChatProvider> = Arc::new(StubChat::new(DEEP_CHANNEL_RESPONSE));

    let writer = Arc::new(MemoryWriter::new(
        store.clone(),
        vector_index,
        embeddings,
        Some(chat.clone()),
        config.clone(),
        clock,
    ));
    let sieve = Sieve::new(store.clone(), writer, Some(chat), config);

    let agent_id = "agent-e1";
    let result = sieve
        .ingest(IngestRequest {
            agent_id: agent_id.to_string(),
            user_message: "我叫Harry，住在东京".to_string(),
            assistant_message: "你好 Harry！".to_string(),
            recent_context: Vec::new(),
        })
        .await;

    assert!(
        result.fast_channel_writes >= 1,
        "expected the identity signal to fire on the fast channel: {result:?}"
    );
    assert!(
        result.relations_written >= 1,
        "expected the deep channel's relation to be written: {result:?}"
    );

    let memories = store
        .list_active_memories(agent_id, None, 100)
        .expect("list memories");
    assert!(
        memories
            .iter()
            .any(|m| m.category == Category::Identity && m.content.contains("Harry")),
        "expected an identity memory mentioning Harry: {memories:?}"
    );

    let relations = store.list_relations(agent_id, 10).expect("list relations");
    assert!(
        relations.iter().any(|r| {
            r.predicate == Predicate::LivesIn
                && (r.subject == "Harry" || r.subject == "用户")
                && r.object == "东京"
                && r.confidence >= 0.5
        }),
        "expected a lives_in relation to Tokyo with confidence >= 0.5: {relations:?}"
    );
}
