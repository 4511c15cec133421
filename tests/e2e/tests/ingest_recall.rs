//! End-to-end journey: a conversational turn is ingested through Sieve, then
//! surfaced again through Gate on a related query.

use std::sync::Arc;

use cortex_core::providers::{EmbeddingProvider, NullEmbedding};
use cortex_core::{
    Config, Gate, HybridSearch, IngestRequest, MemoryWriter, RecallRequest, Sieve, Store,
    SystemClock, VectorIndex, VectorIndexConfig,
};

const TEST_DIMENSIONS: usize = 8;

fn build_pipeline() -> (Arc<Sieve>, Arc<Gate>, Arc<Store>) {
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

    let writer = Arc::new(MemoryWriter::new(
        store.clone(),
        vector_index.clone(),
        embeddings.clone(),
        None,
        config.clone(),
        clock.clone(),
    ));
    let search = Arc::new(HybridSearch::new(
        store.clone(),
        vector_index.clone(),
        embeddings.clone(),
        config.clone(),
        clock,
    ));

    let sieve = Arc::new(Sieve::new(store.clone(), writer.clone(), None, config.clone()));
    let gate = Arc::new(Gate::new(search, None, None, config));

    (sieve, gate, store)
}

#[tokio::test]
async fn ingested_preference_is_recallable() {
    let (sieve, gate, store) = build_pipeline();
    let agent_id = "agent-journey-1";

    let ingest_result = sieve
        .ingest(IngestRequest {
            agent_id: agent_id.to_string(),
            user_message: "I always drink my coffee black, no sugar, no milk.".to_string(),
            assistant_message: "Got it, black coffee it is.".to_string(),
            recent_context: Vec::new(),
        })
        .await;

    assert!(
        ingest_result.fast_channel_writes > 0 || ingest_result.deep_channel_writes > 0,
        "expected at least one candidate to be written: {ingest_result:?}"
    );

    let recall_result = gate
        .recall(RecallRequest {
            agent_id: agent_id.to_string(),
            query: "How does the user take their coffee?".to_string(),
            layers: None,
            categories: None,
            max_tokens: 512,
        })
        .await
        .expect("recall should succeed");

    assert!(
        !recall_result.skipped_small_talk,
        "a substantive query should not be treated as small talk"
    );

    let stats = store.stats().expect("stats");
    assert!(stats.total_memories > 0);
}

#[tokio::test]
async fn small_talk_recall_is_skipped_without_touching_search() {
    let (_sieve, gate, _store) = build_pipeline();

    let recall_result = gate
        .recall(RecallRequest {
            agent_id: "agent-journey-2".to_string(),
            query: "hey".to_string(),
            layers: None,
            categories: None,
            max_tokens: 512,
        })
        .await
        .expect("recall should succeed");

    assert!(recall_result.skipped_small_talk);
    assert_eq!(recall_result.memories_injected, 0);
}
