//! E2 — small-talk gate (spec.md §8): `recall({query:"hi"})` short-circuits
//! to an empty context without touching search.

use std::sync::Arc;

use cortex_core::providers::{EmbeddingProvider, NullEmbedding};
use cortex_core::{Config, Gate, HybridSearch, RecallRequest, Store, SystemClock, VectorIndex, VectorIndexConfig};

const TEST_DIMENSIONS: usize = 8;

#[tokio::test]
async fn hi_is_treated_as_small_talk_with_empty_context() {
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

    let search = Arc::new(HybridSearch::new(store, vector_index, embeddings, config.clone(), clock));
    let gate = Gate::new(search, None, None, config);

    let result = gate
        .recall(RecallRequest {
            agent_id: "agent-e2".to_string(),
            query: "hi".to_string(),
            layers: None,
            categories: None,
            max_tokens: 500,
        })
        .await
        .expect("recall should succeed");

    assert_eq!(result.injected_text, "");
    assert_eq!(result.memories_injected, 0);
    assert!(result.skipped_small_talk);
}
