//! E6 — recall fusion + injection (spec.md §8): of several core memories,
//! the one whose embedding is nearest the query ranks first and the
//! rendered context block uses the localized layer label.

use std::sync::Arc;

use cortex_core::{Category, Config, Gate, HybridSearch, Layer, NewMemory, RecallRequest, SearchFilters, Store, SystemClock, VectorIndex, VectorIndexConfig};
use cortex_e2e_tests::mocks::KeyedEmbedding;

const TEST_DIMENSIONS: usize = 4;
const QUERY: &str = "Where does Harry live?";

#[tokio::test]
async fn nearest_core_memory_is_ranked_first_and_injected_with_localized_label() {
    let temp_dir = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(Store::open(Some(temp_dir.path().join("cortex.db"))).expect("open store"));
    let agent_id = "agent-e6";
    store.ensure_agent(agent_id).expect("ensure agent");

    let developer = store
        .insert_memory(NewMemory {
            layer: Layer::Core,
            category: Category::Fact,
            content: "Harry is a developer".to_string(),
            source: "seed".to_string(),
            agent_id: agent_id.to_string(),
            importance: 0.7,
            confidence: 0.9,
            expires_at: None,
            is_pinned: false,
            metadata: serde_json::json!({}),
        })
        .expect("seed developer memory");
    let lives_in_tokyo = store
        .insert_memory(NewMemory {
            layer: Layer::Core,
            category: Category::Fact,
            content: "Harry lives in Tokyo".to_string(),
            source: "seed".to_string(),
            agent_id: agent_id.to_string(),
            importance: 0.7,
            confidence: 0.9,
            expires_at: None,
            is_pinned: false,
            metadata: serde_json::json!({}),
        })
        .expect("seed tokyo memory");
    let random_fact = store
        .insert_memory(NewMemory {
            layer: Layer::Core,
            category: Category::Fact,
            content: "Random unrelated fact".to_string(),
            source: "seed".to_string(),
            agent_id: agent_id.to_string(),
            importance: 0.7,
            confidence: 0.9,
            expires_at: None,
            is_pinned: false,
            metadata: serde_json::json!({}),
        })
        .expect("seed random memory");

    let vector_index = Arc::new(VectorIndex::new(VectorIndexConfig {
        dimensions: TEST_DIMENSIONS,
        ..VectorIndexConfig::default()
    }));
    vector_index
        .upsert(&developer.id, &[1.0, 0.0, 0.0, 0.0], agent_id)
        .expect("seed developer vector");
    vector_index
        .upsert(&lives_in_tokyo.id, &[0.0, 1.0, 0.0, 0.0], agent_id)
        .expect("seed tokyo vector");
    vector_index
        .upsert(&random_fact.id, &[0.0, 0.0, 1.0, 0.0], agent_id)
        .expect("seed random vector");

    let embeddings = Arc::new(KeyedEmbedding::new(TEST_DIMENSIONS).with(QUERY, vec![0.0, 0.9, 0.1, 0.0]));
    let config = Arc::new(Config::default());
    let clock: Arc<dyn cortex_core::Clock> = Arc::new(SystemClock::default());

    let search = Arc::new(HybridSearch::new(store, vector_index, embeddings, config.clone(), clock));

    let filters = SearchFilters {
        agent_id: agent_id.to_string(),
        layers: None,
        categories: None,
    };
    let (hits, _debug) = search
        .search(QUERY, &filters, 10, false)
        .await
        .expect("search should succeed");
    assert!(!hits.is_empty(), "expected at least one search hit");
    assert_eq!(
        hits[0].memory.id, lives_in_tokyo.id,
        "the Tokyo memory should rank first: {:?}",
        hits.iter().map(|h| (&h.memory.id, h.final_score)).collect::<Vec<_>>()
    );
    assert!(hits[0].final_score > 0.0);

    let gate = Gate::new(search, None, None, config);
    let result = gate
        .recall(RecallRequest {
            agent_id: agent_id.to_string(),
            query: QUERY.to_string(),
            layers: None,
            categories: None,
            max_tokens: 500,
        })
        .await
        .expect("recall should succeed");

    assert!(
        result.injected_text.contains("[核心记忆] Harry lives in Tokyo"),
        "expected localized core-layer label in injected text: {:?}",
        result.injected_text
    );
}
