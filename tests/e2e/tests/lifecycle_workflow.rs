//! End-to-end journey: background lifecycle maintenance expires stale working
//! memories and promotes well-established ones, advancing time with
//! `FixedClock` rather than waiting on the wall clock.

use std::sync::Arc;

use chrono::{Duration, Utc};
use cortex_core::providers::{EmbeddingProvider, NullEmbedding};
use cortex_core::{
    Category, FixedClock, Layer, LifecycleEngine, NewMemory, Store, VectorIndex, VectorIndexConfig,
};

const TEST_DIMENSIONS: usize = 8;
const AGENT_ID: &str = "agent-lifecycle-1";

fn build_store() -> (Arc<Store>, tempfile::TempDir) {
    let temp_dir = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(Store::open(Some(temp_dir.path().join("cortex.db"))).expect("open store"));
    (store, temp_dir)
}

#[tokio::test]
async fn stale_working_memory_expires_and_well_established_one_is_promoted() {
    let (store, _temp_dir) = build_store();
    store.ensure_agent(AGENT_ID).expect("ensure agent");

    let vector_index = Arc::new(VectorIndex::new(VectorIndexConfig {
        dimensions: TEST_DIMENSIONS,
        ..VectorIndexConfig::default()
    }));
    vector_index
        .initialize(vector_index.dimensions())
        .expect("init vector index");
    let embeddings: Arc<dyn EmbeddingProvider> = Arc::new(NullEmbedding::new(TEST_DIMENSIONS));

    let expiring = store
        .insert_memory(NewMemory {
            layer: Layer::Working,
            category: Category::Context,
            content: "The user mentioned it's raining today.".to_string(),
            source: "sieve:fast".to_string(),
            agent_id: AGENT_ID.to_string(),
            importance: 0.2,
            confidence: 0.5,
            expires_at: Some(Utc::now() + Duration::seconds(2)),
            is_pinned: false,
            metadata: serde_json::json!({}),
        })
        .expect("insert expiring memory");

    let promotable = store
        .insert_memory(NewMemory {
            layer: Layer::Working,
            category: Category::Fact,
            content: "The user's name is Priya.".to_string(),
            source: "sieve:fast".to_string(),
            agent_id: AGENT_ID.to_string(),
            importance: 0.9,
            confidence: 0.95,
            expires_at: None,
            is_pinned: false,
            metadata: serde_json::json!({}),
        })
        .expect("insert promotable memory");

    for _ in 0..10 {
        store
            .bump_access(&promotable.id, AGENT_ID, "gate")
            .expect("bump access");
    }

    let config = Arc::new(cortex_core::Config::default());
    let future_clock: Arc<dyn cortex_core::Clock> =
        Arc::new(FixedClock::new(Utc::now() + Duration::hours(25)));

    let lifecycle = LifecycleEngine::new(
        store.clone(),
        vector_index,
        embeddings,
        None,
        config,
        future_clock,
    );

    let report = lifecycle.run(false).await.expect("lifecycle run");

    assert_eq!(report.expired, 1, "the stale working memory should expire: {report:?}");
    assert_eq!(report.promoted, 1, "the well-established memory should promote: {report:?}");
    assert!(!report.already_running);

    assert!(store.get_memory(&expiring.id).unwrap().is_none(), "expired memory should be gone");

    let remaining = store.get_memory(&promotable.id).unwrap().expect("original still present");
    assert!(remaining.superseded_by.is_some(), "original should be superseded by its promoted copy");

    let core_memories = store
        .list_active_memories(AGENT_ID, Some(&[Layer::Core]), 100)
        .expect("list core memories");
    assert!(
        core_memories.iter().any(|m| m.content == "The user's name is Priya."),
        "promoted copy should land in the core layer"
    );

    let log = store.list_lifecycle_log(AGENT_ID, 100).expect("lifecycle log");
    assert!(log.iter().any(|entry| entry.action == "expire"));
    assert!(log.iter().any(|entry| entry.action == "promote"));
}

#[tokio::test]
async fn dry_run_reports_without_mutating_anything() {
    let (store, _temp_dir) = build_store();
    store.ensure_agent(AGENT_ID).expect("ensure agent");

    let vector_index = Arc::new(VectorIndex::new(VectorIndexConfig {
        dimensions: TEST_DIMENSIONS,
        ..VectorIndexConfig::default()
    }));
    vector_index
        .initialize(vector_index.dimensions())
        .expect("init vector index");
    let embeddings: Arc<dyn EmbeddingProvider> = Arc::new(NullEmbedding::new(TEST_DIMENSIONS));

    store
        .insert_memory(NewMemory {
            layer: Layer::Working,
            category: Category::Context,
            content: "Transient note".to_string(),
            source: "sieve:fast".to_string(),
            agent_id: AGENT_ID.to_string(),
            importance: 0.2,
            confidence: 0.5,
            expires_at: Some(Utc::now() + Duration::seconds(2)),
            is_pinned: false,
            metadata: serde_json::json!({}),
        })
        .expect("insert memory");

    let config = Arc::new(cortex_core::Config::default());
    let future_clock: Arc<dyn cortex_core::Clock> =
        Arc::new(FixedClock::new(Utc::now() + Duration::hours(25)));

    let lifecycle = LifecycleEngine::new(store.clone(), vector_index, embeddings, None, config, future_clock);

    let report = lifecycle.run(true).await.expect("dry run");
    assert_eq!(report.expired, 1);

    let still_there = store
        .list_active_memories(AGENT_ID, Some(&[Layer::Working]), 100)
        .expect("list working memories");
    assert_eq!(still_there.len(), 1, "dry run must not delete anything");
}
