//! End-to-end journey: exporting an agent's active memories and re-importing
//! them into a fresh store round-trips content, layer, and category, the way
//! the REST `/export` and `/import` endpoints do over HTTP.

use cortex_core::{Category, Layer, NewMemory, Store};

const AGENT_ID: &str = "agent-export-1";

fn fresh_store() -> (Store, tempfile::TempDir) {
    let temp_dir = tempfile::tempdir().expect("tempdir");
    let store = Store::open(Some(temp_dir.path().join("cortex.db"))).expect("open store");
    (store, temp_dir)
}

#[test]
fn exported_memories_round_trip_into_a_fresh_store() {
    let (source, _source_dir) = fresh_store();
    source.ensure_agent(AGENT_ID).expect("ensure agent");

    let seeded = [
        (Layer::Core, Category::Fact, "The user's timezone is IST."),
        (Layer::Core, Category::Preference, "The user prefers concise answers."),
        (Layer::Archive, Category::Decision, "Decided to migrate to the new billing plan."),
    ];

    for (layer, category, content) in seeded {
        source
            .insert_memory(NewMemory {
                layer,
                category,
                content: content.to_string(),
                source: "fixture".to_string(),
                agent_id: AGENT_ID.to_string(),
                importance: 0.6,
                confidence: 0.8,
                expires_at: None,
                is_pinned: false,
                metadata: serde_json::json!({}),
            })
            .expect("insert seed memory");
    }

    let exported = source
        .list_active_memories(AGENT_ID, None, i64::MAX)
        .expect("export active memories");
    assert_eq!(exported.len(), seeded.len());

    let (destination, _dest_dir) = fresh_store();
    destination.ensure_agent(AGENT_ID).expect("ensure agent");

    let mut imported = 0usize;
    let mut skipped = 0usize;
    for memory in &exported {
        let (Some(layer), Some(category)) = (
            Layer::parse(memory.layer.as_str()),
            Category::parse(memory.category.as_str()),
        ) else {
            skipped += 1;
            continue;
        };

        let outcome = destination.insert_memory(NewMemory {
            layer,
            category,
            content: memory.content.clone(),
            source: "import".to_string(),
            agent_id: AGENT_ID.to_string(),
            importance: memory.importance,
            confidence: memory.confidence,
            expires_at: None,
            is_pinned: memory.is_pinned,
            metadata: memory.metadata.clone(),
        });

        match outcome {
            Ok(_) => imported += 1,
            Err(_) => skipped += 1,
        }
    }

    assert_eq!(imported, seeded.len());
    assert_eq!(skipped, 0);

    let reimported = destination
        .list_active_memories(AGENT_ID, None, i64::MAX)
        .expect("list reimported memories");
    assert_eq!(reimported.len(), seeded.len());

    for (_, _, content) in seeded {
        assert!(
            reimported.iter().any(|m| m.content == content),
            "expected reimported memory with content {content:?}"
        );
    }
}

#[test]
fn export_excludes_superseded_memories() {
    let (store, _dir) = fresh_store();
    store.ensure_agent(AGENT_ID).expect("ensure agent");

    let original = store
        .insert_memory(NewMemory {
            layer: Layer::Core,
            category: Category::Fact,
            content: "Old fact".to_string(),
            source: "fixture".to_string(),
            agent_id: AGENT_ID.to_string(),
            importance: 0.5,
            confidence: 0.8,
            expires_at: None,
            is_pinned: false,
            metadata: serde_json::json!({}),
        })
        .expect("insert original");

    let replacement = store
        .insert_memory(NewMemory {
            layer: Layer::Core,
            category: Category::Fact,
            content: "Updated fact".to_string(),
            source: "fixture".to_string(),
            agent_id: AGENT_ID.to_string(),
            importance: 0.6,
            confidence: 0.9,
            expires_at: None,
            is_pinned: false,
            metadata: serde_json::json!({}),
        })
        .expect("insert replacement");

    store
        .update_memory(
            &original.id,
            cortex_core::MemoryPatch {
                superseded_by: Some(Some(replacement.id.clone())),
                ..Default::default()
            },
        )
        .expect("mark superseded");

    let exported = store
        .list_active_memories(AGENT_ID, None, i64::MAX)
        .expect("export active memories");

    assert_eq!(exported.len(), 1);
    assert_eq!(exported[0].id, replacement.id);
}
