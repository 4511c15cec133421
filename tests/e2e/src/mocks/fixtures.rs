//! Test data factory: realistic memory/relation fixtures for journey tests.

use chrono::{Duration, Utc};
use cortex_core::{Category, Layer, Memory, NewMemory, Predicate, Relation, Store};

pub struct TestDataFactory;

#[derive(Debug)]
pub struct TestScenario {
    pub memory_ids: Vec<String>,
    pub description: String,
    pub metadata: std::collections::HashMap<String, String>,
}

impl TestDataFactory {
    pub fn create_memory(store: &Store, agent_id: &str, content: &str) -> Option<Memory> {
        let _ = store.ensure_agent(agent_id);
        store
            .insert_memory(NewMemory {
                layer: Layer::Core,
                category: Category::Fact,
                content: content.to_string(),
                source: "fixture".to_string(),
                agent_id: agent_id.to_string(),
                importance: 0.5,
                confidence: 0.8,
                expires_at: None,
                is_pinned: false,
                metadata: serde_json::json!({}),
            })
            .ok()
    }

    pub fn create_memory_full(
        store: &Store,
        agent_id: &str,
        content: &str,
        layer: Layer,
        category: Category,
        importance: f64,
        confidence: f64,
    ) -> Option<Memory> {
        let _ = store.ensure_agent(agent_id);
        store
            .insert_memory(NewMemory {
                layer,
                category,
                content: content.to_string(),
                source: "fixture".to_string(),
                agent_id: agent_id.to_string(),
                importance,
                confidence,
                expires_at: None,
                is_pinned: false,
                metadata: serde_json::json!({}),
            })
            .ok()
    }

    pub fn create_expiring_memory(
        store: &Store,
        agent_id: &str,
        content: &str,
        ttl: Duration,
    ) -> Option<Memory> {
        let _ = store.ensure_agent(agent_id);
        store
            .insert_memory(NewMemory {
                layer: Layer::Working,
                category: Category::Context,
                content: content.to_string(),
                source: "fixture".to_string(),
                agent_id: agent_id.to_string(),
                importance: 0.3,
                confidence: 0.5,
                expires_at: Some(Utc::now() + ttl),
                is_pinned: false,
                metadata: serde_json::json!({}),
            })
            .ok()
    }

    pub fn create_batch(store: &Store, agent_id: &str, count: usize) -> Vec<String> {
        let categories = [
            Category::Fact,
            Category::Preference,
            Category::Decision,
            Category::Entity,
            Category::Goal,
        ];

        (0..count)
            .filter_map(|i| {
                Self::create_memory_full(
                    store,
                    agent_id,
                    &format!("Fixture memory {i}"),
                    Layer::Core,
                    categories[i % categories.len()],
                    0.5,
                    0.8,
                )
                .map(|m| m.id)
            })
            .collect()
    }

    /// A scenario exercising lifecycle promotion: a working-layer memory
    /// aged and accessed enough to clear the promotion threshold, one left
    /// fresh, and one aged past expiry.
    pub fn create_promotion_scenario(store: &Store, agent_id: &str) -> TestScenario {
        let mut ids = Vec::new();
        let mut metadata = std::collections::HashMap::new();

        if let Some(m) = Self::create_memory_full(
            store, agent_id, "Frequently confirmed preference", Layer::Working,
            Category::Preference, 0.7, 0.9,
        ) {
            metadata.insert("promotable".to_string(), m.id.clone());
            ids.push(m.id);
        }

        if let Some(m) = Self::create_memory_full(
            store, agent_id, "Just mentioned in passing", Layer::Working,
            Category::Context, 0.1, 0.3,
        ) {
            metadata.insert("fresh".to_string(), m.id.clone());
            ids.push(m.id);
        }

        if let Some(m) = Self::create_expiring_memory(
            store, agent_id, "Stale working-memory note", Duration::seconds(-1),
        ) {
            metadata.insert("expired".to_string(), m.id.clone());
            ids.push(m.id);
        }

        TestScenario {
            memory_ids: ids,
            description: "Lifecycle promotion scenario with mixed ages".to_string(),
            metadata,
        }
    }

    /// A scenario with near-duplicate core memories for dedup testing.
    pub fn create_dedup_scenario(store: &Store, agent_id: &str) -> TestScenario {
        let mut ids = Vec::new();
        for content in [
            "The user prefers dark mode in all applications",
            "The user prefers dark mode in applications",
            "The user's favorite color is blue",
        ] {
            if let Some(m) = Self::create_memory_full(
                store, agent_id, content, Layer::Core, Category::Preference, 0.6, 0.8,
            ) {
                ids.push(m.id);
            }
        }

        TestScenario {
            memory_ids: ids,
            description: "Near-duplicate core memories for dedup testing".to_string(),
            metadata: std::collections::HashMap::new(),
        }
    }

    pub fn create_relation(
        store: &Store,
        agent_id: &str,
        subject: &str,
        predicate: Predicate,
        object: &str,
        confidence: f64,
        source_memory_id: Option<&str>,
    ) -> Option<Relation> {
        store
            .upsert_relation(
                agent_id, subject, predicate, object, confidence, "fixture", source_memory_id, None,
            )
            .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn test_store() -> Store {
        let dir = tempdir().unwrap();
        Store::open(Some(dir.path().join("test.db"))).unwrap()
    }

    #[test]
    fn create_memory_round_trips_content() {
        let store = test_store();
        let memory = TestDataFactory::create_memory(&store, "agent-1", "hello world").unwrap();
        assert_eq!(memory.content, "hello world");
    }

    #[test]
    fn create_batch_inserts_the_requested_count() {
        let store = test_store();
        let ids = TestDataFactory::create_batch(&store, "agent-1", 10);
        assert_eq!(ids.len(), 10);
        assert_eq!(store.stats().unwrap().total_memories, 10);
    }

    #[test]
    fn promotion_scenario_tags_all_three_cases() {
        let store = test_store();
        let scenario = TestDataFactory::create_promotion_scenario(&store, "agent-1");
        assert!(scenario.metadata.contains_key("promotable"));
        assert!(scenario.metadata.contains_key("fresh"));
        assert!(scenario.metadata.contains_key("expired"));
    }

    #[test]
    fn dedup_scenario_creates_near_duplicates() {
        let store = test_store();
        let scenario = TestDataFactory::create_dedup_scenario(&store, "agent-1");
        assert_eq!(scenario.memory_ids.len(), 3);
    }
}
