//! Test database manager: isolated `Store` instances for end-to-end tests,
//! with seeding helpers so journey tests don't hand-roll `NewMemory` boilerplate.

use cortex_core::{Category, Layer, Memory, NewMemory, Store};
use std::path::PathBuf;
use tempfile::TempDir;

/// Manages an isolated `Store` for one test. The backing temp directory is
/// kept alive for the manager's lifetime and cleaned up on drop.
pub struct TestDatabaseManager {
    pub store: Store,
    _temp_dir: Option<TempDir>,
    db_path: PathBuf,
}

impl TestDatabaseManager {
    pub fn new_temp() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let db_path = temp_dir.path().join("test_cortex.db");
        let store = Store::open(Some(db_path.clone())).expect("failed to open test store");

        Self {
            store,
            _temp_dir: Some(temp_dir),
            db_path,
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.db_path
    }

    pub fn is_empty(&self) -> bool {
        self.store.stats().map(|s| s.total_memories == 0).unwrap_or(true)
    }

    pub fn memory_count(&self) -> i64 {
        self.store.stats().map(|s| s.total_memories).unwrap_or(0)
    }

    /// Seed `count` plain core-layer facts for `agent_id`, returning their ids.
    pub fn seed_facts(&mut self, agent_id: &str, count: usize) -> Vec<String> {
        let _ = self.store.ensure_agent(agent_id);
        (0..count)
            .filter_map(|i| {
                self.store
                    .insert_memory(NewMemory {
                        layer: Layer::Core,
                        category: Category::Fact,
                        content: format!("Test fact {i}"),
                        source: "seed".to_string(),
                        agent_id: agent_id.to_string(),
                        importance: 0.5,
                        confidence: 0.8,
                        expires_at: None,
                        is_pinned: false,
                        metadata: serde_json::json!({}),
                    })
                    .ok()
                    .map(|m| m.id)
            })
            .collect()
    }

    /// Seed one memory per layer for `agent_id`, returning them in
    /// working/core/archive order.
    pub fn seed_layers(&mut self, agent_id: &str) -> Vec<Memory> {
        let _ = self.store.ensure_agent(agent_id);
        [Layer::Working, Layer::Core, Layer::Archive]
            .into_iter()
            .filter_map(|layer| {
                self.store
                    .insert_memory(NewMemory {
                        layer,
                        category: Category::Fact,
                        content: format!("A {} memory", layer.as_str()),
                        source: "seed".to_string(),
                        agent_id: agent_id.to_string(),
                        importance: 0.5,
                        confidence: 0.8,
                        expires_at: None,
                        is_pinned: false,
                        metadata: serde_json::json!({}),
                    })
                    .ok()
            })
            .collect()
    }

    pub fn clear(&mut self, agent_id: &str) {
        if let Ok(memories) = self.store.list_active_memories(agent_id, None, i64::MAX) {
            for memory in memories {
                let _ = self.store.delete_memory(&memory.id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_database_starts_empty() {
        let db = TestDatabaseManager::new_temp();
        assert!(db.is_empty());
        assert!(db.path().exists());
    }

    #[test]
    fn seed_facts_inserts_the_requested_count() {
        let mut db = TestDatabaseManager::new_temp();
        let ids = db.seed_facts("agent-1", 10);
        assert_eq!(ids.len(), 10);
        assert_eq!(db.memory_count(), 10);
    }

    #[test]
    fn seed_layers_covers_all_three() {
        let mut db = TestDatabaseManager::new_temp();
        let memories = db.seed_layers("agent-1");
        assert_eq!(memories.len(), 3);
    }

    #[test]
    fn clear_removes_everything_for_the_agent() {
        let mut db = TestDatabaseManager::new_temp();
        db.seed_facts("agent-1", 5);
        assert_eq!(db.memory_count(), 5);

        db.clear("agent-1");
        assert!(db.is_empty());
    }
}
