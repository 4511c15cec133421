//! Shared application state (spec §9 "Shared global state"): one instance
//! of each pipeline stage, cloned cheaply into HTTP handlers and the MCP
//! server via `Arc`.

use std::sync::Arc;

use cortex_core::providers::EmbeddingProvider;
use cortex_core::{Config, Flush, Gate, HybridSearch, LifecycleEngine, MemoryWriter, Sieve, Store, VectorIndex};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub writer: Arc<MemoryWriter>,
    pub sieve: Arc<Sieve>,
    pub gate: Arc<Gate>,
    pub flush: Arc<Flush>,
    pub lifecycle: Arc<LifecycleEngine>,
    pub search: Arc<HybridSearch>,
    pub config: Arc<Config>,
    pub vector_index: Arc<VectorIndex>,
    pub embeddings: Arc<dyn EmbeddingProvider>,
}
