//! A fixture `EmbeddingProvider` that returns a hand-picked vector for an
//! exact content string and an error for anything else. The literal
//! end-to-end scenarios (spec.md §8) need specific cosine distances between
//! specific strings to land on one side or the other of a dedup/SmartUpdate
//! threshold — a real embedding model can't be steered that precisely, and a
//! bag-of-words heuristic can't be hand-verified without running the
//! distance math through the real pipeline. An unmapped string returning
//! `Err` mirrors what `MemoryWriter::write` already does on provider
//! failure: skip dedup, fall through to a plain insert.

use std::collections::HashMap;

use async_trait::async_trait;
use cortex_core::providers::{EmbeddingProvider, ProviderResult};
use cortex_core::ProviderError;

pub struct KeyedEmbedding {
    dimensions: usize,
    vectors: HashMap<String, Vec<f32>>,
}

impl KeyedEmbedding {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            vectors: HashMap::new(),
        }
    }

    pub fn with(mut self, text: &str, vector: Vec<f32>) -> Self {
        assert_eq!(vector.len(), self.dimensions, "fixture vector for {text:?} has the wrong dimensionality");
        self.vectors.insert(text.to_string(), vector);
        self
    }
}

#[async_trait]
impl EmbeddingProvider for KeyedEmbedding {
    async fn embed(&self, text: &str) -> ProviderResult<Vec<f32>> {
        self.vectors
            .get(text)
            .cloned()
            .ok_or_else(|| ProviderError::Unavailable(format!("no fixture vector mapped for {text:?}")))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "keyed-fixture"
    }
}
