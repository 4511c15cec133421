//! # Cortex Core
//!
//! Long-term memory engine for conversational AI agents.
//!
//! Cortex ingests dialogue exchanges, distills them into durable memories
//! stratified across three layers (working / core / archive), and recalls
//! the most relevant memories on demand, formatted for injection into a
//! prompt. A lightweight (subject, predicate, object) relation graph is
//! maintained as a side artifact of extraction.
//!
//! ## Pipeline
//!
//! - [`sieve`] — per-turn ingestion: a fast regex-driven channel and an
//!   optional LLM-driven deep channel, both funneling into [`writer`].
//! - [`gate`] — recall: sanitize, optionally expand the query, run
//!   [`search`]'s hybrid search across variants, optionally rerank, and
//!   format the result for prompt injection.
//! - [`flush`] — session-boundary distillation into a small number of
//!   durable memories plus a summary fallback.
//! - [`lifecycle`] — background maintenance: expiry, promotion, dedup,
//!   archival, compression, decay scoring, and profile synthesis.
//!
//! ## Feature flags
//!
//! - `embeddings` (default): local embedding generation via fastembed.
//! - `vector-search` (default): HNSW vector search via usearch.
//! - `full`: both of the above.

#![warn(rustdoc::missing_crate_level_docs)]

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod memory;
pub mod providers;
pub mod storage;

#[cfg(feature = "embeddings")]
pub mod embeddings;

#[cfg(feature = "vector-search")]
pub mod vector;

pub mod flush;
pub mod gate;
pub mod lifecycle;
pub mod search;
pub mod signal;
pub mod sieve;
pub mod writer;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

pub use cache::EmbeddingCache;
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{Config, SharedConfig};
pub use error::{CortexError, ProviderError, Result, StorageError};
pub use memory::{
    AccessLogEntry, Agent, Category, Evidence, Extraction, ExtractionChannel,
    ExtractionLogEntry, ExtractionSource, LifecycleLogEntry, Layer, Memory, MemoryPatch,
    NewMemory, ParsedExtraction, Predicate, Relation,
};
pub use storage::Store;

pub use flush::{Flush, FlushRequest, FlushResult};
pub use gate::{Gate, RecallRequest, RecallResult};
pub use lifecycle::{LifecycleEngine, LifecycleReport};
pub use search::{HybridSearch, SearchFilters, SearchResult};
pub use signal::{Signal, SignalDetector};
pub use sieve::{IngestRequest, IngestResult, Sieve};
pub use writer::{MemoryWriter, SmartUpdateType, WriteOutcome, WriteRequest};

#[cfg(feature = "vector-search")]
pub use vector::{VectorHit, VectorIndex, VectorIndexConfig};

#[cfg(feature = "embeddings")]
pub use embeddings::LocalEmbeddingProvider;

// ============================================================================
// VERSION INFO
// ============================================================================

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// PRELUDE
// ============================================================================

pub mod prelude {
    pub use crate::{
        Category, Clock, Config, CortexError, Flush, Gate, HybridSearch, Layer, LifecycleEngine,
        Memory, MemoryWriter, Result, Sieve, SignalDetector, Store,
    };

    #[cfg(feature = "embeddings")]
    pub use crate::LocalEmbeddingProvider;

    #[cfg(feature = "vector-search")]
    pub use crate::VectorIndex;
}
