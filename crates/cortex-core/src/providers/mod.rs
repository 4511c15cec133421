//! Provider adapters — capability traits only (spec §9 "Polymorphic
//! providers": "Provider adapters ... are specified only by their
//! interfaces, not implementations"). Concrete local implementations
//! (fastembed-backed embeddings, the cross-encoder reranker) live in
//! `embeddings` and `search::reranker` and implement these traits; no
//! concrete LLM vendor client is written here, matching scope.

mod cascade;
mod chat;
mod embedding;
mod null;
mod reranker;

pub use cascade::{CascadeChat, CascadeEmbedding, CascadeReranker};
pub use chat::{ChatMessage, ChatProvider, ChatRequest, ChatRole};
pub use embedding::{CachedEmbeddingProvider, EmbeddingProvider};
pub use null::{NullChat, NullEmbedding, NullReranker};
pub use reranker::RerankerProvider;

pub type ProviderResult<T> = std::result::Result<T, crate::error::ProviderError>;
