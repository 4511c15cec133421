pub mod fixtures;
pub mod keyed_embedding;
pub mod stub_chat;

pub use fixtures::{TestDataFactory, TestScenario};
pub use keyed_embedding::KeyedEmbedding;
pub use stub_chat::StubChat;
