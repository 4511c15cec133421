//! A `ChatProvider` that always returns the same canned response,
//! regardless of the prompt. Used to drive Sieve's deep channel, Gate's
//! query expansion, and `MemoryWriter`'s SmartUpdate call with a fixed,
//! literal LLM output for scenario tests.

use async_trait::async_trait;
use cortex_core::providers::{ChatProvider, ChatRequest, ProviderResult};

pub struct StubChat {
    response: String,
}

impl StubChat {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
        }
    }
}

#[async_trait]
impl ChatProvider for StubChat {
    async fn complete(&self, _request: ChatRequest) -> ProviderResult<String> {
        Ok(self.response.clone())
    }

    fn name(&self) -> &str {
        "stub-chat"
    }
}
