//! Chat/LLM completion capability. Backs SmartUpdate (§4.5.1), Sieve's deep
//! channel (§4.5 step 3), Flush's highlights/extraction calls (§4.8), the
//! Gate query expander (§4.7 step 3), and lifecycle profile synthesis
//! (§4.10 phase 7) — all of which only ever see this trait, never a
//! concrete vendor client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::ProviderResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    /// Soft cap on response length; providers may clamp further.
    pub max_tokens: Option<u32>,
    /// Lower values favor deterministic output (SmartUpdate, structured
    /// extraction); callers doing freeform highlight generation relax this.
    pub temperature: f32,
}

impl ChatRequest {
    pub fn single_user_message(content: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage {
                role: ChatRole::User,
                content: content.into(),
            }],
            max_tokens: None,
            temperature: 0.2,
        }
    }
}

#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn complete(&self, request: ChatRequest) -> ProviderResult<String>;

    /// Provider identity for logging/debug fields.
    fn name(&self) -> &str;
}
