//! `recall` tool — runs Gate recall and returns prompt-ready injected text.

use serde::Deserialize;
use serde_json::Value;

use cortex_core::{Category, Layer};

use crate::state::AppState;

pub fn schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "agentId": {
                "type": "string",
                "description": "Agent identity to scope recall to"
            },
            "query": {
                "type": "string",
                "description": "What to recall, typically the latest user message"
            },
            "layers": {
                "type": "array",
                "items": { "type": "string", "enum": ["working", "core", "archive"] },
                "description": "Restrict recall to these layers (default: all)"
            },
            "categories": {
                "type": "array",
                "items": { "type": "string" },
                "description": "Restrict recall to these categories (default: all)"
            },
            "maxTokens": {
                "type": "integer",
                "description": "Token budget for the injected text (default: 1000)",
                "default": 1000,
                "minimum": 1
            }
        },
        "required": ["agentId", "query"]
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecallArgs {
    agent_id: String,
    query: String,
    layers: Option<Vec<String>>,
    categories: Option<Vec<String>>,
    max_tokens: Option<usize>,
}

pub async fn execute(state: &AppState, args: Option<Value>) -> Result<Value, String> {
    let args: RecallArgs = match args {
        Some(v) => serde_json::from_value(v).map_err(|e| format!("invalid arguments: {e}"))?,
        None => return Err("missing arguments".to_string()),
    };

    if args.query.trim().is_empty() {
        return Err("query cannot be empty".to_string());
    }

    let layers = args
        .layers
        .map(|ls| {
            ls.iter()
                .filter_map(|l| Layer::parse(l))
                .collect::<Vec<_>>()
        })
        .filter(|ls| !ls.is_empty());
    let categories = args
        .categories
        .map(|cs| {
            cs.iter()
                .filter_map(|c| Category::parse(c))
                .collect::<Vec<_>>()
        })
        .filter(|cs| !cs.is_empty());

    let result = state
        .gate
        .recall(cortex_core::RecallRequest {
            agent_id: args.agent_id,
            query: args.query,
            layers,
            categories,
            max_tokens: args.max_tokens.unwrap_or(1000),
        })
        .await
        .map_err(|e| e.to_string())?;

    serde_json::to_value(result).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::test_state;

    #[tokio::test]
    async fn empty_query_is_rejected() {
        let (state, _dir) = test_state();
        let err = execute(
            &state,
            Some(serde_json::json!({ "agentId": "a", "query": "  " })),
        )
        .await
        .unwrap_err();
        assert!(err.contains("empty"));
    }

    #[tokio::test]
    async fn recall_against_empty_store_returns_no_memories() {
        let (state, _dir) = test_state();
        let result = execute(
            &state,
            Some(serde_json::json!({ "agentId": "a", "query": "what do you know about me" })),
        )
        .await
        .unwrap();
        assert_eq!(result["memoriesInjected"], 0);
    }
}
