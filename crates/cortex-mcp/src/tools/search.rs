//! `search` tool — raw hybrid search results, unlike `recall` which formats
//! output for prompt injection.

use serde::Deserialize;
use serde_json::Value;

use cortex_core::{Category, Layer};

use crate::state::AppState;

pub fn schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "agentId": { "type": "string" },
            "query": { "type": "string" },
            "layers": {
                "type": "array",
                "items": { "type": "string", "enum": ["working", "core", "archive"] }
            },
            "categories": {
                "type": "array",
                "items": { "type": "string" }
            },
            "limit": { "type": "integer", "default": 10, "minimum": 1, "maximum": 100 },
            "debug": { "type": "boolean", "default": false }
        },
        "required": ["agentId", "query"]
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchArgs {
    agent_id: String,
    query: String,
    layers: Option<Vec<String>>,
    categories: Option<Vec<String>>,
    limit: Option<usize>,
    debug: Option<bool>,
}

pub async fn execute(state: &AppState, args: Option<Value>) -> Result<Value, String> {
    let args: SearchArgs = match args {
        Some(v) => serde_json::from_value(v).map_err(|e| format!("invalid arguments: {e}"))?,
        None => return Err("missing arguments".to_string()),
    };

    if args.query.trim().is_empty() {
        return Err("query cannot be empty".to_string());
    }

    let filters = cortex_core::SearchFilters {
        agent_id: args.agent_id,
        layers: args
            .layers
            .map(|ls| ls.iter().filter_map(|l| Layer::parse(l)).collect::<Vec<_>>())
            .filter(|ls| !ls.is_empty()),
        categories: args
            .categories
            .map(|cs| cs.iter().filter_map(|c| Category::parse(c)).collect::<Vec<_>>())
            .filter(|cs| !cs.is_empty()),
    };

    let (results, debug) = state
        .search
        .search(
            &args.query,
            &filters,
            args.limit.unwrap_or(10).clamp(1, 100),
            args.debug.unwrap_or(false),
        )
        .await
        .map_err(|e| e.to_string())?;

    let results: Vec<Value> = results
        .into_iter()
        .map(|r| {
            serde_json::json!({
                "memory": r.memory,
                "finalScore": r.final_score,
                "textScore": r.text_score,
                "vectorScore": r.vector_score,
            })
        })
        .collect();

    Ok(serde_json::json!({ "results": results, "debug": debug }))
}
