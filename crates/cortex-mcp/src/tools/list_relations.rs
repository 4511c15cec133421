//! `list_relations` tool — dumps the (subject, predicate, object) graph for
//! an agent, most recently updated first.

use serde::Deserialize;
use serde_json::Value;

use crate::state::AppState;

pub fn schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "agentId": { "type": "string" },
            "limit": { "type": "integer", "default": 50, "minimum": 1, "maximum": 500 }
        },
        "required": ["agentId"]
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListRelationsArgs {
    agent_id: String,
    limit: Option<i64>,
}

pub async fn execute(state: &AppState, args: Option<Value>) -> Result<Value, String> {
    let args: ListRelationsArgs = match args {
        Some(v) => serde_json::from_value(v).map_err(|e| format!("invalid arguments: {e}"))?,
        None => return Err("missing arguments".to_string()),
    };

    let relations = state
        .store
        .list_relations(&args.agent_id, args.limit.unwrap_or(50).clamp(1, 500))
        .map_err(|e| e.to_string())?;

    Ok(serde_json::json!({ "relations": relations }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::test_state;

    #[tokio::test]
    async fn empty_store_has_no_relations() {
        let (state, _dir) = test_state();
        let result = execute(&state, Some(serde_json::json!({ "agentId": "a" })))
            .await
            .unwrap();
        assert_eq!(result["relations"].as_array().unwrap().len(), 0);
    }
}
