//! `forget` tool — deletes a memory outright, bypassing lifecycle archival.

use serde::Deserialize;
use serde_json::Value;

use crate::state::AppState;

pub fn schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "memoryId": { "type": "string" }
        },
        "required": ["memoryId"]
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ForgetArgs {
    memory_id: String,
}

pub async fn execute(state: &AppState, args: Option<Value>) -> Result<Value, String> {
    let args: ForgetArgs = match args {
        Some(v) => serde_json::from_value(v).map_err(|e| format!("invalid arguments: {e}"))?,
        None => return Err("missing arguments".to_string()),
    };

    if state
        .store
        .get_memory(&args.memory_id)
        .map_err(|e| e.to_string())?
        .is_none()
    {
        return Err(format!("memory not found: {}", args.memory_id));
    }

    state
        .store
        .delete_memory(&args.memory_id)
        .map_err(|e| e.to_string())?;

    Ok(serde_json::json!({ "deleted": true, "memoryId": args.memory_id }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::test_state;
    use cortex_core::{Category, Layer, NewMemory};

    #[tokio::test]
    async fn missing_memory_is_an_error() {
        let (state, _dir) = test_state();
        let err = execute(&state, Some(serde_json::json!({ "memoryId": "nope" })))
            .await
            .unwrap_err();
        assert!(err.contains("not found"));
    }

    #[tokio::test]
    async fn existing_memory_is_deleted() {
        let (state, _dir) = test_state();
        let memory = state
            .store
            .insert_memory(NewMemory {
                layer: Layer::Core,
                category: Category::Fact,
                content: "test".to_string(),
                source: "test".to_string(),
                agent_id: "a".to_string(),
                importance: 0.5,
                confidence: 0.5,
                expires_at: None,
                is_pinned: false,
                metadata: serde_json::json!({}),
            })
            .unwrap();

        let result = execute(
            &state,
            Some(serde_json::json!({ "memoryId": memory.id })),
        )
        .await
        .unwrap();
        assert_eq!(result["deleted"], true);
        assert!(state.store.get_memory(&memory.id).unwrap().is_none());
    }
}
