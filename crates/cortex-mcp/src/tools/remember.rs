//! `remember` tool — a direct `remember` call, bypassing Sieve entirely but
//! still funneled through `MemoryWriter`'s dedup/SmartUpdate path.

use serde::Deserialize;
use serde_json::Value;

use cortex_core::{Category, ExtractionChannel, ExtractionSource, WriteOutcome, WriteRequest};

use crate::state::AppState;

pub fn schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "agentId": { "type": "string" },
            "content": { "type": "string", "description": "The fact to remember" },
            "category": {
                "type": "string",
                "enum": [
                    "identity", "preference", "decision", "fact", "entity", "correction",
                    "todo", "skill", "relationship", "goal", "insight", "project_state",
                    "constraint", "policy", "agent_self_improvement", "agent_user_habit",
                    "agent_relationship", "agent_persona"
                ]
            },
            "importance": { "type": "number", "minimum": 0.0, "maximum": 1.0 },
            "confidence": { "type": "number", "minimum": 0.0, "maximum": 1.0 }
        },
        "required": ["agentId", "content", "category"]
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RememberArgs {
    agent_id: String,
    content: String,
    category: String,
    importance: Option<f64>,
    confidence: Option<f64>,
}

pub async fn execute(state: &AppState, args: Option<Value>) -> Result<Value, String> {
    let args: RememberArgs = match args {
        Some(v) => serde_json::from_value(v).map_err(|e| format!("invalid arguments: {e}"))?,
        None => return Err("missing arguments".to_string()),
    };

    if args.content.trim().is_empty() {
        return Err("content cannot be empty".to_string());
    }
    let category = Category::parse(&args.category)
        .ok_or_else(|| format!("unknown category: {}", args.category))?;
    if !category.is_llm_extractable() {
        return Err(format!(
            "category '{}' is system-internal and cannot be remembered directly",
            args.category
        ));
    }

    let importance = args.importance.unwrap_or_else(|| category.base_importance());
    let confidence = args.confidence.unwrap_or(1.0);

    let outcome = state
        .writer
        .write(
            &args.agent_id,
            WriteRequest {
                content: args.content.clone(),
                category,
                importance,
                confidence,
                source_tag: "mcp:remember".to_string(),
            },
        )
        .await
        .map_err(|e| e.to_string())?;

    let memory_id = match &outcome {
        WriteOutcome::Inserted { memory } | WriteOutcome::Superseded { memory, .. } => {
            Some(memory.id.clone())
        }
        WriteOutcome::ExactDuplicate { candidate_id } | WriteOutcome::Kept { candidate_id } => {
            Some(candidate_id.clone())
        }
    };

    let _ = state.store.append_extraction_log(
        &args.agent_id,
        ExtractionChannel::Mcp.as_str(),
        memory_id.as_deref(),
        category.as_str(),
        ExtractionSource::UserStated.as_str(),
        confidence,
    );

    let (outcome_name, memory, superseded_id) = match outcome {
        WriteOutcome::Inserted { memory } => ("inserted", Some(memory), None),
        WriteOutcome::Superseded {
            memory,
            superseded_id,
            ..
        } => ("superseded", Some(memory), Some(superseded_id)),
        WriteOutcome::ExactDuplicate { candidate_id } => ("exact_duplicate", None, Some(candidate_id)),
        WriteOutcome::Kept { candidate_id } => ("kept", None, Some(candidate_id)),
    };

    Ok(serde_json::json!({
        "outcome": outcome_name,
        "memory": memory,
        "supersededId": superseded_id,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::test_state;

    #[tokio::test]
    async fn empty_content_is_rejected() {
        let (state, _dir) = test_state();
        let err = execute(
            &state,
            Some(serde_json::json!({ "agentId": "a", "content": "  ", "category": "fact" })),
        )
        .await
        .unwrap_err();
        assert!(err.contains("empty"));
    }

    #[tokio::test]
    async fn system_internal_category_is_rejected() {
        let (state, _dir) = test_state();
        let err = execute(
            &state,
            Some(serde_json::json!({ "agentId": "a", "content": "hi", "category": "summary" })),
        )
        .await
        .unwrap_err();
        assert!(err.contains("system-internal"));
    }

    #[tokio::test]
    async fn new_fact_is_inserted() {
        let (state, _dir) = test_state();
        let result = execute(
            &state,
            Some(serde_json::json!({
                "agentId": "a",
                "content": "The user's favorite language is Rust.",
                "category": "preference"
            })),
        )
        .await
        .unwrap();
        assert_eq!(result["outcome"], "inserted");
    }
}
