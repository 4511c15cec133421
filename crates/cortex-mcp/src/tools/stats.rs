//! `stats` tool — store-wide counts, mirrors `/api/v1/stats`.

use serde_json::Value;

use crate::state::AppState;

pub fn schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {}
    })
}

pub async fn execute(state: &AppState, _args: Option<Value>) -> Result<Value, String> {
    let stats = state.store.stats().map_err(|e| e.to_string())?;
    serde_json::to_value(stats).map_err(|e| e.to_string())
}
