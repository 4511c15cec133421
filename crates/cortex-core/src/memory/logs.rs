//! Audit logs kept alongside memories (spec §3.3): access history for
//! recency/decay scoring, and a lifecycle action trail for observability.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One recall/bump touch against a memory (spec §4.4 step 6, §4.7 step 5).
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessLogEntry {
    pub id: i64,
    pub memory_id: String,
    pub agent_id: String,
    pub accessed_at: DateTime<Utc>,
    /// Free-text context tag, e.g. `gate`, `api:get`.
    pub context: String,
}

/// One mutation a `LifecycleEngine` phase made to a memory (spec §4.10).
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleLogEntry {
    pub id: i64,
    pub memory_id: String,
    pub agent_id: String,
    /// `expire`, `promote`, `dedup`, `archive`, `compress`, `decay`.
    pub action: String,
    pub detail: Option<serde_json::Value>,
    pub occurred_at: DateTime<Utc>,
}

/// One extraction event, persisted for audit (spec §3.3). Distinct from
/// `Extraction` itself — this is the storage-layer row shape.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionLogEntry {
    pub id: i64,
    pub agent_id: String,
    pub channel: String,
    pub memory_id: Option<String>,
    pub category: String,
    pub source: String,
    pub raw_confidence: f64,
    pub created_at: DateTime<Utc>,
}
