//! Agent — the scoping identity memories, relations, and logs are partitioned by.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An agent the store has ever seen. `agent_id` is the partition key used by
/// every Sieve/Gate/Flush/Lifecycle operation (spec §3.3); agents are created
/// implicitly on first write and never deleted by lifecycle maintenance.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: String,
    pub display_name: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Free-form JSON profile synthesized by lifecycle phase 7 (spec §4.10).
    pub profile: Option<serde_json::Value>,
    pub profile_updated_at: Option<DateTime<Utc>>,
}
