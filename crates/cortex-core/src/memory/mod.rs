//! Memory module — the Memory entity and its closed vocabularies.
//!
//! A `Memory` is the durable unit Cortex stores about a conversation: a
//! piece of content stratified into a layer (working/core/archive),
//! tagged with a category, and carrying the importance/confidence/decay
//! scores that drive recall ranking and lifecycle maintenance.

mod agent;
mod extraction;
mod logs;
mod relation;

pub use agent::Agent;
pub use extraction::{Extraction, ExtractionChannel, ExtractionSource, ParsedExtraction, ParsedMemory, ParsedRelation};
pub use logs::{AccessLogEntry, ExtractionLogEntry, LifecycleLogEntry};
pub use relation::{Evidence, Predicate, Relation};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// CLOSED VOCABULARIES
// ============================================================================

/// Storage stratum a memory belongs to (spec §6.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    /// Session-scale, always carries an `expires_at`.
    Working,
    /// Durable, no TTL.
    Core,
    /// Aging, compressible; carries an `expires_at` for eventual compression.
    Archive,
}

impl Layer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Layer::Working => "working",
            Layer::Core => "core",
            Layer::Archive => "archive",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "working" => Some(Layer::Working),
            "core" => Some(Layer::Core),
            "archive" => Some(Layer::Archive),
            _ => None,
        }
    }

    /// Layer weight used by HybridSearch's final-score formula (spec §4.4 step 5).
    pub fn weight(&self) -> f32 {
        match self {
            Layer::Core => 1.0,
            Layer::Working => 0.8,
            Layer::Archive => 0.5,
        }
    }

    /// The `[<layer-label>]` tag `formatForInjection` prefixes each line
    /// with (spec §4.4). Fixed regardless of the memory's own language —
    /// it names the storage stratum, not a translation of the content.
    pub fn injection_label(&self) -> &'static str {
        match self {
            Layer::Core => "核心记忆",
            Layer::Working => "工作记忆",
            Layer::Archive => "归档记忆",
        }
    }
}

impl std::fmt::Display for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Layer {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Layer::parse(s).ok_or_else(|| format!("unknown layer: {s}"))
    }
}

/// Category closed set (spec §6.3). `Context` and `Summary` are system-internal —
/// never produced by the LLM parser, only written by Cortex itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Identity,
    Preference,
    Decision,
    Fact,
    Entity,
    Correction,
    Todo,
    Context,
    Summary,
    Skill,
    Relationship,
    Goal,
    Insight,
    ProjectState,
    Constraint,
    Policy,
    AgentSelfImprovement,
    AgentUserHabit,
    AgentRelationship,
    AgentPersona,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Identity => "identity",
            Category::Preference => "preference",
            Category::Decision => "decision",
            Category::Fact => "fact",
            Category::Entity => "entity",
            Category::Correction => "correction",
            Category::Todo => "todo",
            Category::Context => "context",
            Category::Summary => "summary",
            Category::Skill => "skill",
            Category::Relationship => "relationship",
            Category::Goal => "goal",
            Category::Insight => "insight",
            Category::ProjectState => "project_state",
            Category::Constraint => "constraint",
            Category::Policy => "policy",
            Category::AgentSelfImprovement => "agent_self_improvement",
            Category::AgentUserHabit => "agent_user_habit",
            Category::AgentRelationship => "agent_relationship",
            Category::AgentPersona => "agent_persona",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "identity" => Category::Identity,
            "preference" => Category::Preference,
            "decision" => Category::Decision,
            "fact" => Category::Fact,
            "entity" => Category::Entity,
            "correction" => Category::Correction,
            "todo" => Category::Todo,
            "context" => Category::Context,
            "summary" => Category::Summary,
            "skill" => Category::Skill,
            "relationship" => Category::Relationship,
            "goal" => Category::Goal,
            "insight" => Category::Insight,
            "project_state" => Category::ProjectState,
            "constraint" => Category::Constraint,
            "policy" => Category::Policy,
            "agent_self_improvement" => Category::AgentSelfImprovement,
            "agent_user_habit" => Category::AgentUserHabit,
            "agent_relationship" => Category::AgentRelationship,
            "agent_persona" => Category::AgentPersona,
            _ => return None,
        })
    }

    /// Whether the LLM extraction parser (Sieve/Flush) may assign this category.
    /// `Context` and `Summary` are system-internal — Cortex writes them itself
    /// (fallback summaries, lifecycle super-summaries), never the parser.
    pub fn is_llm_extractable(&self) -> bool {
        !matches!(self, Category::Context | Category::Summary)
    }

    /// Base importance used by lifecycle promotion scoring (spec §4.10 phase 2)
    /// and decay scoring (phase 6). Reflects how durable each category typically is.
    pub fn base_importance(&self) -> f64 {
        match self {
            Category::Identity | Category::Constraint | Category::Policy => 0.9,
            Category::Decision | Category::Goal | Category::ProjectState => 0.8,
            Category::Preference | Category::Relationship | Category::Skill => 0.7,
            Category::Correction | Category::Insight => 0.65,
            Category::AgentSelfImprovement
            | Category::AgentUserHabit
            | Category::AgentRelationship
            | Category::AgentPersona => 0.6,
            Category::Fact | Category::Entity => 0.5,
            Category::Todo => 0.4,
            Category::Context | Category::Summary => 0.3,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::parse(s).ok_or_else(|| format!("unknown category: {s}"))
    }
}

// ============================================================================
// MEMORY
// ============================================================================

/// A durable memory (spec §3.1).
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Memory {
    pub id: String,
    pub layer: Layer,
    pub category: Category,
    pub content: String,
    /// Free-text provenance tag, e.g. `ingest`, `flush:<session>`,
    /// `lifecycle:promotion`, `mcp:remember`. Not a closed vocabulary.
    pub source: String,
    pub agent_id: String,
    pub importance: f64,
    pub confidence: f64,
    pub decay_score: f64,
    pub access_count: i64,
    pub last_accessed: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub superseded_by: Option<String>,
    pub is_pinned: bool,
    /// Opaque JSON blob. `metadata.smart_update_type` holds the MemoryWriter
    /// disposition (`replace`/`merge`/`conflict`) when set that way (spec §4.9).
    pub metadata: serde_json::Value,
}

impl Memory {
    /// An "active" memory per spec §3.1: not superseded and not expired.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.superseded_by.is_none() && self.expires_at.map(|e| e > now).unwrap_or(true)
    }
}

/// Fields accepted by `Store::insert_memory` (spec §4.1).
#[derive(Debug, Clone)]
pub struct NewMemory {
    pub layer: Layer,
    pub category: Category,
    pub content: String,
    pub source: String,
    pub agent_id: String,
    pub importance: f64,
    pub confidence: f64,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_pinned: bool,
    pub metadata: serde_json::Value,
}

/// Whitelisted mutable-field patch accepted by `Store::update_memory` (spec §4.1).
#[derive(Debug, Clone, Default)]
pub struct MemoryPatch {
    pub importance: Option<f64>,
    pub confidence: Option<f64>,
    pub decay_score: Option<f64>,
    pub layer: Option<Layer>,
    pub expires_at: Option<Option<DateTime<Utc>>>,
    pub superseded_by: Option<Option<String>>,
    pub metadata: Option<serde_json::Value>,
}
