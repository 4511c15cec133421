//! Relation — a (subject, predicate, object) triple over free-text entity
//! strings, reinforced by repeated extraction with an EMA-smoothed
//! confidence (spec §3.2, §4.6).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Closed predicate vocabulary (spec §6.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    Uses,
    WorksAt,
    LivesIn,
    Knows,
    Manages,
    BelongsTo,
    Created,
    Prefers,
    Studies,
    SkilledIn,
    CollaboratesWith,
    ReportsTo,
    Owns,
    InterestedIn,
    RelatedTo,
    NotUses,
    NotInterestedIn,
    Dislikes,
}

impl Predicate {
    pub fn as_str(&self) -> &'static str {
        match self {
            Predicate::Uses => "uses",
            Predicate::WorksAt => "works_at",
            Predicate::LivesIn => "lives_in",
            Predicate::Knows => "knows",
            Predicate::Manages => "manages",
            Predicate::BelongsTo => "belongs_to",
            Predicate::Created => "created",
            Predicate::Prefers => "prefers",
            Predicate::Studies => "studies",
            Predicate::SkilledIn => "skilled_in",
            Predicate::CollaboratesWith => "collaborates_with",
            Predicate::ReportsTo => "reports_to",
            Predicate::Owns => "owns",
            Predicate::InterestedIn => "interested_in",
            Predicate::RelatedTo => "related_to",
            Predicate::NotUses => "not_uses",
            Predicate::NotInterestedIn => "not_interested_in",
            Predicate::Dislikes => "dislikes",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "uses" => Predicate::Uses,
            "works_at" => Predicate::WorksAt,
            "lives_in" => Predicate::LivesIn,
            "knows" => Predicate::Knows,
            "manages" => Predicate::Manages,
            "belongs_to" => Predicate::BelongsTo,
            "created" => Predicate::Created,
            "prefers" => Predicate::Prefers,
            "studies" => Predicate::Studies,
            "skilled_in" => Predicate::SkilledIn,
            "collaborates_with" => Predicate::CollaboratesWith,
            "reports_to" => Predicate::ReportsTo,
            "owns" => Predicate::Owns,
            "interested_in" => Predicate::InterestedIn,
            "related_to" => Predicate::RelatedTo,
            "not_uses" => Predicate::NotUses,
            "not_interested_in" => Predicate::NotInterestedIn,
            "dislikes" => Predicate::Dislikes,
            _ => return None,
        })
    }
}

impl std::fmt::Display for Predicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Predicate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Predicate::parse(s).ok_or_else(|| format!("unknown predicate: {s}"))
    }
}

/// A single extraction that reinforced a relation's confidence (spec §4.6 step 3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evidence {
    pub memory_id: String,
    pub extracted_at: DateTime<Utc>,
    /// Confidence the parser assigned this specific mention, in [0, 1].
    pub raw_confidence: f64,
}

/// A directed edge `subject --predicate--> object` between two free-text
/// entity strings (spec §3.2). Subject and object are the literal text the
/// extractor produced ("Harry", "东京"), never a memory's own id.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relation {
    pub id: String,
    pub agent_id: String,
    pub subject: String,
    pub predicate: Predicate,
    pub object: String,
    /// EMA-smoothed confidence: `0.3 * raw + 0.7 * previous` on each
    /// reinforcing extraction (spec §4.6, fixed weights per Open Question #3).
    pub confidence: f64,
    /// The memory whose extraction first produced this relation. Written
    /// once; later reinforcing extractions never overwrite it once set
    /// (spec §4.6: "update source_memory_id only if previously null").
    pub source_memory_id: Option<String>,
    /// Free-text provenance tag, mirroring `Memory.source` (e.g.
    /// `sieve:deep`, `flush:<session>`). Set at creation, not revisited on
    /// reinforcement.
    pub source: String,
    pub extraction_count: i64,
    /// Whether the most recent extraction flagged this relation as no
    /// longer true (spec §4.6: "expired is set by the incoming value when
    /// present").
    pub expired: bool,
    pub evidence: Vec<Evidence>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Relation {
    const EMA_NEW_WEIGHT: f64 = 0.3;
    const EMA_PREV_WEIGHT: f64 = 0.7;

    /// Blend a new raw confidence observation into the running EMA (spec §4.6).
    pub fn ema_confidence(previous: f64, raw: f64) -> f64 {
        Self::EMA_NEW_WEIGHT * raw + Self::EMA_PREV_WEIGHT * previous
    }
}
