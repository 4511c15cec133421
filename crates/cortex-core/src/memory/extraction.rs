//! Extraction — what the Sieve/Flush parsers produce before a `NewMemory`
//! reaches `MemoryWriter` (spec §4.5, §4.8).

use serde::{Deserialize, Serialize};

use super::relation::Predicate;
use super::Category;

/// Closed vocabulary for how confidently a fact was stated (spec §6.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionSource {
    /// The speaker stated the fact directly.
    UserStated,
    /// The fact was inferred from context, not stated outright.
    UserImplied,
    /// Inferred from a recurring pattern across multiple exchanges, not a
    /// single statement.
    ObservedPattern,
    /// Written by Cortex itself rather than extracted from dialogue (e.g.
    /// lifecycle-synthesized summaries and profiles).
    SystemDefined,
    /// The agent's own reasoning about itself, not the user.
    SelfReflection,
}

impl ExtractionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionSource::UserStated => "user_stated",
            ExtractionSource::UserImplied => "user_implied",
            ExtractionSource::ObservedPattern => "observed_pattern",
            ExtractionSource::SystemDefined => "system_defined",
            ExtractionSource::SelfReflection => "self_reflection",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "user_stated" => ExtractionSource::UserStated,
            "user_implied" => ExtractionSource::UserImplied,
            "observed_pattern" => ExtractionSource::ObservedPattern,
            "system_defined" => ExtractionSource::SystemDefined,
            "self_reflection" => ExtractionSource::SelfReflection,
            _ => return None,
        })
    }

    /// Base confidence multiplier applied by the parser before MemoryWriter
    /// scoring (spec §4.5 step 4): directly stated facts are trusted more
    /// than inferred or self-authored ones. Not spec-specified; chosen to
    /// preserve the original stated > implied > inferred ordering across the
    /// full five-way vocabulary.
    pub fn confidence_multiplier(&self) -> f64 {
        match self {
            ExtractionSource::UserStated => 1.0,
            ExtractionSource::SystemDefined => 0.9,
            ExtractionSource::UserImplied => 0.75,
            ExtractionSource::ObservedPattern => 0.65,
            ExtractionSource::SelfReflection => 0.6,
        }
    }
}

impl std::fmt::Display for ExtractionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ExtractionSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ExtractionSource::parse(s).ok_or_else(|| format!("unknown extraction source: {s}"))
    }
}

/// Which Sieve/Flush pathway produced an extraction (spec §6.3, §4.5, §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionChannel {
    /// Sieve's regex/signal fast path — no LLM call.
    Fast,
    /// Sieve's LLM-backed deep path.
    Deep,
    /// Session-boundary Flush distillation.
    Flush,
    /// A direct `remember` MCP tool call, bypassing Sieve entirely.
    Mcp,
}

impl ExtractionChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionChannel::Fast => "fast",
            ExtractionChannel::Deep => "deep",
            ExtractionChannel::Flush => "flush",
            ExtractionChannel::Mcp => "mcp",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "fast" => ExtractionChannel::Fast,
            "deep" => ExtractionChannel::Deep,
            "flush" => ExtractionChannel::Flush,
            "mcp" => ExtractionChannel::Mcp,
            _ => return None,
        })
    }
}

impl std::fmt::Display for ExtractionChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ExtractionChannel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ExtractionChannel::parse(s).ok_or_else(|| format!("unknown extraction channel: {s}"))
    }
}

/// A proposed relation, parsed as a sibling of the memory array rather than
/// nested under any one memory (spec §4.5 step 3): subject and object are
/// the literal free-text entity strings the model produced, not pointers
/// into the memory list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedRelation {
    /// Free-text entity, 1-5 words (spec §4.5 step 3, §4.5 step 4).
    pub subject: String,
    pub predicate: Predicate,
    /// Free-text entity, 1-5 words.
    pub object: String,
    pub confidence: f64,
    /// Whether the model flagged this relation as no longer true. Absent
    /// from the envelope means "unchanged" (spec §4.6).
    #[serde(default)]
    pub expired: Option<bool>,
}

/// One fact pulled out of conversation text by the LLM parser, before it has
/// been written to the store (spec §4.5 step 3, step 4).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedMemory {
    pub category: Category,
    pub content: String,
    pub source: ExtractionSource,
    /// The model's own importance estimate in [0, 1], taken as-is rather
    /// than synthesized from category/source (spec §4.5 step 3).
    pub importance: f64,
    /// Short justification the model gave for extracting this fact. Carried
    /// through to the `extraction_log` for debugging, not shown to users.
    #[serde(default)]
    pub reasoning: String,
}

/// The full LLM deep-channel envelope: memories and relations are siblings,
/// never nested (spec §4.5 step 3): `{memories: [...], relations: [...],
/// nothing_extracted: bool}`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ParsedExtraction {
    #[serde(default)]
    pub memories: Vec<ParsedMemory>,
    #[serde(default)]
    pub relations: Vec<ParsedRelation>,
    /// The model explicitly reported nothing worth remembering in this turn
    /// (spec §4.5 step 5), as opposed to a parse failure producing an empty
    /// envelope by accident.
    #[serde(default)]
    pub nothing_extracted: bool,
}

impl ParsedExtraction {
    pub fn is_empty(&self) -> bool {
        self.memories.is_empty() && self.relations.is_empty()
    }
}

/// A record of one extraction event, kept for audit/debugging (spec §3.3,
/// persisted by `Store` as `extraction_log`).
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Extraction {
    pub id: String,
    pub agent_id: String,
    pub channel: ExtractionChannel,
    pub memory_id: Option<String>,
    pub category: Category,
    pub source: ExtractionSource,
    pub raw_confidence: f64,
    pub created_at: chrono::DateTime<chrono::Utc>,
}
