//! SignalDetector (spec §4.3): a pure, regex-driven fast path that turns raw
//! dialogue text into candidate memories without calling an LLM.

use std::sync::OnceLock;

use regex::Regex;

use crate::memory::Category;

/// Confidence assigned to every fast-channel signal (spec §4.3).
pub const SIGNAL_CONFIDENCE: f64 = 0.85;

const SENTENCE_BOUNDARY_MAX: usize = 300;
const FALLBACK_WINDOW_BEFORE: usize = 50;
const FALLBACK_WINDOW_AFTER: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    User,
    Assistant,
}

struct SignalRule {
    name: &'static str,
    category: Category,
    importance: f64,
    side: Side,
    patterns: &'static [&'static str],
}

#[derive(Debug, Clone)]
pub struct Signal {
    pub category: Category,
    pub content: String,
    pub importance: f64,
    pub confidence: f64,
    pub rule_name: &'static str,
}

fn rules() -> &'static [SignalRule] {
    static RULES: OnceLock<Vec<SignalRule>> = OnceLock::new();
    RULES.get_or_init(|| {
        vec![
            SignalRule {
                name: "identity_self_statement",
                category: Category::Identity,
                importance: 0.9,
                side: Side::User,
                patterns: &[
                    r"(?i)\bmy name is ([a-z][\w '-]{1,60})",
                    r"(?i)\bi(?:'m| am) ([a-z][\w '-]{1,60})",
                    r"我(?:是|叫)([\w\p{Han}]{1,30})",
                ],
            },
            SignalRule {
                name: "preference_like_dislike",
                category: Category::Preference,
                importance: 0.7,
                side: Side::User,
                patterns: &[
                    r"(?i)\bi (?:really )?(?:like|love|prefer|hate|dislike) ([\w\s,'-]{2,80})",
                    r"我(?:喜欢|讨厌|偏爱)([\w\p{Han}]{1,40})",
                ],
            },
            SignalRule {
                name: "decision_statement",
                category: Category::Decision,
                importance: 0.8,
                side: Side::User,
                patterns: &[
                    r"(?i)\b(?:i(?:'ve| have)? decided|let's go with|we(?:'ll| will) use) ([\w\s,'-]{2,100})",
                    r"我决定([\w\p{Han}]{1,40})",
                ],
            },
            SignalRule {
                name: "correction_statement",
                category: Category::Correction,
                importance: 0.75,
                side: Side::User,
                patterns: &[
                    r"(?i)\b(?:actually|no,? that's wrong|that's not right|correction:) ([\w\s,'-]{2,100})",
                    r"不对[，,]?([\w\p{Han}]{1,40})",
                ],
            },
            SignalRule {
                name: "todo_item",
                category: Category::Todo,
                importance: 0.6,
                side: Side::User,
                patterns: &[
                    r"(?i)\b(?:todo|remind me to|i need to|don't forget to) ([\w\s,'-]{2,100})",
                    r"记得([\w\p{Han}]{1,40})",
                ],
            },
            SignalRule {
                name: "fact_statement",
                category: Category::Fact,
                importance: 0.5,
                side: Side::User,
                patterns: &[
                    r"(?i)\b(?:fyi|for your information|note that) ([\w\s,'-]{2,100})",
                ],
            },
            SignalRule {
                name: "skill_statement",
                category: Category::Skill,
                importance: 0.65,
                side: Side::User,
                patterns: &[
                    r"(?i)\bi(?:'m| am)? (?:good at|skilled in|experienced with|proficient in) ([\w\s,'-]{2,80})",
                ],
            },
            SignalRule {
                name: "relationship_statement",
                category: Category::Relationship,
                importance: 0.6,
                side: Side::User,
                patterns: &[
                    r"(?i)\bmy (?:wife|husband|partner|boss|manager|colleague|friend|son|daughter) (?:is |, )([\w\s,'-]{2,80})",
                ],
            },
            SignalRule {
                name: "goal_statement",
                category: Category::Goal,
                importance: 0.75,
                side: Side::User,
                patterns: &[
                    r"(?i)\b(?:my goal is|i(?:'m| am) trying to|i want to) ([\w\s,'-]{2,100})",
                ],
            },
            SignalRule {
                name: "constraint_statement",
                category: Category::Constraint,
                importance: 0.85,
                side: Side::User,
                patterns: &[
                    r"(?i)\b(?:never|always|must not|must always|please don't) ([\w\s,'-]{2,100})",
                ],
            },
            SignalRule {
                name: "agent_self_improvement",
                category: Category::AgentSelfImprovement,
                importance: 0.6,
                side: Side::Assistant,
                patterns: &[
                    r"(?i)\bi(?:'ll| will) (?:remember|make sure) to ([\w\s,'-]{2,100})",
                ],
            },
            SignalRule {
                name: "agent_user_habit",
                category: Category::AgentUserHabit,
                importance: 0.55,
                side: Side::Assistant,
                patterns: &[
                    r"(?i)\byou (?:usually|tend to|always|often) ([\w\s,'-]{2,100})",
                ],
            },
            SignalRule {
                name: "agent_relationship",
                category: Category::AgentRelationship,
                importance: 0.5,
                side: Side::Assistant,
                patterns: &[
                    r"(?i)\bas (?:your assistant|we discussed) ([\w\s,'-]{2,100})",
                ],
            },
            SignalRule {
                name: "agent_persona",
                category: Category::AgentPersona,
                importance: 0.5,
                side: Side::Assistant,
                patterns: &[
                    r"(?i)\bi(?:'m| am) (?:here to|designed to) ([\w\s,'-]{2,100})",
                ],
            },
        ]
    })
}

fn compiled(patterns: &'static [&'static str]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
}

/// Strip injected memory/context scaffolding and role markers before either
/// signal detection or LLM extraction (spec §4.3, shared with Sieve/Gate).
pub fn sanitize(text: &str) -> String {
    static TAG_BLOCK: OnceLock<Regex> = OnceLock::new();
    static ROLE_LINE: OnceLock<Regex> = OnceLock::new();

    let tag_re = TAG_BLOCK.get_or_init(|| {
        Regex::new(r"(?is)<(cortex_memory|system|context|memory|tool_result)[^>]*>.*?</\1>")
            .expect("static regex")
    });
    let role_re = ROLE_LINE.get_or_init(|| {
        Regex::new(r"(?im)^\s*(user|assistant|system)\s*:\s*").expect("static regex")
    });

    let without_tags = tag_re.replace_all(text, "");
    let without_roles = role_re.replace_all(&without_tags, "");
    without_roles.trim().to_string()
}

/// Extract the sentence surrounding a match, bounded by punctuation, falling
/// back to a fixed window when no boundary is found nearby (spec §4.3).
fn extract_surrounding(text: &str, match_start: usize, match_end: usize) -> String {
    let is_boundary = |c: char| matches!(c, '。' | '！' | '？' | '\n' | '.' | '!' | '?');

    let before = text[..match_start]
        .char_indices()
        .rev()
        .find(|(_, c)| is_boundary(*c))
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);

    let after = text[match_end..]
        .char_indices()
        .find(|(_, c)| is_boundary(*c))
        .map(|(i, _)| match_end + i)
        .unwrap_or(text.len());

    let sentence = &text[before..after];
    if sentence.trim().is_empty() || sentence.len() > SENTENCE_BOUNDARY_MAX * 4 {
        let fallback_start = match_start.saturating_sub(FALLBACK_WINDOW_BEFORE);
        let fallback_end = (match_end + FALLBACK_WINDOW_AFTER).min(text.len());
        let start = nearest_char_boundary(text, fallback_start);
        let end = nearest_char_boundary(text, fallback_end);
        text[start..end].trim().to_string()
    } else {
        sentence.chars().take(SENTENCE_BOUNDARY_MAX).collect::<String>().trim().to_string()
    }
}

fn nearest_char_boundary(text: &str, mut idx: usize) -> usize {
    while idx > 0 && idx < text.len() && !text.is_char_boundary(idx) {
        idx += 1;
    }
    idx.min(text.len())
}

/// Run every rule against the appropriate side of a sanitized exchange,
/// yielding at most one signal per rule (spec §4.3).
pub fn detect(user_text: &str, assistant_text: &str) -> Vec<Signal> {
    let user = sanitize(user_text);
    let assistant = sanitize(assistant_text);

    let mut signals = Vec::new();
    for rule in rules() {
        let haystack = match rule.side {
            Side::User => &user,
            Side::Assistant => &assistant,
        };
        for pattern in compiled(rule.patterns) {
            if let Some(m) = pattern.find(haystack) {
                let content = extract_surrounding(haystack, m.start(), m.end());
                if !content.is_empty() {
                    signals.push(Signal {
                        category: rule.category,
                        content,
                        importance: rule.importance,
                        confidence: SIGNAL_CONFIDENCE,
                        rule_name: rule.name,
                    });
                }
                break;
            }
        }
    }
    signals
}

/// Stateless entry point bundling sanitize/detect/small-talk classification
/// (spec §4.3). Carries no fields; every Sieve/Gate caller shares one instance.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignalDetector;

impl SignalDetector {
    pub fn detect(&self, user_text: &str, assistant_text: &str) -> Vec<Signal> {
        detect(user_text, assistant_text)
    }

    pub fn sanitize(&self, text: &str) -> String {
        sanitize(text)
    }

    pub fn is_small_talk(&self, query: &str) -> bool {
        is_small_talk(query)
    }
}

const SMALL_TALK_PHRASES: &[&str] = &[
    "hi", "hello", "hey", "thanks", "thank you", "ok", "okay", "cool", "got it", "sure",
    "bye", "goodbye", "yo", "sup", "你好", "谢谢", "好的", "再见", "こんにちは", "ありがとう",
];

/// Whether a recall query is small talk and should skip retrieval entirely
/// (spec §4.7 step 2).
pub fn is_small_talk(query: &str) -> bool {
    let trimmed = query.trim();
    if trimmed.chars().count() <= 3 {
        return true;
    }
    let lower = trimmed.to_lowercase();
    SMALL_TALK_PHRASES.iter().any(|p| lower == *p)
}
