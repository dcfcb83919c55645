//! Keyword heuristics for visual answers.
//!
//! Two questions get asked about every user query before any model call:
//! does it deserve an infographic ([`decide_visual`]), and, when a model
//! classification is on the table, can keywords settle it first
//! ([`classify_by_keywords`])? Both are cheap word matches; anything they
//! cannot settle is left to the caller.

use serde::Serialize;

use crate::cooldown::{contains_phrase, words};
use crate::parse::Record;

/// Layout hint for a generated visual.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VisualStyle {
    Simple,
    Detailed,
    Timeline,
    Chart,
}

impl VisualStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            VisualStyle::Simple => "simple",
            VisualStyle::Detailed => "detailed",
            VisualStyle::Timeline => "timeline",
            VisualStyle::Chart => "chart",
        }
    }
}

/// Whether to make a visual, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisualDecision {
    pub make: bool,
    pub reason: String,
    pub style: VisualStyle,
}

const TIMELINE_KEYWORDS: &[&str] = &["schedule", "calendar", "timeline", "when to"];
const CHART_KEYWORDS: &[&str] = &["compare", "comparison", "difference between", "vs"];

/// Keywords that make a question worth a visual, checked in order.
pub const VISUAL_KEYWORDS: &[&str] = &[
    "steps",
    "step by step",
    "how to",
    "how do i",
    "procedure",
    "process",
    "schedule",
    "calendar",
    "timeline",
    "when to",
    "symptoms",
    "identify",
    "signs of",
    "disease",
    "pest",
    "compare",
    "comparison",
    "difference between",
    "vs",
    "diagram",
    "chart",
    "infographic",
    "visual",
    "show me",
];

const GREETING_KEYWORDS: &[&str] = &[
    "hello",
    "hi",
    "namaste",
    "namaskar",
    "good morning",
    "good evening",
    "thank you",
    "thanks",
    "dhanyawad",
    "shukriya",
    "bye",
    "goodbye",
    "how are you",
    "what is your name",
    "who are you",
    "who made you",
];

const EXPLICIT_VISUAL_KEYWORDS: &[&str] = &[
    "show me",
    "diagram",
    "chart",
    "infographic",
    "picture",
    "image",
    "visual",
    "steps",
    "step by step",
    "how to",
    "how do i",
    "schedule",
    "calendar",
    "process",
    "procedure",
    "symptoms",
    "identify",
    "comparison",
    "compare",
];

fn first_match<'a>(text_words: &[String], keywords: &[&'a str]) -> Option<&'a str> {
    keywords
        .iter()
        .find(|kw| contains_phrase(text_words, &words(kw)))
        .copied()
}

/// Decide whether a question warrants an infographic.
///
/// The whole word `create` always wins; otherwise the first visual keyword
/// found picks the style.
pub fn decide_visual(question: &str) -> VisualDecision {
    let q = words(question);

    if contains_phrase(&q, &["create".to_string()]) {
        return VisualDecision {
            make: true,
            reason: "User requested 'create' in the question.".to_string(),
            style: VisualStyle::Detailed,
        };
    }

    if let Some(keyword) = first_match(&q, VISUAL_KEYWORDS) {
        let style = if TIMELINE_KEYWORDS.contains(&keyword) {
            VisualStyle::Timeline
        } else if CHART_KEYWORDS.contains(&keyword) {
            VisualStyle::Chart
        } else {
            VisualStyle::Detailed
        };
        return VisualDecision {
            make: true,
            reason: format!("Visual keyword '{}' detected.", keyword),
            style,
        };
    }

    VisualDecision {
        make: false,
        reason: "No visual triggers present".to_string(),
        style: VisualStyle::Simple,
    }
}

/// Preferred answer format for a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    Visual,
    Text,
}

/// Classification of a query, with confidence in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub format: ResponseFormat,
    pub confidence: f64,
    pub reason: String,
}

impl Classification {
    /// What callers fall back to when nothing better is known.
    pub fn default_text(reason: impl Into<String>) -> Self {
        Self {
            format: ResponseFormat::Text,
            confidence: 0.5,
            reason: reason.into(),
        }
    }

    /// Interpret a model-produced record. Requires a `format` field; other
    /// fields fall back to defaults.
    pub fn from_record(record: &Record) -> Option<Self> {
        let format = match record.get("format")?.as_str()?.trim().to_lowercase().as_str() {
            "visual" => ResponseFormat::Visual,
            "text" => ResponseFormat::Text,
            _ => return None,
        };
        let confidence = match record.get("confidence") {
            Some(v) => v
                .as_f64()
                .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
                .unwrap_or(0.5),
            None => 0.5,
        }
        .clamp(0.0, 1.0);
        let reason = record
            .get("reason")
            .and_then(|v| v.as_str())
            .unwrap_or("AI classification")
            .to_string();
        Some(Self {
            format,
            confidence,
            reason,
        })
    }
}

/// Settle obvious queries without a model call.
///
/// Greetings are always text; explicit visual wording is always visual.
pub fn classify_by_keywords(question: &str) -> Option<Classification> {
    let q = words(question);

    if first_match(&q, GREETING_KEYWORDS).is_some() {
        return Some(Classification {
            format: ResponseFormat::Text,
            confidence: 0.95,
            reason: "Greeting or pleasantry detected".to_string(),
        });
    }

    if first_match(&q, EXPLICIT_VISUAL_KEYWORDS).is_some() {
        return Some(Classification {
            format: ResponseFormat::Visual,
            confidence: 0.95,
            reason: "Visual content keywords detected".to_string(),
        });
    }

    None
}
