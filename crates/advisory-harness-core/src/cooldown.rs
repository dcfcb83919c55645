//! Cooldown policy for expensive generation calls.
//!
//! The policy is advisory: it tells the caller whether a remote generation
//! for a topic is worth making right now. It never blocks anything by
//! itself, and the caller can always force.
//!
//! # Evaluation order
//!
//! 1. `force` → [`GateDecision::Forced`]
//! 2. normalized topic contains an override token → [`GateDecision::Override`]
//! 3. no previous generation → [`GateDecision::Fresh`]
//! 4. `now - last_fired_at >= window` → [`GateDecision::Expired`]
//! 5. otherwise → [`GateDecision::CoolingDown`]
//!
//! ```rust
//! use advisory_harness_core::cooldown::{CooldownPolicy, GateDecision};
//! use chrono::{Duration, Utc};
//!
//! let policy = CooldownPolicy::new(Duration::hours(24));
//! let now = Utc::now();
//! let last = Some(now - Duration::hours(1));
//! assert!(!policy.evaluate("red rot in sugarcane", false, last, now).allows());
//! assert!(matches!(
//!     policy.evaluate("show me red rot symptoms", false, last, now),
//!     GateDecision::Override { .. }
//! ));
//! ```

use chrono::{DateTime, Duration, Utc};

use crate::digest::hash_str;

/// Default cooldown window: 24 hours.
pub const DEFAULT_COOLDOWN_SECS: i64 = 86_400;

/// Topic used when the caller passes an empty one.
pub const FALLBACK_TOPIC: &str = "general";

/// Explicit "make me a visual" requests that bypass the cooldown.
pub const DEFAULT_OVERRIDE_TRIGGERS: &[&str] = &[
    "create",
    "infographic",
    "visual",
    "visualize",
    "diagram",
    "chart",
    "show me",
    "picture",
    "image",
    "timeline",
    "steps",
    "step by step",
    "schedule",
    "compare",
    "comparison",
];

/// Canonical form of a topic: trimmed, lowercased, single-spaced.
pub fn normalize_topic(topic: &str) -> String {
    let normalized = topic
        .split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");
    if normalized.is_empty() {
        FALLBACK_TOPIC.to_string()
    } else {
        normalized
    }
}

/// Ledger key for a topic: SHA-256 of its normalized form.
pub fn topic_key(topic: &str) -> String {
    hash_str(&normalize_topic(topic))
}

/// Split text into lowercase alphanumeric words.
pub(crate) fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

/// True when `phrase` occurs in `haystack` as a run of whole words.
pub(crate) fn contains_phrase(haystack: &[String], phrase: &[String]) -> bool {
    !phrase.is_empty()
        && haystack.len() >= phrase.len()
        && haystack.windows(phrase.len()).any(|w| w == phrase)
}

/// Set of override tokens, matched as substrings of the normalized topic,
/// so `charts` and `visualization` hit `chart` and `visual`.
#[derive(Debug, Clone)]
pub struct TriggerVocabulary {
    tokens: Vec<String>,
}

impl TriggerVocabulary {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut vocab = Self { tokens: Vec::new() };
        vocab.extend(tokens);
        vocab
    }

    pub fn extend<I, S>(&mut self, tokens: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for token in tokens {
            let label = words(token.as_ref()).join(" ");
            if !label.is_empty() && !self.tokens.contains(&label) {
                self.tokens.push(label);
            }
        }
    }

    /// First token found in `topic`, if any.
    pub fn find(&self, topic: &str) -> Option<&str> {
        let haystack = normalize_topic(topic);
        self.tokens
            .iter()
            .find(|token| haystack.contains(token.as_str()))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl Default for TriggerVocabulary {
    fn default() -> Self {
        Self::new(DEFAULT_OVERRIDE_TRIGGERS.iter().copied())
    }
}

/// Why a generation request was allowed or suppressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Forced,
    Override { token: String },
    Fresh,
    Expired { elapsed: Duration },
    CoolingDown { remaining: Duration },
}

impl GateDecision {
    pub fn allows(&self) -> bool {
        !matches!(self, GateDecision::CoolingDown { .. })
    }
}

/// Time-window policy over normalized topics.
#[derive(Debug, Clone)]
pub struct CooldownPolicy {
    pub window: Duration,
    pub triggers: TriggerVocabulary,
}

impl CooldownPolicy {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            triggers: TriggerVocabulary::default(),
        }
    }

    pub fn with_triggers(window: Duration, triggers: TriggerVocabulary) -> Self {
        Self { window, triggers }
    }

    /// Decide whether a generation for `topic` should go ahead at `now`,
    /// given the time of the last generation for the same topic key.
    pub fn evaluate(
        &self,
        topic: &str,
        force: bool,
        last_fired_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> GateDecision {
        if force {
            return GateDecision::Forced;
        }

        let normalized = normalize_topic(topic);
        if let Some(token) = self.triggers.find(&normalized) {
            return GateDecision::Override {
                token: token.to_string(),
            };
        }

        match last_fired_at {
            None => GateDecision::Fresh,
            Some(last) => {
                let elapsed = now - last;
                if elapsed >= self.window {
                    GateDecision::Expired { elapsed }
                } else {
                    GateDecision::CoolingDown {
                        remaining: self.window - elapsed,
                    }
                }
            }
        }
    }
}

impl Default for CooldownPolicy {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_COOLDOWN_SECS))
    }
}
