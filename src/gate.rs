//! Persisted generation cooldown gate.
//!
//! Wraps the pure [`CooldownPolicy`] with the cooldown ledger: the last
//! generation time per topic key survives restarts. The gate is advisory.
//! Callers may always force, and an unreadable ledger counts as "never
//! generated" so the gate fails open.

use chrono::{DateTime, Duration, Utc};

use advisory_harness_core::cooldown::{
    topic_key, CooldownPolicy, GateDecision, TriggerVocabulary,
};
use advisory_harness_core::models::CooldownEntry;

use crate::config::GateConfig;
use crate::ledger::Ledger;

pub struct CooldownGate {
    ledger: Ledger<CooldownEntry>,
    policy: CooldownPolicy,
}

impl CooldownGate {
    pub fn new(ledger: Ledger<CooldownEntry>, policy: CooldownPolicy) -> Self {
        Self { ledger, policy }
    }

    /// Build from the `[gate]` config section; `extra_triggers` extend the
    /// default override vocabulary.
    pub fn from_config(ledger: Ledger<CooldownEntry>, config: &GateConfig) -> Self {
        let mut triggers = TriggerVocabulary::default();
        triggers.extend(config.extra_triggers.iter());
        let policy = CooldownPolicy::with_triggers(Duration::seconds(config.cooldown_secs), triggers);
        Self::new(ledger, policy)
    }

    pub fn policy(&self) -> &CooldownPolicy {
        &self.policy
    }

    pub fn last_fired_at(&self, topic: &str) -> Option<DateTime<Utc>> {
        self.ledger
            .get(&topic_key(topic))
            .map(|entry| entry.last_fired_at)
    }

    pub fn evaluate(&self, topic: &str, force: bool) -> GateDecision {
        self.evaluate_at(topic, force, Utc::now())
    }

    pub fn evaluate_at(&self, topic: &str, force: bool, now: DateTime<Utc>) -> GateDecision {
        // Force and overrides never need the ledger.
        let last = if force || self.policy.triggers.find(topic).is_some() {
            None
        } else {
            self.last_fired_at(topic)
        };
        let decision = self.policy.evaluate(topic, force, last, now);
        match &decision {
            GateDecision::CoolingDown { remaining } => tracing::info!(
                topic,
                remaining_secs = remaining.num_seconds(),
                "generation suppressed by cooldown"
            ),
            other => tracing::debug!(topic, decision = ?other, "generation allowed"),
        }
        decision
    }

    pub fn should_generate(&self, topic: &str, force: bool) -> bool {
        self.evaluate(topic, force).allows()
    }

    /// Record a successful generation for `topic` at the current time.
    pub fn record_generation(&self, topic: &str) -> bool {
        self.record_generation_at(topic, Utc::now())
    }

    pub fn record_generation_at(&self, topic: &str, now: DateTime<Utc>) -> bool {
        let key = topic_key(topic);
        let entry = CooldownEntry {
            topic_key: key.clone(),
            last_fired_at: now,
        };
        let saved = self.ledger.put(key, entry);
        if !saved {
            tracing::warn!(topic, "failed to record generation (cooldown not persisted)");
        }
        saved
    }
}
