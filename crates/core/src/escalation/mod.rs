//! Escalation trigger evaluation with per-trigger thresholds, cooldowns and priority order.
//!
//! Every trigger type has a fixed binary score: it either matches and scores its fixed
//! value or scores 0. The first trigger in priority order whose score reaches its threshold
//! fires and evaluation stops.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::catalog::vocabulary::{
    self, COMPETITOR_TERMS, COMPLAINT_TERMS, COMPLEX_MESSAGE_CHARS, COMPLEX_REQUEST_TERMS,
    HIGH_VALUE_TERMS,
};
use crate::catalog::{EscalationAction, EscalationTrigger, SignalCatalog, TriggerCatalog, TriggerType};
use crate::domain::conversation::{
    ConversationAnalysis, ConversationId, Intent, LeadScore, Mood, Urgency,
};

pub const BUYING_SIGNAL_SCORE: u8 = 95;
pub const COMPLAINT_SCORE: u8 = 90;
pub const URGENT_TIMELINE_SCORE: u8 = 85;
pub const HIGH_VALUE_SCORE: u8 = 85;
pub const COMPETITOR_SCORE: u8 = 75;
pub const COMPLEX_REQUEST_SCORE: u8 = 70;

/// Lead scores at or above this count as high value when paired with purchase intent.
pub const HIGH_VALUE_LEAD_SCORE: u8 = 80;

#[derive(Clone, Copy, Debug)]
pub struct EscalationContext<'a> {
    pub conversation_id: &'a ConversationId,
    pub message: &'a str,
    pub analysis: &'a ConversationAnalysis,
    pub lead_score: LeadScore,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationOutcome {
    pub trigger: EscalationTrigger,
    pub score: u8,
    pub fired_at: DateTime<Utc>,
}

impl EscalationOutcome {
    pub fn is_immediate(&self) -> bool {
        self.trigger.action == EscalationAction::Immediate
    }
}

/// Recorded once per firing for downstream monitoring.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationAlert {
    pub id: String,
    pub conversation_id: ConversationId,
    pub trigger_id: String,
    pub trigger_type: TriggerType,
    pub action: EscalationAction,
    pub notification_required: bool,
    pub score: u8,
    pub reason: String,
    pub fired_at: DateTime<Utc>,
}

type CooldownKey = (String, ConversationId);

#[derive(Debug, Default)]
pub struct EscalationTriggerSystem {
    triggers: TriggerCatalog,
    signals: SignalCatalog,
    last_fired: Mutex<HashMap<CooldownKey, DateTime<Utc>>>,
    alerts: Mutex<Vec<EscalationAlert>>,
}

impl EscalationTriggerSystem {
    pub fn new(triggers: TriggerCatalog, signals: SignalCatalog) -> Self {
        Self {
            triggers,
            signals,
            last_fired: Mutex::new(HashMap::new()),
            alerts: Mutex::new(Vec::new()),
        }
    }

    pub fn triggers(&self) -> &TriggerCatalog {
        &self.triggers
    }

    /// Fixed score for one trigger type, 0 when its condition does not hold.
    pub fn score(&self, trigger_type: TriggerType, context: &EscalationContext<'_>) -> u8 {
        let normalized = vocabulary::normalize(context.message);
        let analysis = context.analysis;

        match trigger_type {
            TriggerType::BuyingSignal => {
                let strong = analysis.buying_signals.iter().any(|signal| self.signals.is_strong(signal))
                    || self.signals.contains_strong(&normalized);
                if strong {
                    BUYING_SIGNAL_SCORE
                } else {
                    0
                }
            }
            TriggerType::Complaint => {
                if analysis.mood == Mood::Frustrated || any_term(&normalized, COMPLAINT_TERMS) {
                    COMPLAINT_SCORE
                } else {
                    0
                }
            }
            TriggerType::UrgentTimeline => {
                if analysis.urgency == Urgency::Critical {
                    URGENT_TIMELINE_SCORE
                } else {
                    0
                }
            }
            TriggerType::HighValue => {
                let purchase_intent =
                    matches!(analysis.intent, Intent::ReadyToBuy | Intent::PriceFocused);
                if (context.lead_score.total_score >= HIGH_VALUE_LEAD_SCORE && purchase_intent)
                    || any_term(&normalized, HIGH_VALUE_TERMS)
                {
                    HIGH_VALUE_SCORE
                } else {
                    0
                }
            }
            TriggerType::ComplexRequest => {
                if context.message.chars().count() > COMPLEX_MESSAGE_CHARS
                    || any_term(&normalized, COMPLEX_REQUEST_TERMS)
                {
                    COMPLEX_REQUEST_SCORE
                } else {
                    0
                }
            }
            TriggerType::CompetitorMention => {
                if any_term(&normalized, COMPETITOR_TERMS) {
                    COMPETITOR_SCORE
                } else {
                    0
                }
            }
        }
    }

    /// Evaluates the catalog in priority order. A trigger still cooling down for this
    /// conversation is skipped and evaluation moves on to the next one.
    pub fn evaluate(
        &self,
        context: &EscalationContext<'_>,
        now: DateTime<Utc>,
    ) -> Option<EscalationOutcome> {
        for trigger in self.triggers.triggers() {
            let score = self.score(trigger.trigger_type, context);
            if score == 0 || score < trigger.threshold {
                continue;
            }

            let key = (trigger.id.clone(), context.conversation_id.clone());
            {
                let mut last_fired = lock(&self.last_fired);
                if let Some(fired_at) = last_fired.get(&key) {
                    if still_cooling(*fired_at, trigger.cooldown_secs, now) {
                        continue;
                    }
                }
                last_fired.insert(key, now);
            }

            self.record_alert(trigger, context.conversation_id, score, now);
            return Some(EscalationOutcome { trigger: trigger.clone(), score, fired_at: now });
        }
        None
    }

    pub fn is_cooling_down(
        &self,
        trigger_id: &str,
        conversation_id: &ConversationId,
        now: DateTime<Utc>,
    ) -> bool {
        let Some(trigger) = self.triggers.get(trigger_id) else {
            return false;
        };
        lock(&self.last_fired)
            .get(&(trigger_id.to_string(), conversation_id.clone()))
            .is_some_and(|fired_at| still_cooling(*fired_at, trigger.cooldown_secs, now))
    }

    pub fn alerts(&self) -> Vec<EscalationAlert> {
        lock(&self.alerts).clone()
    }

    /// Hands recorded alerts to a monitoring job and clears the log.
    pub fn drain_alerts(&self) -> Vec<EscalationAlert> {
        std::mem::take(&mut *lock(&self.alerts))
    }

    fn record_alert(
        &self,
        trigger: &EscalationTrigger,
        conversation_id: &ConversationId,
        score: u8,
        fired_at: DateTime<Utc>,
    ) {
        let alert = EscalationAlert {
            id: Uuid::new_v4().to_string(),
            conversation_id: conversation_id.clone(),
            trigger_id: trigger.id.clone(),
            trigger_type: trigger.trigger_type,
            action: trigger.action,
            notification_required: trigger.notification_required,
            score,
            reason: trigger.reason.clone(),
            fired_at,
        };

        info!(
            event_name = "escalation.trigger.fired",
            conversation_id = %conversation_id,
            trigger_id = %trigger.id,
            trigger_type = trigger.trigger_type.as_str(),
            score,
            notification_required = trigger.notification_required,
            "escalation trigger fired"
        );

        lock(&self.alerts).push(alert);
    }
}

/// A cooldown end past the representable range never expires.
fn still_cooling(fired_at: DateTime<Utc>, cooldown_secs: i64, now: DateTime<Utc>) -> bool {
    match Duration::try_seconds(cooldown_secs).and_then(|span| fired_at.checked_add_signed(span)) {
        Some(until) => now < until,
        None => true,
    }
}

fn any_term(normalized: &str, terms: &[&str]) -> bool {
    terms.iter().any(|term| normalized.contains(term))
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
