//! Routing: one decision per inbound message.
//!
//! Evaluation order is escalation, automated action, template, then generation. The first
//! applicable step wins.

mod matcher;
mod metrics;

pub use matcher::{category_relevance, TemplateMatch, TemplateMatcher};
pub use metrics::{RoutingMetrics, RoutingMetricsSnapshot};

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::catalog::vocabulary::{self, ACKNOWLEDGMENT_ACTION, ACKNOWLEDGMENT_PHRASES, AUTOMATED_ACTIONS};
use crate::config::RoutingConfig;
use crate::domain::conversation::{
    ConversationAnalysis, ConversationId, LeadContext, LeadScore, PriorityTier, Urgency,
};
use crate::domain::routing::{RoutingDecision, RoutingPriority, RoutingType};
use crate::escalation::{EscalationContext, EscalationOutcome, EscalationTriggerSystem};

const AI_BASE_CONFIDENCE: u8 = 70;
const AI_MAX_CONFIDENCE: u8 = 95;
const ACKNOWLEDGMENT_MAX_WORDS: usize = 5;

/// Canned reply for an automated action.
pub fn automated_response(action: &str) -> Option<&'static str> {
    match action {
        "send_hours_info" => Some(
            "Our showroom is open Monday through Saturday from 9am to 8pm and Sunday from 11am \
             to 5pm. Would you like to set up a time to stop by?",
        ),
        "send_location_info" => Some(
            "I'll send over our address and directions right away. Would you like me to \
             schedule a time for your visit?",
        ),
        ACKNOWLEDGMENT_ACTION => {
            Some("You're welcome! Just reply here whenever you have another question.")
        }
        _ => None,
    }
}

/// Everything the router looks at for one message.
#[derive(Clone, Copy, Debug)]
pub struct RoutingInput<'a> {
    pub conversation_id: &'a ConversationId,
    pub message: &'a str,
    pub analysis: &'a ConversationAnalysis,
    pub lead_score: LeadScore,
    pub lead: &'a LeadContext,
    /// Prior messages in the conversation, both sides.
    pub history_len: usize,
}

/// The decision plus the evidence behind it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingResult {
    pub decision: RoutingDecision,
    pub escalation: Option<EscalationOutcome>,
    pub template_match: Option<TemplateMatch>,
}

/// Priority for an escalation from urgency and lead tier.
pub fn escalation_priority(urgency: Urgency, tier: PriorityTier) -> RoutingPriority {
    if urgency == Urgency::Critical || tier == PriorityTier::Hot {
        RoutingPriority::Immediate
    } else if urgency == Urgency::High || tier == PriorityTier::Warm {
        RoutingPriority::Urgent
    } else {
        RoutingPriority::Normal
    }
}

/// First automated action whose pattern matches, then the acknowledgment check.
pub fn detect_automated_action(message: &str) -> Option<&'static str> {
    let padded = vocabulary::word_padded(message);
    if let Some((action, _)) = AUTOMATED_ACTIONS
        .iter()
        .find(|(_, phrases)| phrases.iter().any(|phrase| vocabulary::contains_phrase(&padded, phrase)))
    {
        return Some(action);
    }

    let word_count = padded.split_whitespace().count();
    let acknowledgment_only = word_count > 0
        && word_count <= ACKNOWLEDGMENT_MAX_WORDS
        && !message.contains('?')
        && ACKNOWLEDGMENT_PHRASES.iter().any(|phrase| vocabulary::contains_phrase(&padded, phrase));
    acknowledgment_only.then_some(ACKNOWLEDGMENT_ACTION)
}

pub struct RoutingDecisionEngine {
    config: RoutingConfig,
    escalation: Arc<EscalationTriggerSystem>,
    matcher: TemplateMatcher,
    metrics: RoutingMetrics,
}

impl RoutingDecisionEngine {
    pub fn new(
        config: RoutingConfig,
        escalation: Arc<EscalationTriggerSystem>,
        matcher: TemplateMatcher,
    ) -> Self {
        Self { config, escalation, matcher, metrics: RoutingMetrics::default() }
    }

    pub fn config(&self) -> RoutingConfig {
        self.config
    }

    pub fn escalation(&self) -> &Arc<EscalationTriggerSystem> {
        &self.escalation
    }

    pub fn matcher(&self) -> &TemplateMatcher {
        &self.matcher
    }

    pub fn metrics(&self) -> RoutingMetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn route(&self, input: &RoutingInput<'_>, now: DateTime<Utc>) -> RoutingResult {
        let result = self.decide(input, now);
        self.metrics.record(result.decision.routing_type);

        info!(
            event_name = "routing.decision.made",
            conversation_id = %input.conversation_id,
            routing_type = result.decision.routing_type.as_str(),
            confidence = result.decision.confidence,
            priority = result.decision.priority.as_str(),
            template_id = result.decision.template_id.as_deref().unwrap_or(""),
            "routing decision made"
        );

        result
    }

    fn decide(&self, input: &RoutingInput<'_>, now: DateTime<Utc>) -> RoutingResult {
        let escalation_context = EscalationContext {
            conversation_id: input.conversation_id,
            message: input.message,
            analysis: input.analysis,
            lead_score: input.lead_score,
        };
        if let Some(outcome) = self.escalation.evaluate(&escalation_context, now) {
            let decision = escalation_decision(input, &outcome);
            return RoutingResult { decision, escalation: Some(outcome), template_match: None };
        }

        if let Some(action) = detect_automated_action(input.message) {
            let decision = RoutingDecision {
                routing_type: RoutingType::AutomatedAction,
                confidence: self.config.automated_action_confidence,
                reasoning: format!("message matches the `{action}` automated action"),
                template_id: None,
                escalation_reason: None,
                required_actions: vec![action.to_string()],
                priority: standard_priority(input),
            };
            return RoutingResult { decision, escalation: None, template_match: None };
        }

        let best = self.matcher.best_match(input.message, input.analysis.intent, input.lead);
        if best.score > self.config.template_threshold {
            let decision = RoutingDecision {
                routing_type: RoutingType::TemplateBased,
                confidence: best.score,
                reasoning: format!(
                    "template `{}` scored {} for {} intent",
                    best.template_id(),
                    best.score,
                    input.analysis.intent.as_str()
                ),
                template_id: Some(best.template.id.clone()),
                escalation_reason: None,
                required_actions: Vec::new(),
                priority: standard_priority(input),
            };
            return RoutingResult { decision, escalation: None, template_match: Some(best) };
        }

        let decision = RoutingDecision {
            routing_type: RoutingType::AiGenerated,
            confidence: generation_confidence(input),
            reasoning: format!(
                "no escalation or automated action applies and the best template `{}` scored {} \
                 (threshold {}), generating a tailored reply",
                best.template_id(),
                best.score,
                self.config.template_threshold
            ),
            template_id: None,
            escalation_reason: None,
            required_actions: Vec::new(),
            priority: standard_priority(input),
        };
        RoutingResult { decision, escalation: None, template_match: Some(best) }
    }
}

fn escalation_decision(input: &RoutingInput<'_>, outcome: &EscalationOutcome) -> RoutingDecision {
    let mut priority = escalation_priority(input.analysis.urgency, input.lead_score.priority_tier);
    if outcome.is_immediate() {
        priority = priority.min(RoutingPriority::Urgent);
    }

    let mut required_actions = Vec::new();
    if outcome.trigger.notification_required {
        required_actions.push("notify_sales_team".to_string());
    }
    required_actions.push("send_escalation_acknowledgment".to_string());

    RoutingDecision {
        routing_type: RoutingType::HumanEscalation,
        confidence: outcome.score,
        reasoning: format!(
            "escalation trigger `{}` fired with score {} (threshold {})",
            outcome.trigger.id, outcome.score, outcome.trigger.threshold
        ),
        template_id: None,
        escalation_reason: Some(outcome.trigger.reason.clone()),
        required_actions,
        priority,
    }
}

fn standard_priority(input: &RoutingInput<'_>) -> RoutingPriority {
    if input.lead_score.priority_tier == PriorityTier::Cold && input.analysis.urgency == Urgency::Low {
        RoutingPriority::Low
    } else {
        RoutingPriority::Normal
    }
}

fn generation_confidence(input: &RoutingInput<'_>) -> u8 {
    let mut confidence = AI_BASE_CONFIDENCE;
    if input.lead_score.priority_tier == PriorityTier::Hot {
        confidence += 10;
    }
    if input.history_len > 3 {
        confidence += 5;
    }
    if (50..=300).contains(&input.message.chars().count()) {
        confidence += 5;
    }
    confidence.min(AI_MAX_CONFIDENCE)
}
