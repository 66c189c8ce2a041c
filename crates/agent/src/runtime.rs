//! Per-message pipeline: load context, analyze, route, then produce a reply, an escalation
//! payload or automated actions. Generation failures always fall back to a canned reply.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use closer_core::analysis::{AnalysisCache, AnalysisRequest, CacheKey, ConversationAnalyzer};
use closer_core::audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink, NoopAuditSink};
use closer_core::catalog::{vocabulary, SignalCatalog, TemplateCatalog, TriggerCatalog};
use closer_core::config::{AppConfig, PipelineConfig};
use closer_core::domain::conversation::{
    Conversation, ConversationAnalysis, ConversationId, ConversationMessage, Lead, LeadContext,
    LeadId, LeadScore,
};
use closer_core::domain::experiment::{
    LeadProfile, ResponseStrategy, Tone, VariantAssignment, VariantOutcome,
};
use closer_core::domain::quality::{LeadSegment, ResponseEffectivenessScore, ResponseImpact};
use closer_core::domain::routing::{RoutingDecision, RoutingPriority, RoutingType};
use closer_core::errors::ApplicationError;
use closer_core::escalation::EscalationTriggerSystem;
use closer_core::quality::{
    detect_topics, segment_for, PersonalizationSample, ResponseQualityOptimizer, ScoringInput,
};
use closer_core::routing::{
    automated_response, RoutingDecisionEngine, RoutingInput, TemplateMatch, TemplateMatcher,
};
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::{info, warn};
use uuid::Uuid;

use crate::collaborators::{ConversationStore, LeadScorer};
use crate::guardrails::{GuardrailDecision, GuardrailPolicy};
use crate::llm::{GenerationError, LlmClient};
use crate::prompts::{build_generation_request, first_name, PromptInput};

const RECENT_CUSTOMER_MESSAGES: usize = 5;
const ACTOR: &str = "agent-runtime";

/// Where the text of a reply came from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResponseSource {
    Generated { provider: String },
    Template { template_id: String },
    Automated { action: String },
    Fallback { reason_code: String, template_id: Option<String> },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestedResponse {
    pub text: String,
    pub source: ResponseSource,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadSummary {
    pub lead_id: LeadId,
    pub name: Option<String>,
    pub vehicle_interest: Option<String>,
    pub source: Option<String>,
    pub score: LeadScore,
}

/// Everything a salesperson needs to pick up an escalated conversation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationPayload {
    pub conversation_id: ConversationId,
    pub trigger_id: Option<String>,
    pub reason: String,
    pub priority: RoutingPriority,
    pub lead: LeadSummary,
    pub recent_customer_messages: Vec<String>,
    pub required_actions: Vec<String>,
    /// Sent to the customer while a person takes over.
    pub acknowledgment: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RouteOutcome {
    Suggested(SuggestedResponse),
    Escalation(EscalationPayload),
    Actions { required_actions: Vec<String>, response: SuggestedResponse },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteResponse {
    pub correlation_id: String,
    pub conversation_id: ConversationId,
    pub analysis: ConversationAnalysis,
    pub decision: RoutingDecision,
    pub outcome: RouteOutcome,
    pub next_steps: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OptimizedResponse {
    pub response_id: String,
    pub response: String,
    pub source: ResponseSource,
    pub variant_used: Option<VariantAssignment>,
    pub quality_score: ResponseEffectivenessScore,
}

/// What happened after a response went out.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseOutcome {
    pub conversation_id: ConversationId,
    pub response_id: Option<String>,
    pub response: String,
    pub original_message: String,
    /// The customer's next message, if they replied.
    pub follow_up: Option<String>,
    pub template_id: Option<String>,
    pub variant: Option<VariantAssignment>,
    pub converted: bool,
    pub escalated: bool,
    pub response_time_ms: Option<u64>,
}

impl ResponseOutcome {
    pub fn new(
        conversation_id: ConversationId,
        original_message: impl Into<String>,
        response: impl Into<String>,
    ) -> Self {
        Self {
            conversation_id,
            response_id: None,
            response: response.into(),
            original_message: original_message.into(),
            follow_up: None,
            template_id: None,
            variant: None,
            converted: false,
            escalated: false,
            response_time_ms: None,
        }
    }
}

struct GenerationContext<'a> {
    conversation_id: &'a ConversationId,
    correlation_id: &'a str,
    message: &'a str,
    loaded: &'a LoadedConversation,
    analysis: &'a ConversationAnalysis,
    strategy: &'a ResponseStrategy,
    best_template: Option<&'a TemplateMatch>,
}

struct LoadedConversation {
    conversation: Conversation,
    history: Vec<ConversationMessage>,
    lead: Lead,
    lead_context: LeadContext,
    lead_score: LeadScore,
}

pub struct AgentRuntime {
    pipeline: PipelineConfig,
    store: Arc<dyn ConversationStore>,
    lead_scorer: Arc<dyn LeadScorer>,
    llm: Arc<dyn LlmClient>,
    analyzer: ConversationAnalyzer,
    router: RoutingDecisionEngine,
    optimizer: Arc<ResponseQualityOptimizer>,
    cache: AnalysisCache,
    guardrails: GuardrailPolicy,
    audit: Arc<dyn AuditSink>,
    sample_limit: usize,
    samples: Mutex<Vec<PersonalizationSample>>,
}

impl AgentRuntime {
    pub fn new(
        config: &AppConfig,
        store: Arc<dyn ConversationStore>,
        lead_scorer: Arc<dyn LeadScorer>,
        llm: Arc<dyn LlmClient>,
    ) -> Self {
        let signals = SignalCatalog::default();
        let cooldown_secs = i64::try_from(config.escalation.default_cooldown_secs).unwrap_or(i64::MAX);
        let escalation = Arc::new(EscalationTriggerSystem::new(
            TriggerCatalog::with_cooldown(cooldown_secs),
            signals.clone(),
        ));
        let matcher = TemplateMatcher::new(Arc::new(TemplateCatalog::default()));

        Self {
            pipeline: config.pipeline.clone(),
            store,
            lead_scorer,
            llm,
            analyzer: ConversationAnalyzer::new(signals),
            router: RoutingDecisionEngine::new(config.routing, escalation, matcher),
            optimizer: Arc::new(ResponseQualityOptimizer::new(config.quality, Utc::now())),
            cache: AnalysisCache::new(config.pipeline.analysis_cache_entries),
            guardrails: GuardrailPolicy::default(),
            audit: Arc::new(NoopAuditSink),
            sample_limit: config.quality.score_history_limit,
            samples: Mutex::new(Vec::new()),
        }
    }

    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_guardrails(mut self, guardrails: GuardrailPolicy) -> Self {
        self.guardrails = guardrails;
        self
    }

    /// Swaps the stock template library for `catalog`, keeping the routing config and
    /// escalation state already in place.
    pub fn with_template_catalog(mut self, catalog: TemplateCatalog) -> Self {
        self.router = RoutingDecisionEngine::new(
            self.router.config(),
            Arc::clone(self.router.escalation()),
            TemplateMatcher::new(Arc::new(catalog)),
        );
        self
    }

    pub fn router(&self) -> &RoutingDecisionEngine {
        &self.router
    }

    pub fn optimizer(&self) -> &Arc<ResponseQualityOptimizer> {
        &self.optimizer
    }

    /// Decides how to answer one inbound message and produces the matching payload.
    pub async fn route(
        &self,
        conversation_id: &ConversationId,
        message: &str,
        sender_id: Option<&str>,
    ) -> Result<RouteResponse, ApplicationError> {
        let correlation_id = Uuid::new_v4().to_string();
        let loaded = self.load(conversation_id).await?;
        let analysis = self.analyze(conversation_id, message, &loaded);

        let result = self.router.route(
            &RoutingInput {
                conversation_id,
                message,
                analysis: &analysis,
                lead_score: loaded.lead_score,
                lead: &loaded.lead_context,
                history_len: loaded.history.len(),
            },
            Utc::now(),
        );
        let decision = result.decision.clone();

        self.audit.emit(
            AuditEvent::new(
                Some(conversation_id.clone()),
                &correlation_id,
                "routing.decision.made",
                AuditCategory::Routing,
                sender_id.unwrap_or(ACTOR),
                AuditOutcome::Success,
            )
            .with_metadata("routing_type", decision.routing_type.as_str())
            .with_metadata("priority", decision.priority.as_str())
            .with_metadata("confidence", decision.confidence.to_string()),
        );

        let outcome = match decision.routing_type {
            RoutingType::HumanEscalation => {
                let trigger = result.escalation.as_ref().map(|outcome| &outcome.trigger);
                let payload =
                    self.escalation_payload(&loaded, message, &decision, trigger.map(|t| t.id.clone()));
                self.audit.emit(
                    AuditEvent::new(
                        Some(conversation_id.clone()),
                        &correlation_id,
                        "escalation.trigger.fired",
                        AuditCategory::Escalation,
                        ACTOR,
                        AuditOutcome::Success,
                    )
                    .with_metadata("trigger_id", payload.trigger_id.clone().unwrap_or_default())
                    .with_metadata("priority", payload.priority.as_str()),
                );
                RouteOutcome::Escalation(payload)
            }
            RoutingType::AutomatedAction => {
                let action = decision.required_actions.first().cloned().unwrap_or_default();
                let text = automated_response(&action)
                    .map(str::to_string)
                    .unwrap_or_else(|| self.pipeline.fallback_response.clone());
                RouteOutcome::Actions {
                    required_actions: decision.required_actions.clone(),
                    response: SuggestedResponse { text, source: ResponseSource::Automated { action } },
                }
            }
            RoutingType::TemplateBased => {
                let reply = match result.template_match.as_ref() {
                    Some(template_match) => self.render_template(template_match, &loaded.lead_context),
                    None => None,
                };
                let reply = match reply {
                    Some(reply) => reply,
                    None => self.fallback_reply(
                        conversation_id,
                        &correlation_id,
                        "template_render_failed",
                        None,
                        &loaded.lead_context,
                    ),
                };
                RouteOutcome::Suggested(reply)
            }
            RoutingType::AiGenerated => {
                let strategy = ResponseStrategy::default();
                let reply = self
                    .generate_reply(&GenerationContext {
                        conversation_id,
                        correlation_id: &correlation_id,
                        message,
                        loaded: &loaded,
                        analysis: &analysis,
                        strategy: &strategy,
                        best_template: result.template_match.as_ref(),
                    })
                    .await;
                RouteOutcome::Suggested(reply)
            }
        };

        Ok(RouteResponse {
            correlation_id,
            conversation_id: conversation_id.clone(),
            next_steps: analysis.next_steps.clone(),
            analysis,
            decision,
            outcome,
        })
    }

    /// Generates a reply shaped by the lead's A/B variant and segment profile, and previews
    /// its quality. `context` overrides the stored lead profile when given.
    pub async fn get_optimized_response(
        &self,
        conversation_id: &ConversationId,
        message: &str,
        context: Option<LeadContext>,
    ) -> Result<OptimizedResponse, ApplicationError> {
        let correlation_id = Uuid::new_v4().to_string();
        let mut loaded = self.load(conversation_id).await?;
        let analysis = match context {
            // Cached entries were built from the stored profile.
            Some(context) => {
                loaded.lead_context = context;
                self.analyze_uncached(conversation_id, message, &loaded)
            }
            None => self.analyze(conversation_id, message, &loaded),
        };

        let lead_profile = LeadProfile {
            source: loaded.lead_context.source.clone(),
            vehicle_interest: loaded.lead_context.vehicle_interest.clone(),
            score: loaded.lead_score.total_score,
        };
        let variant = self.optimizer.select_variant(&lead_profile);
        let strategy = variant.as_ref().map(|assignment| assignment.strategy.clone()).unwrap_or_default();
        let best_template =
            self.router.matcher().best_match(message, analysis.intent, &loaded.lead_context);

        let reply = self
            .generate_reply(&GenerationContext {
                conversation_id,
                correlation_id: &correlation_id,
                message,
                loaded: &loaded,
                analysis: &analysis,
                strategy: &strategy,
                best_template: Some(&best_template),
            })
            .await;

        let now = Utc::now();
        let response_id = Uuid::new_v4().to_string();
        let quality_score = self.optimizer.assess(
            &ScoringInput {
                response_id: Some(&response_id),
                conversation_id,
                response: &reply.text,
                original_message: message,
                lead: &loaded.lead_context,
                impact: ResponseImpact::default(),
            },
            now,
        );

        Ok(OptimizedResponse {
            response_id,
            response: reply.text,
            source: reply.source,
            variant_used: variant,
            quality_score,
        })
    }

    /// Scores a sent response against what happened next and feeds every learning loop:
    /// score history, template effectiveness, A/B counters and personalization samples.
    pub async fn record_response_outcome(
        &self,
        outcome: ResponseOutcome,
    ) -> Result<ResponseEffectivenessScore, ApplicationError> {
        let loaded = self.load(&outcome.conversation_id).await?;
        let before = self.analyze(&outcome.conversation_id, &outcome.original_message, &loaded);
        let after = outcome.follow_up.as_deref().map(|follow_up| {
            let mut history = loaded.history.clone();
            let now = Utc::now();
            history.push(ConversationMessage::customer(outcome.original_message.clone(), now));
            history.push(ConversationMessage::agent(outcome.response.clone(), now));
            self.analyzer.analyze(
                &AnalysisRequest::new(&outcome.conversation_id, follow_up)
                    .with_history(&history)
                    .with_lead(Some(&loaded.lead.id), &loaded.lead_context),
            )
        });
        let impact = ResponseImpact::between(&before, loaded.history.len(), after.as_ref());

        let now = Utc::now();
        let score = self.optimizer.score_response(
            &ScoringInput {
                response_id: outcome.response_id.as_deref(),
                conversation_id: &outcome.conversation_id,
                response: &outcome.response,
                original_message: &outcome.original_message,
                lead: &loaded.lead_context,
                impact,
            },
            now,
        );

        if let Some(template_id) = outcome.template_id.as_deref() {
            if !score.degraded {
                self.router.matcher().catalog().record_feedback(template_id, score.overall);
            }
        }

        if let Some(assignment) = outcome.variant.as_ref() {
            self.record_variant_outcome(
                assignment,
                VariantOutcome {
                    impression: true,
                    responded: outcome.follow_up.is_some(),
                    converted: outcome.converted,
                    escalated: outcome.escalated,
                    response_time_ms: outcome.response_time_ms,
                },
                now,
            );
        }

        if !score.degraded {
            let tone = outcome.variant.as_ref().map(|assignment| assignment.strategy.tone);
            self.push_sample(personalization_sample(&outcome.response, &loaded.lead_context, tone, score.overall));
        }

        self.audit.emit(
            AuditEvent::new(
                Some(outcome.conversation_id.clone()),
                score.response_id.clone(),
                "response.outcome.recorded",
                AuditCategory::Quality,
                ACTOR,
                if score.degraded { AuditOutcome::Degraded } else { AuditOutcome::Success },
            )
            .with_metadata("overall", score.overall.to_string())
            .with_metadata("benchmark", score.benchmark.as_str()),
        );

        Ok(score)
    }

    /// Re-tunes segment profiles from every sample gathered so far.
    pub fn retune_personalization(&self, now: DateTime<Utc>) -> Vec<LeadSegment> {
        let samples = self.samples().clone();
        self.optimizer.retune_personalization(&samples, now)
    }

    async fn load(&self, conversation_id: &ConversationId) -> Result<LoadedConversation, ApplicationError> {
        let conversation = self
            .store
            .conversation(conversation_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("conversation", conversation_id.0.clone()))?;
        let history = self.store.messages(conversation_id).await?;
        let lead = self
            .store
            .lead(&conversation.lead_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("lead", conversation.lead_id.0.clone()))?;

        let lead_score = match self.lead_scorer.score(&lead.id).await {
            Ok(score) => score,
            Err(error) => {
                warn!(
                    event_name = "lead_scoring.unavailable",
                    conversation_id = %conversation_id,
                    lead_id = %lead.id,
                    error = %error,
                    "lead scoring failed, treating lead as cold"
                );
                LeadScore::default()
            }
        };

        let lead_context = LeadContext::from(&lead);
        Ok(LoadedConversation { conversation, history, lead, lead_context, lead_score })
    }

    fn analyze(
        &self,
        conversation_id: &ConversationId,
        message: &str,
        loaded: &LoadedConversation,
    ) -> ConversationAnalysis {
        let key = CacheKey::new(conversation_id, message, loaded.history.len());
        self.cache.get_or_insert_with(key, || self.analyze_uncached(conversation_id, message, loaded))
    }

    fn analyze_uncached(
        &self,
        conversation_id: &ConversationId,
        message: &str,
        loaded: &LoadedConversation,
    ) -> ConversationAnalysis {
        self.analyzer.analyze(
            &AnalysisRequest::new(conversation_id, message)
                .with_history(&loaded.history)
                .with_lead(Some(&loaded.conversation.lead_id), &loaded.lead_context),
        )
    }

    async fn generate_reply(&self, context: &GenerationContext<'_>) -> SuggestedResponse {
        let GenerationContext { conversation_id, correlation_id, loaded, .. } = *context;
        let segment = segment_for(loaded.lead_context.vehicle_interest.as_deref());
        let profile = self.optimizer.personalization_profile(segment);
        let request = build_generation_request(&PromptInput {
            message: context.message,
            history: &loaded.history,
            analysis: context.analysis,
            lead: &loaded.lead_context,
            strategy: context.strategy,
            profile: &profile,
        });

        let timeout_ms = self.pipeline.generation_timeout_ms;
        let generated = match timeout(Duration::from_millis(timeout_ms), self.llm.generate(&request)).await {
            Ok(result) => result,
            Err(_) => Err(GenerationError::Timeout(timeout_ms)),
        };

        let reason_code = match generated {
            Ok(text) => match self.guardrails.evaluate(&text, request.max_chars) {
                GuardrailDecision::Allow => {
                    return SuggestedResponse {
                        text,
                        source: ResponseSource::Generated { provider: self.llm.name().to_string() },
                    };
                }
                GuardrailDecision::Degrade { reason_code, .. } => reason_code,
            },
            Err(error) => {
                warn!(
                    event_name = "generation.failed",
                    conversation_id = %conversation_id,
                    correlation_id,
                    provider = self.llm.name(),
                    error = %error,
                    "generation call failed"
                );
                error.reason_code()
            }
        };

        let template = context.best_template.filter(|template_match| template_match.score > 0);
        self.fallback_reply(conversation_id, correlation_id, reason_code, template, &loaded.lead_context)
    }

    /// Best positive-scoring template if one renders, else the configured acknowledgment.
    fn fallback_reply(
        &self,
        conversation_id: &ConversationId,
        correlation_id: &str,
        reason_code: &str,
        template: Option<&TemplateMatch>,
        lead: &LeadContext,
    ) -> SuggestedResponse {
        let rendered = template.and_then(|template_match| {
            self.render_template(template_match, lead).map(|reply| (template_match.template_id().to_string(), reply))
        });
        let (text, template_id) = match rendered {
            Some((template_id, reply)) => (reply.text, Some(template_id)),
            None => (self.pipeline.fallback_response.clone(), None),
        };

        warn!(
            event_name = "generation.fallback.used",
            conversation_id = %conversation_id,
            correlation_id,
            reason_code,
            template_id = template_id.as_deref().unwrap_or(""),
            "falling back to a canned reply"
        );
        self.audit.emit(
            AuditEvent::new(
                Some(conversation_id.clone()),
                correlation_id,
                "generation.fallback.used",
                AuditCategory::Generation,
                ACTOR,
                AuditOutcome::Degraded,
            )
            .with_metadata("reason_code", reason_code)
            .with_metadata("template_id", template_id.clone().unwrap_or_default()),
        );

        SuggestedResponse {
            text,
            source: ResponseSource::Fallback { reason_code: reason_code.to_string(), template_id },
        }
    }

    fn render_template(&self, template_match: &TemplateMatch, lead: &LeadContext) -> Option<SuggestedResponse> {
        match template_match.template.render(&template_values(lead)) {
            Ok(text) => Some(SuggestedResponse {
                text,
                source: ResponseSource::Template { template_id: template_match.template_id().to_string() },
            }),
            Err(error) => {
                warn!(
                    event_name = "template.render.failed",
                    template_id = template_match.template_id(),
                    error = %error,
                    "template failed to render"
                );
                None
            }
        }
    }

    fn escalation_payload(
        &self,
        loaded: &LoadedConversation,
        inbound: &str,
        decision: &RoutingDecision,
        trigger_id: Option<String>,
    ) -> EscalationPayload {
        let mut recent_customer_messages: Vec<String> = loaded
            .history
            .iter()
            .filter(|message| !message.is_from_agent)
            .map(|message| message.content.clone())
            .collect();
        recent_customer_messages.push(inbound.to_string());
        let skip = recent_customer_messages.len().saturating_sub(RECENT_CUSTOMER_MESSAGES);
        recent_customer_messages.drain(..skip);

        let greeting = match first_name(&loaded.lead_context) {
            Some(name) => format!("Thanks, {name}!"),
            None => "Thanks!".to_string(),
        };
        let timing = match decision.priority {
            RoutingPriority::Immediate | RoutingPriority::Urgent => "right away",
            RoutingPriority::Normal | RoutingPriority::Low => "shortly",
        };

        EscalationPayload {
            conversation_id: loaded.conversation.id.clone(),
            trigger_id,
            reason: decision.escalation_reason.clone().unwrap_or_else(|| decision.reasoning.clone()),
            priority: decision.priority,
            lead: LeadSummary {
                lead_id: loaded.lead.id.clone(),
                name: loaded.lead.name.clone(),
                vehicle_interest: loaded.lead.vehicle_interest.clone(),
                source: loaded.lead.source.clone(),
                score: loaded.lead_score,
            },
            recent_customer_messages,
            required_actions: decision.required_actions.clone(),
            acknowledgment: format!(
                "{greeting} I'm bringing in a member of our sales team who will reach out {timing}."
            ),
        }
    }

    fn record_variant_outcome(&self, assignment: &VariantAssignment, outcome: VariantOutcome, now: DateTime<Utc>) {
        if let Err(error) =
            self.optimizer.update_ab_test_results(&assignment.test_id, &assignment.variant_id, outcome, now)
        {
            warn!(
                event_name = "experiment.outcome.rejected",
                test_id = %assignment.test_id,
                variant_id = %assignment.variant_id,
                error = %error,
                "A/B outcome was not recorded"
            );
        }
    }

    fn push_sample(&self, sample: PersonalizationSample) {
        let mut samples = self.samples();
        samples.push(sample);
        let overflow = samples.len().saturating_sub(self.sample_limit);
        if overflow > 0 {
            samples.drain(..overflow);
        }
        info!(
            event_name = "quality.personalization.sample_recorded",
            segment = samples.last().map(|sample| sample.segment.as_str()).unwrap_or(""),
            buffered = samples.len(),
            "personalization sample recorded"
        );
    }

    fn samples(&self) -> MutexGuard<'_, Vec<PersonalizationSample>> {
        match self.samples.lock() {
            Ok(samples) => samples,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn template_values(lead: &LeadContext) -> HashMap<String, String> {
    let mut values = HashMap::new();
    if let Some(name) = first_name(lead) {
        values.insert("customer_name".to_string(), name.to_string());
    }
    if let Some(vehicle) = lead.vehicle_interest.as_deref() {
        values.insert("vehicle".to_string(), vehicle.to_string());
    }
    values
}

fn personalization_sample(
    response: &str,
    lead: &LeadContext,
    tone: Option<Tone>,
    score: u8,
) -> PersonalizationSample {
    let padded = vocabulary::word_padded(response);
    let used_name = first_name(lead).is_some_and(|name| vocabulary::contains_phrase(&padded, &name.to_lowercase()));
    let referenced_vehicle = lead.vehicle_interest.as_deref().is_some_and(|vehicle| {
        vocabulary::word_padded(vehicle)
            .split_whitespace()
            .filter(|word| word.len() >= 3 && !word.chars().all(|ch| ch.is_ascii_digit()))
            .any(|word| vocabulary::contains_phrase(&padded, word))
    });

    PersonalizationSample {
        segment: segment_for(lead.vehicle_interest.as_deref()),
        used_name,
        referenced_vehicle,
        tone: tone.unwrap_or(Tone::Friendly),
        topics: detect_topics(response),
        score,
    }
}
