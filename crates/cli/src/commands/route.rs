use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use clap::Args;
use closer_agent::priority_tier_for;
use closer_core::analysis::{AnalysisRequest, ConversationAnalyzer};
use closer_core::catalog::{SignalCatalog, TemplateCatalog, TriggerCatalog};
use closer_core::config::AppConfig;
use closer_core::domain::conversation::{ConversationAnalysis, ConversationId, LeadContext, LeadScore};
use closer_core::domain::routing::{RoutingDecision, RoutingType};
use closer_core::escalation::EscalationTriggerSystem;
use closer_core::routing::{
    automated_response, RoutingDecisionEngine, RoutingInput, TemplateMatch, TemplateMatcher,
};
use serde::Serialize;

use super::{lead_context, load_config, load_history, require_message, CommandResult};

#[derive(Debug, Args)]
pub struct RouteArgs {
    #[arg(long, help = "Inbound customer message to route")]
    pub message: String,
    #[arg(long, help = "JSON array of prior conversation messages")]
    pub history_file: Option<PathBuf>,
    #[arg(long, help = "Lead's full name")]
    pub lead_name: Option<String>,
    #[arg(long, help = "Vehicle the lead asked about")]
    pub vehicle: Option<String>,
    #[arg(long, help = "Channel the lead came from")]
    pub source: Option<String>,
    #[arg(
        long,
        default_value_t = 30,
        value_parser = clap::value_parser!(u8).range(0..=100),
        help = "Lead score from 0 to 100"
    )]
    pub lead_score: u8,
}

#[derive(Debug, Serialize)]
struct TemplateSummary {
    template_id: String,
    score: u8,
    matched_conditions: Vec<String>,
}

#[derive(Debug, Serialize)]
struct RouteReport {
    analysis: ConversationAnalysis,
    decision: RoutingDecision,
    lead_score: LeadScore,
    escalation_trigger: Option<String>,
    best_template: Option<TemplateSummary>,
    /// Reply text for template and automated routes.
    preview: Option<String>,
}

pub fn run(args: &RouteArgs) -> CommandResult {
    if let Err(failure) = require_message("route", "--message", &args.message) {
        return failure;
    }
    let config = match load_config("route") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let history = match load_history("route", args.history_file.as_deref()) {
        Ok(history) => history,
        Err(failure) => return failure,
    };

    let conversation_id = ConversationId("cli".to_string());
    let lead = lead_context(args.lead_name.as_deref(), args.vehicle.as_deref(), args.source.as_deref());
    let lead_score = LeadScore::new(args.lead_score, priority_tier_for(args.lead_score));
    let signals = SignalCatalog::default();
    let analysis = ConversationAnalyzer::new(signals.clone()).analyze(
        &AnalysisRequest::new(&conversation_id, &args.message)
            .with_history(&history)
            .with_lead(None, &lead),
    );

    let router = dry_run_router(&config, signals);
    let result = router.route(
        &RoutingInput {
            conversation_id: &conversation_id,
            message: &args.message,
            analysis: &analysis,
            lead_score,
            lead: &lead,
            history_len: history.len(),
        },
        Utc::now(),
    );

    let preview = match result.decision.routing_type {
        RoutingType::TemplateBased => result.template_match.as_ref().and_then(|best| render(best, &lead)),
        RoutingType::AutomatedAction => result
            .decision
            .required_actions
            .first()
            .and_then(|action| automated_response(action))
            .map(str::to_string),
        RoutingType::AiGenerated | RoutingType::HumanEscalation => None,
    };

    let message = format!(
        "{} with {} priority (confidence {})",
        result.decision.routing_type.as_str(),
        result.decision.priority.as_str(),
        result.decision.confidence
    );
    let report = RouteReport {
        analysis,
        lead_score,
        escalation_trigger: result.escalation.as_ref().map(|outcome| outcome.trigger.id.clone()),
        best_template: result.template_match.as_ref().map(|best| TemplateSummary {
            template_id: best.template_id().to_string(),
            score: best.score,
            matched_conditions: best.matched_conditions.clone(),
        }),
        preview,
        decision: result.decision,
    };
    CommandResult::success("route", message, &report)
}

fn dry_run_router(config: &AppConfig, signals: SignalCatalog) -> RoutingDecisionEngine {
    let cooldown_secs = i64::try_from(config.escalation.default_cooldown_secs).unwrap_or(i64::MAX);
    let escalation = EscalationTriggerSystem::new(TriggerCatalog::with_cooldown(cooldown_secs), signals);
    RoutingDecisionEngine::new(
        config.routing,
        Arc::new(escalation),
        TemplateMatcher::new(Arc::new(TemplateCatalog::default())),
    )
}

fn render(best: &TemplateMatch, lead: &LeadContext) -> Option<String> {
    let mut values = HashMap::new();
    if let Some(name) = lead.name.as_deref().and_then(|name| name.split_whitespace().next()) {
        values.insert("customer_name".to_string(), name.to_string());
    }
    if let Some(vehicle) = lead.vehicle_interest.as_deref() {
        values.insert("vehicle".to_string(), vehicle.to_string());
    }
    best.template.render(&values).ok()
}
