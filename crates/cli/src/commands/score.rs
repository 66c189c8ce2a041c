use chrono::Utc;
use clap::Args;
use closer_core::analysis::{AnalysisRequest, ConversationAnalyzer};
use closer_core::domain::conversation::{ConversationId, ConversationMessage};
use closer_core::domain::quality::ResponseImpact;
use closer_core::quality::{EffectivenessScorer, ScoringInput};

use super::{lead_context, load_config, require_message, CommandResult};

#[derive(Debug, Args)]
pub struct ScoreArgs {
    #[arg(long, help = "Customer message the response answered")]
    pub message: String,
    #[arg(long, help = "Response text to score")]
    pub response: String,
    #[arg(long, help = "Customer's next message, if they replied")]
    pub follow_up: Option<String>,
    #[arg(long, help = "Lead's full name")]
    pub lead_name: Option<String>,
    #[arg(long, help = "Vehicle the lead asked about")]
    pub vehicle: Option<String>,
}

pub fn run(args: &ScoreArgs) -> CommandResult {
    if let Err(failure) = require_message("score", "--message", &args.message) {
        return failure;
    }
    let config = match load_config("score") {
        Ok(config) => config,
        Err(failure) => return failure,
    };

    let conversation_id = ConversationId("cli".to_string());
    let lead = lead_context(args.lead_name.as_deref(), args.vehicle.as_deref(), None);
    let analyzer = ConversationAnalyzer::default();
    let before = analyzer
        .analyze(&AnalysisRequest::new(&conversation_id, &args.message).with_lead(None, &lead));

    let now = Utc::now();
    let exchange = [
        ConversationMessage::customer(args.message.clone(), now),
        ConversationMessage::agent(args.response.clone(), now),
    ];
    let after = args.follow_up.as_deref().map(|follow_up| {
        analyzer.analyze(
            &AnalysisRequest::new(&conversation_id, follow_up)
                .with_history(&exchange)
                .with_lead(None, &lead),
        )
    });
    let impact = ResponseImpact::between(&before, 0, after.as_ref());

    let scorer = EffectivenessScorer::new(config.quality.industry_average, config.quality.top_performer);
    let input = ScoringInput {
        response_id: None,
        conversation_id: &conversation_id,
        response: &args.response,
        original_message: &args.message,
        lead: &lead,
        impact,
    };
    match scorer.score(&input, now) {
        Ok(score) => CommandResult::success(
            "score",
            format!("overall {} ({})", score.overall, score.benchmark.as_str()),
            &score,
        ),
        Err(error) => CommandResult::invalid_input("score", error.to_string()),
    }
}
