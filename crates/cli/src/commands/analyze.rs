use std::path::PathBuf;

use clap::Args;
use closer_core::analysis::{AnalysisRequest, ConversationAnalyzer};
use closer_core::domain::conversation::ConversationId;

use super::{lead_context, load_history, require_message, CommandResult};

#[derive(Debug, Args)]
pub struct AnalyzeArgs {
    #[arg(long, help = "Inbound customer message to analyze")]
    pub message: String,
    #[arg(long, help = "JSON array of prior conversation messages")]
    pub history_file: Option<PathBuf>,
    #[arg(long, help = "Lead's full name")]
    pub lead_name: Option<String>,
    #[arg(long, help = "Vehicle the lead asked about")]
    pub vehicle: Option<String>,
    #[arg(long, default_value = "cli", help = "Conversation id recorded on the analysis")]
    pub conversation_id: String,
}

pub fn run(args: &AnalyzeArgs) -> CommandResult {
    if let Err(failure) = require_message("analyze", "--message", &args.message) {
        return failure;
    }
    let history = match load_history("analyze", args.history_file.as_deref()) {
        Ok(history) => history,
        Err(failure) => return failure,
    };

    let conversation_id = ConversationId(args.conversation_id.clone());
    let lead = lead_context(args.lead_name.as_deref(), args.vehicle.as_deref(), None);
    let analysis = ConversationAnalyzer::default().analyze(
        &AnalysisRequest::new(&conversation_id, &args.message)
            .with_history(&history)
            .with_lead(None, &lead),
    );

    CommandResult::success(
        "analyze",
        format!(
            "{} intent, {} urgency, {} buying signal(s)",
            analysis.intent.as_str(),
            analysis.urgency.as_str(),
            analysis.buying_signals.len()
        ),
        &analysis,
    )
}
