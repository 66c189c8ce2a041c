use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::Args;
use closer_core::domain::quality::ResponseEffectivenessScore;
use closer_core::quality::QualityMonitor;

use super::{load_config, read_json, CommandResult};

#[derive(Debug, Args)]
pub struct MonitorArgs {
    #[arg(long, help = "JSON array of recorded effectiveness scores")]
    pub scores_file: PathBuf,
    #[arg(long, help = "Trend window in hours (defaults to quality.trend_window_hours)")]
    pub window_hours: Option<u64>,
    #[arg(long, help = "End of the current window as RFC 3339 (defaults to now)")]
    pub now: Option<DateTime<Utc>>,
}

pub fn run(args: &MonitorArgs) -> CommandResult {
    let config = match load_config("monitor") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let scores: Vec<ResponseEffectivenessScore> = match read_json("monitor", &args.scores_file) {
        Ok(scores) => scores,
        Err(failure) => return failure,
    };
    let window_hours = args.window_hours.unwrap_or(config.quality.trend_window_hours);
    if window_hours == 0 {
        return CommandResult::invalid_input("monitor", "--window-hours must be positive");
    }

    let monitor = QualityMonitor::new(config.quality.industry_average, window_hours);
    let report = monitor.analyze(&scores, args.now.unwrap_or_else(Utc::now));

    CommandResult::success(
        "monitor",
        format!("{} trend, {} alert(s)", report.trend.as_str(), report.alerts.len()),
        &report,
    )
}
