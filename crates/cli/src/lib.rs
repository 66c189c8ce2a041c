pub mod commands;

use std::io::{self, Write};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use commands::analyze::AnalyzeArgs;
use commands::monitor::MonitorArgs;
use commands::route::RouteArgs;
use commands::score::ScoreArgs;

#[derive(Debug, Parser)]
#[command(
    name = "closer",
    about = "Closer operator CLI",
    long_about = "Analyze customer messages, dry-run routing decisions, score responses and \
                  monitor response quality offline.",
    after_help = "Examples:\n  closer analyze --message \"Do you have the RAV4 in blue?\"\n  \
                  closer route --message \"What are your hours?\"\n  \
                  closer monitor --scores-file scores.json\n  closer config"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Analyze one customer message: mood, intent, urgency and buying signals")]
    Analyze(AnalyzeArgs),
    #[command(about = "Dry-run the routing decision for a message against the stock catalogs")]
    Route(RouteArgs),
    #[command(about = "Score a response on the six quality dimensions plus measured impact")]
    Score(ScoreArgs),
    #[command(about = "Compare quality windows over recorded scores and list alerts")]
    Monitor(MonitorArgs),
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
}

pub fn run() -> Result<ExitCode> {
    let cli = Cli::parse();

    let (name, result) = match &cli.command {
        Command::Analyze(args) => ("analyze", commands::analyze::run(args)),
        Command::Route(args) => ("route", commands::route::run(args)),
        Command::Score(args) => ("score", commands::score::run(args)),
        Command::Monitor(args) => ("monitor", commands::monitor::run(args)),
        Command::Config => ("config", commands::config::run()),
    };
    tracing::debug!(
        event_name = "cli.command.completed",
        command = name,
        exit_code = result.exit_code,
        "command completed"
    );

    writeln!(io::stdout().lock(), "{}", result.output).context("failed to write command output")?;
    Ok(ExitCode::from(result.exit_code))
}
