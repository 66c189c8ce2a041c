use std::process::ExitCode;

use anyhow::Result;
use closer_core::config::{AppConfig, LoadOptions, LoggingConfig};

fn init_logging(config: &LoggingConfig) {
    use closer_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.level.parse::<Level>().unwrap_or(Level::INFO);
    // Logs go to stderr; stdout carries the JSON payload.
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    let _ = match config.format {
        Compact => builder.compact().try_init(),
        Pretty => builder.pretty().try_init(),
        Json => builder.json().try_init(),
    };
}

fn main() -> Result<ExitCode> {
    // Commands report config errors themselves; logging falls back to defaults.
    let logging = AppConfig::load(LoadOptions::default())
        .map(|config| config.logging)
        .unwrap_or_default();
    init_logging(&logging);

    closer_cli::run()
}
