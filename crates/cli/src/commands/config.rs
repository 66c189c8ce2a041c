use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use closer_core::config::AppConfig;
use serde::Serialize;
use toml::Value;

use super::{load_config, CommandResult};

#[derive(Debug, Serialize)]
struct ConfigEntry {
    key: &'static str,
    value: String,
    source: String,
}

pub fn run() -> CommandResult {
    let config = match load_config("config") {
        Ok(config) => config,
        Err(failure) => return failure,
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let entries: Vec<ConfigEntry> = effective_values(&config)
        .into_iter()
        .map(|(key, env_key, value)| ConfigEntry {
            key,
            value,
            source: field_source(key, env_key, config_file_doc.as_ref(), config_file_path.as_deref()),
        })
        .collect();

    CommandResult::success(
        "config",
        "effective config (source precedence: env > file > default)",
        &entries,
    )
}

fn effective_values(config: &AppConfig) -> Vec<(&'static str, &'static str, String)> {
    let api_key = if config.llm.api_key.is_some() { "<redacted>" } else { "<unset>" };
    vec![
        ("llm.provider", "CLOSER_LLM_PROVIDER", config.llm.provider.as_str().to_string()),
        ("llm.model", "CLOSER_LLM_MODEL", config.llm.model.clone()),
        (
            "llm.base_url",
            "CLOSER_LLM_BASE_URL",
            config.llm.base_url.clone().unwrap_or_else(|| "<unset>".to_string()),
        ),
        ("llm.api_key", "CLOSER_LLM_API_KEY", api_key.to_string()),
        ("llm.timeout_secs", "CLOSER_LLM_TIMEOUT_SECS", config.llm.timeout_secs.to_string()),
        ("llm.max_tokens", "CLOSER_LLM_MAX_TOKENS", config.llm.max_tokens.to_string()),
        (
            "pipeline.generation_timeout_ms",
            "CLOSER_PIPELINE_GENERATION_TIMEOUT_MS",
            config.pipeline.generation_timeout_ms.to_string(),
        ),
        (
            "pipeline.analysis_cache_entries",
            "CLOSER_PIPELINE_ANALYSIS_CACHE_ENTRIES",
            config.pipeline.analysis_cache_entries.to_string(),
        ),
        (
            "routing.template_threshold",
            "CLOSER_ROUTING_TEMPLATE_THRESHOLD",
            config.routing.template_threshold.to_string(),
        ),
        (
            "routing.automated_action_confidence",
            "CLOSER_ROUTING_AUTOMATED_ACTION_CONFIDENCE",
            config.routing.automated_action_confidence.to_string(),
        ),
        (
            "escalation.default_cooldown_secs",
            "CLOSER_ESCALATION_DEFAULT_COOLDOWN_SECS",
            config.escalation.default_cooldown_secs.to_string(),
        ),
        (
            "quality.min_sample_size",
            "CLOSER_QUALITY_MIN_SAMPLE_SIZE",
            config.quality.min_sample_size.to_string(),
        ),
        (
            "quality.industry_average",
            "CLOSER_QUALITY_INDUSTRY_AVERAGE",
            config.quality.industry_average.to_string(),
        ),
        (
            "quality.trend_window_hours",
            "CLOSER_QUALITY_TREND_WINDOW_HOURS",
            config.quality.trend_window_hours.to_string(),
        ),
        ("logging.level", "CLOSER_LOGGING_LEVEL", config.logging.level.clone()),
        ("logging.format", "CLOSER_LOGGING_FORMAT", format!("{:?}", config.logging.format).to_lowercase()),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("closer.toml"), PathBuf::from("config/closer.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if env::var_os(env_key).is_some() {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}
