use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MAX_ESCALATION_COOLDOWN_SECS: u64 = 30 * 24 * 60 * 60;

#[derive(Clone, Debug, Default)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub pipeline: PipelineConfig,
    pub routing: RoutingConfig,
    pub escalation: EscalationConfig,
    pub quality: QualityConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub max_tokens: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PipelineConfig {
    /// Upper bound on one generation call before the fallback reply is used.
    pub generation_timeout_ms: u64,
    pub analysis_cache_entries: usize,
    pub fallback_response: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct RoutingConfig {
    /// A template is used only when its match score is strictly above this value.
    pub template_threshold: u8,
    pub automated_action_confidence: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct EscalationConfig {
    pub default_cooldown_secs: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct QualityConfig {
    pub min_sample_size: u64,
    pub min_variants: usize,
    pub industry_average: u8,
    pub top_performer: u8,
    pub trend_window_hours: u64,
    pub min_profile_samples: usize,
    pub score_history_limit: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    #[serde(rename = "openai")]
    OpenAi,
    Ollama,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Ollama => "ollama",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub llm_base_url: Option<String>,
    pub generation_timeout_ms: Option<u64>,
    pub template_threshold: Option<u8>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Ollama,
            api_key: None,
            base_url: Some("http://localhost:11434".to_string()),
            model: "llama3.1".to_string(),
            timeout_secs: 30,
            max_tokens: 400,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            generation_timeout_ms: 8_000,
            analysis_cache_entries: 256,
            fallback_response: "Thanks for reaching out! A member of our team will follow up with \
                                you shortly."
                .to_string(),
        }
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self { template_threshold: 70, automated_action_confidence: 85 }
    }
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self { default_cooldown_secs: 30 * 60 }
    }
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            min_sample_size: 50,
            min_variants: 2,
            industry_average: 72,
            top_performer: 88,
            trend_window_hours: 24,
            min_profile_samples: 10,
            score_history_limit: 1_000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::Compact }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected openai|ollama)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("closer.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(api_key) = llm.api_key {
                self.llm.api_key = Some(secret_value(api_key));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(max_tokens) = llm.max_tokens {
                self.llm.max_tokens = max_tokens;
            }
        }

        if let Some(pipeline) = patch.pipeline {
            if let Some(generation_timeout_ms) = pipeline.generation_timeout_ms {
                self.pipeline.generation_timeout_ms = generation_timeout_ms;
            }
            if let Some(analysis_cache_entries) = pipeline.analysis_cache_entries {
                self.pipeline.analysis_cache_entries = analysis_cache_entries;
            }
            if let Some(fallback_response) = pipeline.fallback_response {
                self.pipeline.fallback_response = fallback_response;
            }
        }

        if let Some(routing) = patch.routing {
            if let Some(template_threshold) = routing.template_threshold {
                self.routing.template_threshold = template_threshold;
            }
            if let Some(automated_action_confidence) = routing.automated_action_confidence {
                self.routing.automated_action_confidence = automated_action_confidence;
            }
        }

        if let Some(escalation) = patch.escalation {
            if let Some(default_cooldown_secs) = escalation.default_cooldown_secs {
                self.escalation.default_cooldown_secs = default_cooldown_secs;
            }
        }

        if let Some(quality) = patch.quality {
            if let Some(min_sample_size) = quality.min_sample_size {
                self.quality.min_sample_size = min_sample_size;
            }
            if let Some(min_variants) = quality.min_variants {
                self.quality.min_variants = min_variants;
            }
            if let Some(industry_average) = quality.industry_average {
                self.quality.industry_average = industry_average;
            }
            if let Some(top_performer) = quality.top_performer {
                self.quality.top_performer = top_performer;
            }
            if let Some(trend_window_hours) = quality.trend_window_hours {
                self.quality.trend_window_hours = trend_window_hours;
            }
            if let Some(min_profile_samples) = quality.min_profile_samples {
                self.quality.min_profile_samples = min_profile_samples;
            }
            if let Some(score_history_limit) = quality.score_history_limit {
                self.quality.score_history_limit = score_history_limit;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("CLOSER_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        if let Some(value) = read_env("CLOSER_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("CLOSER_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("CLOSER_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("CLOSER_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("CLOSER_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("CLOSER_LLM_MAX_TOKENS") {
            self.llm.max_tokens = parse_u32("CLOSER_LLM_MAX_TOKENS", &value)?;
        }

        if let Some(value) = read_env("CLOSER_PIPELINE_GENERATION_TIMEOUT_MS") {
            self.pipeline.generation_timeout_ms =
                parse_u64("CLOSER_PIPELINE_GENERATION_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = read_env("CLOSER_PIPELINE_ANALYSIS_CACHE_ENTRIES") {
            self.pipeline.analysis_cache_entries =
                parse_usize("CLOSER_PIPELINE_ANALYSIS_CACHE_ENTRIES", &value)?;
        }
        if let Some(value) = read_env("CLOSER_PIPELINE_FALLBACK_RESPONSE") {
            self.pipeline.fallback_response = value;
        }

        if let Some(value) = read_env("CLOSER_ROUTING_TEMPLATE_THRESHOLD") {
            self.routing.template_threshold = parse_u8("CLOSER_ROUTING_TEMPLATE_THRESHOLD", &value)?;
        }
        if let Some(value) = read_env("CLOSER_ROUTING_AUTOMATED_ACTION_CONFIDENCE") {
            self.routing.automated_action_confidence =
                parse_u8("CLOSER_ROUTING_AUTOMATED_ACTION_CONFIDENCE", &value)?;
        }

        if let Some(value) = read_env("CLOSER_ESCALATION_DEFAULT_COOLDOWN_SECS") {
            self.escalation.default_cooldown_secs =
                parse_u64("CLOSER_ESCALATION_DEFAULT_COOLDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("CLOSER_QUALITY_MIN_SAMPLE_SIZE") {
            self.quality.min_sample_size = parse_u64("CLOSER_QUALITY_MIN_SAMPLE_SIZE", &value)?;
        }
        if let Some(value) = read_env("CLOSER_QUALITY_MIN_VARIANTS") {
            self.quality.min_variants = parse_usize("CLOSER_QUALITY_MIN_VARIANTS", &value)?;
        }
        if let Some(value) = read_env("CLOSER_QUALITY_INDUSTRY_AVERAGE") {
            self.quality.industry_average = parse_u8("CLOSER_QUALITY_INDUSTRY_AVERAGE", &value)?;
        }
        if let Some(value) = read_env("CLOSER_QUALITY_TOP_PERFORMER") {
            self.quality.top_performer = parse_u8("CLOSER_QUALITY_TOP_PERFORMER", &value)?;
        }
        if let Some(value) = read_env("CLOSER_QUALITY_TREND_WINDOW_HOURS") {
            self.quality.trend_window_hours =
                parse_u64("CLOSER_QUALITY_TREND_WINDOW_HOURS", &value)?;
        }
        if let Some(value) = read_env("CLOSER_QUALITY_MIN_PROFILE_SAMPLES") {
            self.quality.min_profile_samples =
                parse_usize("CLOSER_QUALITY_MIN_PROFILE_SAMPLES", &value)?;
        }
        if let Some(value) = read_env("CLOSER_QUALITY_SCORE_HISTORY_LIMIT") {
            self.quality.score_history_limit =
                parse_usize("CLOSER_QUALITY_SCORE_HISTORY_LIMIT", &value)?;
        }

        let log_level = read_env("CLOSER_LOGGING_LEVEL").or_else(|| read_env("CLOSER_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("CLOSER_LOGGING_FORMAT").or_else(|| read_env("CLOSER_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(llm_base_url) = overrides.llm_base_url {
            self.llm.base_url = Some(llm_base_url);
        }
        if let Some(generation_timeout_ms) = overrides.generation_timeout_ms {
            self.pipeline.generation_timeout_ms = generation_timeout_ms;
        }
        if let Some(template_threshold) = overrides.template_threshold {
            self.routing.template_threshold = template_threshold;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_llm(&self.llm)?;
        validate_pipeline(&self.pipeline)?;
        validate_routing(&self.routing)?;
        validate_quality(&self.quality)?;
        validate_escalation(&self.escalation)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("closer.toml"), PathBuf::from("config/closer.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if llm.max_tokens == 0 {
        return Err(ConfigError::Validation(
            "llm.max_tokens must be greater than zero".to_string(),
        ));
    }

    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }

    match llm.provider {
        LlmProvider::OpenAi => {
            let missing = llm
                .api_key
                .as_ref()
                .map(|value| value.expose_secret().trim().is_empty())
                .unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "llm.api_key is required for the openai provider (set CLOSER_LLM_API_KEY)"
                        .to_string(),
                ));
            }
        }
        LlmProvider::Ollama => {
            let missing =
                llm.base_url.as_ref().map(|value| value.trim().is_empty()).unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "llm.base_url is required for the ollama provider".to_string(),
                ));
            }
        }
    }

    if let Some(base_url) = &llm.base_url {
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::Validation(
                "llm.base_url must start with http:// or https://".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_pipeline(pipeline: &PipelineConfig) -> Result<(), ConfigError> {
    if pipeline.generation_timeout_ms == 0 || pipeline.generation_timeout_ms > 120_000 {
        return Err(ConfigError::Validation(
            "pipeline.generation_timeout_ms must be in range 1..=120000".to_string(),
        ));
    }

    if pipeline.fallback_response.trim().is_empty() {
        return Err(ConfigError::Validation(
            "pipeline.fallback_response must not be empty; the conversation always needs a reply"
                .to_string(),
        ));
    }

    Ok(())
}

fn validate_routing(routing: &RoutingConfig) -> Result<(), ConfigError> {
    if routing.template_threshold > 100 {
        return Err(ConfigError::Validation(
            "routing.template_threshold must be in range 0..=100".to_string(),
        ));
    }

    if routing.automated_action_confidence > 100 {
        return Err(ConfigError::Validation(
            "routing.automated_action_confidence must be in range 0..=100".to_string(),
        ));
    }

    Ok(())
}

fn validate_quality(quality: &QualityConfig) -> Result<(), ConfigError> {
    if quality.min_sample_size == 0 {
        return Err(ConfigError::Validation(
            "quality.min_sample_size must be greater than zero".to_string(),
        ));
    }

    if quality.min_variants < 2 {
        return Err(ConfigError::Validation(
            "quality.min_variants must be at least 2".to_string(),
        ));
    }

    if quality.top_performer > 100 || quality.industry_average >= quality.top_performer {
        return Err(ConfigError::Validation(
            "quality.industry_average must be below quality.top_performer, which must be at most 100"
                .to_string(),
        ));
    }

    if quality.trend_window_hours == 0 {
        return Err(ConfigError::Validation(
            "quality.trend_window_hours must be greater than zero".to_string(),
        ));
    }

    if quality.score_history_limit == 0 {
        return Err(ConfigError::Validation(
            "quality.score_history_limit must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_escalation(escalation: &EscalationConfig) -> Result<(), ConfigError> {
    if escalation.default_cooldown_secs > MAX_ESCALATION_COOLDOWN_SECS {
        return Err(ConfigError::Validation(format!(
            "escalation.default_cooldown_secs must be at most {MAX_ESCALATION_COOLDOWN_SECS} (30 days)"
        )));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u8(key: &str, value: &str) -> Result<u8, ConfigError> {
    value.parse::<u8>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    llm: Option<LlmPatch>,
    pipeline: Option<PipelinePatch>,
    routing: Option<RoutingPatch>,
    escalation: Option<EscalationPatch>,
    quality: Option<QualityPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_tokens: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct PipelinePatch {
    generation_timeout_ms: Option<u64>,
    analysis_cache_entries: Option<usize>,
    fallback_response: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RoutingPatch {
    template_threshold: Option<u8>,
    automated_action_confidence: Option<u8>,
}

#[derive(Debug, Default, Deserialize)]
struct EscalationPatch {
    default_cooldown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct QualityPatch {
    min_sample_size: Option<u64>,
    min_variants: Option<usize>,
    industry_average: Option<u8>,
    top_performer: Option<u8>,
    trend_window_hours: Option<u64>,
    min_profile_samples: Option<usize>,
    score_history_limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
