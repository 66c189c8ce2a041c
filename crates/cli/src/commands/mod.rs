pub mod analyze;
pub mod config;
pub mod monitor;
pub mod route;
pub mod score;

use std::fs;
use std::path::Path;

use closer_core::config::{AppConfig, LoadOptions};
use closer_core::domain::conversation::{ConversationMessage, LeadContext};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

pub const EXIT_CONFIG: u8 = 2;
pub const EXIT_INVALID_INPUT: u8 = 3;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>, data: &impl Serialize) -> Self {
        let data = match serde_json::to_value(data) {
            Ok(data) => data,
            Err(error) => return Self::failure(command, "serialization", error.to_string(), 1),
        };
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            data: Some(data),
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            data: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    pub fn invalid_input(command: &str, message: impl Into<String>) -> Self {
        Self::failure(command, "invalid_input", message, EXIT_INVALID_INPUT)
    }
}

pub(crate) fn load_config(command: &str) -> Result<AppConfig, CommandResult> {
    AppConfig::load(LoadOptions::default()).map_err(|error| {
        CommandResult::failure(command, "config_validation", error.to_string(), EXIT_CONFIG)
    })
}

pub(crate) fn read_json<T: DeserializeOwned>(command: &str, path: &Path) -> Result<T, CommandResult> {
    let raw = fs::read_to_string(path).map_err(|error| {
        CommandResult::invalid_input(command, format!("could not read `{}`: {error}", path.display()))
    })?;
    serde_json::from_str(&raw).map_err(|error| {
        CommandResult::invalid_input(command, format!("could not parse `{}`: {error}", path.display()))
    })
}

pub(crate) fn load_history(
    command: &str,
    path: Option<&Path>,
) -> Result<Vec<ConversationMessage>, CommandResult> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };
    let mut history: Vec<ConversationMessage> = read_json(command, path)?;
    history.sort_by_key(|message| message.timestamp);
    Ok(history)
}

pub(crate) fn require_message(command: &str, flag: &str, value: &str) -> Result<(), CommandResult> {
    if value.trim().is_empty() {
        return Err(CommandResult::invalid_input(command, format!("{flag} must not be empty")));
    }
    Ok(())
}

pub(crate) fn lead_context(
    name: Option<&str>,
    vehicle: Option<&str>,
    source: Option<&str>,
) -> LeadContext {
    LeadContext {
        name: name.map(str::to_string),
        vehicle_interest: vehicle.map(str::to_string),
        source: source.map(str::to_string),
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}
