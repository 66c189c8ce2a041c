use std::env;
use std::fs;
use std::sync::{Mutex, OnceLock};

use chrono::{DateTime, Duration, Utc};
use closer_cli::commands::analyze::AnalyzeArgs;
use closer_cli::commands::monitor::MonitorArgs;
use closer_cli::commands::route::RouteArgs;
use closer_cli::commands::score::ScoreArgs;
use closer_cli::commands::{analyze, config, monitor, route, score};
use closer_core::domain::conversation::{ConversationId, LeadContext};
use closer_core::domain::quality::{ResponseEffectivenessScore, ResponseImpact};
use closer_core::quality::{EffectivenessScorer, ScoringInput};
use serde_json::Value;

fn route_args(message: &str) -> RouteArgs {
    RouteArgs {
        message: message.to_string(),
        history_file: None,
        lead_name: Some("Dana Whitfield".to_string()),
        vehicle: Some("Subaru Outback".to_string()),
        source: Some("website".to_string()),
        lead_score: 30,
    }
}

#[test]
fn analyze_reports_intent_and_signals() {
    with_env(&[], || {
        let result = analyze::run(&AnalyzeArgs {
            message: "I'm ready to buy today, can we sign the paperwork?".to_string(),
            history_file: None,
            lead_name: None,
            vehicle: None,
            conversation_id: "conv-cli".to_string(),
        });
        assert_eq!(result.exit_code, 0, "expected successful analysis");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "analyze");
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["data"]["intent"], "ready_to_buy");
        assert_eq!(payload["data"]["urgency"], "critical");
        assert_eq!(payload["data"]["conversation_id"], "conv-cli");
    });
}

#[test]
fn analyze_rejects_blank_message() {
    with_env(&[], || {
        let result = analyze::run(&AnalyzeArgs {
            message: "   ".to_string(),
            history_file: None,
            lead_name: None,
            vehicle: None,
            conversation_id: "cli".to_string(),
        });
        assert_eq!(result.exit_code, 3);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "invalid_input");
    });
}

#[test]
fn analyze_reads_history_file() {
    with_env(&[], || {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("history.json");
        fs::write(
            &path,
            r#"[
                {"content": "Is the Outback still available?", "is_from_agent": false, "timestamp": "2026-03-01T15:00:00Z"},
                {"content": "It is! Want to come see it?", "is_from_agent": true, "timestamp": "2026-03-01T15:02:00Z"}
            ]"#,
        )
        .expect("write history");

        let result = analyze::run(&AnalyzeArgs {
            message: "Maybe this weekend.".to_string(),
            history_file: Some(path),
            lead_name: None,
            vehicle: None,
            conversation_id: "cli".to_string(),
        });
        assert_eq!(result.exit_code, 0, "output: {}", result.output);
    });
}

#[test]
fn analyze_reports_unparsable_history() {
    with_env(&[], || {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("history.json");
        fs::write(&path, "not json").expect("write history");

        let result = analyze::run(&AnalyzeArgs {
            message: "hello".to_string(),
            history_file: Some(path),
            lead_name: None,
            vehicle: None,
            conversation_id: "cli".to_string(),
        });
        assert_eq!(result.exit_code, 3);
        assert_eq!(parse_payload(&result.output)["error_class"], "invalid_input");
    });
}

#[test]
fn route_escalates_strong_buying_signal() {
    with_env(&[], || {
        let result = route::run(&route_args("I'm ready to buy today, can we sign the paperwork?"));
        assert_eq!(result.exit_code, 0);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["data"]["decision"]["routing_type"], "human_escalation");
        assert_eq!(payload["data"]["escalation_trigger"], "strong_buying_signal");
        let priority = payload["data"]["decision"]["priority"].as_str().unwrap_or_default();
        assert!(priority == "immediate" || priority == "urgent", "priority: {priority}");
    });
}

#[test]
fn route_previews_automated_hours_reply() {
    with_env(&[], || {
        let result = route::run(&route_args("What are your hours?"));
        assert_eq!(result.exit_code, 0);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["data"]["decision"]["routing_type"], "automated_action");
        assert_eq!(payload["data"]["decision"]["required_actions"][0], "send_hours_info");
        let preview = payload["data"]["preview"].as_str().unwrap_or_default();
        assert!(preview.contains("Monday through Saturday"));
    });
}

#[test]
fn route_respects_threshold_from_env() {
    with_env(&[("CLOSER_ROUTING_TEMPLATE_THRESHOLD", "100")], || {
        let result = route::run(&route_args("Can I schedule a test drive this weekend?"));
        assert_eq!(result.exit_code, 0);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["data"]["decision"]["routing_type"], "ai_generated");
        assert!(payload["data"]["preview"].is_null());
    });
}

#[test]
fn route_returns_config_failure_for_bad_env() {
    with_env(&[("CLOSER_ROUTING_TEMPLATE_THRESHOLD", "lots")], || {
        let result = route::run(&route_args("hello"));
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "route");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn score_counts_customer_reply() {
    with_env(&[], || {
        let result = score::run(&ScoreArgs {
            message: "Can I schedule a test drive this weekend?".to_string(),
            response: "Absolutely, Dana! Would Saturday at 10am work for a test drive of the Outback?"
                .to_string(),
            follow_up: Some("Saturday works, see you then.".to_string()),
            lead_name: Some("Dana Whitfield".to_string()),
            vehicle: Some("Subaru Outback".to_string()),
        });
        assert_eq!(result.exit_code, 0, "output: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["data"]["impact"]["customer_replied"], true);
        assert_eq!(payload["data"]["degraded"], false);
        let overall = payload["data"]["overall"].as_u64().unwrap_or_default();
        assert!(overall > 0 && overall <= 100);
    });
}

#[test]
fn score_rejects_empty_response() {
    with_env(&[], || {
        let result = score::run(&ScoreArgs {
            message: "Do you have it in blue?".to_string(),
            response: " ".to_string(),
            follow_up: None,
            lead_name: None,
            vehicle: None,
        });
        assert_eq!(result.exit_code, 3);
        assert_eq!(parse_payload(&result.output)["error_class"], "invalid_input");
    });
}

#[test]
fn monitor_flags_declining_quality() {
    with_env(&[], || {
        let now: DateTime<Utc> = "2026-03-10T12:00:00Z".parse().expect("timestamp");
        let mut scores = Vec::new();
        for hours_ago in [30, 36, 40] {
            scores.push(recorded_score(85, true, now - Duration::hours(hours_ago)));
        }
        for hours_ago in [2, 5, 9] {
            scores.push(recorded_score(50, false, now - Duration::hours(hours_ago)));
        }

        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("scores.json");
        fs::write(&path, serde_json::to_string(&scores).expect("serialize scores")).expect("write scores");

        let result = monitor::run(&MonitorArgs { scores_file: path, window_hours: Some(24), now: Some(now) });
        assert_eq!(result.exit_code, 0, "output: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["data"]["trend"], "declining");
        let kinds: Vec<&str> = payload["data"]["alerts"]
            .as_array()
            .map(|alerts| alerts.iter().filter_map(|alert| alert["kind"].as_str()).collect())
            .unwrap_or_default();
        assert!(kinds.contains(&"below_industry_average"), "alerts: {kinds:?}");
        assert!(kinds.contains(&"sharp_decline"), "alerts: {kinds:?}");
        assert!(kinds.contains(&"low_reply_rate"), "alerts: {kinds:?}");
    });
}

#[test]
fn monitor_reports_missing_scores_file() {
    with_env(&[], || {
        let dir = tempfile::tempdir().expect("temp dir");
        let result = monitor::run(&MonitorArgs {
            scores_file: dir.path().join("missing.json"),
            window_hours: None,
            now: None,
        });
        assert_eq!(result.exit_code, 3);
    });
}

#[test]
fn config_attributes_env_sources_and_redacts_key() {
    with_env(
        &[
            ("CLOSER_LLM_PROVIDER", "openai"),
            ("CLOSER_LLM_API_KEY", "sk-test-secret"),
            ("CLOSER_QUALITY_INDUSTRY_AVERAGE", "75"),
        ],
        || {
            let result = config::run();
            assert_eq!(result.exit_code, 0, "output: {}", result.output);
            assert!(!result.output.contains("sk-test-secret"));

            let payload = parse_payload(&result.output);
            let entries = payload["data"].as_array().cloned().unwrap_or_default();
            let entry = |key: &str| {
                entries.iter().find(|entry| entry["key"] == key).cloned().unwrap_or(Value::Null)
            };
            assert_eq!(entry("llm.provider")["value"], "openai");
            assert_eq!(entry("llm.provider")["source"], "env (CLOSER_LLM_PROVIDER)");
            assert_eq!(entry("llm.api_key")["value"], "<redacted>");
            assert_eq!(entry("quality.industry_average")["value"], "75");
            assert_eq!(entry("routing.template_threshold")["source"], "default");
        },
    );
}

#[test]
fn config_fails_when_openai_has_no_key() {
    with_env(&[("CLOSER_LLM_PROVIDER", "openai")], || {
        let result = config::run();
        assert_eq!(result.exit_code, 2);
        assert_eq!(parse_payload(&result.output)["error_class"], "config_validation");
    });
}

fn recorded_score(overall: u8, replied: bool, scored_at: DateTime<Utc>) -> ResponseEffectivenessScore {
    let conversation_id = ConversationId("conv-monitor".to_string());
    let lead = LeadContext::default();
    let impact = ResponseImpact { customer_replied: replied, ..ResponseImpact::default() };
    let mut score = EffectivenessScorer::new(72, 88)
        .score(
            &ScoringInput {
                response_id: None,
                conversation_id: &conversation_id,
                response: "Thanks for asking! Would you like to schedule a visit this week?",
                original_message: "Do you have any SUVs?",
                lead: &lead,
                impact,
            },
            scored_at,
        )
        .expect("score");
    score.overall = overall;
    score
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "CLOSER_LLM_PROVIDER",
        "CLOSER_LLM_API_KEY",
        "CLOSER_LLM_BASE_URL",
        "CLOSER_LLM_MODEL",
        "CLOSER_LLM_TIMEOUT_SECS",
        "CLOSER_LLM_MAX_TOKENS",
        "CLOSER_PIPELINE_GENERATION_TIMEOUT_MS",
        "CLOSER_PIPELINE_ANALYSIS_CACHE_ENTRIES",
        "CLOSER_PIPELINE_FALLBACK_RESPONSE",
        "CLOSER_ROUTING_TEMPLATE_THRESHOLD",
        "CLOSER_ROUTING_AUTOMATED_ACTION_CONFIDENCE",
        "CLOSER_ESCALATION_DEFAULT_COOLDOWN_SECS",
        "CLOSER_QUALITY_MIN_SAMPLE_SIZE",
        "CLOSER_QUALITY_MIN_VARIANTS",
        "CLOSER_QUALITY_INDUSTRY_AVERAGE",
        "CLOSER_QUALITY_TOP_PERFORMER",
        "CLOSER_QUALITY_TREND_WINDOW_HOURS",
        "CLOSER_QUALITY_MIN_PROFILE_SAMPLES",
        "CLOSER_QUALITY_SCORE_HISTORY_LIMIT",
        "CLOSER_LOGGING_LEVEL",
        "CLOSER_LOGGING_FORMAT",
        "CLOSER_LOG_LEVEL",
        "CLOSER_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
