use std::env;
use std::sync::{Mutex, OnceLock};

use carebook_cli::commands::{check, config, migrate, seed};
use serde_json::Value;

const VALID_ENV: &[(&str, &str)] =
    &[("CAREBOOK_DATABASE_URL", "sqlite::memory:"), ("CAREBOOK_LLM_PROVIDER", "ollama")];

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(VALID_ENV, || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_returns_config_failure_without_llm_credentials() {
    with_env(&[("CAREBOOK_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn seed_lists_the_demo_doctors() {
    with_env(VALID_ENV, || {
        let result = seed::run();
        assert_eq!(result.exit_code, 0, "expected seed success: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "seed");
        assert_eq!(payload["status"], "ok");

        let message = payload["message"].as_str().unwrap_or("");
        assert!(message.contains("patient `pat-demo`"));
        assert!(message.contains("  - doc-ahuja: Dr. Rahul Ahuja"));
        assert!(message.contains("  - doc-sharma: Dr. Priya Sharma"));
        assert!(message.contains("  - doc-patel: Dr. Amit Patel"));
    });
}

#[test]
fn seed_is_idempotent_across_runs() {
    with_env(VALID_ENV, || {
        let first = parse_payload(&seed::run().output);
        let second = parse_payload(&seed::run().output);

        assert_eq!(first["status"], "ok");
        assert_eq!(second["status"], "ok");
        assert_eq!(first["message"], second["message"]);
    });
}

#[test]
fn check_reports_ready_on_a_fresh_database() {
    with_env(VALID_ENV, || {
        let result = check::run(true);
        assert_eq!(result.exit_code, 0, "expected ready report: {}", result.output);

        let report = parse_payload(&result.output);
        assert_eq!(report["overall_status"], "pass");
        let checks = report["checks"].as_array().cloned().unwrap_or_default();
        let status_of = |name: &str| {
            checks
                .iter()
                .find(|check| check["name"] == name)
                .map(|check| check["status"].clone())
                .unwrap_or(Value::Null)
        };
        assert_eq!(status_of("database_schema"), "pass");
        assert_eq!(status_of("demo_data"), "warn");
        assert_eq!(status_of("collaborators"), "warn");
    });
}

#[test]
fn check_fails_and_skips_when_config_is_invalid() {
    with_env(&[], || {
        let result = check::run(true);
        assert_eq!(result.exit_code, 1);

        let report = parse_payload(&result.output);
        assert_eq!(report["overall_status"], "fail");
        assert_eq!(report["checks"][0]["name"], "config_validation");
        assert_eq!(report["checks"][1]["status"], "skipped");
    });
}

#[test]
fn config_redacts_secrets_and_attributes_env_sources() {
    with_env(
        &[
            ("CAREBOOK_DATABASE_URL", "sqlite::memory:"),
            ("CAREBOOK_LLM_API_KEY", "sk-live-secret"),
            ("CAREBOOK_LLM_MODEL", "mistral-large-latest"),
        ],
        || {
            let result = config::run();
            assert_eq!(result.exit_code, 0, "{}", result.output);
            assert!(!result.output.contains("sk-live-secret"));
            assert!(result
                .output
                .contains("- llm.api_key = <redacted> (source: env (CAREBOOK_LLM_API_KEY))"));
            assert!(result.output.contains(
                "- llm.model = mistral-large-latest (source: env (CAREBOOK_LLM_MODEL))"
            ));
            assert!(result.output.contains("- agent.max_tool_rounds = 8 (source: default)"));
        },
    );
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard = match ENV_LOCK.get_or_init(|| Mutex::new(())).lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };

    let keys = [
        "CAREBOOK_DATABASE_URL",
        "CAREBOOK_DATABASE_MAX_CONNECTIONS",
        "CAREBOOK_DATABASE_TIMEOUT_SECS",
        "CAREBOOK_LLM_PROVIDER",
        "CAREBOOK_LLM_API_KEY",
        "CAREBOOK_LLM_BASE_URL",
        "CAREBOOK_LLM_MODEL",
        "CAREBOOK_LLM_TIMEOUT_SECS",
        "CAREBOOK_LLM_MAX_RETRIES",
        "CAREBOOK_AGENT_MAX_TOOL_ROUNDS",
        "CAREBOOK_AGENT_HISTORY_WINDOW",
        "CAREBOOK_AGENT_TOOL_TIMEOUT_SECS",
        "CAREBOOK_SERVER_BIND_ADDRESS",
        "CAREBOOK_SERVER_PORT",
        "CAREBOOK_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "CAREBOOK_SERVER_CORS_ORIGINS",
        "CAREBOOK_NOTIFICATIONS_SLACK_WEBHOOK_URL",
        "CAREBOOK_NOTIFICATIONS_SENDGRID_API_KEY",
        "CAREBOOK_NOTIFICATIONS_FROM_EMAIL",
        "CAREBOOK_NOTIFICATIONS_CALENDAR_ACCESS_TOKEN",
        "CAREBOOK_NOTIFICATIONS_CALENDAR_ID",
        "CAREBOOK_NOTIFICATIONS_CALENDAR_TIMEZONE",
        "CAREBOOK_LOGGING_LEVEL",
        "CAREBOOK_LOGGING_FORMAT",
        "CAREBOOK_LOG_LEVEL",
        "CAREBOOK_LOG_FORMAT",
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
