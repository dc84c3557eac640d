use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use carebook_core::config::{AppConfig, LoadOptions};
use secrecy::SecretString;
use toml::Value;

use crate::commands::CommandResult;

/// One effective setting and the environment variable that can override it.
struct Field {
    key: &'static str,
    env_key: &'static str,
    value: String,
}

impl Field {
    fn new(key: &'static str, env_key: &'static str, value: impl Into<String>) -> Self {
        Self { key, env_key, value: value.into() }
    }
}

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult { exit_code: 2, output: format!("config validation failed: {error}") }
        }
    };

    let file_path = detect_config_path();
    let file_doc = file_path.as_deref().and_then(load_config_file_doc);

    let mut lines =
        vec!["effective config (source precedence: env > file > default):".to_string()];
    lines.extend(fields(&config).into_iter().map(|field| {
        let source = field_source(&field, file_doc.as_ref(), file_path.as_deref());
        format!("- {} = {} (source: {source})", field.key, field.value)
    }));

    CommandResult { exit_code: 0, output: lines.join("\n") }
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let notifications = &config.notifications;
    vec![
        Field::new("database.url", "CAREBOOK_DATABASE_URL", &config.database.url),
        Field::new(
            "database.max_connections",
            "CAREBOOK_DATABASE_MAX_CONNECTIONS",
            config.database.max_connections.to_string(),
        ),
        Field::new(
            "database.timeout_secs",
            "CAREBOOK_DATABASE_TIMEOUT_SECS",
            config.database.timeout_secs.to_string(),
        ),
        Field::new("llm.provider", "CAREBOOK_LLM_PROVIDER", config.llm.provider.as_str()),
        Field::new("llm.model", "CAREBOOK_LLM_MODEL", &config.llm.model),
        Field::new("llm.base_url", "CAREBOOK_LLM_BASE_URL", config.llm.endpoint()),
        Field::new("llm.api_key", "CAREBOOK_LLM_API_KEY", redact(config.llm.api_key.as_ref())),
        Field::new(
            "agent.max_tool_rounds",
            "CAREBOOK_AGENT_MAX_TOOL_ROUNDS",
            config.agent.max_tool_rounds.to_string(),
        ),
        Field::new(
            "agent.history_window",
            "CAREBOOK_AGENT_HISTORY_WINDOW",
            config.agent.history_window.to_string(),
        ),
        Field::new(
            "agent.tool_timeout_secs",
            "CAREBOOK_AGENT_TOOL_TIMEOUT_SECS",
            config.agent.tool_timeout_secs.to_string(),
        ),
        Field::new("server.bind_address", "CAREBOOK_SERVER_BIND_ADDRESS", &config.server.bind_address),
        Field::new("server.port", "CAREBOOK_SERVER_PORT", config.server.port.to_string()),
        Field::new(
            "server.cors_origins",
            "CAREBOOK_SERVER_CORS_ORIGINS",
            config.server.cors_origins.join(","),
        ),
        Field::new(
            "notifications.slack_webhook_url",
            "CAREBOOK_NOTIFICATIONS_SLACK_WEBHOOK_URL",
            redact(notifications.slack_webhook_url.as_ref()),
        ),
        Field::new(
            "notifications.sendgrid_api_key",
            "CAREBOOK_NOTIFICATIONS_SENDGRID_API_KEY",
            redact(notifications.sendgrid_api_key.as_ref()),
        ),
        Field::new(
            "notifications.from_email",
            "CAREBOOK_NOTIFICATIONS_FROM_EMAIL",
            &notifications.from_email,
        ),
        Field::new(
            "notifications.calendar_access_token",
            "CAREBOOK_NOTIFICATIONS_CALENDAR_ACCESS_TOKEN",
            redact(notifications.calendar_access_token.as_ref()),
        ),
        Field::new(
            "notifications.calendar_id",
            "CAREBOOK_NOTIFICATIONS_CALENDAR_ID",
            &notifications.calendar_id,
        ),
        Field::new("logging.level", "CAREBOOK_LOGGING_LEVEL", &config.logging.level),
        Field::new(
            "logging.format",
            "CAREBOOK_LOGGING_FORMAT",
            format!("{:?}", config.logging.format).to_ascii_lowercase(),
        ),
    ]
}

fn redact(secret: Option<&SecretString>) -> &'static str {
    if secret.is_some() {
        "<redacted>"
    } else {
        "<unset>"
    }
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("carebook.toml"), PathBuf::from("config/carebook.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: &Path) -> Option<Value> {
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(field: &Field, file_doc: Option<&Value>, file_path: Option<&Path>) -> String {
    if env::var_os(field.env_key).is_some() {
        return format!("env ({})", field.env_key);
    }

    if file_doc.is_some_and(|doc| contains_path(doc, field.key)) {
        let file_path = file_path
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "config file".to_string());
        return format!("file ({file_path})");
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
