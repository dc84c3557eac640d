use carebook_core::config::{AppConfig, LoadOptions, NotificationsConfig};
use carebook_db::{connect_with_settings, migrations, DemoClinicDataset};
use serde::Serialize;

use crate::commands::CommandResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Warn,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct Check {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl Check {
    fn new(name: &'static str, status: CheckStatus, details: impl Into<String>) -> Self {
        Self { name, status, details: details.into() }
    }
}

#[derive(Debug, Serialize)]
struct CheckReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<Check>,
}

/// Exit code 0 unless a check failed; warnings (for example an unseeded
/// database) do not fail the run.
pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = if report.overall_status == CheckStatus::Fail { 1 } else { 0 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"check serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report() -> CheckReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(Check::new(
                "config_validation",
                CheckStatus::Pass,
                "configuration loaded and validated",
            ));
            checks.push(Check::new(
                "llm_provider",
                CheckStatus::Pass,
                format!(
                    "{} model `{}` at {}",
                    config.llm.provider.as_str(),
                    config.llm.model,
                    config.llm.endpoint()
                ),
            ));
            checks.push(collaborator_wiring(&config.notifications));
            checks.extend(database_checks(&config));
        }
        Err(error) => {
            checks.push(Check::new("config_validation", CheckStatus::Fail, error.to_string()));
            for name in ["llm_provider", "collaborators", "database_schema", "demo_data"] {
                checks.push(Check::new(
                    name,
                    CheckStatus::Skipped,
                    "skipped because configuration did not load",
                ));
            }
        }
    }

    let failed = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let overall_status = if failed { CheckStatus::Fail } else { CheckStatus::Pass };
    let summary = if failed {
        "check: one or more readiness checks failed".to_string()
    } else {
        "check: runtime is ready".to_string()
    };

    CheckReport { overall_status, summary, checks }
}

fn collaborator_wiring(notifications: &NotificationsConfig) -> Check {
    let mode = |configured: bool, real: &str| if configured { real.to_string() } else { "demo".to_string() };
    let calendar = mode(notifications.calendar_access_token.is_some(), "google calendar");
    let email = mode(notifications.sendgrid_api_key.is_some(), "sendgrid");
    let slack = mode(notifications.slack_webhook_url.is_some(), "webhook");
    let all_demo = [&calendar, &email, &slack].iter().all(|value| value.as_str() == "demo");

    Check::new(
        "collaborators",
        if all_demo { CheckStatus::Warn } else { CheckStatus::Pass },
        format!("calendar: {calendar}, email: {email}, slack: {slack}"),
    )
}

fn database_checks(config: &AppConfig) -> Vec<Check> {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return vec![Check::new(
                "database_schema",
                CheckStatus::Fail,
                format!("failed to initialize async runtime: {error}"),
            )];
        }
    };

    runtime.block_on(async {
        let pool = match connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        {
            Ok(pool) => pool,
            Err(error) => {
                return vec![
                    Check::new(
                        "database_schema",
                        CheckStatus::Fail,
                        format!("failed to connect to database: {error}"),
                    ),
                    Check::new("demo_data", CheckStatus::Skipped, "skipped without a database"),
                ];
            }
        };

        let schema = match migrations::run_pending(&pool).await {
            Ok(()) => Check::new(
                "database_schema",
                CheckStatus::Pass,
                format!("migrations current on `{}`", config.database.url),
            ),
            Err(error) => {
                Check::new("database_schema", CheckStatus::Fail, format!("migration failed: {error}"))
            }
        };

        let demo_data = if schema.status == CheckStatus::Pass {
            match DemoClinicDataset::verify(&pool).await {
                Ok(verification) if verification.all_present => {
                    Check::new("demo_data", CheckStatus::Pass, "demo clinic present")
                }
                Ok(_) => Check::new(
                    "demo_data",
                    CheckStatus::Warn,
                    "demo clinic not loaded; run `carebook seed`",
                ),
                Err(error) => Check::new("demo_data", CheckStatus::Fail, error.to_string()),
            }
        } else {
            Check::new("demo_data", CheckStatus::Skipped, "skipped because the schema is not current")
        };

        pool.close().await;
        vec![schema, demo_data]
    })
}

fn render_human(report: &CheckReport) -> String {
    let mut lines = vec![report.summary.clone()];

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Warn => "warn",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
