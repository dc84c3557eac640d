use std::sync::Arc;

use carebook_agent::collaborators::{CollaboratorError, Collaborators};
use carebook_agent::llm::{LlmClient, LlmError, OpenAiCompatibleClient};
use carebook_agent::tools::handlers::ClinicRepositories;
use carebook_agent::tools::{ClinicTools, ToolExecutor};
use carebook_agent::{AgentRuntime, ProfileResolver, RuntimeSettings, SessionStore};
use carebook_core::audit::TracingAuditSink;
use carebook_core::clock::Clock;
use carebook_core::config::{AppConfig, ConfigError};
use carebook_db::repositories::{
    NotificationRepository, SqlNotificationRepository, SqlPromptRecordRepository,
    SqlSessionRepository,
};
use carebook_db::{connect_with_settings, migrations, DbPool};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub runtime: Arc<AgentRuntime>,
    pub notifications: Arc<dyn NotificationRepository>,
    pub audit: Arc<TracingAuditSink>,
    pub clock: Clock,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("language model client could not be built: {0}")]
    Llm(#[source] LlmError),
    #[error("side-effect collaborators could not be built: {0}")]
    Collaborators(#[source] CollaboratorError),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        llm_provider = config.llm.provider.as_str(),
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let llm = OpenAiCompatibleClient::from_config(&config.llm).map_err(BootstrapError::Llm)?;
    assemble(config, db_pool, Arc::new(llm), Clock::System)
}

/// Wires the component graph over an already-migrated pool.
pub fn assemble(
    config: AppConfig,
    db_pool: DbPool,
    llm: Arc<dyn LlmClient>,
    clock: Clock,
) -> Result<Application, BootstrapError> {
    let notifications: Arc<dyn NotificationRepository> =
        Arc::new(SqlNotificationRepository::new(db_pool.clone()));
    let collaborators =
        Collaborators::from_config(&config.notifications, notifications.clone(), clock)
            .map_err(BootstrapError::Collaborators)?;
    let audit = Arc::new(TracingAuditSink::default());

    let repos = ClinicRepositories::sqlite(db_pool.clone());
    let settings = RuntimeSettings::from_config(&config.agent, clock);
    let tools = ClinicTools::new(repos.clone(), collaborators, audit.clone(), clock);
    let executor = ToolExecutor::new(Arc::new(tools), settings.tool_timeout);
    let sessions = SessionStore::new(Arc::new(SqlSessionRepository::new(db_pool.clone())), clock);

    let runtime = AgentRuntime::new(
        llm,
        executor,
        sessions,
        ProfileResolver::new(repos),
        Arc::new(SqlPromptRecordRepository::new(db_pool.clone())),
        settings,
    );
    info!(
        event_name = "system.bootstrap.runtime_ready",
        correlation_id = "bootstrap",
        max_tool_rounds = settings.max_tool_rounds,
        history_window = settings.history_window,
        "agent runtime assembled"
    );

    Ok(Application { config, db_pool, runtime: Arc::new(runtime), notifications, audit, clock })
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use chrono::{NaiveDate, NaiveDateTime};

    use carebook_agent::llm::ScriptedLlmClient;
    use carebook_core::clock::Clock;
    use carebook_core::config::AppConfig;
    use carebook_db::{connect_with_settings, migrations, DemoClinicDataset};

    use super::{assemble, Application};

    /// Monday 2026-03-02 08:00, clinic-local.
    pub fn monday_morning() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 2)
            .and_then(|date| date.and_hms_opt(8, 0, 0))
            .expect("fixed timestamp")
    }

    pub async fn seeded_app(llm: Arc<ScriptedLlmClient>) -> Application {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("pool");
        migrations::run_pending(&pool).await.expect("migrations");
        DemoClinicDataset::load(&pool).await.expect("seed");
        assemble(AppConfig::default(), pool, llm, Clock::Fixed(monday_morning())).expect("assemble")
    }
}
