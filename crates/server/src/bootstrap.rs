use std::sync::Arc;
use std::time::Duration;

use cadence_agent::controller::TurnController;
use cadence_agent::engine::DecisionEngine;
use cadence_agent::openai::HttpLlmClient;
use cadence_agent::session::InMemorySessionStore;
use cadence_agent::translate::{LlmTranslator, NoopTranslator, Translator};
use cadence_core::config::{AppConfig, ConfigError, LoadOptions};
use cadence_db::{connect_with_settings, migrations, DbPool, SqlCalendar};
use cadence_db::repositories::{SqlLeadRepository, SqlMeetingRepository};
use thiserror::Error;
use tracing::info;

use crate::outbound::HttpVoiceGateway;

/// Number of slots put on the table per offer.
pub const SLOT_OFFER_COUNT: usize = 2;

/// Shared handler state for every HTTP surface.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db_pool: DbPool,
    pub controller: Arc<TurnController>,
    pub leads: SqlLeadRepository,
    pub meetings: SqlMeetingRepository,
    pub translator: Arc<dyn Translator>,
    pub gateway: Option<Arc<HttpVoiceGateway>>,
}

impl AppState {
    pub fn llm_configured(&self) -> bool {
        self.config.llm.is_configured()
    }
}

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub state: AppState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("llm client initialization failed: {0}")]
    Llm(String),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
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

    let llm_client = Arc::new(
        HttpLlmClient::from_config(&config.llm).map_err(|err| BootstrapError::Llm(err.to_string()))?,
    );
    let engine = DecisionEngine::new(
        llm_client.clone(),
        Duration::from_secs(config.llm.timeout_secs),
        config.llm.max_retries,
    );

    let translator: Arc<dyn Translator> =
        if config.voice.needs_translation() && config.llm.is_configured() {
            Arc::new(LlmTranslator::new(
                llm_client,
                config.voice.caller_language.clone(),
                config.voice.working_language.clone(),
            ))
        } else {
            Arc::new(NoopTranslator)
        };

    let controller = Arc::new(TurnController::new(
        Arc::new(InMemorySessionStore::new()),
        engine,
        Arc::new(SqlCalendar::new(db_pool.clone())),
        SLOT_OFFER_COUNT,
    ));

    let gateway = HttpVoiceGateway::from_config(&config.voice).map(Arc::new);

    let state = AppState {
        config: Arc::new(config.clone()),
        db_pool: db_pool.clone(),
        controller,
        leads: SqlLeadRepository::new(db_pool.clone()),
        meetings: SqlMeetingRepository::new(db_pool.clone()),
        translator,
        gateway,
    };

    Ok(Application { config, db_pool, state })
}

#[cfg(test)]
mod tests {
    use cadence_core::config::{ConfigOverrides, LoadOptions};

    use super::bootstrap;

    fn memory_options() -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:?cache=shared".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_prepares_schema_and_state() {
        let app = bootstrap(memory_options()).await.expect("bootstrap should succeed");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN ('leads', 'meetings')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("baseline tables should exist after bootstrap");
        assert_eq!(table_count, 2);

        assert!(app.state.gateway.is_none(), "no gateway without credentials");

        app.db_pool.close().await;
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_on_invalid_database_url() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("postgres://nope".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        assert!(result.is_err(), "non-sqlite url should fail config validation");
    }
}
