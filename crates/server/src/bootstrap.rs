use std::sync::Arc;
use std::time::Duration;

use posada_agent::{cache, rate_limit};
use posada_agent::{
    AgentDeps, AgentSettings, BookingAgent, LlmError, OpenAiCompatibleClient, RateLimiter,
    SearchError, SearchProvider, TavilyClient, TtlCache,
};
use posada_core::clock::SystemClock;
use posada_core::config::{AppConfig, ConfigError, LoadOptions};
use posada_db::repositories::{SqlBookingLedger, SqlConversationStore, SqlRoomInventory};
use posada_db::{connect_with_settings, migrations, DbPool};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub agent: Arc<BookingAgent>,
    pub sweepers: Vec<JoinHandle<()>>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("llm client could not be built: {0}")]
    Llm(#[source] LlmError),
    #[error("search client could not be built: {0}")]
    Search(#[source] SearchError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        llm_provider = config.llm.provider.as_str(),
        search_enabled = config.search.enabled,
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
    let search: Option<Arc<dyn SearchProvider>> = if config.search.enabled {
        Some(Arc::new(TavilyClient::from_config(&config.search).map_err(BootstrapError::Search)?))
    } else {
        None
    };

    let rate_limiter = Arc::new(RateLimiter::new(
        Duration::from_secs(config.chat.rate_limit_window_secs),
        config.chat.rate_limit_max_messages,
    ));
    let web_cache = Arc::new(TtlCache::new(Duration::from_secs(config.chat.search_cache_ttl_secs)));
    let sweepers = vec![
        RateLimiter::spawn_sweeper(&rate_limiter, rate_limit::DEFAULT_SWEEP_INTERVAL),
        TtlCache::spawn_sweeper(&web_cache, cache::DEFAULT_SWEEP_INTERVAL),
    ];

    let ledger = Arc::new(SqlBookingLedger::new(db_pool.clone()));
    let deps = AgentDeps {
        conversations: Arc::new(SqlConversationStore::new(db_pool.clone())),
        inventory: Arc::new(SqlRoomInventory::new(db_pool.clone())),
        ledger,
        llm: Arc::new(llm),
        search,
        clock: Arc::new(SystemClock::with_offset_minutes(config.chat.utc_offset_minutes)),
        rate_limiter,
        web_cache,
    };
    let agent = Arc::new(BookingAgent::new(deps, AgentSettings::from_config(&config)));

    Ok(Application { config, db_pool, agent, sweepers })
}
