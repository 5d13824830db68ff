use std::sync::Arc;

use chatorder_agent::{
    create_client, ExtractionInvoker, ExtractionSettings, FeedbackRecorder, LlmError,
    LoggingCustomerMessenger, LoggingOrderManagement, Orchestrator, OrchestratorParts,
};
use chatorder_core::audit::{AuditSink, TracingAuditSink};
use chatorder_core::config::{AppConfig, ConfigError, LoadOptions};
use chatorder_core::menu::MenuRegistry;
use chatorder_core::reconcile::Reconciler;
use chatorder_db::{
    connect_with_settings, migrations, DbPool, DraftOrderRepository, OrderIntentRepository,
    SqlDraftOrderRepository, SqlOrderIntentRepository,
};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub drafts: Arc<dyn DraftOrderRepository>,
    pub intents: Arc<dyn OrderIntentRepository>,
    pub orchestrator: Arc<Orchestrator>,
    pub feedback: Arc<FeedbackRecorder>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("language model client setup failed: {0}")]
    LlmClient(#[source] LlmError),
    #[error("extraction prompt template failed to compile: {0}")]
    PromptTemplate(#[source] tera::Error),
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
        "starting application bootstrap"
    );
    config.validate()?;

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

    let client = create_client(&config.llm).map_err(BootstrapError::LlmClient)?;
    let settings = ExtractionSettings::from_config(&config.llm, &config.extraction);
    let extractor =
        Arc::new(ExtractionInvoker::new(client, settings).map_err(BootstrapError::PromptTemplate)?);

    let registry = Arc::new(MenuRegistry::new());
    let drafts: Arc<dyn DraftOrderRepository> =
        Arc::new(SqlDraftOrderRepository::new(db_pool.clone()));
    let intents: Arc<dyn OrderIntentRepository> =
        Arc::new(SqlOrderIntentRepository::new(db_pool.clone()));
    let audit: Arc<dyn AuditSink> = Arc::new(TracingAuditSink);

    let orchestrator = Arc::new(Orchestrator::new(OrchestratorParts {
        registry,
        extractor,
        reconciler: Reconciler::new(config.extraction.confidence_threshold),
        drafts: drafts.clone(),
        intents: intents.clone(),
        order_management: Arc::new(LoggingOrderManagement),
        messenger: Arc::new(LoggingCustomerMessenger),
        audit: audit.clone(),
        top_k: config.extraction.top_k,
    }));
    let feedback = Arc::new(FeedbackRecorder::new(intents.clone(), audit));

    info!(
        event_name = "system.bootstrap.ready",
        correlation_id = "bootstrap",
        confidence_threshold = config.extraction.confidence_threshold,
        model = %config.llm.model,
        "order intake runtime assembled"
    );

    Ok(Application { config, db_pool, drafts, intents, orchestrator, feedback })
}
