use std::sync::Arc;

use askdb_agent::crm_loop::CrmConversation;
use askdb_agent::llm::{HttpLlmClient, LlmClient};
use askdb_agent::workflow::{CrmBackend, SqlBackend, Workflow};
use askdb_core::config::{AppConfig, ConfigError, LoadOptions};
use askdb_core::errors::WorkflowError;
use askdb_core::routing::ToolDescriptor;
use askdb_core::tabulate::ResultRow;
use askdb_core::{SchemaMap, SchemaMapError};
use askdb_crm::{CrmClient, CrmError, CrmToolRunner};
use askdb_db::{apply_demo_dataset, capture_snapshot, connect, run_read_query, DbPool};
use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub workflow: Arc<Workflow>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("demo dataset seeding failed: {0}")]
    Seed(#[source] sqlx::Error),
    #[error("schema introspection failed: {0}")]
    Introspection(#[source] sqlx::Error),
    #[error(transparent)]
    SchemaMap(#[from] SchemaMapError),
    #[error("llm client setup failed: {0}")]
    Llm(#[source] anyhow::Error),
    #[error(transparent)]
    Crm(#[from] CrmError),
}

/// Executes generated SQL against the application pool.
struct PoolSqlBackend {
    pool: DbPool,
}

#[async_trait]
impl SqlBackend for PoolSqlBackend {
    async fn fetch(&self, sql: &str) -> Result<Vec<ResultRow>, WorkflowError> {
        run_read_query(&self.pool, sql).await
    }
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let db_pool = connect(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(event_name = "system.bootstrap.database_connected", "database connection established");

    // In-memory databases start empty; give them the demo dataset so the
    // server has something to answer questions about.
    if config.database.url.contains(":memory:") {
        apply_demo_dataset(&db_pool).await.map_err(BootstrapError::Seed)?;
        info!(event_name = "system.bootstrap.demo_seeded", "demo dataset applied");
    }

    let snapshot = capture_snapshot(&db_pool).await.map_err(BootstrapError::Introspection)?;
    info!(
        event_name = "system.bootstrap.schema_captured",
        table_count = snapshot.table_names().len(),
        column_count = snapshot.columns.len(),
        "schema snapshot captured"
    );

    let schema_map = SchemaMap::load(&config.database.schema_map_path)?;
    let schema_map = schema_map.merge_with_snapshot(&snapshot);
    if let Err(error) = schema_map.save(&config.database.schema_map_path) {
        // A read-only map location is not fatal; the merged map still
        // drives this process.
        warn!(
            event_name = "system.bootstrap.schema_map_not_saved",
            error = %error,
            "merged schema map could not be written back"
        );
    }

    let llm: Arc<dyn LlmClient> =
        Arc::new(HttpLlmClient::from_config(&config.llm).map_err(BootstrapError::Llm)?);

    let (crm, crm_catalog): (Option<Arc<dyn CrmBackend>>, Vec<ToolDescriptor>) =
        if config.crm.enabled {
            let client = CrmClient::from_config(&config.crm)?;
            // The tool set is only advertised to the router once the CRM has
            // answered a discovery call; an unreachable CRM leaves the
            // catalog empty so record questions fall through to SQL.
            match client.discover_tools().await {
                Ok(catalog) => {
                    let conversation = CrmConversation::new(
                        llm.clone(),
                        CrmToolRunner::new(client),
                        config.workflow.max_crm_steps,
                    );
                    info!(
                        event_name = "system.bootstrap.crm_enabled",
                        tool_count = catalog.len(),
                        "crm integration enabled"
                    );
                    (Some(Arc::new(conversation)), catalog)
                }
                Err(error) => {
                    warn!(
                        event_name = "system.bootstrap.crm_unreachable",
                        error = %error,
                        "crm enabled but not answering; continuing without crm tools"
                    );
                    (None, Vec::new())
                }
            }
        } else {
            info!(event_name = "system.bootstrap.crm_disabled", "crm integration disabled");
            (None, Vec::new())
        };

    let workflow = Arc::new(Workflow::new(
        llm,
        Arc::new(PoolSqlBackend { pool: db_pool.clone() }),
        crm,
        crm_catalog,
        Arc::new(snapshot),
        Arc::new(schema_map),
        &config.workflow,
    ));

    Ok(Application { config, db_pool, workflow })
}
