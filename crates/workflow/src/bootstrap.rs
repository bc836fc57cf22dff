use salesgate_core::config::{AppConfig, ConfigError, LoadOptions};
use salesgate_db::{connect_with_settings, migrations, DbPool};
use thiserror::Error;
use tracing::info;

use crate::approvals::ApprovalService;
use crate::credit::CreditService;
use crate::gate::OrderConfirmationGate;
use crate::stores::Stores;

/// The three services wired over one set of stores.
#[derive(Clone)]
pub struct Services {
    pub gate: OrderConfirmationGate,
    pub approvals: ApprovalService,
    pub credit: CreditService,
}

impl Services {
    pub fn new(stores: Stores, config: &AppConfig) -> Self {
        let naming = config.request_naming();
        let credit = CreditService::new(stores.clone(), config.company_currency());
        let gate = OrderConfirmationGate::new(stores.clone(), credit.clone(), naming.clone());
        let approvals = ApprovalService::new(stores, gate.clone(), naming);
        Self { gate, approvals, credit }
    }
}

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub services: Services,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

/// Loads configuration, opens the database, applies pending migrations
/// and wires the services over SQL stores.
pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        database_url = %config.database.url,
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "system.bootstrap.migrations_applied", "database migrations applied");

    let services = Services::new(Stores::sql(db_pool.clone()), &config);
    Ok(Application { config, db_pool, services })
}
