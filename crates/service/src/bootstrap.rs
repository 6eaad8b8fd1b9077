//! Process wiring: configuration, logging, database, adapters, services.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use orderline_core::{AppConfig, ConfigError, ServiceError};
use orderline_db::repositories::{
    SqlCallRepository, SqlCredentialRepository, SqlMenuRepository, SqlOrderRepository,
    SqlRestaurantRepository,
};
use orderline_db::{connect, migrations, DbPool};
use orderline_pos::PosRegistry;

use crate::credentials::CredentialService;
use crate::pipeline::OrderPipeline;
use crate::tenant::{CallRegistry, TenantResolver};

/// The fully wired operation surface handed to the inbound layer.
pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub tenants: TenantResolver,
    pub call_registry: CallRegistry,
    pub pipeline: OrderPipeline,
    pub credentials: CredentialService,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("provider setup failed: {0}")]
    Pos(#[from] ServiceError),
}

pub fn init_logging(config: &AppConfig) {
    use orderline_core::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

pub async fn bootstrap() -> Result<Application, BootstrapError> {
    bootstrap_with_config(AppConfig::from_env()?).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    let db_pool =
        connect(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!("database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!("database migrations applied");

    Ok(build_application(config, db_pool)?)
}

/// Wires services onto an already migrated pool. Split out so tests can
/// bootstrap against an in-memory database without touching process env.
pub fn build_application(config: AppConfig, db_pool: DbPool) -> Result<Application, ServiceError> {
    let restaurants = Arc::new(SqlRestaurantRepository::new(db_pool.clone()));
    let menus = Arc::new(SqlMenuRepository::new(db_pool.clone()));
    let calls = Arc::new(SqlCallRepository::new(db_pool.clone()));
    let orders = Arc::new(SqlOrderRepository::new(db_pool.clone()));
    let credentials = Arc::new(SqlCredentialRepository::new(db_pool.clone()));

    let registry = Arc::new(PosRegistry::new(&config, credentials.clone())?);
    let tenants = TenantResolver::new(restaurants.clone(), menus);
    let call_registry = CallRegistry::new(tenants.clone(), calls.clone());
    let pipeline =
        OrderPipeline::new(tenants.clone(), calls, orders, Arc::clone(&registry));
    let credential_service =
        CredentialService::new(restaurants, credentials, registry, config.clover.clone());

    Ok(Application {
        config,
        db_pool,
        tenants,
        call_registry,
        pipeline,
        credentials: credential_service,
    })
}
