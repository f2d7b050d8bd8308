use crate::config::AppConfig;
use crate::errors::ServiceError;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::time::Duration;
use tracing::info;

/// Type alias for a database connection pool
pub type DbPool = DatabaseConnection;

/// Establishes a connection pool to the database using the application
/// configuration. Collaborator calls carry a bounded acquire timeout so a
/// stalled database aborts order creation instead of hanging checkout.
pub async fn establish_connection(config: &AppConfig) -> Result<DbPool, ServiceError> {
    let mut options = ConnectOptions::new(config.database_url.clone());
    options
        .max_connections(config.db_max_connections)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(config.request_timeout_secs))
        .acquire_timeout(Duration::from_secs(config.request_timeout_secs))
        .idle_timeout(Duration::from_secs(600))
        .sqlx_logging(false);

    let pool = Database::connect(options).await?;
    info!(max_connections = config.db_max_connections, "Database connection established");
    Ok(pool)
}

/// Applies any pending embedded migrations.
pub async fn run_migrations(pool: &DbPool) -> Result<(), ServiceError> {
    use sea_orm_migration::MigratorTrait;

    info!("Running database migrations");
    crate::migrator::Migrator::up(pool, None).await?;
    Ok(())
}
