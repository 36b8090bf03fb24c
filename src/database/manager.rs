use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::info;

use crate::config;

/// Errors from DatabaseManager
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

static POOL: OnceCell<PgPool> = OnceCell::const_new();

/// Process-wide connection pool, built lazily from configuration.
pub struct DatabaseManager;

impl DatabaseManager {
    pub async fn pool() -> Result<&'static PgPool, DatabaseError> {
        POOL.get_or_try_init(|| async {
            let database = &config::config().database;
            let pool = PgPoolOptions::new()
                .max_connections(database.max_connections)
                .acquire_timeout(Duration::from_secs(database.connection_timeout))
                .connect(&database.url)
                .await?;
            info!("database pool established");
            Ok(pool)
        })
        .await
    }

    /// Run embedded migrations. Called once at startup.
    pub async fn migrate() -> Result<(), DatabaseError> {
        let pool = Self::pool().await?;
        sqlx::migrate!("./migrations").run(pool).await?;
        Ok(())
    }

    pub async fn health_check() -> Result<(), DatabaseError> {
        let pool = Self::pool().await?;
        sqlx::query("SELECT 1").execute(pool).await?;
        Ok(())
    }
}
