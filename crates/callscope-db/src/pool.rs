//! PostgreSQL connection pool management

use callscope_core::{AppError, AppResult};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::{info, warn};

/// Default maximum number of connections in the pool
const DEFAULT_MAX_CONNECTIONS: u32 = 20;

/// Connection acquire timeout in seconds
const ACQUIRE_TIMEOUT_SECS: u64 = 30;

/// Idle connection timeout in seconds
const IDLE_TIMEOUT_SECS: u64 = 600;

/// Create a PostgreSQL connection pool
///
/// # Arguments
///
/// * `database_url` - PostgreSQL connection URL
/// * `max_connections` - Maximum number of connections (None = default)
pub async fn create_pool(database_url: &str, max_connections: Option<u32>) -> AppResult<PgPool> {
    let max_conns = max_connections.unwrap_or(DEFAULT_MAX_CONNECTIONS);
    info!("Creating database pool with {} max connections", max_conns);

    let pool = PgPoolOptions::new()
        .max_connections(max_conns)
        .acquire_timeout(Duration::from_secs(ACQUIRE_TIMEOUT_SECS))
        .idle_timeout(Some(Duration::from_secs(IDLE_TIMEOUT_SECS)))
        .test_before_acquire(true)
        .connect(database_url)
        .await
        .map_err(|e| {
            warn!("Failed to create database pool: {}", e);
            AppError::Pool(format!("Failed to connect to database: {}", e))
        })?;

    // Verify connectivity before handing the pool out
    sqlx::query("SELECT 1")
        .execute(&pool)
        .await
        .map_err(|e| AppError::Database(format!("Database health check failed: {}", e)))?;

    info!("Database connection verified");

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires database
    async fn test_create_pool() {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgresql://localhost/callscope".to_string());

        let result = create_pool(&database_url, Some(5)).await;
        assert!(result.is_ok());
    }
}
