//! Integration repository implementation
//!
//! Persists the full integration row (credentials included) after every
//! mutation so connections survive restarts. The connection configuration
//! is stored as JSONB.

use async_trait::async_trait;
use callscope_core::{
    models::{Integration, IntegrationStatus},
    traits::{IntegrationRepository, Repository},
    AppError, AppResult,
};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{debug, error, instrument};
use uuid::Uuid;

/// PostgreSQL implementation of IntegrationRepository
pub struct PgIntegrationRepository {
    pool: PgPool,
}

impl PgIntegrationRepository {
    /// Create a new integration repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const INTEGRATION_SELECT_COLUMNS: &str = r#"
    id, name, vendor, status, config,
    last_sync, total_calls, error_count,
    created_at, updated_at
"#;

#[async_trait]
impl Repository<Integration, Uuid> for PgIntegrationRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Integration>> {
        let query = format!(
            "SELECT {} FROM integrations WHERE id = $1",
            INTEGRATION_SELECT_COLUMNS
        );

        let result = sqlx::query_as::<sqlx::Postgres, IntegrationRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error finding integration {}: {}", id, e);
                AppError::Database(format!("Failed to find integration: {}", e))
            })?;

        result.map(Integration::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn find_all(&self, limit: i64, offset: i64) -> AppResult<Vec<Integration>> {
        let query = format!(
            "SELECT {} FROM integrations ORDER BY created_at DESC LIMIT {} OFFSET {}",
            INTEGRATION_SELECT_COLUMNS, limit, offset
        );

        let rows = sqlx::query_as::<sqlx::Postgres, IntegrationRow>(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::Database(format!("Failed to list integrations: {}", e)))?;

        rows.into_iter().map(Integration::try_from).collect()
    }

    #[instrument(skip(self))]
    async fn count(&self) -> AppResult<i64> {
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM integrations")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(total.0)
    }

    #[instrument(skip(self, entity))]
    async fn create(&self, entity: &Integration) -> AppResult<Integration> {
        debug!("Creating integration: {} ({})", entity.name, entity.id);

        let config = serde_json::to_value(&entity.config)?;
        let query = format!(
            r#"
            INSERT INTO integrations (
                id, name, vendor, status, config,
                last_sync, total_calls, error_count,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {}
            "#,
            INTEGRATION_SELECT_COLUMNS
        );

        let row = sqlx::query_as::<sqlx::Postgres, IntegrationRow>(&query)
            .bind(entity.id)
            .bind(&entity.name)
            .bind(entity.vendor.as_str())
            .bind(entity.status.as_str())
            .bind(&config)
            .bind(entity.last_sync)
            .bind(entity.total_calls)
            .bind(entity.error_count)
            .bind(entity.created_at)
            .bind(entity.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error creating integration: {}", e);
                if e.to_string().contains("unique constraint") {
                    AppError::AlreadyExists(format!("Integration {} already exists", entity.id))
                } else {
                    AppError::Database(format!("Failed to create integration: {}", e))
                }
            })?;

        Integration::try_from(row)
    }

    #[instrument(skip(self, entity))]
    async fn update(&self, entity: &Integration) -> AppResult<Integration> {
        debug!("Updating integration: {}", entity.id);

        let config = serde_json::to_value(&entity.config)?;
        let query = format!(
            r#"
            UPDATE integrations
            SET name = $2,
                vendor = $3,
                status = $4,
                config = $5,
                last_sync = $6,
                total_calls = $7,
                error_count = $8,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            INTEGRATION_SELECT_COLUMNS
        );

        let row = sqlx::query_as::<sqlx::Postgres, IntegrationRow>(&query)
            .bind(entity.id)
            .bind(&entity.name)
            .bind(entity.vendor.as_str())
            .bind(entity.status.as_str())
            .bind(&config)
            .bind(entity.last_sync)
            .bind(entity.total_calls)
            .bind(entity.error_count)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error updating integration {}: {}", entity.id, e);
                AppError::Database(format!("Failed to update integration: {}", e))
            })?;

        Integration::try_from(row)
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        debug!("Deleting integration: {}", id);

        let result = sqlx::query("DELETE FROM integrations WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(format!("Failed to delete integration: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl IntegrationRepository for PgIntegrationRepository {
    #[instrument(skip(self))]
    async fn list_all(&self) -> AppResult<Vec<Integration>> {
        let query = format!(
            "SELECT {} FROM integrations ORDER BY created_at",
            INTEGRATION_SELECT_COLUMNS
        );

        let rows = sqlx::query_as::<sqlx::Postgres, IntegrationRow>(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::Database(format!("Failed to list integrations: {}", e)))?;

        rows.into_iter().map(Integration::try_from).collect()
    }

    #[instrument(skip(self))]
    async fn set_status(&self, id: Uuid, status: IntegrationStatus) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE integrations SET status = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(status.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(format!("Failed to set integration status: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(AppError::IntegrationNotFound(id.to_string()));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn record_sync(
        &self,
        id: Uuid,
        last_sync: Option<DateTime<Utc>>,
        calls_delta: i64,
        errors_delta: i64,
        status: IntegrationStatus,
    ) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE integrations
            SET last_sync = COALESCE($2, last_sync),
                total_calls = total_calls + $3,
                error_count = error_count + $4,
                status = $5,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(last_sync)
        .bind(calls_delta)
        .bind(errors_delta)
        .bind(status.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(format!("Failed to record sync outcome: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(AppError::IntegrationNotFound(id.to_string()));
        }
        Ok(())
    }
}

/// Helper struct for mapping database rows to the domain model
#[derive(Debug, sqlx::FromRow)]
struct IntegrationRow {
    id: Uuid,
    name: String,
    vendor: String,
    status: String,
    config: serde_json::Value,
    last_sync: Option<DateTime<Utc>>,
    total_calls: i64,
    error_count: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<IntegrationRow> for Integration {
    type Error = AppError;

    fn try_from(row: IntegrationRow) -> AppResult<Self> {
        let config = serde_json::from_value(row.config)
            .map_err(|e| AppError::Database(format!("Corrupt integration config: {}", e)))?;

        Ok(Integration {
            id: row.id,
            name: row.name,
            vendor: row
                .vendor
                .parse()
                .map_err(|e| AppError::Database(format!("Corrupt vendor in row: {}", e)))?,
            status: row
                .status
                .parse()
                .map_err(|e| AppError::Database(format!("Corrupt status in row: {}", e)))?,
            config,
            last_sync: row.last_sync,
            total_calls: row.total_calls,
            error_count: row.error_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
