//! Admin filter repository implementation
//!
//! Stores the admin-defined predicate filters. The polymorphic value is
//! kept as JSONB in its wire shape (string, array, number, or {min,max}).

use async_trait::async_trait;
use callscope_core::{
    models::AdminFilter,
    traits::{AdminFilterRepository, Repository},
    AppError, AppResult,
};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{debug, error, instrument};
use uuid::Uuid;

/// PostgreSQL implementation of AdminFilterRepository
pub struct PgAdminFilterRepository {
    pool: PgPool,
}

impl PgAdminFilterRepository {
    /// Create a new admin filter repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const FILTER_SELECT_COLUMNS: &str = r#"
    id, filter_type, operator, filter_value,
    applies_to, is_active, created_by, created_at
"#;

#[async_trait]
impl Repository<AdminFilter, Uuid> for PgAdminFilterRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<AdminFilter>> {
        let query = format!(
            "SELECT {} FROM admin_filters WHERE id = $1",
            FILTER_SELECT_COLUMNS
        );

        let result = sqlx::query_as::<sqlx::Postgres, FilterRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error finding filter {}: {}", id, e);
                AppError::Database(format!("Failed to find filter: {}", e))
            })?;

        result.map(AdminFilter::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn find_all(&self, limit: i64, offset: i64) -> AppResult<Vec<AdminFilter>> {
        let query = format!(
            "SELECT {} FROM admin_filters ORDER BY created_at DESC LIMIT {} OFFSET {}",
            FILTER_SELECT_COLUMNS, limit, offset
        );

        let rows = sqlx::query_as::<sqlx::Postgres, FilterRow>(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::Database(format!("Failed to list filters: {}", e)))?;

        rows.into_iter().map(AdminFilter::try_from).collect()
    }

    #[instrument(skip(self))]
    async fn count(&self) -> AppResult<i64> {
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM admin_filters")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(total.0)
    }

    #[instrument(skip(self, entity))]
    async fn create(&self, entity: &AdminFilter) -> AppResult<AdminFilter> {
        debug!(
            "Creating admin filter: {} {} ({})",
            entity.filter_type, entity.operator, entity.id
        );

        let value = serde_json::to_value(&entity.filter_value)?;
        let query = format!(
            r#"
            INSERT INTO admin_filters (
                id, filter_type, operator, filter_value,
                applies_to, is_active, created_by, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            FILTER_SELECT_COLUMNS
        );

        let row = sqlx::query_as::<sqlx::Postgres, FilterRow>(&query)
            .bind(entity.id)
            .bind(entity.filter_type.as_str())
            .bind(entity.operator.as_str())
            .bind(&value)
            .bind(&entity.applies_to)
            .bind(entity.is_active)
            .bind(&entity.created_by)
            .bind(entity.created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error creating filter: {}", e);
                AppError::Database(format!("Failed to create filter: {}", e))
            })?;

        AdminFilter::try_from(row)
    }

    #[instrument(skip(self, entity))]
    async fn update(&self, entity: &AdminFilter) -> AppResult<AdminFilter> {
        debug!("Updating admin filter: {}", entity.id);

        let value = serde_json::to_value(&entity.filter_value)?;
        let query = format!(
            r#"
            UPDATE admin_filters
            SET filter_type = $2,
                operator = $3,
                filter_value = $4,
                applies_to = $5,
                is_active = $6
            WHERE id = $1
            RETURNING {}
            "#,
            FILTER_SELECT_COLUMNS
        );

        let row = sqlx::query_as::<sqlx::Postgres, FilterRow>(&query)
            .bind(entity.id)
            .bind(entity.filter_type.as_str())
            .bind(entity.operator.as_str())
            .bind(&value)
            .bind(&entity.applies_to)
            .bind(entity.is_active)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error updating filter {}: {}", entity.id, e);
                AppError::Database(format!("Failed to update filter: {}", e))
            })?;

        AdminFilter::try_from(row)
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM admin_filters WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(format!("Failed to delete filter: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl AdminFilterRepository for PgAdminFilterRepository {
    #[instrument(skip(self))]
    async fn list_for_context(&self, context: &str) -> AppResult<Vec<AdminFilter>> {
        let query = format!(
            r#"
            SELECT {}
            FROM admin_filters
            WHERE is_active = TRUE AND $1 = ANY(applies_to)
            ORDER BY created_at DESC
            "#,
            FILTER_SELECT_COLUMNS
        );

        let rows = sqlx::query_as::<sqlx::Postgres, FilterRow>(&query)
            .bind(context)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::Database(format!("Failed to load context filters: {}", e)))?;

        rows.into_iter().map(AdminFilter::try_from).collect()
    }
}

/// Helper struct for mapping database rows to the domain model
#[derive(Debug, sqlx::FromRow)]
struct FilterRow {
    id: Uuid,
    filter_type: String,
    operator: String,
    filter_value: serde_json::Value,
    applies_to: Vec<String>,
    is_active: bool,
    created_by: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<FilterRow> for AdminFilter {
    type Error = AppError;

    fn try_from(row: FilterRow) -> AppResult<Self> {
        let filter_value = serde_json::from_value(row.filter_value)
            .map_err(|e| AppError::Database(format!("Corrupt filter value: {}", e)))?;

        Ok(AdminFilter {
            id: row.id,
            filter_type: row
                .filter_type
                .parse()
                .map_err(|e| AppError::Database(format!("Corrupt filter type: {}", e)))?,
            filter_value,
            operator: row
                .operator
                .parse()
                .map_err(|e| AppError::Database(format!("Corrupt operator: {}", e)))?,
            applies_to: row.applies_to,
            is_active: row.is_active,
            created_by: row.created_by,
            created_at: row.created_at,
        })
    }
}
