//! Call ledger repository implementation
//!
//! PostgreSQL-backed storage for canonical call records. Uses runtime
//! queries (not compile-time macros) to avoid requiring a database
//! connection at build time. Filtered listing builds raw SQL with escaped
//! literal values; the values are either enum spellings we control or are
//! quote-escaped before interpolation.

use async_trait::async_trait;
use callscope_core::{
    models::{CallQuery, CallRecord, VendorKind},
    traits::{CallRepository, CallStats, Repository, VendorCount},
    AppError, AppResult,
};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{debug, error, instrument};

/// PostgreSQL implementation of CallRepository
pub struct PgCallRepository {
    pool: PgPool,
}

impl PgCallRepository {
    /// Create a new call repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const CALL_SELECT_COLUMNS: &str = r#"
    id, external_id, vendor, direction,
    from_number, to_number, duration_seconds,
    start_time, end_time, recording_url,
    campaign_id, agent_id, customer_id, disposition,
    status, transcription_status, analysis_status,
    metadata, created_at, updated_at
"#;

/// Escape a literal for inclusion in raw SQL
fn sql_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn sql_list(values: &[String]) -> String {
    values
        .iter()
        .map(|v| sql_quote(v))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Membership clause; an empty set is an unsatisfiable intersection
fn membership(expr: &str, values: &[String]) -> String {
    if values.is_empty() {
        "FALSE".to_string()
    } else {
        format!("{} IN ({})", expr, sql_list(values))
    }
}

/// Coalesced metadata lookup matching `CallQuery`'s in-memory candidates
fn metadata_expr(keys: &[&str]) -> String {
    let parts: Vec<String> = keys
        .iter()
        .map(|k| format!("metadata->>{}", sql_quote(k)))
        .collect();
    format!("COALESCE({}, '')", parts.join(", "))
}

/// Translate a `CallQuery` into a WHERE clause ("" when unconstrained)
fn build_where(query: &CallQuery) -> String {
    let mut parts: Vec<String> = Vec::new();

    if let Some(vendor) = query.vendor {
        parts.push(format!("vendor = {}", sql_quote(vendor.as_str())));
    }
    if let Some(direction) = query.direction {
        parts.push(format!("direction = {}", sql_quote(direction.as_str())));
    }
    if let Some(ref campaign_id) = query.campaign_id {
        parts.push(format!("campaign_id = {}", sql_quote(campaign_id)));
    }
    if let Some(start) = query.start_date {
        parts.push(format!(
            "start_time >= '{}'",
            start.format("%Y-%m-%d %H:%M:%S%z")
        ));
    }
    if let Some(end) = query.end_date {
        parts.push(format!(
            "start_time < '{}'",
            end.format("%Y-%m-%d %H:%M:%S%z")
        ));
    }
    if let Some(min) = query.min_duration {
        parts.push(format!("duration_seconds >= {}", min));
    }
    if let Some(max) = query.max_duration {
        parts.push(format!("duration_seconds <= {}", max));
    }

    if let Some(ref names) = query.agent_names {
        parts.push(membership("COALESCE(agent_id, '')", names));
    }
    if !query.agent_names_excluded.is_empty() {
        parts.push(format!(
            "COALESCE(agent_id, '') NOT IN ({})",
            sql_list(&query.agent_names_excluded)
        ));
    }
    if let Some(ref needle) = query.agent_name_contains {
        parts.push(format!(
            "agent_id ILIKE {}",
            sql_quote(&format!("%{}%", needle))
        ));
    }

    let publisher = metadata_expr(&["publisher_name", "publisher", "affiliate"]);
    if let Some(ref names) = query.publisher_names {
        parts.push(membership(&publisher, names));
    }
    if !query.publisher_names_excluded.is_empty() {
        parts.push(format!(
            "{} NOT IN ({})",
            publisher,
            sql_list(&query.publisher_names_excluded)
        ));
    }
    if let Some(ref needle) = query.publisher_name_contains {
        parts.push(format!(
            "{} ILIKE {}",
            publisher,
            sql_quote(&format!("%{}%", needle))
        ));
    }

    let campaign_status = metadata_expr(&["campaign_status", "campaignStatus"]);
    if let Some(ref statuses) = query.campaign_statuses {
        parts.push(membership(&campaign_status, statuses));
    }
    if !query.campaign_statuses_excluded.is_empty() {
        parts.push(format!(
            "{} NOT IN ({})",
            campaign_status,
            sql_list(&query.campaign_statuses_excluded)
        ));
    }

    for keyword in &query.keywords {
        let pattern = sql_quote(&format!("%{}%", keyword));
        parts.push(format!(
            "(COALESCE(disposition, '') ILIKE {} OR metadata::text ILIKE {})",
            pattern, pattern
        ));
    }

    for (key, value) in &query.custom_equals {
        parts.push(format!("metadata->>{} = {}", sql_quote(key), sql_quote(value)));
    }
    for (key, value) in &query.custom_contains {
        parts.push(format!(
            "metadata->>{} ILIKE {}",
            sql_quote(key),
            sql_quote(&format!("%{}%", value))
        ));
    }

    if parts.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", parts.join(" AND "))
    }
}

#[async_trait]
impl Repository<CallRecord, String> for PgCallRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: String) -> AppResult<Option<CallRecord>> {
        debug!("Finding call record by id: {}", id);

        let query = format!("SELECT {} FROM call_records WHERE id = $1", CALL_SELECT_COLUMNS);

        let result = sqlx::query_as::<sqlx::Postgres, CallRow>(&query)
            .bind(&id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error finding call {}: {}", id, e);
                AppError::Database(format!("Failed to find call record: {}", e))
            })?;

        result.map(CallRecord::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn find_all(&self, limit: i64, offset: i64) -> AppResult<Vec<CallRecord>> {
        let query = format!(
            "SELECT {} FROM call_records ORDER BY start_time DESC LIMIT {} OFFSET {}",
            CALL_SELECT_COLUMNS, limit, offset
        );

        let rows = sqlx::query_as::<sqlx::Postgres, CallRow>(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::Database(format!("Failed to list call records: {}", e)))?;

        rows.into_iter().map(CallRecord::try_from).collect()
    }

    #[instrument(skip(self))]
    async fn count(&self) -> AppResult<i64> {
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM call_records")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(total.0)
    }

    #[instrument(skip(self, entity))]
    async fn create(&self, entity: &CallRecord) -> AppResult<CallRecord> {
        debug!("Creating call record: {}", entity.id);

        let query = format!(
            r#"
            INSERT INTO call_records (
                id, external_id, vendor, direction,
                from_number, to_number, duration_seconds,
                start_time, end_time, recording_url,
                campaign_id, agent_id, customer_id, disposition,
                status, transcription_status, analysis_status,
                metadata, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                    $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)
            RETURNING {}
            "#,
            CALL_SELECT_COLUMNS
        );

        let row = bind_call(sqlx::query_as::<sqlx::Postgres, CallRow>(&query), entity)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error creating call {}: {}", entity.id, e);
                if e.to_string().contains("unique constraint") {
                    AppError::AlreadyExists(format!("Call {} already exists", entity.id))
                } else {
                    AppError::Database(format!("Failed to create call record: {}", e))
                }
            })?;

        CallRecord::try_from(row)
    }

    #[instrument(skip(self, entity))]
    async fn update(&self, entity: &CallRecord) -> AppResult<CallRecord> {
        debug!("Updating call record: {}", entity.id);

        let query = format!(
            r#"
            UPDATE call_records
            SET external_id = $2,
                vendor = $3,
                direction = $4,
                from_number = $5,
                to_number = $6,
                duration_seconds = $7,
                start_time = $8,
                end_time = $9,
                recording_url = $10,
                campaign_id = $11,
                agent_id = $12,
                customer_id = $13,
                disposition = $14,
                status = $15,
                transcription_status = $16,
                analysis_status = $17,
                metadata = $18,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            CALL_SELECT_COLUMNS
        );

        let row = sqlx::query_as::<sqlx::Postgres, CallRow>(&query)
            .bind(&entity.id)
            .bind(&entity.external_id)
            .bind(entity.vendor.as_str())
            .bind(entity.direction.as_str())
            .bind(&entity.from_number)
            .bind(&entity.to_number)
            .bind(entity.duration_seconds)
            .bind(entity.start_time)
            .bind(entity.end_time)
            .bind(&entity.recording_url)
            .bind(&entity.campaign_id)
            .bind(&entity.agent_id)
            .bind(&entity.customer_id)
            .bind(&entity.disposition)
            .bind(entity.status.as_str())
            .bind(entity.transcription_status.as_str())
            .bind(entity.analysis_status.as_str())
            .bind(&entity.metadata)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error updating call {}: {}", entity.id, e);
                AppError::Database(format!("Failed to update call record: {}", e))
            })?;

        CallRecord::try_from(row)
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: String) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM call_records WHERE id = $1")
            .bind(&id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(format!("Failed to delete call record: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl CallRepository for PgCallRepository {
    #[instrument(skip(self))]
    async fn find_by_external(
        &self,
        vendor: VendorKind,
        external_id: &str,
    ) -> AppResult<Option<CallRecord>> {
        let query = format!(
            "SELECT {} FROM call_records WHERE vendor = $1 AND external_id = $2",
            CALL_SELECT_COLUMNS
        );

        let result = sqlx::query_as::<sqlx::Postgres, CallRow>(&query)
            .bind(vendor.as_str())
            .bind(external_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::Database(format!("Failed to find call record: {}", e)))?;

        result.map(CallRecord::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn exists_external(&self, vendor: VendorKind, external_id: &str) -> AppResult<bool> {
        let exists: (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM call_records WHERE vendor = $1 AND external_id = $2)",
        )
        .bind(vendor.as_str())
        .bind(external_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::Database(format!("Failed to check call existence: {}", e)))?;

        Ok(exists.0)
    }

    #[instrument(skip(self, record))]
    async fn upsert(&self, record: &CallRecord) -> AppResult<CallRecord> {
        debug!("Upserting call record: {}", record.id);

        let query = format!(
            r#"
            INSERT INTO call_records (
                id, external_id, vendor, direction,
                from_number, to_number, duration_seconds,
                start_time, end_time, recording_url,
                campaign_id, agent_id, customer_id, disposition,
                status, transcription_status, analysis_status,
                metadata, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                    $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)
            ON CONFLICT (id) DO UPDATE SET
                duration_seconds = EXCLUDED.duration_seconds,
                end_time = EXCLUDED.end_time,
                recording_url = EXCLUDED.recording_url,
                disposition = EXCLUDED.disposition,
                status = EXCLUDED.status,
                transcription_status = EXCLUDED.transcription_status,
                analysis_status = EXCLUDED.analysis_status,
                metadata = EXCLUDED.metadata,
                updated_at = NOW()
            RETURNING {}
            "#,
            CALL_SELECT_COLUMNS
        );

        let row = bind_call(sqlx::query_as::<sqlx::Postgres, CallRow>(&query), record)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error upserting call {}: {}", record.id, e);
                AppError::Database(format!("Failed to upsert call record: {}", e))
            })?;

        CallRecord::try_from(row)
    }

    #[instrument(skip(self, query))]
    async fn list_filtered(
        &self,
        query: &CallQuery,
        limit: i64,
        offset: i64,
    ) -> AppResult<(Vec<CallRecord>, i64)> {
        let where_clause = build_where(query);
        debug!("Listing call records: {}", where_clause);

        let count_sql = format!("SELECT COUNT(*) FROM call_records {}", where_clause);
        let data_sql = format!(
            "SELECT {} FROM call_records {} ORDER BY start_time DESC LIMIT {} OFFSET {}",
            CALL_SELECT_COLUMNS, where_clause, limit, offset
        );

        let total: (i64,) = sqlx::query_as(&count_sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error counting filtered calls: {}", e);
                AppError::Database(format!("Failed to count call records: {}", e))
            })?;

        let rows = sqlx::query_as::<sqlx::Postgres, CallRow>(&data_sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error fetching filtered calls: {}", e);
                AppError::Database(format!("Failed to fetch call records: {}", e))
            })?;

        let records: AppResult<Vec<CallRecord>> =
            rows.into_iter().map(CallRecord::try_from).collect();
        Ok((records?, total.0))
    }

    #[instrument(skip(self))]
    async fn stats(&self) -> AppResult<CallStats> {
        let (total_calls, average_duration_seconds): (i64, f64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(AVG(duration_seconds), 0)::float8 FROM call_records",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        let (inbound, outbound, recorded, transcribed, pending, failed): (
            i64,
            i64,
            i64,
            i64,
            i64,
            i64,
        ) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE direction = 'inbound'),
                COUNT(*) FILTER (WHERE direction = 'outbound'),
                COUNT(*) FILTER (WHERE recording_url IS NOT NULL),
                COUNT(*) FILTER (WHERE transcription_status = 'completed'),
                COUNT(*) FILTER (WHERE transcription_status = 'pending'),
                COUNT(*) FILTER (WHERE transcription_status = 'failed')
            FROM call_records
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        let vendor_rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT vendor, COUNT(*) FROM call_records GROUP BY vendor ORDER BY vendor")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(CallStats {
            total_calls,
            inbound_calls: inbound,
            outbound_calls: outbound,
            recorded_calls: recorded,
            transcribed_calls: transcribed,
            transcription_pending: pending,
            transcription_failed: failed,
            average_duration_seconds,
            calls_by_vendor: vendor_rows
                .into_iter()
                .map(|(vendor, calls)| VendorCount { vendor, calls })
                .collect(),
        })
    }
}

type CallQueryAs<'q> = sqlx::query::QueryAs<'q, sqlx::Postgres, CallRow, sqlx::postgres::PgArguments>;

/// Bind all insert columns in declaration order
fn bind_call<'q>(query: CallQueryAs<'q>, entity: &'q CallRecord) -> CallQueryAs<'q> {
    query
        .bind(&entity.id)
        .bind(&entity.external_id)
        .bind(entity.vendor.as_str())
        .bind(entity.direction.as_str())
        .bind(&entity.from_number)
        .bind(&entity.to_number)
        .bind(entity.duration_seconds)
        .bind(entity.start_time)
        .bind(entity.end_time)
        .bind(&entity.recording_url)
        .bind(&entity.campaign_id)
        .bind(&entity.agent_id)
        .bind(&entity.customer_id)
        .bind(&entity.disposition)
        .bind(entity.status.as_str())
        .bind(entity.transcription_status.as_str())
        .bind(entity.analysis_status.as_str())
        .bind(&entity.metadata)
        .bind(entity.created_at)
        .bind(entity.updated_at)
}

/// Helper struct for mapping database rows to the domain model
#[derive(Debug, sqlx::FromRow)]
struct CallRow {
    id: String,
    external_id: String,
    vendor: String,
    direction: String,
    from_number: String,
    to_number: String,
    duration_seconds: i64,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
    recording_url: Option<String>,
    campaign_id: Option<String>,
    agent_id: Option<String>,
    customer_id: Option<String>,
    disposition: Option<String>,
    status: String,
    transcription_status: String,
    analysis_status: String,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CallRow> for CallRecord {
    type Error = AppError;

    fn try_from(row: CallRow) -> AppResult<Self> {
        let parse = |what: &str, err: String| {
            AppError::Database(format!("Corrupt {} in call row: {}", what, err))
        };

        Ok(CallRecord {
            id: row.id,
            external_id: row.external_id,
            vendor: row.vendor.parse().map_err(|e| parse("vendor", e))?,
            direction: row.direction.parse().map_err(|e| parse("direction", e))?,
            from_number: row.from_number,
            to_number: row.to_number,
            duration_seconds: row.duration_seconds,
            start_time: row.start_time,
            end_time: row.end_time,
            recording_url: row.recording_url,
            campaign_id: row.campaign_id,
            agent_id: row.agent_id,
            customer_id: row.customer_id,
            disposition: row.disposition,
            status: row.status.parse().map_err(|e| parse("status", e))?,
            transcription_status: row
                .transcription_status
                .parse()
                .map_err(|e| parse("transcription_status", e))?,
            analysis_status: row
                .analysis_status
                .parse()
                .map_err(|e| parse("analysis_status", e))?,
            metadata: row.metadata,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_quote_escapes() {
        assert_eq!(sql_quote("O'Brien"), "'O''Brien'");
        assert_eq!(sql_quote("plain"), "'plain'");
    }

    #[test]
    fn test_build_where_empty_query() {
        assert_eq!(build_where(&CallQuery::default()), "");
    }

    #[test]
    fn test_build_where_duration_and_vendor() {
        let query = CallQuery {
            vendor: Some(VendorKind::Ringba),
            min_duration: Some(30),
            max_duration: Some(120),
            ..Default::default()
        };
        let clause = build_where(&query);
        assert!(clause.starts_with("WHERE "));
        assert!(clause.contains("vendor = 'ringba'"));
        assert!(clause.contains("duration_seconds >= 30"));
        assert!(clause.contains("duration_seconds <= 120"));
    }

    #[test]
    fn test_build_where_membership_lists() {
        let query = CallQuery {
            agent_names: Some(vec!["a1".to_string(), "a2".to_string()]),
            publisher_names_excluded: vec!["spam'co".to_string()],
            ..Default::default()
        };
        let clause = build_where(&query);
        assert!(clause.contains("COALESCE(agent_id, '') IN ('a1', 'a2')"));
        assert!(clause.contains("NOT IN ('spam''co')"));
    }

    #[test]
    fn test_build_where_unsatisfiable_membership() {
        let query = CallQuery {
            agent_names: Some(Vec::new()),
            ..Default::default()
        };
        assert!(build_where(&query).contains("FALSE"));
    }
}
