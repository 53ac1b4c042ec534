//! In-memory repository implementations
//!
//! Back the same repository traits as the PostgreSQL implementations using
//! process-local maps. Used by service tests and by credential-less local
//! runs. Filtered listing goes through `CallQuery::matches`, the same
//! predicate semantics the SQL path encodes as WHERE clauses.

use async_trait::async_trait;
use callscope_core::{
    models::{AdminFilter, CallQuery, CallRecord, Integration, IntegrationStatus, VendorKind},
    traits::{
        AdminFilterRepository, CallRepository, CallStats, IntegrationRepository, Repository,
        VendorCount,
    },
    AppError, AppResult,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

// ==================== Calls ====================

/// In-memory call ledger
#[derive(Default)]
pub struct InMemoryCallRepository {
    records: RwLock<HashMap<String, CallRecord>>,
}

impl InMemoryCallRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn sorted(&self) -> Vec<CallRecord> {
        let mut records: Vec<CallRecord> = self
            .records
            .read()
            .expect("call ledger lock poisoned")
            .values()
            .cloned()
            .collect();
        records.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        records
    }
}

#[async_trait]
impl Repository<CallRecord, String> for InMemoryCallRepository {
    async fn find_by_id(&self, id: String) -> AppResult<Option<CallRecord>> {
        Ok(self
            .records
            .read()
            .expect("call ledger lock poisoned")
            .get(&id)
            .cloned())
    }

    async fn find_all(&self, limit: i64, offset: i64) -> AppResult<Vec<CallRecord>> {
        Ok(self
            .sorted()
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn count(&self) -> AppResult<i64> {
        Ok(self.records.read().expect("call ledger lock poisoned").len() as i64)
    }

    async fn create(&self, entity: &CallRecord) -> AppResult<CallRecord> {
        let mut records = self.records.write().expect("call ledger lock poisoned");
        if records.contains_key(&entity.id) {
            return Err(AppError::AlreadyExists(entity.id.clone()));
        }
        records.insert(entity.id.clone(), entity.clone());
        Ok(entity.clone())
    }

    async fn update(&self, entity: &CallRecord) -> AppResult<CallRecord> {
        let mut records = self.records.write().expect("call ledger lock poisoned");
        if !records.contains_key(&entity.id) {
            return Err(AppError::CallNotFound(entity.id.clone()));
        }
        records.insert(entity.id.clone(), entity.clone());
        Ok(entity.clone())
    }

    async fn delete(&self, id: String) -> AppResult<bool> {
        Ok(self
            .records
            .write()
            .expect("call ledger lock poisoned")
            .remove(&id)
            .is_some())
    }
}

#[async_trait]
impl CallRepository for InMemoryCallRepository {
    async fn find_by_external(
        &self,
        vendor: VendorKind,
        external_id: &str,
    ) -> AppResult<Option<CallRecord>> {
        Ok(self
            .records
            .read()
            .expect("call ledger lock poisoned")
            .values()
            .find(|r| r.vendor == vendor && r.external_id == external_id)
            .cloned())
    }

    async fn exists_external(&self, vendor: VendorKind, external_id: &str) -> AppResult<bool> {
        Ok(self.find_by_external(vendor, external_id).await?.is_some())
    }

    async fn upsert(&self, record: &CallRecord) -> AppResult<CallRecord> {
        self.records
            .write()
            .expect("call ledger lock poisoned")
            .insert(record.id.clone(), record.clone());
        Ok(record.clone())
    }

    async fn list_filtered(
        &self,
        query: &CallQuery,
        limit: i64,
        offset: i64,
    ) -> AppResult<(Vec<CallRecord>, i64)> {
        let matching: Vec<CallRecord> = self
            .sorted()
            .into_iter()
            .filter(|r| query.matches(r))
            .collect();
        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();
        Ok((page, total))
    }

    async fn stats(&self) -> AppResult<CallStats> {
        let records = self.records.read().expect("call ledger lock poisoned");

        let total = records.len() as i64;
        let mut stats = CallStats {
            total_calls: total,
            ..Default::default()
        };

        let mut duration_sum: i64 = 0;
        let mut by_vendor: HashMap<String, i64> = HashMap::new();
        for record in records.values() {
            duration_sum += record.duration_seconds;
            if record.is_inbound() {
                stats.inbound_calls += 1;
            } else {
                stats.outbound_calls += 1;
            }
            if record.was_recorded() {
                stats.recorded_calls += 1;
            }
            match record.transcription_status.as_str() {
                "completed" => stats.transcribed_calls += 1,
                "pending" => stats.transcription_pending += 1,
                "failed" => stats.transcription_failed += 1,
                _ => {}
            }
            *by_vendor.entry(record.vendor.to_string()).or_insert(0) += 1;
        }

        stats.average_duration_seconds = if total > 0 {
            duration_sum as f64 / total as f64
        } else {
            0.0
        };

        let mut vendor_counts: Vec<VendorCount> = by_vendor
            .into_iter()
            .map(|(vendor, calls)| VendorCount { vendor, calls })
            .collect();
        vendor_counts.sort_by(|a, b| a.vendor.cmp(&b.vendor));
        stats.calls_by_vendor = vendor_counts;

        Ok(stats)
    }
}

// ==================== Integrations ====================

/// In-memory integration store
#[derive(Default)]
pub struct InMemoryIntegrationRepository {
    integrations: RwLock<HashMap<Uuid, Integration>>,
}

impl InMemoryIntegrationRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository<Integration, Uuid> for InMemoryIntegrationRepository {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Integration>> {
        Ok(self
            .integrations
            .read()
            .expect("integration lock poisoned")
            .get(&id)
            .cloned())
    }

    async fn find_all(&self, limit: i64, offset: i64) -> AppResult<Vec<Integration>> {
        let mut all = self.list_all().await?;
        all.reverse();
        Ok(all
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn count(&self) -> AppResult<i64> {
        Ok(self
            .integrations
            .read()
            .expect("integration lock poisoned")
            .len() as i64)
    }

    async fn create(&self, entity: &Integration) -> AppResult<Integration> {
        let mut integrations = self
            .integrations
            .write()
            .expect("integration lock poisoned");
        if integrations.contains_key(&entity.id) {
            return Err(AppError::AlreadyExists(entity.id.to_string()));
        }
        integrations.insert(entity.id, entity.clone());
        Ok(entity.clone())
    }

    async fn update(&self, entity: &Integration) -> AppResult<Integration> {
        let mut integrations = self
            .integrations
            .write()
            .expect("integration lock poisoned");
        if !integrations.contains_key(&entity.id) {
            return Err(AppError::IntegrationNotFound(entity.id.to_string()));
        }
        integrations.insert(entity.id, entity.clone());
        Ok(entity.clone())
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        Ok(self
            .integrations
            .write()
            .expect("integration lock poisoned")
            .remove(&id)
            .is_some())
    }
}

#[async_trait]
impl IntegrationRepository for InMemoryIntegrationRepository {
    async fn list_all(&self) -> AppResult<Vec<Integration>> {
        let mut all: Vec<Integration> = self
            .integrations
            .read()
            .expect("integration lock poisoned")
            .values()
            .cloned()
            .collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(all)
    }

    async fn set_status(&self, id: Uuid, status: IntegrationStatus) -> AppResult<()> {
        let mut integrations = self
            .integrations
            .write()
            .expect("integration lock poisoned");
        let integration = integrations
            .get_mut(&id)
            .ok_or_else(|| AppError::IntegrationNotFound(id.to_string()))?;
        integration.status = status;
        integration.updated_at = Utc::now();
        Ok(())
    }

    async fn record_sync(
        &self,
        id: Uuid,
        last_sync: Option<DateTime<Utc>>,
        calls_delta: i64,
        errors_delta: i64,
        status: IntegrationStatus,
    ) -> AppResult<()> {
        let mut integrations = self
            .integrations
            .write()
            .expect("integration lock poisoned");
        let integration = integrations
            .get_mut(&id)
            .ok_or_else(|| AppError::IntegrationNotFound(id.to_string()))?;
        if let Some(last_sync) = last_sync {
            integration.last_sync = Some(last_sync);
        }
        integration.total_calls += calls_delta;
        integration.error_count += errors_delta;
        integration.status = status;
        integration.updated_at = Utc::now();
        Ok(())
    }
}

// ==================== Admin filters ====================

/// In-memory admin filter store
#[derive(Default)]
pub struct InMemoryAdminFilterRepository {
    filters: RwLock<HashMap<Uuid, AdminFilter>>,
}

impl InMemoryAdminFilterRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository<AdminFilter, Uuid> for InMemoryAdminFilterRepository {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<AdminFilter>> {
        Ok(self
            .filters
            .read()
            .expect("filter lock poisoned")
            .get(&id)
            .cloned())
    }

    async fn find_all(&self, limit: i64, offset: i64) -> AppResult<Vec<AdminFilter>> {
        let mut all: Vec<AdminFilter> = self
            .filters
            .read()
            .expect("filter lock poisoned")
            .values()
            .cloned()
            .collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn count(&self) -> AppResult<i64> {
        Ok(self.filters.read().expect("filter lock poisoned").len() as i64)
    }

    async fn create(&self, entity: &AdminFilter) -> AppResult<AdminFilter> {
        let mut filters = self.filters.write().expect("filter lock poisoned");
        if filters.contains_key(&entity.id) {
            return Err(AppError::AlreadyExists(entity.id.to_string()));
        }
        filters.insert(entity.id, entity.clone());
        Ok(entity.clone())
    }

    async fn update(&self, entity: &AdminFilter) -> AppResult<AdminFilter> {
        let mut filters = self.filters.write().expect("filter lock poisoned");
        if !filters.contains_key(&entity.id) {
            return Err(AppError::FilterNotFound(entity.id.to_string()));
        }
        filters.insert(entity.id, entity.clone());
        Ok(entity.clone())
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        Ok(self
            .filters
            .write()
            .expect("filter lock poisoned")
            .remove(&id)
            .is_some())
    }
}

#[async_trait]
impl AdminFilterRepository for InMemoryAdminFilterRepository {
    async fn list_for_context(&self, context: &str) -> AppResult<Vec<AdminFilter>> {
        let mut matching: Vec<AdminFilter> = self
            .filters
            .read()
            .expect("filter lock poisoned")
            .values()
            .filter(|f| f.applies_in(context))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matching)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use callscope_core::models::{FilterOperator, FilterType, FilterValue};

    #[tokio::test]
    async fn test_ledger_round_trip_is_faithful() {
        let repo = InMemoryCallRepository::new();

        let mut record = CallRecord::new(VendorKind::Ringba, "CL900");
        record.from_number = "+15550001111".to_string();
        record.recording_url = Some("https://rec/CL900.mp3".to_string());
        record.metadata = serde_json::json!({"publisher_name": "MediaOne", "raw": 1});

        repo.upsert(&record).await.unwrap();
        let loaded = repo
            .find_by_id("ringba-CL900".to_string())
            .await
            .unwrap()
            .unwrap();

        // Persistence is a faithful store: field-for-field equality
        assert_eq!(record, loaded);
    }

    #[tokio::test]
    async fn test_exists_external_per_vendor_namespace() {
        let repo = InMemoryCallRepository::new();
        repo.upsert(&CallRecord::new(VendorKind::Ringba, "X1"))
            .await
            .unwrap();

        assert!(repo
            .exists_external(VendorKind::Ringba, "X1")
            .await
            .unwrap());
        // The same external id under a different vendor is a different call
        assert!(!repo
            .exists_external(VendorKind::Twilio, "X1")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_list_filtered_uses_query_matches() {
        let repo = InMemoryCallRepository::new();
        for (id, duration) in [("a", 45), ("b", 200), ("c", 90)] {
            let mut record = CallRecord::new(VendorKind::Retreaver, id);
            record.duration_seconds = duration;
            repo.upsert(&record).await.unwrap();
        }

        let query = CallQuery {
            min_duration: Some(30),
            max_duration: Some(120),
            ..Default::default()
        };
        let (records, total) = repo.list_filtered(&query, 50, 0).await.unwrap();
        assert_eq!(total, 2);
        assert!(records.iter().all(|r| r.duration_seconds <= 120));
    }

    #[tokio::test]
    async fn test_stats_aggregates() {
        let repo = InMemoryCallRepository::new();
        let mut a = CallRecord::new(VendorKind::Ringba, "a");
        a.duration_seconds = 60;
        a.recording_url = Some("u".to_string());
        let mut b = CallRecord::new(VendorKind::Twilio, "b");
        b.duration_seconds = 120;
        repo.upsert(&a).await.unwrap();
        repo.upsert(&b).await.unwrap();

        let stats = repo.stats().await.unwrap();
        assert_eq!(stats.total_calls, 2);
        assert_eq!(stats.recorded_calls, 1);
        assert!((stats.average_duration_seconds - 90.0).abs() < f64::EPSILON);
        assert_eq!(stats.calls_by_vendor.len(), 2);
    }

    #[tokio::test]
    async fn test_filters_context_listing_newest_first() {
        let repo = InMemoryAdminFilterRepository::new();

        let mut older = AdminFilter::new(
            FilterType::Keyword,
            FilterOperator::Contains,
            FilterValue::Text("refund".to_string()),
            "admin-1",
        );
        older.created_at = Utc::now() - chrono::Duration::hours(1);
        let newer = AdminFilter::new(
            FilterType::CallDuration,
            FilterOperator::Between,
            FilterValue::Range { min: 30, max: 120 },
            "admin-1",
        );
        let mut inactive = AdminFilter::new(
            FilterType::AgentName,
            FilterOperator::Equals,
            FilterValue::Text("a".to_string()),
            "admin-1",
        );
        inactive.is_active = false;

        repo.create(&older).await.unwrap();
        repo.create(&newer).await.unwrap();
        repo.create(&inactive).await.unwrap();

        let listed = repo.list_for_context("reports").await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, newer.id);
        assert!(repo.list_for_context("export").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_integration_record_sync_accumulates() {
        let repo = InMemoryIntegrationRepository::new();
        let integration = Integration::new(
            "line",
            VendorKind::Retreaver,
            callscope_core::models::IntegrationConfig {
                api_key: "k".to_string(),
                account_id: None,
                sync_interval_minutes: 5,
                auto_transcribe: false,
                filters: Default::default(),
            },
        );
        repo.create(&integration).await.unwrap();

        let now = Utc::now();
        repo.record_sync(integration.id, Some(now), 3, 1, IntegrationStatus::Active)
            .await
            .unwrap();
        // Failed cycle: counters move, last_sync does not
        repo.record_sync(integration.id, None, 0, 1, IntegrationStatus::Error)
            .await
            .unwrap();

        let loaded = repo.find_by_id(integration.id).await.unwrap().unwrap();
        assert_eq!(loaded.total_calls, 3);
        assert_eq!(loaded.error_count, 2);
        assert_eq!(loaded.status, IntegrationStatus::Error);
        assert_eq!(loaded.last_sync, Some(now));
    }
}
