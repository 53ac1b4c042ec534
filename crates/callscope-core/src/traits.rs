//! Common traits for repositories and collaborating services
//!
//! Defines abstractions for data access and the external collaborators
//! (recording storage, transcription vendor) the sync pipeline talks to.

use crate::error::AppError;
use crate::models::{
    AdminFilter, CallQuery, CallRecord, Integration, IntegrationStatus, VendorKind,
};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Generic repository trait for CRUD operations
#[async_trait]
pub trait Repository<T, ID>: Send + Sync {
    /// Find entity by ID
    async fn find_by_id(&self, id: ID) -> Result<Option<T>, AppError>;

    /// Find all entities with pagination
    async fn find_all(&self, limit: i64, offset: i64) -> Result<Vec<T>, AppError>;

    /// Count total entities
    async fn count(&self) -> Result<i64, AppError>;

    /// Create a new entity
    async fn create(&self, entity: &T) -> Result<T, AppError>;

    /// Update an existing entity
    async fn update(&self, entity: &T) -> Result<T, AppError>;

    /// Delete entity by ID
    async fn delete(&self, id: ID) -> Result<bool, AppError>;
}

/// Call ledger repository
///
/// The ledger is the store of previously processed calls; the sync cycle
/// deduplicates against it by `(vendor, external_id)`.
#[async_trait]
pub trait CallRepository: Repository<CallRecord, String> {
    /// Find a record by its vendor-native identifier
    async fn find_by_external(
        &self,
        vendor: VendorKind,
        external_id: &str,
    ) -> Result<Option<CallRecord>, AppError>;

    /// Check whether a vendor-native identifier was already processed
    async fn exists_external(
        &self,
        vendor: VendorKind,
        external_id: &str,
    ) -> Result<bool, AppError>;

    /// Insert or replace by canonical id
    async fn upsert(&self, record: &CallRecord) -> Result<CallRecord, AppError>;

    /// List records matching a query, with total count
    async fn list_filtered(
        &self,
        query: &CallQuery,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<CallRecord>, i64), AppError>;

    /// Aggregate counters for the dashboard
    async fn stats(&self) -> Result<CallStats, AppError>;
}

/// Integration configuration repository
///
/// The full integration row (credentials included) is persisted after
/// every mutation so connections survive restarts.
#[async_trait]
pub trait IntegrationRepository: Repository<Integration, Uuid> {
    /// All stored integrations, active or not
    async fn list_all(&self) -> Result<Vec<Integration>, AppError>;

    /// Update lifecycle status only
    async fn set_status(&self, id: Uuid, status: IntegrationStatus) -> Result<(), AppError>;

    /// Persist the outcome of one sync cycle
    ///
    /// `last_sync` is only advanced when the cycle actually covered its
    /// window (`Some`); a failed cycle passes `None` so the window is
    /// retried on the next tick.
    async fn record_sync(
        &self,
        id: Uuid,
        last_sync: Option<DateTime<Utc>>,
        calls_delta: i64,
        errors_delta: i64,
        status: IntegrationStatus,
    ) -> Result<(), AppError>;
}

/// Admin filter repository
#[async_trait]
pub trait AdminFilterRepository: Repository<AdminFilter, Uuid> {
    /// Active filters whose `applies_to` contains the context,
    /// most recently created first
    async fn list_for_context(&self, context: &str) -> Result<Vec<AdminFilter>, AppError>;
}

/// Transcription collaborator
///
/// The speech-to-text vendor is consumed only through this interface.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Submit a downloaded recording; returns the vendor's job id
    async fn submit(&self, record: &CallRecord, audio: Bytes) -> Result<String, AppError>;
}

/// Recording download collaborator
#[async_trait]
pub trait RecordingFetcher: Send + Sync {
    /// Download a recording into memory
    async fn download(&self, url: &str) -> Result<Bytes, AppError>;
}

/// Aggregate counters for the dashboard
#[derive(Debug, Clone, Default, Serialize)]
pub struct CallStats {
    pub total_calls: i64,
    pub inbound_calls: i64,
    pub outbound_calls: i64,
    pub recorded_calls: i64,
    pub transcribed_calls: i64,
    pub transcription_pending: i64,
    pub transcription_failed: i64,
    pub average_duration_seconds: f64,
    pub calls_by_vendor: Vec<VendorCount>,
}

/// Per-vendor call count
#[derive(Debug, Clone, Serialize)]
pub struct VendorCount {
    pub vendor: String,
    pub calls: i64,
}

/// Pagination parameters
#[derive(Debug, Clone, Default)]
pub struct Pagination {
    pub page: i64,
    pub per_page: i64,
}

impl Pagination {
    pub fn new(page: i64, per_page: i64) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, 1000),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.per_page
    }

    pub fn limit(&self) -> i64 {
        self.per_page
    }
}

/// Paginated response wrapper
#[derive(Debug, Clone, Serialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub pagination: PaginationMeta,
}

/// Pagination metadata
#[derive(Debug, Clone, Serialize)]
pub struct PaginationMeta {
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

impl PaginationMeta {
    pub fn new(total: i64, page: i64, per_page: i64) -> Self {
        let total_pages = if per_page > 0 {
            (total + per_page - 1) / per_page
        } else {
            0
        };

        Self {
            total,
            page,
            per_page,
            total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination() {
        let p = Pagination::new(1, 10);
        assert_eq!(p.offset(), 0);
        assert_eq!(p.limit(), 10);

        let p = Pagination::new(3, 20);
        assert_eq!(p.offset(), 40);
        assert_eq!(p.limit(), 20);
    }

    #[test]
    fn test_pagination_bounds() {
        let p = Pagination::new(0, 10); // page 0 becomes 1
        assert_eq!(p.page, 1);

        let p = Pagination::new(1, 2000); // per_page capped at 1000
        assert_eq!(p.per_page, 1000);
    }

    #[test]
    fn test_pagination_meta() {
        let meta = PaginationMeta::new(95, 1, 10);
        assert_eq!(meta.total_pages, 10);

        let meta = PaginationMeta::new(101, 1, 10);
        assert_eq!(meta.total_pages, 11);
    }
}
