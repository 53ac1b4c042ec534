//! Dashboard handlers
//!
//! Aggregate metrics for the dashboard cards.

use crate::dto::ApiResponse;
use actix_web::{
    web::{self, Data},
    HttpResponse,
};
use callscope_core::{
    models::IntegrationStatus,
    traits::{CallRepository, CallStats, IntegrationRepository},
    AppError,
};
use serde::Serialize;
use tracing::{debug, instrument};

/// Dashboard statistics response
#[derive(Debug, Serialize)]
pub struct DashboardStats {
    /// Call ledger aggregates
    pub calls: CallStats,
    /// Configured integrations
    pub integrations_total: usize,
    /// Integrations currently polling cleanly
    pub integrations_active: usize,
    /// Integrations whose last cycle failed
    pub integrations_error: usize,
}

/// Get dashboard statistics
///
/// GET /api/v1/dashboard/stats
#[instrument(skip(calls, integrations))]
pub async fn get_stats(
    calls: Data<dyn CallRepository>,
    integrations: Data<dyn IntegrationRepository>,
) -> Result<HttpResponse, AppError> {
    debug!("Fetching dashboard statistics");

    let call_stats = calls.stats().await?;
    let stored = integrations.list_all().await?;

    let stats = DashboardStats {
        calls: call_stats,
        integrations_total: stored.len(),
        integrations_active: stored
            .iter()
            .filter(|i| i.status == IntegrationStatus::Active)
            .count(),
        integrations_error: stored
            .iter()
            .filter(|i| i.status == IntegrationStatus::Error)
            .count(),
    };

    Ok(HttpResponse::Ok().json(ApiResponse::success(stats)))
}

/// Configure dashboard routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/dashboard").route("/stats", web::get().to(get_stats)));
}
