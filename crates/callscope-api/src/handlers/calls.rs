//! Call report handlers
//!
//! Listing goes through the admin filter engine before it reaches the
//! store, so an admin's stored filters tighten every report query. The
//! admin identity comes from the `X-Admin-User` header; the session layer
//! in front of this service is responsible for setting it.

use crate::dto::{ApiResponse, CallFilterParams, CallResponse};
use actix_web::{
    web::{self, Data, Path, Query},
    HttpRequest, HttpResponse,
};
use callscope_core::{
    traits::{CallRepository, PaginatedResponse, Repository},
    AppError,
};
use callscope_services::{constants::REPORTS_CONTEXT, FilterEngine};
use tracing::{debug, info, instrument, warn};
use validator::Validate;

/// Admin identity for filter scoping, with a catch-all default
pub(crate) fn admin_user(req: &HttpRequest) -> String {
    req.headers()
        .get("X-Admin-User")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("admin")
        .to_string()
}

/// List calls with filtering and pagination
///
/// # Examples
///
/// ```text
/// GET /api/v1/calls?page=1&per_page=50&vendor=ringba&min_duration=30
/// ```
#[instrument(skip(req, query, calls, engine))]
pub async fn list_calls(
    req: HttpRequest,
    query: Query<CallFilterParams>,
    calls: Data<dyn CallRepository>,
    engine: Data<FilterEngine>,
) -> Result<HttpResponse, AppError> {
    query.validate().map_err(|e| {
        warn!("Invalid query parameters: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let admin = admin_user(&req);
    let store_query = engine
        .apply_filters(query.to_query(), &admin, REPORTS_CONTEXT)
        .await?;

    debug!(
        "Listing calls for {}: page={}, per_page={}",
        admin, query.pagination.page, query.pagination.per_page
    );

    let (records, total) = calls
        .list_filtered(
            &store_query,
            query.pagination.limit(),
            query.pagination.offset(),
        )
        .await?;

    let data: Vec<CallResponse> = records.into_iter().map(CallResponse::from).collect();
    info!("Retrieved {} calls out of {} total", data.len(), total);

    let page: PaginatedResponse<CallResponse> = query.pagination.paginate(data, total);
    Ok(HttpResponse::Ok().json(page))
}

/// Get a single call by its canonical id
///
/// # Examples
///
/// ```text
/// GET /api/v1/calls/ringba-CL123
/// ```
#[instrument(skip(calls))]
pub async fn get_call(
    path: Path<String>,
    calls: Data<dyn CallRepository>,
) -> Result<HttpResponse, AppError> {
    let call_id = path.into_inner();
    debug!("Fetching call: {}", call_id);

    let record = calls
        .find_by_id(call_id.clone())
        .await?
        .ok_or_else(|| AppError::CallNotFound(call_id))?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(CallResponse::from(record))))
}

/// Configure call routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/calls")
            .route("", web::get().to(list_calls))
            .route("/export", web::get().to(super::export::export_calls))
            .route("/{id}", web::get().to(get_call)),
    );
}
