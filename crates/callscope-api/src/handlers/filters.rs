//! Admin filter handlers
//!
//! Creation rejects `(filter_type, operator)` pairs outside the legality
//! table up front; already-stored filters that no longer fit are silently
//! skipped by the engine instead.

use crate::dto::{ApiResponse, CreateFilterRequest, FilterResponse, PaginationParams, UpdateFilterRequest};
use actix_web::{
    web::{self, Data, Json, Path, Query},
    HttpRequest, HttpResponse,
};
use callscope_core::{traits::AdminFilterRepository, traits::Repository, AppError};
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use super::calls::admin_user;

/// List stored filters, newest first
#[instrument(skip(filters, query))]
pub async fn list_filters(
    query: Query<PaginationParams>,
    filters: Data<dyn AdminFilterRepository>,
) -> Result<HttpResponse, AppError> {
    query
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let stored = filters.find_all(query.limit(), query.offset()).await?;
    let total = filters.count().await?;
    let data: Vec<FilterResponse> = stored.into_iter().map(FilterResponse::from).collect();

    Ok(HttpResponse::Ok().json(query.paginate(data, total)))
}

/// Create a filter
#[instrument(skip(req, body, filters))]
pub async fn create_filter(
    req: HttpRequest,
    body: Json<CreateFilterRequest>,
    filters: Data<dyn AdminFilterRepository>,
) -> Result<HttpResponse, AppError> {
    let request = body.into_inner();

    if !request.filter_type.allows(request.operator) {
        warn!(
            "Rejected filter: {} does not accept {}",
            request.filter_type, request.operator
        );
        return Err(AppError::InvalidFilterCombination {
            filter_type: request.filter_type.to_string(),
            operator: request.operator.to_string(),
        });
    }

    let admin = admin_user(&req);
    let filter = request.into_filter(&admin);
    let created = filters.create(&filter).await?;

    info!(
        "Admin {} created filter {} ({} {})",
        admin, created.id, created.filter_type, created.operator
    );
    Ok(HttpResponse::Created().json(ApiResponse::success(FilterResponse::from(created))))
}

/// Update a filter's value, contexts, or active flag
#[instrument(skip(body, filters))]
pub async fn update_filter(
    path: Path<Uuid>,
    body: Json<UpdateFilterRequest>,
    filters: Data<dyn AdminFilterRepository>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let mut filter = filters
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::FilterNotFound(id.to_string()))?;

    let changes = body.into_inner();
    if let Some(value) = changes.filter_value {
        filter.filter_value = value;
    }
    if let Some(applies_to) = changes.applies_to {
        filter.applies_to = applies_to;
    }
    if let Some(is_active) = changes.is_active {
        filter.is_active = is_active;
    }

    let updated = filters.update(&filter).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(FilterResponse::from(updated))))
}

/// Delete a filter
#[instrument(skip(filters))]
pub async fn delete_filter(
    path: Path<Uuid>,
    filters: Data<dyn AdminFilterRepository>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    if !filters.delete(id).await? {
        return Err(AppError::FilterNotFound(id.to_string()));
    }

    Ok(HttpResponse::Ok().json(ApiResponse::with_message((), "filter deleted")))
}

/// Configure admin filter routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/filters")
            .route("", web::get().to(list_filters))
            .route("", web::post().to(create_filter))
            .route("/{id}", web::put().to(update_filter))
            .route("/{id}", web::delete().to(delete_filter)),
    );
}
