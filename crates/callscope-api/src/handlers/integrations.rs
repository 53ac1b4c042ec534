//! Integration management handlers
//!
//! Create tests connectivity before anything is stored; delete cancels the
//! integration's polling timer. The Ringba probe endpoint exposes the full
//! endpoint/auth discovery report for operator debugging.

use crate::dto::{
    ApiResponse, ConnectionTestResponse, CreateIntegrationRequest, IntegrationResponse,
    TestConnectionRequest,
};
use actix_web::{
    web::{self, Data, Json, Path},
    HttpResponse,
};
use callscope_core::{
    config::AppConfig,
    traits::{IntegrationRepository, Repository},
    AppError,
};
use callscope_services::IntegrationManager;
use callscope_vendors::{RingbaClient, VendorClientFactory, VendorRegistry};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

/// List all configured integrations
#[instrument(skip(integrations))]
pub async fn list_integrations(
    integrations: Data<dyn IntegrationRepository>,
) -> Result<HttpResponse, AppError> {
    let stored = integrations.list_all().await?;
    let data: Vec<IntegrationResponse> =
        stored.into_iter().map(IntegrationResponse::from).collect();

    Ok(HttpResponse::Ok().json(ApiResponse::success(data)))
}

/// Get one integration
#[instrument(skip(integrations))]
pub async fn get_integration(
    path: Path<Uuid>,
    integrations: Data<dyn IntegrationRepository>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let integration = integrations
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::IntegrationNotFound(id.to_string()))?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(IntegrationResponse::from(integration))))
}

/// Create a vendor connection
///
/// Connectivity is verified first; a rejected key stores nothing.
#[instrument(skip(body, manager), fields(vendor = %body.vendor))]
pub async fn create_integration(
    body: Json<CreateIntegrationRequest>,
    manager: Data<IntegrationManager>,
) -> Result<HttpResponse, AppError> {
    body.validate().map_err(|e| {
        warn!("Invalid integration request: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let request = body.into_inner().into_new_integration();
    info!("Creating {} integration '{}'", request.vendor, request.name);

    let manager = manager.into_inner();
    let integration = manager.add_integration(request).await?;

    Ok(HttpResponse::Created().json(ApiResponse::with_message(
        IntegrationResponse::from(integration),
        "integration created and first sync completed",
    )))
}

/// Delete a connection and cancel its polling timer
#[instrument(skip(manager))]
pub async fn delete_integration(
    path: Path<Uuid>,
    manager: Data<IntegrationManager>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let deleted = manager.remove_integration(id).await?;
    if !deleted {
        return Err(AppError::IntegrationNotFound(id.to_string()));
    }

    info!("Integration {} removed", id);
    Ok(HttpResponse::Ok().json(ApiResponse::with_message((), "integration removed")))
}

/// Stop polling without deleting the stored connection
#[instrument(skip(manager))]
pub async fn pause_integration(
    path: Path<Uuid>,
    manager: Data<IntegrationManager>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    manager.pause_integration(id).await?;

    info!("Integration {} paused", id);
    Ok(HttpResponse::Ok().json(ApiResponse::with_message((), "integration paused")))
}

/// Run one sync cycle now
#[instrument(skip(manager))]
pub async fn trigger_sync(
    path: Path<Uuid>,
    manager: Data<IntegrationManager>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    debug!("Manual sync requested for {}", id);

    let outcome = manager.trigger_sync(id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(outcome)))
}

/// Test vendor connectivity without storing anything
///
/// Always answers 200; the outcome is in the body.
#[instrument(skip(body, registry), fields(vendor = %body.vendor))]
pub async fn test_connection(
    body: Json<TestConnectionRequest>,
    registry: Data<VendorRegistry>,
) -> Result<HttpResponse, AppError> {
    body.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let outcome = match registry.client_for(body.vendor, &body.as_config()) {
        Ok(client) => client
            .test_connection()
            .await
            .map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };

    let response = ConnectionTestResponse {
        vendor: body.vendor,
        reachable: outcome.is_ok(),
        error: outcome.err(),
    };

    Ok(HttpResponse::Ok().json(ApiResponse::success(response)))
}

/// Run the Ringba endpoint/auth discovery probe and return the report
///
/// The report lists every attempted (endpoint, auth style) combination
/// with its status or transport error, whether or not one succeeded.
#[instrument(skip(config))]
pub async fn probe_ringba(config: Data<AppConfig>) -> Result<HttpResponse, AppError> {
    let ringba = config.vendors.ringba.as_ref().ok_or_else(|| {
        AppError::VendorNotConfigured("RINGBA_API_KEY / account not set".to_string())
    })?;

    let client = RingbaClient::new(
        &ringba.api_key,
        &ringba.account_id,
        config.sync.vendor_timeout_secs,
        config.sync.probe_attempt_budget,
    )
    .map_err(|e| e.into_app(callscope_core::models::VendorKind::Ringba))?;

    let report = client.probe().await;
    info!(
        "Ringba probe finished: success={}, attempts={}",
        report.success,
        report.attempts.len()
    );

    Ok(HttpResponse::Ok().json(ApiResponse::success(report)))
}

/// Configure integration routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/integrations")
            .route("", web::get().to(list_integrations))
            .route("", web::post().to(create_integration))
            .route("/test", web::post().to(test_connection))
            .route("/probe/ringba", web::get().to(probe_ringba))
            .route("/{id}", web::get().to(get_integration))
            .route("/{id}", web::delete().to(delete_integration))
            .route("/{id}/sync", web::post().to(trigger_sync))
            .route("/{id}/pause", web::post().to(pause_integration)),
    );
}
