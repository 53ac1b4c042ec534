//! CallScope Server
//!
//! Call-tracking analytics backend: polls vendor connections for new
//! calls, normalizes and stores them, pipes recordings to transcription,
//! and serves the aggregated data over a JSON/CSV HTTP API.

use actix_cors::Cors;
use actix_web::{http::header, middleware, web, App, HttpResponse, HttpServer};
use callscope_api::handlers::{
    configure_calls, configure_dashboard, configure_filters, configure_integrations, live_calls,
};
use callscope_core::config::{RetreaverConfig, RingbaConfig, TwilioConfig};
use callscope_core::traits::{
    AdminFilterRepository, CallRepository, IntegrationRepository, RecordingFetcher, Transcriber,
};
use callscope_core::AppConfig;
use callscope_db::{
    create_pool, PgAdminFilterRepository, PgCallRepository, PgIntegrationRepository,
};
use callscope_services::{FilterEngine, HttpTranscriber, IntegrationManager, NoopTranscriber};
use callscope_vendors::{HttpRecordingFetcher, VendorRegistry};
use std::env;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Health check endpoint
async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "callscope",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Configure API routes
fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            // Health check
            .route("/health", web::get().to(health_check))
            // Dashboard stats
            .configure(configure_dashboard)
            // Call reports and CSV export
            .configure(configure_calls)
            // Vendor connection management
            .configure(configure_integrations)
            // Admin filters
            .configure(configure_filters)
            // Live vendor proxy (does not touch the ledger)
            .route("/vendors/{vendor}/calls", web::get().to(live_calls)),
    );
}

/// Initialize tracing/logging
fn init_tracing() {
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "callscope={},callscope_api={},callscope_services={},callscope_vendors={},callscope_db={},actix_web=info,sqlx=warn",
            log_level, log_level, log_level, log_level, log_level
        ))
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_file(true)
                .with_line_number(true),
        )
        .init();
}

/// Fill vendor sections from the flat environment variables operators use
///
/// `RINGBA_API_KEY`/`RINGBA_ACCOUNT_ID`, `RETREAVER_API_KEY`, and
/// `TWILIO_ACCOUNT_SID`/`TWILIO_AUTH_TOKEN` take effect when the config
/// file left the section empty. Absent credentials stay absent; requests
/// needing them get a structured error, never a crash.
fn apply_vendor_env(config: &mut AppConfig) {
    if config.vendors.ringba.is_none() {
        if let (Ok(api_key), Ok(account_id)) =
            (env::var("RINGBA_API_KEY"), env::var("RINGBA_ACCOUNT_ID"))
        {
            config.vendors.ringba = Some(RingbaConfig {
                api_key,
                account_id,
            });
        }
    }
    if config.vendors.retreaver.is_none() {
        if let Ok(api_key) = env::var("RETREAVER_API_KEY") {
            config.vendors.retreaver = Some(RetreaverConfig {
                api_key,
                company_id: env::var("RETREAVER_COMPANY_ID").ok(),
            });
        }
    }
    if config.vendors.twilio.is_none() {
        if let (Ok(account_sid), Ok(auth_token)) =
            (env::var("TWILIO_ACCOUNT_SID"), env::var("TWILIO_AUTH_TOKEN"))
        {
            config.vendors.twilio = Some(TwilioConfig {
                account_sid,
                auth_token,
            });
        }
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize logging
    init_tracing();

    info!("Starting CallScope v{}", env!("CARGO_PKG_VERSION"));

    let mut config = AppConfig::load().expect("Failed to load configuration");
    apply_vendor_env(&mut config);

    // DATABASE_URL wins over the config file, matching deploy tooling
    let database_url = env::var("DATABASE_URL").unwrap_or_else(|_| config.database.url.clone());

    info!("Connecting to database...");
    let pool = create_pool(&database_url, Some(config.database.max_connections))
        .await
        .expect("Failed to create database pool");

    // Repositories
    let call_repo: Arc<dyn CallRepository> = Arc::new(PgCallRepository::new(pool.clone()));
    let integration_repo: Arc<dyn IntegrationRepository> =
        Arc::new(PgIntegrationRepository::new(pool.clone()));
    let filter_repo: Arc<dyn AdminFilterRepository> =
        Arc::new(PgAdminFilterRepository::new(pool.clone()));

    // Vendor access and pipeline collaborators
    let registry = VendorRegistry::new(
        config.sync.vendor_timeout_secs,
        config.sync.probe_attempt_budget,
    );
    let transcriber: Arc<dyn Transcriber> = if config.transcription.enabled {
        Arc::new(HttpTranscriber::new(&config.transcription).expect("Failed to build transcriber"))
    } else {
        info!("Transcription disabled");
        Arc::new(NoopTranscriber)
    };
    let recordings: Arc<dyn RecordingFetcher> = Arc::new(
        HttpRecordingFetcher::new(config.sync.recording_timeout_secs)
            .expect("Failed to build recording fetcher"),
    );

    // Integration manager: resume persisted connections
    let manager = IntegrationManager::new(
        integration_repo.clone(),
        call_repo.clone(),
        Arc::new(registry.clone()),
        transcriber,
        recordings,
    );
    match manager.clone().start_all().await {
        Ok(resumed) => info!("Resumed {} persisted integration(s)", resumed),
        Err(e) => warn!("Could not resume integrations: {}", e),
    }

    let engine = FilterEngine::new(filter_repo.clone());

    // Shared application data
    let call_data: web::Data<dyn CallRepository> = web::Data::from(call_repo);
    let integration_data: web::Data<dyn IntegrationRepository> =
        web::Data::from(integration_repo);
    let filter_data: web::Data<dyn AdminFilterRepository> = web::Data::from(filter_repo);
    let manager_data = web::Data::from(manager);
    let engine_data = web::Data::new(engine);
    let registry_data = web::Data::new(registry);
    let config_data = web::Data::new(config.clone());

    let cors_origins = config.server.cors_origins.clone();
    let bind_addr = config.server_addr();
    info!(
        "Starting HTTP server on {} with {} workers",
        bind_addr, config.server.workers
    );

    HttpServer::new(move || {
        let cors_origins_inner = cors_origins.clone();
        let cors = Cors::default()
            .allowed_origin_fn(move |origin, _req_head| {
                let origins: Vec<&str> = cors_origins_inner.split(',').collect();
                if let Ok(origin_str) = origin.to_str() {
                    origins.iter().any(|o| o.trim() == origin_str)
                } else {
                    false
                }
            })
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec![header::ACCEPT, header::CONTENT_TYPE])
            .allowed_header("X-Admin-User")
            .max_age(3600);

        App::new()
            .app_data(call_data.clone())
            .app_data(integration_data.clone())
            .app_data(filter_data.clone())
            .app_data(manager_data.clone())
            .app_data(engine_data.clone())
            .app_data(registry_data.clone())
            .app_data(config_data.clone())
            .app_data(web::QueryConfig::default().error_handler(|err, _req| {
                let error_message = err.to_string();
                actix_web::error::InternalError::from_response(
                    err,
                    HttpResponse::BadRequest().json(serde_json::json!({
                        "success": false,
                        "error": "invalid_query",
                        "message": error_message
                    })),
                )
                .into()
            }))
            .wrap(cors)
            .wrap(TracingLogger::default())
            .wrap(middleware::Compress::default())
            .wrap(middleware::NormalizePath::trim())
            .configure(configure_routes)
            .route(
                "/",
                web::get().to(|| async {
                    HttpResponse::Found()
                        .append_header(("Location", "/api/v1/health"))
                        .finish()
                }),
            )
    })
    .workers(config.server.workers)
    .bind(&bind_addr)?
    .run()
    .await
}
