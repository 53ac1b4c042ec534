//! Unified error handling for CallScope
//!
//! This module provides a comprehensive error type that covers all possible
//! failure scenarios in the application, with automatic HTTP response mapping.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

/// Main application error type
///
/// All errors in the application should be converted to this type.
/// It implements `ResponseError` for automatic HTTP response generation.
#[derive(Error, Debug)]
pub enum AppError {
    // ==================== Database Errors ====================
    #[error("Database error: {0}")]
    Database(String),

    #[error("Database pool error: {0}")]
    Pool(String),

    #[error("Transaction failed: {0}")]
    Transaction(String),

    // ==================== Vendor Errors ====================
    #[error("Vendor {vendor} returned HTTP {status}")]
    VendorHttp { vendor: String, status: u16 },

    #[error("Vendor connection failed: {0}")]
    VendorConnection(String),

    #[error("Vendor authentication rejected: {0}")]
    VendorAuth(String),

    #[error("Vendor response could not be parsed: {0}")]
    VendorParse(String),

    #[error("Vendor credentials not configured: {0}")]
    VendorNotConfigured(String),

    #[error("Endpoint probe exhausted after {attempts} attempts")]
    ProbeExhausted { attempts: usize },

    // ==================== Pipeline Errors ====================
    #[error("Recording download failed: {0}")]
    RecordingDownload(String),

    #[error("Transcription failed: {0}")]
    Transcription(String),

    #[error("Sync already running for integration {0}")]
    SyncInProgress(String),

    // ==================== Business Logic Errors ====================
    #[error("Integration not found: {0}")]
    IntegrationNotFound(String),

    #[error("Call record not found: {0}")]
    CallNotFound(String),

    #[error("Filter not found: {0}")]
    FilterNotFound(String),

    #[error("Invalid filter combination: {filter_type} does not accept {operator}")]
    InvalidFilterCombination {
        filter_type: String,
        operator: String,
    },

    // ==================== Validation Errors ====================
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    // ==================== Resource Errors ====================
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    // ==================== Internal Errors ====================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AppError {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation(_)
            | AppError::InvalidInput(_)
            | AppError::MissingField(_)
            | AppError::InvalidFilterCombination { .. } => StatusCode::BAD_REQUEST,

            // 404 Not Found
            AppError::IntegrationNotFound(_)
            | AppError::CallNotFound(_)
            | AppError::FilterNotFound(_)
            | AppError::NotFound(_) => StatusCode::NOT_FOUND,

            // 409 Conflict
            AppError::Conflict(_) | AppError::AlreadyExists(_) | AppError::SyncInProgress(_) => {
                StatusCode::CONFLICT
            }

            // 502 Bad Gateway - the upstream vendor misbehaved
            AppError::VendorHttp { .. }
            | AppError::VendorConnection(_)
            | AppError::VendorParse(_)
            | AppError::ProbeExhausted { .. } => StatusCode::BAD_GATEWAY,

            // 503 Service Unavailable - vendor rejected our credentials
            AppError::VendorAuth(_) | AppError::VendorNotConfigured(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }

            // 500 Internal Server Error
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Database(_) => "database_error",
            AppError::Pool(_) => "pool_error",
            AppError::Transaction(_) => "transaction_error",
            AppError::VendorHttp { .. } => "vendor_http_error",
            AppError::VendorConnection(_) => "vendor_connection_error",
            AppError::VendorAuth(_) => "vendor_auth_error",
            AppError::VendorParse(_) => "vendor_parse_error",
            AppError::VendorNotConfigured(_) => "vendor_not_configured",
            AppError::ProbeExhausted { .. } => "probe_exhausted",
            AppError::RecordingDownload(_) => "recording_download_error",
            AppError::Transcription(_) => "transcription_error",
            AppError::SyncInProgress(_) => "sync_in_progress",
            AppError::IntegrationNotFound(_) => "integration_not_found",
            AppError::CallNotFound(_) => "call_not_found",
            AppError::FilterNotFound(_) => "filter_not_found",
            AppError::InvalidFilterCombination { .. } => "invalid_filter_combination",
            AppError::Validation(_) => "validation_error",
            AppError::InvalidInput(_) => "invalid_input",
            AppError::MissingField(_) => "missing_field",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::AlreadyExists(_) => "already_exists",
            AppError::Internal(_) => "internal_error",
            AppError::Config(_) => "config_error",
            AppError::Serialization(_) => "serialization_error",
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        AppError::status_code(self)
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let body = json!({
            "success": false,
            "error": self.error_code(),
            "message": self.to_string(),
            "status": status.as_u16(),
        });

        HttpResponse::build(status).json(body)
    }
}

// ==================== From implementations ====================

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}
