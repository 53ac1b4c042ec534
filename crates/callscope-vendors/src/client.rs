//! Vendor client abstraction
//!
//! One client per vendor wraps authentication and HTTP access to that
//! vendor's REST API and returns normalized `CallRecord`s. Failures are
//! always tagged (`VendorError`) so callers can tell "zero calls" apart
//! from "request failed".

use async_trait::async_trait;
use bytes::Bytes;
use callscope_core::models::{CallRecord, FetchFilters, VendorKind};
use callscope_core::traits::RecordingFetcher;
use callscope_core::{AppError, AppResult};
use reqwest::{Client, ClientBuilder};
use std::time::Duration;
use thiserror::Error;
use tracing::{error, instrument};

/// Errors produced by vendor clients
#[derive(Debug, Error)]
pub enum VendorError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("HTTP error: status {0}")]
    Http(u16),

    #[error("Authentication rejected: {0}")]
    Auth(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Missing configuration: {0}")]
    MissingConfig(String),

    #[error("Timeout: request took longer than {0}s")]
    Timeout(u64),

    #[error("Endpoint probe exhausted after {attempts} attempts")]
    ProbeExhausted { attempts: usize },
}

impl VendorError {
    /// Convert into the application error, attaching the vendor name
    pub fn into_app(self, vendor: VendorKind) -> AppError {
        match self {
            VendorError::Connection(msg) => AppError::VendorConnection(msg),
            VendorError::Http(status) => AppError::VendorHttp {
                vendor: vendor.to_string(),
                status,
            },
            VendorError::Auth(msg) => AppError::VendorAuth(msg),
            VendorError::Parse(msg) => AppError::VendorParse(msg),
            VendorError::MissingConfig(msg) => AppError::VendorNotConfigured(msg),
            VendorError::Timeout(secs) => {
                AppError::VendorConnection(format!("{} timed out after {}s", vendor, secs))
            }
            VendorError::ProbeExhausted { attempts } => AppError::ProbeExhausted { attempts },
        }
    }

    pub(crate) fn from_reqwest(err: reqwest::Error, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            VendorError::Timeout(timeout_secs)
        } else {
            VendorError::Connection(err.to_string())
        }
    }
}

/// Vendor client contract
///
/// `fetch_calls` builds vendor-specific query parameters from the common
/// `FetchFilters` shape, issues the request, and maps each raw item through
/// the field mapper. `recording_url` is the fallback path for vendors whose
/// list endpoint does not inline recording URLs; `Ok(None)` means "no
/// recording available", not an error.
#[async_trait]
pub trait VendorClient: Send + Sync {
    /// Which vendor this client talks to
    fn vendor(&self) -> VendorKind;

    /// Cheap connectivity/credential check
    async fn test_connection(&self) -> Result<(), VendorError>;

    /// Fetch and normalize call logs
    async fn fetch_calls(&self, filters: &FetchFilters) -> Result<Vec<CallRecord>, VendorError>;

    /// Resolve a recording URL for one call
    async fn recording_url(&self, external_id: &str) -> Result<Option<String>, VendorError>;
}

/// Build the shared reqwest client with bounded timeouts
pub(crate) fn build_http_client(timeout_secs: u64) -> Result<Client, VendorError> {
    ClientBuilder::new()
        .timeout(Duration::from_secs(timeout_secs))
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .build()
        .map_err(|e| VendorError::Connection(e.to_string()))
}

/// Map a non-2xx response into the tagged error
pub(crate) fn check_status(status: reqwest::StatusCode) -> Result<(), VendorError> {
    if status.is_success() {
        return Ok(());
    }
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(VendorError::Auth(format!("status {}", status.as_u16())));
    }
    Err(VendorError::Http(status.as_u16()))
}

/// Apply the filter bounds the vendor's query parameters cannot express
///
/// Date ranges go to the vendor as query parameters; duration bounds and
/// membership lists are enforced here so every client honors the full
/// `FetchFilters` contract regardless of vendor API capability.
pub(crate) fn apply_local_filters(records: Vec<CallRecord>, filters: &FetchFilters) -> Vec<CallRecord> {
    records
        .into_iter()
        .filter(|record| {
            if let Some(min) = filters.min_duration {
                if record.duration_seconds < min {
                    return false;
                }
            }
            if let Some(max) = filters.max_duration {
                if record.duration_seconds > max {
                    return false;
                }
            }
            if let Some(direction) = filters.direction {
                if record.direction != direction {
                    return false;
                }
            }
            if !filters.campaign_ids.is_empty() {
                let campaign = record.campaign_id.as_deref().unwrap_or("");
                if !filters.campaign_ids.iter().any(|c| c == campaign) {
                    return false;
                }
            }
            if !filters.agent_ids.is_empty() {
                let agent = record.agent_id.as_deref().unwrap_or("");
                if !filters.agent_ids.iter().any(|a| a == agent) {
                    return false;
                }
            }
            true
        })
        .collect()
}

/// Recording downloader over plain HTTP GET
///
/// Recording URLs are vendor-signed links; no additional auth is attached.
pub struct HttpRecordingFetcher {
    http_client: Client,
    timeout_secs: u64,
}

impl HttpRecordingFetcher {
    pub fn new(timeout_secs: u64) -> AppResult<Self> {
        let http_client = ClientBuilder::new()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(e.to_string()))?;

        Ok(Self {
            http_client,
            timeout_secs,
        })
    }
}

#[async_trait]
impl RecordingFetcher for HttpRecordingFetcher {
    #[instrument(skip(self))]
    async fn download(&self, url: &str) -> AppResult<Bytes> {
        let response = self.http_client.get(url).send().await.map_err(|e| {
            error!("Recording download failed: {}", e);
            if e.is_timeout() {
                AppError::RecordingDownload(format!("timed out after {}s", self.timeout_secs))
            } else {
                AppError::RecordingDownload(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::RecordingDownload(format!(
                "status {}",
                status.as_u16()
            )));
        }

        response
            .bytes()
            .await
            .map_err(|e| AppError::RecordingDownload(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_status() {
        assert!(check_status(reqwest::StatusCode::OK).is_ok());
        assert!(matches!(
            check_status(reqwest::StatusCode::NOT_FOUND),
            Err(VendorError::Http(404))
        ));
        assert!(matches!(
            check_status(reqwest::StatusCode::UNAUTHORIZED),
            Err(VendorError::Auth(_))
        ));
    }

    #[test]
    fn test_into_app_attaches_vendor() {
        let err = VendorError::Http(503).into_app(VendorKind::Ringba);
        match err {
            AppError::VendorHttp { vendor, status } => {
                assert_eq!(vendor, "ringba");
                assert_eq!(status, 503);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_apply_local_filters() {
        let mut short = CallRecord::new(VendorKind::Ringba, "a");
        short.duration_seconds = 10;
        let mut long = CallRecord::new(VendorKind::Ringba, "b");
        long.duration_seconds = 90;

        let filters = FetchFilters {
            min_duration: Some(30),
            ..Default::default()
        };
        let kept = apply_local_filters(vec![short, long], &filters);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].external_id, "b");
    }

    #[test]
    fn test_probe_exhausted_maps_through() {
        let err = VendorError::ProbeExhausted { attempts: 9 }.into_app(VendorKind::Ringba);
        assert!(matches!(err, AppError::ProbeExhausted { attempts: 9 }));
    }
}
