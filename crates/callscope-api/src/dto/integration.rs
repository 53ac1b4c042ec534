//! Integration DTOs

use callscope_core::models::{
    FetchFilters, Integration, IntegrationConfig, IntegrationStatus, VendorKind,
};
use callscope_services::NewIntegration;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Request body for creating (or testing) a vendor connection
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateIntegrationRequest {
    /// Human-readable connection name
    #[validate(length(min = 1, max = 128))]
    pub name: String,

    /// Vendor to connect to
    pub vendor: VendorKind,

    /// Vendor API key or auth token
    #[validate(length(min = 1))]
    pub api_key: String,

    /// Vendor account identifier (required by Ringba and Twilio)
    pub account_id: Option<String>,

    /// Polling interval in minutes
    #[serde(default = "default_sync_interval")]
    #[validate(range(min = 1, max = 1440))]
    pub sync_interval_minutes: u64,

    /// Submit recordings for transcription automatically
    #[serde(default)]
    pub auto_transcribe: bool,

    /// Standing fetch filters for this connection
    #[serde(default)]
    pub filters: FetchFilters,
}

fn default_sync_interval() -> u64 {
    5
}

impl CreateIntegrationRequest {
    pub fn into_new_integration(self) -> NewIntegration {
        NewIntegration {
            name: self.name,
            vendor: self.vendor,
            config: IntegrationConfig {
                api_key: self.api_key,
                account_id: self.account_id,
                sync_interval_minutes: self.sync_interval_minutes,
                auto_transcribe: self.auto_transcribe,
                filters: self.filters,
            },
        }
    }
}

/// Integration response shape
///
/// Credentials are redacted down to the trailing characters; the full key
/// never leaves the server once stored.
#[derive(Debug, Clone, Serialize)]
pub struct IntegrationResponse {
    pub id: Uuid,
    pub name: String,
    pub vendor: VendorKind,
    pub status: IntegrationStatus,
    pub api_key_hint: String,
    pub account_id: Option<String>,
    pub sync_interval_minutes: u64,
    pub auto_transcribe: bool,
    pub last_sync: Option<DateTime<Utc>>,
    pub total_calls: i64,
    pub error_count: i64,
    pub success_rate: f64,
    pub created_at: DateTime<Utc>,
}

/// Redact an API key down to its last four characters
fn mask_key(key: &str) -> String {
    let tail: String = key
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("••••{}", tail)
}

impl From<Integration> for IntegrationResponse {
    fn from(integration: Integration) -> Self {
        Self {
            id: integration.id,
            name: integration.name.clone(),
            vendor: integration.vendor,
            status: integration.status,
            api_key_hint: mask_key(&integration.config.api_key),
            account_id: integration.config.account_id.clone(),
            sync_interval_minutes: integration.config.sync_interval_minutes,
            auto_transcribe: integration.config.auto_transcribe,
            last_sync: integration.last_sync,
            total_calls: integration.total_calls,
            error_count: integration.error_count,
            success_rate: integration.success_rate(),
            created_at: integration.created_at,
        }
    }
}

/// Request body for a standalone connectivity test (nothing is stored)
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct TestConnectionRequest {
    pub vendor: VendorKind,

    #[validate(length(min = 1))]
    pub api_key: String,

    pub account_id: Option<String>,
}

impl TestConnectionRequest {
    /// Throwaway config for building a client to test with
    pub fn as_config(&self) -> IntegrationConfig {
        IntegrationConfig {
            api_key: self.api_key.clone(),
            account_id: self.account_id.clone(),
            sync_interval_minutes: default_sync_interval(),
            auto_transcribe: false,
            filters: FetchFilters::default(),
        }
    }
}

/// Result of a standalone connectivity test
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionTestResponse {
    pub vendor: VendorKind,
    pub reachable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
