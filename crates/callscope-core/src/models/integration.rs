//! Vendor integration model
//!
//! An `Integration` is one configured connection to a vendor account,
//! together with its polling configuration and running counters.

use crate::models::call::{CallDirection, VendorKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Integration lifecycle status
///
/// `Configuring -> Active -> (Error | Inactive)`; `Error` self-heals back
/// to `Active` on the next successful sync cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegrationStatus {
    Configuring,
    Active,
    Inactive,
    Error,
}

impl IntegrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Configuring => "configuring",
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for IntegrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IntegrationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "configuring" => Ok(Self::Configuring),
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            "error" => Ok(Self::Error),
            other => Err(format!("unknown integration status: {}", other)),
        }
    }
}

/// Common filter shape handed to every vendor client's fetch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FetchFilters {
    /// Fetch calls started at or after this instant
    pub start_date: Option<DateTime<Utc>>,

    /// Fetch calls started before this instant
    pub end_date: Option<DateTime<Utc>>,

    /// Minimum duration in seconds
    pub min_duration: Option<i64>,

    /// Maximum duration in seconds
    pub max_duration: Option<i64>,

    /// Restrict to these campaign ids
    #[serde(default)]
    pub campaign_ids: Vec<String>,

    /// Restrict to these agent ids
    #[serde(default)]
    pub agent_ids: Vec<String>,

    /// Restrict to one direction
    pub direction: Option<CallDirection>,
}

/// Per-integration connection configuration
///
/// Persisted verbatim (credentials included) alongside the operational
/// state, so an integration survives restarts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationConfig {
    /// Vendor API key or auth token
    pub api_key: String,

    /// Vendor account identifier where the API requires one
    pub account_id: Option<String>,

    /// Polling interval in minutes
    pub sync_interval_minutes: u64,

    /// Submit recordings to the transcription collaborator automatically
    pub auto_transcribe: bool,

    /// Standing filters applied to every fetch of this integration
    #[serde(default)]
    pub filters: FetchFilters,
}

/// One configured vendor connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Integration {
    /// Unique identifier
    pub id: Uuid,

    /// Human-readable connection name
    pub name: String,

    /// Vendor this connection talks to
    pub vendor: VendorKind,

    /// Lifecycle status
    pub status: IntegrationStatus,

    /// Connection configuration (credentials, interval, filters)
    pub config: IntegrationConfig,

    /// End of the last successfully synced window
    pub last_sync: Option<DateTime<Utc>>,

    /// Calls processed over the integration's lifetime
    pub total_calls: i64,

    /// Failed cycles and per-record failures over the lifetime
    pub error_count: i64,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last mutation timestamp
    pub updated_at: DateTime<Utc>,
}

impl Integration {
    /// Create a new integration in the `Configuring` state
    pub fn new(name: impl Into<String>, vendor: VendorKind, config: IntegrationConfig) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            vendor,
            status: IntegrationStatus::Configuring,
            config,
            last_sync: None,
            total_calls: 0,
            error_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Share of lifetime calls that processed cleanly, in `[0, 1]`
    ///
    /// Reads as 1.0 before the first call has been seen.
    pub fn success_rate(&self) -> f64 {
        if self.total_calls <= 0 {
            return 1.0;
        }
        let ok = (self.total_calls - self.error_count).max(0);
        ok as f64 / self.total_calls as f64
    }

    /// Whether the polling timer should be running
    #[inline]
    pub fn is_pollable(&self) -> bool {
        matches!(
            self.status,
            IntegrationStatus::Active | IntegrationStatus::Error
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> IntegrationConfig {
        IntegrationConfig {
            api_key: "key".to_string(),
            account_id: Some("RA0001".to_string()),
            sync_interval_minutes: 5,
            auto_transcribe: true,
            filters: FetchFilters::default(),
        }
    }

    #[test]
    fn test_new_integration_is_configuring() {
        let integration = Integration::new("main line", VendorKind::Ringba, config());
        assert_eq!(integration.status, IntegrationStatus::Configuring);
        assert!(integration.last_sync.is_none());
        assert_eq!(integration.total_calls, 0);
    }

    #[test]
    fn test_success_rate() {
        let mut integration = Integration::new("main line", VendorKind::Ringba, config());
        assert_eq!(integration.success_rate(), 1.0);

        integration.total_calls = 10;
        integration.error_count = 2;
        assert!((integration.success_rate() - 0.8).abs() < f64::EPSILON);

        // Error count can exceed total when connection-level failures pile
        // up before any call lands; the rate floors at zero.
        integration.total_calls = 1;
        integration.error_count = 5;
        assert_eq!(integration.success_rate(), 0.0);
    }

    #[test]
    fn test_error_status_is_still_pollable() {
        let mut integration = Integration::new("main line", VendorKind::Ringba, config());
        integration.status = IntegrationStatus::Error;
        assert!(integration.is_pollable());

        integration.status = IntegrationStatus::Inactive;
        assert!(!integration.is_pollable());
    }

    #[test]
    fn test_fetch_filters_default_is_unbounded() {
        let filters = FetchFilters::default();
        assert!(filters.start_date.is_none());
        assert!(filters.end_date.is_none());
        assert!(filters.campaign_ids.is_empty());
        assert!(filters.direction.is_none());
    }
}
