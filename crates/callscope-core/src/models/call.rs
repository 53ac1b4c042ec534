//! Canonical call record model
//!
//! Every vendor-specific call log is normalized into `CallRecord` before
//! it touches the rest of the system.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported call-tracking vendors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VendorKind {
    Ringba,
    Retreaver,
    Twilio,
}

impl VendorKind {
    /// Stable lowercase name, used as id prefix and in API paths
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ringba => "ringba",
            Self::Retreaver => "retreaver",
            Self::Twilio => "twilio",
        }
    }

    /// Build the globally unique record id from a vendor-native id.
    ///
    /// External ids are only unique within one vendor's namespace, so the
    /// canonical id is always vendor-prefixed.
    pub fn record_id(&self, external_id: &str) -> String {
        format!("{}-{}", self.as_str(), external_id)
    }
}

impl fmt::Display for VendorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VendorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ringba" => Ok(Self::Ringba),
            "retreaver" => Ok(Self::Retreaver),
            "twilio" => Ok(Self::Twilio),
            other => Err(format!("unknown vendor: {}", other)),
        }
    }
}

/// Call direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallDirection {
    Inbound,
    Outbound,
}

impl CallDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inbound => "inbound",
            Self::Outbound => "outbound",
        }
    }
}

impl fmt::Display for CallDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CallDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "inbound" | "in" | "incoming" => Ok(Self::Inbound),
            "outbound" | "out" | "outgoing" | "outbound-api" | "outbound-dial" => {
                Ok(Self::Outbound)
            }
            other => Err(format!("unknown direction: {}", other)),
        }
    }
}

/// Local processing state for a pipeline stage
///
/// This is CallScope's own state, not the vendor's call status.
/// `Completed` and `Failed` are terminal and are not revisited by
/// the same sync cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Terminal states are never re-entered within a sync cycle
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown processing status: {}", other)),
        }
    }
}

/// Canonical call record
///
/// The vendor-agnostic shape every raw call log is mapped into.
/// The original vendor payload is retained in `metadata` for
/// auditability and debugging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRecord {
    /// Globally unique identifier, vendor-prefixed (e.g. "ringba-abc123")
    pub id: String,

    /// Vendor-native call identifier, unique only within one vendor
    pub external_id: String,

    /// Vendor this record came from
    pub vendor: VendorKind,

    /// Call direction
    pub direction: CallDirection,

    /// Caller number (E.164-ish, not validated)
    pub from_number: String,

    /// Called number (E.164-ish, not validated)
    pub to_number: String,

    /// Total call duration in seconds (non-negative)
    pub duration_seconds: i64,

    /// Call start timestamp
    pub start_time: DateTime<Utc>,

    /// Call end timestamp (None while the call is in progress)
    pub end_time: Option<DateTime<Utc>>,

    /// Recording URL (None means no recording available)
    pub recording_url: Option<String>,

    /// Correlation identifiers
    pub campaign_id: Option<String>,
    pub agent_id: Option<String>,
    pub customer_id: Option<String>,

    /// Vendor-specific outcome label, free text
    pub disposition: Option<String>,

    /// Local processing state
    pub status: ProcessingStatus,

    /// Transcription pipeline state (independent of `status`)
    pub transcription_status: ProcessingStatus,

    /// Analysis pipeline state (independent of `status`)
    pub analysis_status: ProcessingStatus,

    /// Original vendor payload, kept intact
    pub metadata: serde_json::Value,

    /// Row creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last mutation timestamp
    pub updated_at: DateTime<Utc>,
}

impl CallRecord {
    /// Create a record from a vendor-native id with pipeline states reset
    pub fn new(vendor: VendorKind, external_id: impl Into<String>) -> Self {
        let external_id = external_id.into();
        Self {
            id: vendor.record_id(&external_id),
            external_id,
            vendor,
            ..Default::default()
        }
    }

    /// Check if this is an inbound call
    #[inline]
    pub fn is_inbound(&self) -> bool {
        self.direction == CallDirection::Inbound
    }

    /// Check if a recording is available
    #[inline]
    pub fn was_recorded(&self) -> bool {
        self.recording_url.is_some()
    }

    /// Check if every pipeline reached a terminal state
    pub fn is_settled(&self) -> bool {
        self.status.is_terminal()
            && self.transcription_status.is_terminal()
            && self.analysis_status.is_terminal()
    }

    /// Get duration for display
    pub fn effective_duration(&self) -> String {
        let mins = self.duration_seconds / 60;
        let secs = self.duration_seconds % 60;
        format!("{:02}:{:02}", mins, secs)
    }
}

impl Default for CallRecord {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            external_id: String::new(),
            vendor: VendorKind::Ringba,
            direction: CallDirection::Inbound,
            from_number: String::new(),
            to_number: String::new(),
            duration_seconds: 0,
            start_time: now,
            end_time: None,
            recording_url: None,
            campaign_id: None,
            agent_id: None,
            customer_id: None,
            disposition: None,
            status: ProcessingStatus::Pending,
            transcription_status: ProcessingStatus::Pending,
            analysis_status: ProcessingStatus::Pending,
            metadata: serde_json::Value::Null,
            created_at: now,
            updated_at: now,
        }
    }
}
