//! Call DTOs

use crate::dto::common::PaginationParams;
use callscope_core::models::{CallDirection, CallQuery, CallRecord, ProcessingStatus, VendorKind};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Query parameters for listing calls
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CallFilterParams {
    #[serde(flatten)]
    pub pagination: PaginationParams,

    /// Restrict to one vendor
    pub vendor: Option<VendorKind>,

    /// Restrict to one direction
    pub direction: Option<CallDirection>,

    /// Restrict to one campaign
    pub campaign_id: Option<String>,

    /// Restrict to one agent
    pub agent_id: Option<String>,

    /// Window start, `YYYY-MM-DD` or RFC 3339
    pub start_date: Option<String>,

    /// Window end (exclusive), `YYYY-MM-DD` or RFC 3339
    pub end_date: Option<String>,

    /// Minimum duration in seconds
    #[serde(default, deserialize_with = "crate::dto::common::opt_number_from_string")]
    #[validate(range(min = 0))]
    pub min_duration: Option<i64>,

    /// Maximum duration in seconds
    #[serde(default, deserialize_with = "crate::dto::common::opt_number_from_string")]
    #[validate(range(min = 0))]
    pub max_duration: Option<i64>,
}

/// Parse a request date: bare dates become midnight UTC
pub fn parse_optional_date(value: &Option<String>) -> Option<DateTime<Utc>> {
    let raw = value.as_deref()?;
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    let date = raw.parse::<NaiveDate>().ok()?;
    Utc.from_local_datetime(&date.and_hms_opt(0, 0, 0)?).single()
}

impl CallFilterParams {
    /// Translate request parameters into the store query
    pub fn to_query(&self) -> CallQuery {
        CallQuery {
            vendor: self.vendor,
            direction: self.direction,
            campaign_id: self.campaign_id.clone(),
            start_date: parse_optional_date(&self.start_date),
            end_date: parse_optional_date(&self.end_date),
            min_duration: self.min_duration,
            max_duration: self.max_duration,
            agent_names: self.agent_id.clone().map(|a| vec![a]),
            ..Default::default()
        }
    }
}

/// Call record response shape
#[derive(Debug, Clone, Serialize)]
pub struct CallResponse {
    pub id: String,
    pub external_id: String,
    pub vendor: VendorKind,
    pub direction: CallDirection,
    pub from_number: String,
    pub to_number: String,
    pub duration_seconds: i64,
    /// `MM:SS` display form
    pub duration_display: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub recording_url: Option<String>,
    pub has_recording: bool,
    pub campaign_id: Option<String>,
    pub agent_id: Option<String>,
    pub customer_id: Option<String>,
    pub disposition: Option<String>,
    pub status: ProcessingStatus,
    pub transcription_status: ProcessingStatus,
    pub analysis_status: ProcessingStatus,
}

impl From<CallRecord> for CallResponse {
    fn from(record: CallRecord) -> Self {
        Self {
            duration_display: record.effective_duration(),
            has_recording: record.was_recorded(),
            id: record.id,
            external_id: record.external_id,
            vendor: record.vendor,
            direction: record.direction,
            from_number: record.from_number,
            to_number: record.to_number,
            duration_seconds: record.duration_seconds,
            start_time: record.start_time,
            end_time: record.end_time,
            recording_url: record.recording_url,
            campaign_id: record.campaign_id,
            agent_id: record.agent_id,
            customer_id: record.customer_id,
            disposition: record.disposition,
            status: record.status,
            transcription_status: record.transcription_status,
            analysis_status: record.analysis_status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_optional_date_shapes() {
        assert!(parse_optional_date(&None).is_none());

        let bare = parse_optional_date(&Some("2025-03-01".to_string())).unwrap();
        assert_eq!(bare, Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap());

        let rfc = parse_optional_date(&Some("2025-03-01T12:30:00Z".to_string())).unwrap();
        assert_eq!(rfc, Utc.with_ymd_and_hms(2025, 3, 1, 12, 30, 0).unwrap());

        assert!(parse_optional_date(&Some("yesterday".to_string())).is_none());
    }

    #[test]
    fn test_to_query_maps_bounds() {
        let params = CallFilterParams {
            pagination: PaginationParams::default(),
            vendor: Some(VendorKind::Ringba),
            direction: None,
            campaign_id: None,
            agent_id: Some("a1".to_string()),
            start_date: Some("2025-03-01".to_string()),
            end_date: None,
            min_duration: Some(30),
            max_duration: None,
        };

        let query = params.to_query();
        assert_eq!(query.vendor, Some(VendorKind::Ringba));
        assert_eq!(query.min_duration, Some(30));
        assert_eq!(query.agent_names, Some(vec!["a1".to_string()]));
        assert!(query.start_date.is_some());
    }

    #[test]
    fn test_call_response_conversion() {
        let mut record = CallRecord::new(VendorKind::Twilio, "CA1");
        record.duration_seconds = 125;
        record.recording_url = Some("https://rec/CA1.mp3".to_string());

        let response = CallResponse::from(record);
        assert_eq!(response.id, "twilio-CA1");
        assert_eq!(response.duration_display, "02:05");
        assert!(response.has_recording);
    }
}
