//! Twilio client
//!
//! Basic-auth REST against the 2010-04-01 API. Twilio reports durations as
//! strings and timestamps in RFC 2822; both are handled by the field
//! mapper's coercions. Recording URLs are never inlined in the call list
//! and always go through the Recordings subresource fallback.

use crate::client::{apply_local_filters, build_http_client, check_status, VendorClient, VendorError};
use crate::mapping;
use async_trait::async_trait;
use callscope_core::models::{CallDirection, CallRecord, FetchFilters, VendorKind};
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, instrument, warn};

const TWILIO_API_BASE: &str = "https://api.twilio.com/2010-04-01";

const ID_KEYS: &[&str] = &["sid", "call_sid", "id"];
const FROM_KEYS: &[&str] = &["from", "from_formatted", "caller"];
const TO_KEYS: &[&str] = &["to", "to_formatted", "called"];
const DURATION_KEYS: &[&str] = &["duration", "call_duration"];
const START_KEYS: &[&str] = &["start_time", "date_created"];
const END_KEYS: &[&str] = &["end_time", "date_updated"];
const DIRECTION_KEYS: &[&str] = &["direction"];
const DISPOSITION_KEYS: &[&str] = &["status"];
const LIST_KEYS: &[&str] = &["calls", "data"];

/// Twilio vendor client
pub struct TwilioClient {
    http_client: Client,
    account_sid: String,
    auth_token: String,
    timeout_secs: u64,
}

impl TwilioClient {
    pub fn new(
        account_sid: impl Into<String>,
        auth_token: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self, VendorError> {
        Ok(Self {
            http_client: build_http_client(timeout_secs)?,
            account_sid: account_sid.into(),
            auth_token: auth_token.into(),
            timeout_secs,
        })
    }

    fn calls_url(&self) -> String {
        format!("{}/Accounts/{}/Calls.json", TWILIO_API_BASE, self.account_sid)
    }

    fn normalize(raw: &Value) -> Option<CallRecord> {
        let external_id = mapping::resolve_str(raw, ID_KEYS)?;
        let mut record = CallRecord::new(VendorKind::Twilio, external_id);

        record.from_number = mapping::resolve_str(raw, FROM_KEYS).unwrap_or_default();
        record.to_number = mapping::resolve_str(raw, TO_KEYS).unwrap_or_default();
        record.duration_seconds = mapping::resolve_i64(raw, DURATION_KEYS).unwrap_or(0).max(0);
        record.start_time = mapping::resolve_time(raw, START_KEYS).unwrap_or(record.start_time);
        record.end_time = mapping::resolve_time(raw, END_KEYS);
        record.disposition = mapping::resolve_str(raw, DISPOSITION_KEYS);
        record.direction = mapping::resolve_str(raw, DIRECTION_KEYS)
            .and_then(|s| s.parse().ok())
            .unwrap_or(CallDirection::Outbound);
        record.metadata = raw.clone();

        Some(record)
    }
}

#[async_trait]
impl VendorClient for TwilioClient {
    fn vendor(&self) -> VendorKind {
        VendorKind::Twilio
    }

    async fn test_connection(&self) -> Result<(), VendorError> {
        let url = format!("{}/Accounts/{}.json", TWILIO_API_BASE, self.account_sid);
        let response = self
            .http_client
            .get(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .send()
            .await
            .map_err(|e| VendorError::from_reqwest(e, self.timeout_secs))?;
        check_status(response.status())
    }

    #[instrument(skip(self, filters))]
    async fn fetch_calls(&self, filters: &FetchFilters) -> Result<Vec<CallRecord>, VendorError> {
        let mut params: Vec<(&str, String)> = vec![("PageSize", "200".to_string())];
        if let Some(start) = filters.start_date {
            params.push(("StartTime>", start.format("%Y-%m-%d").to_string()));
        }
        if let Some(end) = filters.end_date {
            params.push(("StartTime<", end.format("%Y-%m-%d").to_string()));
        }

        let response = self
            .http_client
            .get(self.calls_url())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .query(&params)
            .send()
            .await
            .map_err(|e| VendorError::from_reqwest(e, self.timeout_secs))?;
        check_status(response.status())?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| VendorError::Parse(e.to_string()))?;

        let items = mapping::extract_items(&body, LIST_KEYS);
        debug!("Twilio returned {} raw calls", items.len());

        let records: Vec<CallRecord> = items
            .iter()
            .filter_map(|item| {
                let record = Self::normalize(item);
                if record.is_none() {
                    warn!("Skipping Twilio call without a sid: {}", item);
                }
                record
            })
            .collect();

        Ok(apply_local_filters(records, filters))
    }

    #[instrument(skip(self))]
    async fn recording_url(&self, external_id: &str) -> Result<Option<String>, VendorError> {
        let url = format!(
            "{}/Accounts/{}/Calls/{}/Recordings.json",
            TWILIO_API_BASE, self.account_sid, external_id
        );

        let response = self
            .http_client
            .get(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .send()
            .await
            .map_err(|e| VendorError::from_reqwest(e, self.timeout_secs))?;

        if !response.status().is_success() {
            return Ok(None);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| VendorError::Parse(e.to_string()))?;

        let recording_sid = body
            .get("recordings")
            .and_then(|r| r.as_array())
            .and_then(|items| items.first())
            .and_then(|first| mapping::resolve_str(first, &["sid"]));

        Ok(recording_sid.map(|sid| {
            format!(
                "{}/Accounts/{}/Recordings/{}.mp3",
                TWILIO_API_BASE, self.account_sid, sid
            )
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_twilio_string_duration_and_rfc2822() {
        let raw = json!({
            "sid": "CA5678",
            "from": "+15550001111",
            "to": "+15552223333",
            "duration": "62",
            "start_time": "Sat, 01 Mar 2025 12:30:00 +0000",
            "direction": "outbound-api",
            "status": "completed"
        });

        let record = TwilioClient::normalize(&raw).unwrap();
        assert_eq!(record.id, "twilio-CA5678");
        assert_eq!(record.duration_seconds, 62);
        assert_eq!(record.direction, CallDirection::Outbound);
        assert_eq!(record.start_time.timestamp(), 1_740_832_200);
        assert_eq!(record.disposition.as_deref(), Some("completed"));
    }

    #[test]
    fn test_normalize_inbound_direction() {
        let raw = json!({"sid": "CA1", "direction": "inbound"});
        let record = TwilioClient::normalize(&raw).unwrap();
        assert_eq!(record.direction, CallDirection::Inbound);
    }

    #[test]
    fn test_calls_url_is_account_scoped() {
        let client = TwilioClient::new("AC123", "token", 30).unwrap();
        assert_eq!(
            client.calls_url(),
            "https://api.twilio.com/2010-04-01/Accounts/AC123/Calls.json"
        );
    }
}
