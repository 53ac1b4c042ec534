//! Retreaver client
//!
//! Query-parameter auth against
//! `https://api.retreaver.com/api/v2/calls.json`. Retreaver wraps each
//! list item in a `{"call": {...}}` envelope; both the wrapped and bare
//! shapes are accepted.

use crate::client::{apply_local_filters, build_http_client, check_status, VendorClient, VendorError};
use crate::mapping;
use async_trait::async_trait;
use callscope_core::models::{CallDirection, CallRecord, FetchFilters, VendorKind};
use chrono::{SecondsFormat, Utc};
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, instrument, warn};

const RETREAVER_API_BASE: &str = "https://api.retreaver.com/api/v2";

const ID_KEYS: &[&str] = &["uuid", "id", "call_id"];
const FROM_KEYS: &[&str] = &["caller", "caller_number", "from", "ani"];
const TO_KEYS: &[&str] = &["dialed_call_number", "number_dialed", "tracking_number", "to"];
const DURATION_KEYS: &[&str] = &["duration_in_seconds", "duration", "call_duration", "total_duration"];
const START_KEYS: &[&str] = &["created_at", "called_at", "start_time"];
const END_KEYS: &[&str] = &["ended_at", "end_time", "updated_at"];
const RECORDING_KEYS: &[&str] = &["recording_url", "audio_url"];
const CAMPAIGN_KEYS: &[&str] = &["campaign_id", "campaign_key", "cid"];
const AGENT_KEYS: &[&str] = &["agent_id", "target_id", "target_cid"];
const CUSTOMER_KEYS: &[&str] = &["contact_id", "customer_id"];
const DISPOSITION_KEYS: &[&str] = &["status", "disposition", "hung_up_by"];
const LIST_KEYS: &[&str] = &["calls", "data", "records"];

/// Retreaver vendor client
pub struct RetreaverClient {
    http_client: Client,
    api_key: String,
    company_id: Option<String>,
    timeout_secs: u64,
}

impl RetreaverClient {
    pub fn new(
        api_key: impl Into<String>,
        company_id: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self, VendorError> {
        Ok(Self {
            http_client: build_http_client(timeout_secs)?,
            api_key: api_key.into(),
            company_id,
            timeout_secs,
        })
    }

    fn calls_url() -> String {
        format!("{}/calls.json", RETREAVER_API_BASE)
    }

    fn normalize(item: &Value) -> Option<CallRecord> {
        // Unwrap the {"call": {...}} envelope when present
        let raw = item.get("call").unwrap_or(item);

        let external_id = mapping::resolve_str(raw, ID_KEYS)?;
        let mut record = CallRecord::new(VendorKind::Retreaver, external_id);

        record.from_number = mapping::resolve_str(raw, FROM_KEYS).unwrap_or_default();
        record.to_number = mapping::resolve_str(raw, TO_KEYS).unwrap_or_default();
        record.duration_seconds = mapping::resolve_i64(raw, DURATION_KEYS).unwrap_or(0).max(0);
        record.start_time = mapping::resolve_time(raw, START_KEYS).unwrap_or(record.start_time);
        record.end_time = mapping::resolve_time(raw, END_KEYS);
        record.recording_url = mapping::resolve_str(raw, RECORDING_KEYS);
        record.campaign_id = mapping::resolve_str(raw, CAMPAIGN_KEYS);
        record.agent_id = mapping::resolve_str(raw, AGENT_KEYS);
        record.customer_id = mapping::resolve_str(raw, CUSTOMER_KEYS);
        record.disposition = mapping::resolve_str(raw, DISPOSITION_KEYS);
        // Retreaver tracks inbound campaign calls only
        record.direction = CallDirection::Inbound;
        record.metadata = raw.clone();

        Some(record)
    }
}

#[async_trait]
impl VendorClient for RetreaverClient {
    fn vendor(&self) -> VendorKind {
        VendorKind::Retreaver
    }

    async fn test_connection(&self) -> Result<(), VendorError> {
        let response = self
            .http_client
            .get(Self::calls_url())
            .query(&[("api_key", self.api_key.as_str()), ("per_page", "1")])
            .send()
            .await
            .map_err(|e| VendorError::from_reqwest(e, self.timeout_secs))?;
        check_status(response.status())
    }

    #[instrument(skip(self, filters))]
    async fn fetch_calls(&self, filters: &FetchFilters) -> Result<Vec<CallRecord>, VendorError> {
        let mut params: Vec<(&str, String)> = vec![("api_key", self.api_key.clone())];
        if let Some(ref company_id) = self.company_id {
            params.push(("company_id", company_id.clone()));
        }
        if let Some(start) = filters.start_date {
            params.push((
                "created_at_start",
                start.to_rfc3339_opts(SecondsFormat::Secs, true),
            ));
        }
        let end = filters.end_date.unwrap_or_else(Utc::now);
        params.push((
            "created_at_end",
            end.to_rfc3339_opts(SecondsFormat::Secs, true),
        ));

        let response = self
            .http_client
            .get(Self::calls_url())
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
        debug!("Retreaver returned {} raw calls", items.len());

        let records: Vec<CallRecord> = items
            .iter()
            .filter_map(|item| {
                let record = Self::normalize(item);
                if record.is_none() {
                    warn!("Skipping Retreaver call without an id: {}", item);
                }
                record
            })
            .collect();

        Ok(apply_local_filters(records, filters))
    }

    /// Retreaver inlines recording URLs in the list payload; the fallback
    /// refetches the single call in case the URL appeared after the fact.
    #[instrument(skip(self))]
    async fn recording_url(&self, external_id: &str) -> Result<Option<String>, VendorError> {
        let url = format!("{}/calls/{}.json", RETREAVER_API_BASE, external_id);
        let response = self
            .http_client
            .get(&url)
            .query(&[("api_key", self.api_key.as_str())])
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
        let raw = body.get("call").unwrap_or(&body);

        Ok(mapping::resolve_str(raw, RECORDING_KEYS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_unwraps_call_envelope() {
        let item = json!({
            "call": {
                "uuid": "ret-88",
                "caller": "+15550001111",
                "dialed_call_number": "+15552223333",
                "duration_in_seconds": "62",
                "created_at": "2025-03-01T09:00:00Z",
                "recording_url": "https://cdn.retreaver.com/ret-88.mp3",
                "campaign_id": 412
            }
        });

        let record = RetreaverClient::normalize(&item).unwrap();
        assert_eq!(record.id, "retreaver-ret-88");
        assert_eq!(record.duration_seconds, 62);
        assert_eq!(record.campaign_id.as_deref(), Some("412"));
        assert_eq!(record.direction, CallDirection::Inbound);
    }

    #[test]
    fn test_normalize_accepts_bare_shape() {
        let item = json!({"uuid": "ret-90", "caller": "+15550001111"});
        let record = RetreaverClient::normalize(&item).unwrap();
        assert_eq!(record.external_id, "ret-90");
        assert_eq!(record.duration_seconds, 0);
        assert!(record.recording_url.is_none());
    }

    #[test]
    fn test_calls_url() {
        assert_eq!(
            RetreaverClient::calls_url(),
            "https://api.retreaver.com/api/v2/calls.json"
        );
    }
}
