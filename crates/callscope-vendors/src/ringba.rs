//! Ringba client
//!
//! Header-auth REST against `https://api.ringba.com/v2/{accountId}/...`.
//! The endpoint shape and auth header a given account accepts are not
//! reliably known ahead of time, so the first successful combination is
//! discovered by the prober and cached for the steady state.

use crate::client::{apply_local_filters, build_http_client, check_status, VendorClient, VendorError};
use crate::mapping;
use crate::prober::{probe_endpoints, ProbeReport, ProbeTarget};
use async_trait::async_trait;
use callscope_core::models::{CallDirection, CallRecord, FetchFilters, VendorKind};
use chrono::{SecondsFormat, Utc};
use reqwest::Client;
use serde_json::Value;
use std::sync::RwLock;
use tracing::{debug, instrument, warn};

const RINGBA_API_BASE: &str = "https://api.ringba.com/v2";

// Candidate source keys per canonical field, in priority order
const ID_KEYS: &[&str] = &["inboundCallId", "callId", "id", "uuid"];
const FROM_KEYS: &[&str] = &["inboundPhoneNumber", "callerId", "caller", "ani", "from"];
const TO_KEYS: &[&str] = &["targetNumber", "dialedNumber", "trackingPhoneNumber", "dnis", "to"];
const DURATION_KEYS: &[&str] = &["callLengthInSeconds", "duration", "callDuration", "connectedCallLengthInSeconds"];
const START_KEYS: &[&str] = &["dtStamp", "callDt", "startTime", "timestamp"];
const END_KEYS: &[&str] = &["endCallDt", "endTime", "hangupDt"];
const RECORDING_KEYS: &[&str] = &["recordingUrl", "callRecordingUrl", "recording_url"];
const CAMPAIGN_KEYS: &[&str] = &["campaignId", "campaignName", "campaign"];
const AGENT_KEYS: &[&str] = &["targetId", "targetName", "buyer", "agentId"];
const CUSTOMER_KEYS: &[&str] = &["callerId", "contactId"];
const DISPOSITION_KEYS: &[&str] = &["disposition", "callStatus", "hangupCause"];
const DIRECTION_KEYS: &[&str] = &["direction", "callDirection"];
const LIST_KEYS: &[&str] = &["records", "callLogs", "calls", "data", "items", "report"];

/// Ringba vendor client
pub struct RingbaClient {
    http_client: Client,
    api_key: String,
    account_id: String,
    probe_budget: usize,
    timeout_secs: u64,
    /// Working (endpoint, auth) combination, filled in by the first probe
    target: RwLock<Option<ProbeTarget>>,
}

impl RingbaClient {
    pub fn new(
        api_key: impl Into<String>,
        account_id: impl Into<String>,
        timeout_secs: u64,
        probe_budget: usize,
    ) -> Result<Self, VendorError> {
        Ok(Self {
            http_client: build_http_client(timeout_secs)?,
            api_key: api_key.into(),
            account_id: account_id.into(),
            probe_budget,
            timeout_secs,
            target: RwLock::new(None),
        })
    }

    /// Endpoint templates tried by the prober, in order
    pub fn candidate_endpoints(account_id: &str) -> Vec<String> {
        vec![
            format!("{}/{}/calllogs", RINGBA_API_BASE, account_id),
            format!("{}/{}/calllogs/detail", RINGBA_API_BASE, account_id),
            format!("{}/{}/calls", RINGBA_API_BASE, account_id),
        ]
    }

    /// Run the discovery probe and cache the working combination
    #[instrument(skip(self))]
    pub async fn probe(&self) -> ProbeReport {
        let endpoints = Self::candidate_endpoints(&self.account_id);
        let report =
            probe_endpoints(&self.http_client, &endpoints, &self.api_key, self.probe_budget).await;

        if let Some(ref working) = report.working {
            *self.target.write().expect("probe target lock poisoned") = Some(working.clone());
        }
        report
    }

    /// Cached target, probing first if none is known yet
    async fn target(&self) -> Result<ProbeTarget, VendorError> {
        let cached = self
            .target
            .read()
            .expect("probe target lock poisoned")
            .clone();
        if let Some(target) = cached {
            return Ok(target);
        }
        self.probe().await.into_target()
    }

    fn normalize(raw: &Value) -> Option<CallRecord> {
        let external_id = mapping::resolve_str(raw, ID_KEYS)?;
        let mut record = CallRecord::new(VendorKind::Ringba, external_id);

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
        // Ringba is an inbound call-tracking platform; default accordingly
        record.direction = mapping::resolve_str(raw, DIRECTION_KEYS)
            .and_then(|s| s.parse().ok())
            .unwrap_or(CallDirection::Inbound);
        record.metadata = raw.clone();

        Some(record)
    }
}

#[async_trait]
impl VendorClient for RingbaClient {
    fn vendor(&self) -> VendorKind {
        VendorKind::Ringba
    }

    async fn test_connection(&self) -> Result<(), VendorError> {
        self.probe().await.into_target().map(|_| ())
    }

    #[instrument(skip(self, filters))]
    async fn fetch_calls(&self, filters: &FetchFilters) -> Result<Vec<CallRecord>, VendorError> {
        let target = self.target().await?;

        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(start) = filters.start_date {
            params.push(("startDate", start.to_rfc3339_opts(SecondsFormat::Secs, true)));
        }
        let end = filters.end_date.unwrap_or_else(Utc::now);
        params.push(("endDate", end.to_rfc3339_opts(SecondsFormat::Secs, true)));

        let request = target
            .auth
            .apply(self.http_client.get(&target.url), &self.api_key)
            .query(&params);

        let response = request
            .send()
            .await
            .map_err(|e| VendorError::from_reqwest(e, self.timeout_secs))?;
        check_status(response.status())?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| VendorError::Parse(e.to_string()))?;

        let items = mapping::extract_items(&body, LIST_KEYS);
        debug!("Ringba returned {} raw call logs", items.len());

        let records: Vec<CallRecord> = items
            .iter()
            .filter_map(|item| {
                let record = Self::normalize(item);
                if record.is_none() {
                    warn!("Skipping Ringba call log without an id: {}", item);
                }
                record
            })
            .collect();

        Ok(apply_local_filters(records, filters))
    }

    #[instrument(skip(self))]
    async fn recording_url(&self, external_id: &str) -> Result<Option<String>, VendorError> {
        let target = self.target().await?;
        let url = format!(
            "{}/{}/calls/{}/recording",
            RINGBA_API_BASE, self.account_id, external_id
        );

        let response = target
            .auth
            .apply(self.http_client.get(&url), &self.api_key)
            .send()
            .await
            .map_err(|e| VendorError::from_reqwest(e, self.timeout_secs))?;

        // A failed lookup means "no recording available", not an error
        if !response.status().is_success() {
            return Ok(None);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| VendorError::Parse(e.to_string()))?;

        Ok(mapping::resolve_str(&body, &["url", "recordingUrl", "recording_url"]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_candidate_endpoints_are_account_scoped() {
        let endpoints = RingbaClient::candidate_endpoints("RA1234");
        assert_eq!(endpoints.len(), 3);
        assert!(endpoints
            .iter()
            .all(|e| e.starts_with("https://api.ringba.com/v2/RA1234/")));
    }

    #[test]
    fn test_normalize_maps_priority_keys() {
        let raw = json!({
            "inboundCallId": "CL123",
            "inboundPhoneNumber": "+15550001111",
            "targetNumber": "+15552223333",
            "callLengthInSeconds": 95,
            "dtStamp": "2025-03-01T12:30:00Z",
            "recordingUrl": "https://rec.ringba.com/CL123.mp3",
            "campaignId": "CAMP9",
            "targetName": "Acme Insurance",
            "disposition": "sale"
        });

        let record = RingbaClient::normalize(&raw).unwrap();
        assert_eq!(record.id, "ringba-CL123");
        assert_eq!(record.from_number, "+15550001111");
        assert_eq!(record.to_number, "+15552223333");
        assert_eq!(record.duration_seconds, 95);
        assert_eq!(record.direction, CallDirection::Inbound);
        assert_eq!(record.campaign_id.as_deref(), Some("CAMP9"));
        assert_eq!(record.agent_id.as_deref(), Some("Acme Insurance"));
        assert_eq!(
            record.recording_url.as_deref(),
            Some("https://rec.ringba.com/CL123.mp3")
        );
        assert_eq!(record.metadata, raw);
    }

    #[test]
    fn test_normalize_without_id_is_skipped() {
        let raw = json!({"inboundPhoneNumber": "+15550001111"});
        assert!(RingbaClient::normalize(&raw).is_none());
    }

    #[test]
    fn test_normalize_negative_duration_clamped() {
        let raw = json!({"callId": "CL1", "duration": -5});
        let record = RingbaClient::normalize(&raw).unwrap();
        assert_eq!(record.duration_seconds, 0);
    }
}
