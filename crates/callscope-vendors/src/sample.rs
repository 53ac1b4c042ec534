//! Synthetic sample data
//!
//! When a vendor is unconfigured or failing, the API layer substitutes
//! deterministic sample records so the dashboard stays populated during
//! development and outages. Responses built from this module always carry
//! a `mock_data` flag so users are not misled.

use callscope_core::models::{CallDirection, CallRecord, VendorKind};
use chrono::{Duration, TimeZone, Utc};

/// Documented header row of the mock CSV export
pub const MOCK_CSV_HEADER: &str =
    "call_id,direction,from_number,to_number,start_time,duration_seconds,campaign_id,disposition,has_recording";

const SAMPLE_FROM: [&str; 5] = [
    "+15550100001",
    "+15550100002",
    "+15550100003",
    "+15550100004",
    "+15550100005",
];

const SAMPLE_DURATIONS: [i64; 5] = [45, 182, 67, 310, 12];

const SAMPLE_DISPOSITIONS: [&str; 5] = ["sale", "no-answer", "callback", "sale", "abandoned"];

/// Deterministic sample records for one vendor
///
/// Timestamps are anchored to a fixed instant so repeated calls (and the
/// mock CSV) always produce identical output.
pub fn sample_calls(vendor: VendorKind, count: usize) -> Vec<CallRecord> {
    let base = Utc.with_ymd_and_hms(2025, 1, 15, 9, 0, 0).unwrap();

    (0..count)
        .map(|i| {
            let mut record =
                CallRecord::new(vendor, format!("sample-{:04}", i + 1));
            record.from_number = SAMPLE_FROM[i % SAMPLE_FROM.len()].to_string();
            record.to_number = "+18005550199".to_string();
            record.direction = if i % 4 == 3 {
                CallDirection::Outbound
            } else {
                CallDirection::Inbound
            };
            record.duration_seconds = SAMPLE_DURATIONS[i % SAMPLE_DURATIONS.len()];
            record.start_time = base + Duration::minutes(7 * i as i64);
            record.end_time = Some(record.start_time + Duration::seconds(record.duration_seconds));
            record.campaign_id = Some(format!("sample-campaign-{}", (i % 2) + 1));
            record.disposition = Some(SAMPLE_DISPOSITIONS[i % SAMPLE_DISPOSITIONS.len()].to_string());
            record.recording_url = if i % 3 == 0 {
                Some(format!(
                    "https://recordings.example.com/{}/sample-{:04}.mp3",
                    vendor, i + 1
                ))
            } else {
                None
            };
            record.metadata = serde_json::json!({
                "sample": true,
                "vendor": vendor.as_str(),
            });
            // Pin the bookkeeping timestamps too, so two invocations
            // compare equal field-for-field.
            record.created_at = base;
            record.updated_at = base;
            record
        })
        .collect()
}

/// The fixed mock CSV body: documented header plus five sample rows
pub fn mock_csv(vendor: VendorKind) -> String {
    let mut out = String::from(MOCK_CSV_HEADER);
    out.push('\n');
    for record in sample_calls(vendor, 5) {
        out.push_str(&format!(
            "{},{},{},{},{},{},{},{},{}\n",
            record.id,
            record.direction,
            record.from_number,
            record.to_number,
            record.start_time.to_rfc3339(),
            record.duration_seconds,
            record.campaign_id.as_deref().unwrap_or(""),
            record.disposition.as_deref().unwrap_or(""),
            record.recording_url.is_some(),
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_calls_are_deterministic() {
        let a = sample_calls(VendorKind::Ringba, 5);
        let b = sample_calls(VendorKind::Ringba, 5);
        assert_eq!(a, b);
        assert_eq!(a.len(), 5);
        assert_eq!(a[0].id, "ringba-sample-0001");
    }

    #[test]
    fn test_mock_csv_has_header_and_five_rows() {
        let csv = mock_csv(VendorKind::Retreaver);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0], MOCK_CSV_HEADER);
        assert!(lines[1].starts_with("retreaver-sample-0001,"));
    }

    #[test]
    fn test_sample_ids_are_vendor_prefixed() {
        let calls = sample_calls(VendorKind::Twilio, 3);
        assert!(calls.iter().all(|c| c.id.starts_with("twilio-sample-")));
    }
}
