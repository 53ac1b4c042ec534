//! Field mapper
//!
//! Vendors disagree on key names for the same logical field. Each canonical
//! field carries an ordered list of candidate source keys; resolution
//! returns the value of the first candidate that is present and non-null.
//!
//! Presence, not truthiness: a `0` or `""` from an earlier-priority key is
//! accepted and short-circuits later candidates. Typed helpers apply
//! coercion only after retrieval; they do not fall through to later keys
//! when coercion fails.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

/// Resolve the first present, non-null candidate key
pub fn resolve<'a>(raw: &'a Value, candidates: &[&str]) -> Option<&'a Value> {
    let obj = raw.as_object()?;
    for key in candidates {
        if let Some(value) = obj.get(*key) {
            if !value.is_null() {
                return Some(value);
            }
        }
    }
    None
}

/// Resolve as text; numbers are stringified, other shapes are dropped
pub fn resolve_str(raw: &Value, candidates: &[&str]) -> Option<String> {
    match resolve(raw, candidates)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Resolve as an integer; accepts numbers and numeric strings
pub fn resolve_i64(raw: &Value, candidates: &[&str]) -> Option<i64> {
    match resolve(raw, candidates)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<f64>().ok().map(|f| f as i64),
        _ => None,
    }
}

/// Resolve as a boolean; accepts bools and the usual string spellings
pub fn resolve_bool(raw: &Value, candidates: &[&str]) -> Option<bool> {
    match resolve(raw, candidates)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.to_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        },
        Value::Number(n) => n.as_i64().map(|v| v != 0),
        _ => None,
    }
}

/// Resolve as a UTC timestamp
///
/// Accepts RFC 3339, RFC 2822 (Twilio), bare `YYYY-MM-DD HH:MM:SS`, and
/// epoch seconds or milliseconds.
pub fn resolve_time(raw: &Value, candidates: &[&str]) -> Option<DateTime<Utc>> {
    match resolve(raw, candidates)? {
        Value::String(s) => parse_timestamp(s),
        Value::Number(n) => n.as_i64().and_then(epoch_to_utc),
        _ => None,
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    s.trim().parse::<i64>().ok().and_then(epoch_to_utc)
}

/// Pull the list of raw call items out of a vendor response body
///
/// Vendors wrap their lists differently: a bare array, a named top-level
/// array, or an array nested one level down (e.g. `{"report": {"records":
/// [...]}}`). The first matching shape wins.
pub fn extract_items(body: &Value, keys: &[&str]) -> Vec<Value> {
    if let Some(items) = body.as_array() {
        return items.clone();
    }
    for key in keys {
        if let Some(items) = body.get(*key).and_then(|v| v.as_array()) {
            return items.clone();
        }
    }
    for key in keys {
        if let Some(nested) = body.get(*key) {
            if nested.is_object() {
                for inner in keys {
                    if let Some(items) = nested.get(*inner).and_then(|v| v.as_array()) {
                        return items.clone();
                    }
                }
            }
        }
    }
    Vec::new()
}

fn epoch_to_utc(n: i64) -> Option<DateTime<Utc>> {
    // Heuristic: values past ~Nov 2286 in seconds are really milliseconds
    if n > 9_999_999_999 {
        Utc.timestamp_millis_opt(n).single()
    } else {
        Utc.timestamp_opt(n, 0).single()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_first_present_wins() {
        let raw = json!({"caller_id": "+15550001111", "from": "+15559998888"});
        assert_eq!(
            resolve_str(&raw, &["caller_id", "from", "ani"]),
            Some("+15550001111".to_string())
        );
    }

    #[test]
    fn test_null_is_skipped() {
        let raw = json!({"caller_id": null, "from": "+15559998888"});
        assert_eq!(
            resolve_str(&raw, &["caller_id", "from"]),
            Some("+15559998888".to_string())
        );
    }

    #[test]
    fn test_zero_short_circuits_later_keys() {
        // A present 0 wins over a later candidate holding 45.
        let raw = json!({"duration": 0, "call_duration": 45});
        assert_eq!(resolve_i64(&raw, &["duration", "call_duration"]), Some(0));
    }

    #[test]
    fn test_empty_string_is_present() {
        let raw = json!({"disposition": "", "status": "answered"});
        assert_eq!(
            resolve_str(&raw, &["disposition", "status"]),
            Some(String::new())
        );
    }

    #[test]
    fn test_missing_returns_none_for_default_fallback() {
        let raw = json!({"other": 1});
        assert_eq!(resolve_i64(&raw, &["duration", "call_duration"]), None);
        assert_eq!(resolve_i64(&raw, &["duration"]).unwrap_or(0), 0);
    }

    #[test]
    fn test_numeric_string_coercion() {
        let raw = json!({"duration": "45"});
        assert_eq!(resolve_i64(&raw, &["duration"]), Some(45));

        let raw = json!({"duration": "45.7"});
        assert_eq!(resolve_i64(&raw, &["duration"]), Some(45));
    }

    #[test]
    fn test_number_to_string_coercion() {
        let raw = json!({"campaign_id": 9912});
        assert_eq!(
            resolve_str(&raw, &["campaign_id"]),
            Some("9912".to_string())
        );
    }

    #[test]
    fn test_time_formats() {
        let raw = json!({
            "rfc3339": "2025-03-01T12:30:00Z",
            "rfc2822": "Sat, 01 Mar 2025 12:30:00 +0000",
            "plain": "2025-03-01 12:30:00",
            "epoch": 1740832200,
        });
        let expected = Utc.with_ymd_and_hms(2025, 3, 1, 12, 30, 0).unwrap();
        assert_eq!(resolve_time(&raw, &["rfc3339"]), Some(expected));
        assert_eq!(resolve_time(&raw, &["rfc2822"]), Some(expected));
        assert_eq!(resolve_time(&raw, &["plain"]), Some(expected));
        assert!(resolve_time(&raw, &["epoch"]).is_some());
    }

    #[test]
    fn test_epoch_millis() {
        let raw = json!({"ts": 1740832200000_i64});
        let parsed = resolve_time(&raw, &["ts"]).unwrap();
        assert_eq!(parsed.timestamp(), 1_740_832_200);
    }

    #[test]
    fn test_non_object_resolves_to_none() {
        assert!(resolve(&json!([1, 2, 3]), &["a"]).is_none());
        assert!(resolve(&Value::Null, &["a"]).is_none());
    }

    #[test]
    fn test_extract_items_shapes() {
        let keys = &["records", "calls", "report"];

        let bare = json!([{"id": 1}]);
        assert_eq!(extract_items(&bare, keys).len(), 1);

        let named = json!({"calls": [{"id": 1}, {"id": 2}]});
        assert_eq!(extract_items(&named, keys).len(), 2);

        let nested = json!({"report": {"records": [{"id": 1}]}});
        assert_eq!(extract_items(&nested, keys).len(), 1);

        let empty = json!({"unrelated": true});
        assert!(extract_items(&empty, keys).is_empty());
    }
}
