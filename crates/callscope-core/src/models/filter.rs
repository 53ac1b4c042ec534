//! Admin filters and the call query they tighten
//!
//! Admin users store predicate filters that are folded onto report queries
//! before they reach the data store. A filter only applies when its
//! `(filter_type, operator)` pair is legal and its value has the matching
//! shape; anything else is a silent pass-through.

use crate::models::call::{CallDirection, CallRecord, VendorKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Fixed set of filterable dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterType {
    AgentName,
    PublisherName,
    CampaignStatus,
    CallDuration,
    Keyword,
    DateRange,
    Custom,
}

impl FilterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AgentName => "agent_name",
            Self::PublisherName => "publisher_name",
            Self::CampaignStatus => "campaign_status",
            Self::CallDuration => "call_duration",
            Self::Keyword => "keyword",
            Self::DateRange => "date_range",
            Self::Custom => "custom",
        }
    }

    /// Legal operator subset per filter type
    ///
    /// `call_duration` never takes `contains`; anything outside this table
    /// is skipped by the filter engine without raising an error.
    pub fn allows(&self, op: FilterOperator) -> bool {
        use FilterOperator::*;
        match self {
            Self::AgentName | Self::PublisherName => {
                matches!(op, Equals | Contains | In | NotIn)
            }
            Self::CampaignStatus => matches!(op, Equals | In | NotIn),
            Self::CallDuration => matches!(op, GreaterThan | LessThan | Between),
            Self::Keyword => matches!(op, Contains),
            Self::DateRange => matches!(op, Between),
            Self::Custom => matches!(op, Equals | Contains),
        }
    }
}

impl fmt::Display for FilterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "agent_name" => Ok(Self::AgentName),
            "publisher_name" => Ok(Self::PublisherName),
            "campaign_status" => Ok(Self::CampaignStatus),
            "call_duration" => Ok(Self::CallDuration),
            "keyword" => Ok(Self::Keyword),
            "date_range" => Ok(Self::DateRange),
            "custom" => Ok(Self::Custom),
            other => Err(format!("unknown filter type: {}", other)),
        }
    }
}

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    Equals,
    Contains,
    GreaterThan,
    LessThan,
    Between,
    In,
    NotIn,
}

impl FilterOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Equals => "equals",
            Self::Contains => "contains",
            Self::GreaterThan => "greater_than",
            Self::LessThan => "less_than",
            Self::Between => "between",
            Self::In => "in",
            Self::NotIn => "not_in",
        }
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterOperator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "equals" => Ok(Self::Equals),
            "contains" => Ok(Self::Contains),
            "greater_than" => Ok(Self::GreaterThan),
            "less_than" => Ok(Self::LessThan),
            "between" => Ok(Self::Between),
            "in" => Ok(Self::In),
            "not_in" => Ok(Self::NotIn),
            other => Err(format!("unknown operator: {}", other)),
        }
    }
}

/// Filter value, shaped by the filter type
///
/// Serialized untagged so stored values keep the wire shapes admins
/// already use: a bare string, an array, a number, or `{min, max}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Range { min: i64, max: i64 },
    Number(i64),
    Text(String),
    List(Vec<String>),
}

impl FilterValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<i64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_range(&self) -> Option<(i64, i64)> {
        match self {
            Self::Range { min, max } => Some((*min, *max)),
            _ => None,
        }
    }
}

/// Stored admin filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminFilter {
    /// Unique identifier
    pub id: Uuid,

    /// Dimension this filter constrains
    pub filter_type: FilterType,

    /// Value, shaped per `filter_type`
    pub filter_value: FilterValue,

    /// Comparison operator
    pub operator: FilterOperator,

    /// Context tags where this filter is active (e.g. "reports", "export")
    pub applies_to: Vec<String>,

    /// Inactive filters are loaded but never applied
    pub is_active: bool,

    /// Admin user who created the filter
    pub created_by: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl AdminFilter {
    pub fn new(
        filter_type: FilterType,
        operator: FilterOperator,
        filter_value: FilterValue,
        created_by: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            filter_type,
            filter_value,
            operator,
            applies_to: vec!["reports".to_string()],
            is_active: true,
            created_by: created_by.into(),
            created_at: Utc::now(),
        }
    }

    /// Whether the stored `(type, operator)` pair is in the legal table
    #[inline]
    pub fn is_legal(&self) -> bool {
        self.filter_type.allows(self.operator)
    }

    /// Whether this filter participates in the given context
    pub fn applies_in(&self, context: &str) -> bool {
        self.is_active && self.applies_to.iter().any(|tag| tag == context)
    }
}

/// Query object for the call store
///
/// The admin filter engine folds filters onto this shape; the SQL
/// repository translates it into WHERE clauses and the in-memory
/// repository evaluates it with `matches`, so both paths share one
/// predicate semantics. All constraints are conjunctive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallQuery {
    pub vendor: Option<VendorKind>,
    pub direction: Option<CallDirection>,
    pub campaign_id: Option<String>,

    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,

    pub min_duration: Option<i64>,
    pub max_duration: Option<i64>,

    /// Agent membership: `None` = unconstrained, `Some(empty)` = matches
    /// nothing (two conflicting equality filters intersect to this)
    pub agent_names: Option<Vec<String>>,
    pub agent_names_excluded: Vec<String>,
    pub agent_name_contains: Option<String>,

    /// Publisher membership, resolved from vendor metadata
    pub publisher_names: Option<Vec<String>>,
    pub publisher_names_excluded: Vec<String>,
    pub publisher_name_contains: Option<String>,

    /// Campaign status membership, resolved from vendor metadata
    pub campaign_statuses: Option<Vec<String>>,
    pub campaign_statuses_excluded: Vec<String>,

    /// Substrings searched in disposition and metadata text
    pub keywords: Vec<String>,

    /// Exact-match pairs against top-level metadata fields
    pub custom_equals: Vec<(String, String)>,

    /// Substring pairs against top-level metadata fields
    pub custom_contains: Vec<(String, String)>,
}

/// Top-level metadata lookup as text; metadata holds the raw vendor payload
fn metadata_text<'a>(record: &'a CallRecord, key: &str) -> Option<&'a str> {
    record.metadata.get(key).and_then(|v| v.as_str())
}

fn metadata_field<'a>(record: &'a CallRecord, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|key| metadata_text(record, key))
}

impl CallQuery {
    /// Evaluate the query against one record
    pub fn matches(&self, record: &CallRecord) -> bool {
        if let Some(vendor) = self.vendor {
            if record.vendor != vendor {
                return false;
            }
        }
        if let Some(direction) = self.direction {
            if record.direction != direction {
                return false;
            }
        }
        if let Some(ref campaign_id) = self.campaign_id {
            if record.campaign_id.as_deref() != Some(campaign_id.as_str()) {
                return false;
            }
        }
        if let Some(start) = self.start_date {
            if record.start_time < start {
                return false;
            }
        }
        if let Some(end) = self.end_date {
            if record.start_time >= end {
                return false;
            }
        }
        if let Some(min) = self.min_duration {
            if record.duration_seconds < min {
                return false;
            }
        }
        if let Some(max) = self.max_duration {
            if record.duration_seconds > max {
                return false;
            }
        }

        let agent = record.agent_id.as_deref().unwrap_or("");
        if let Some(ref names) = self.agent_names {
            if !names.iter().any(|a| a == agent) {
                return false;
            }
        }
        if self.agent_names_excluded.iter().any(|a| a == agent) {
            return false;
        }
        if let Some(ref needle) = self.agent_name_contains {
            if !agent.to_lowercase().contains(&needle.to_lowercase()) {
                return false;
            }
        }

        let publisher =
            metadata_field(record, &["publisher_name", "publisher", "affiliate"]).unwrap_or("");
        if let Some(ref names) = self.publisher_names {
            if !names.iter().any(|p| p == publisher) {
                return false;
            }
        }
        if self.publisher_names_excluded.iter().any(|p| p == publisher) {
            return false;
        }
        if let Some(ref needle) = self.publisher_name_contains {
            if !publisher.to_lowercase().contains(&needle.to_lowercase()) {
                return false;
            }
        }

        let campaign_status =
            metadata_field(record, &["campaign_status", "campaignStatus"]).unwrap_or("");
        if let Some(ref statuses) = self.campaign_statuses {
            if !statuses.iter().any(|s| s == campaign_status) {
                return false;
            }
        }
        if self
            .campaign_statuses_excluded
            .iter()
            .any(|s| s == campaign_status)
        {
            return false;
        }

        if !self.keywords.is_empty() {
            let haystack = format!(
                "{} {}",
                record.disposition.as_deref().unwrap_or(""),
                record.metadata
            )
            .to_lowercase();
            if !self
                .keywords
                .iter()
                .all(|kw| haystack.contains(&kw.to_lowercase()))
            {
                return false;
            }
        }

        for (key, expected) in &self.custom_equals {
            if metadata_text(record, key) != Some(expected.as_str()) {
                return false;
            }
        }
        for (key, needle) in &self.custom_contains {
            let found = metadata_text(record, key)
                .map(|v| v.to_lowercase().contains(&needle.to_lowercase()))
                .unwrap_or(false);
            if !found {
                return false;
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legality_table() {
        assert!(FilterType::CallDuration.allows(FilterOperator::Between));
        assert!(!FilterType::CallDuration.allows(FilterOperator::Contains));
        assert!(FilterType::AgentName.allows(FilterOperator::NotIn));
        assert!(!FilterType::Keyword.allows(FilterOperator::Equals));
        assert!(FilterType::DateRange.allows(FilterOperator::Between));
        assert!(!FilterType::DateRange.allows(FilterOperator::In));
    }

    #[test]
    fn test_filter_value_wire_shapes() {
        let v: FilterValue = serde_json::from_str("\"north\"").unwrap();
        assert_eq!(v, FilterValue::Text("north".to_string()));

        let v: FilterValue = serde_json::from_str("[\"a\",\"b\"]").unwrap();
        assert_eq!(v.as_list().unwrap().len(), 2);

        let v: FilterValue = serde_json::from_str("30").unwrap();
        assert_eq!(v.as_number(), Some(30));

        let v: FilterValue = serde_json::from_str("{\"min\":30,\"max\":120}").unwrap();
        assert_eq!(v.as_range(), Some((30, 120)));
    }

    #[test]
    fn test_applies_in_context() {
        let mut filter = AdminFilter::new(
            FilterType::Keyword,
            FilterOperator::Contains,
            FilterValue::Text("refund".to_string()),
            "admin-1",
        );
        assert!(filter.applies_in("reports"));
        assert!(!filter.applies_in("export"));

        filter.is_active = false;
        assert!(!filter.applies_in("reports"));
    }

    #[test]
    fn test_query_duration_bounds() {
        let query = CallQuery {
            min_duration: Some(30),
            max_duration: Some(120),
            ..Default::default()
        };

        let mut record = CallRecord::default();
        record.duration_seconds = 45;
        assert!(query.matches(&record));

        record.duration_seconds = 200;
        assert!(!query.matches(&record));
    }

    #[test]
    fn test_query_metadata_publisher() {
        let query = CallQuery {
            publisher_names: Some(vec!["MediaOne".to_string()]),
            ..Default::default()
        };

        let mut record = CallRecord::default();
        record.metadata = serde_json::json!({"publisher_name": "MediaOne"});
        assert!(query.matches(&record));

        record.metadata = serde_json::json!({"publisher_name": "Other"});
        assert!(!query.matches(&record));
    }

    #[test]
    fn test_query_keyword_searches_disposition() {
        let query = CallQuery {
            keywords: vec!["Refund".to_string()],
            ..Default::default()
        };

        let mut record = CallRecord::default();
        record.disposition = Some("customer refund request".to_string());
        assert!(query.matches(&record));

        record.disposition = Some("sale".to_string());
        record.metadata = serde_json::Value::Null;
        assert!(!query.matches(&record));
    }

    #[test]
    fn test_default_query_matches_everything() {
        let query = CallQuery::default();
        assert!(query.matches(&CallRecord::default()));
    }

    #[test]
    fn test_empty_membership_matches_nothing() {
        // None is unconstrained; Some(empty) is an unsatisfiable
        // intersection and must exclude every record.
        let query = CallQuery {
            agent_names: Some(Vec::new()),
            ..Default::default()
        };
        let mut record = CallRecord::default();
        record.agent_id = Some("a1".to_string());
        assert!(!query.matches(&record));
    }
}
