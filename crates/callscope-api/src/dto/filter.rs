//! Admin filter DTOs

use callscope_core::models::{AdminFilter, FilterOperator, FilterType, FilterValue};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request body for creating an admin filter
///
/// The value keeps its wire shape (string, array, number, or {min,max});
/// creation rejects combinations outside the legality table outright, so
/// stored filters only silently no-op when their value shape is wrong.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateFilterRequest {
    pub filter_type: FilterType,
    pub operator: FilterOperator,
    pub filter_value: FilterValue,

    /// Context tags; defaults to the reports context
    #[serde(default = "default_applies_to")]
    pub applies_to: Vec<String>,

    #[serde(default = "default_is_active")]
    pub is_active: bool,
}

fn default_applies_to() -> Vec<String> {
    vec!["reports".to_string()]
}

fn default_is_active() -> bool {
    true
}

impl CreateFilterRequest {
    pub fn into_filter(self, created_by: &str) -> AdminFilter {
        let mut filter = AdminFilter::new(
            self.filter_type,
            self.operator,
            self.filter_value,
            created_by,
        );
        filter.applies_to = self.applies_to;
        filter.is_active = self.is_active;
        filter
    }
}

/// Request body for updating an admin filter
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateFilterRequest {
    pub filter_value: Option<FilterValue>,
    pub applies_to: Option<Vec<String>>,
    pub is_active: Option<bool>,
}

/// Admin filter response shape
#[derive(Debug, Clone, Serialize)]
pub struct FilterResponse {
    pub id: Uuid,
    pub filter_type: FilterType,
    pub operator: FilterOperator,
    pub filter_value: FilterValue,
    pub applies_to: Vec<String>,
    pub is_active: bool,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl From<AdminFilter> for FilterResponse {
    fn from(filter: AdminFilter) -> Self {
        Self {
            id: filter.id,
            filter_type: filter.filter_type,
            operator: filter.operator,
            filter_value: filter.filter_value,
            applies_to: filter.applies_to,
            is_active: filter.is_active,
            created_by: filter.created_by,
            created_at: filter.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_wire_shape() {
        let request: CreateFilterRequest = serde_json::from_str(
            r#"{
                "filter_type": "call_duration",
                "operator": "between",
                "filter_value": {"min": 30, "max": 120}
            }"#,
        )
        .unwrap();

        assert_eq!(request.filter_type, FilterType::CallDuration);
        assert_eq!(request.operator, FilterOperator::Between);
        assert_eq!(request.filter_value.as_range(), Some((30, 120)));
        assert_eq!(request.applies_to, vec!["reports".to_string()]);
        assert!(request.is_active);
    }

    #[test]
    fn test_into_filter_stamps_creator() {
        let request = CreateFilterRequest {
            filter_type: FilterType::Keyword,
            operator: FilterOperator::Contains,
            filter_value: FilterValue::Text("refund".to_string()),
            applies_to: vec!["export".to_string()],
            is_active: false,
        };

        let filter = request.into_filter("admin-9");
        assert_eq!(filter.created_by, "admin-9");
        assert_eq!(filter.applies_to, vec!["export".to_string()]);
        assert!(!filter.is_active);
    }
}
