//! Admin filter engine
//!
//! Folds the stored admin filters onto a `CallQuery` before it reaches the
//! data store. Filters are conjunctive (AND only, no OR across filters) and
//! are applied most-recently-created first. A filter whose
//! `(filter_type, operator)` pair is outside the legality table, or whose
//! value shape does not fit its operator, is a silent no-op. Misconfigured
//! filters therefore pass through without narrowing anything.

use callscope_core::{
    models::{AdminFilter, CallQuery, FilterOperator, FilterType, FilterValue},
    traits::AdminFilterRepository,
    AppResult,
};
use chrono::{TimeZone, Utc};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Admin filter engine
pub struct FilterEngine {
    filters: Arc<dyn AdminFilterRepository>,
}

impl FilterEngine {
    /// Create a new filter engine
    pub fn new(filters: Arc<dyn AdminFilterRepository>) -> Self {
        Self { filters }
    }

    /// Tighten a query with the admin's active filters for a context
    ///
    /// Zero active filters returns the query unchanged.
    #[instrument(skip(self, query))]
    pub async fn apply_filters(
        &self,
        query: CallQuery,
        admin_user_id: &str,
        context: &str,
    ) -> AppResult<CallQuery> {
        let active = self.filters.list_for_context(context).await?;

        let applied = active
            .iter()
            .filter(|f| f.created_by == admin_user_id)
            .fold(query, |q, f| apply_one(q, f));

        Ok(applied)
    }
}

/// Membership tightening: the first filter sets the list; later filters
/// intersect with it, keeping the fold conjunctive. Conflicting equality
/// filters intersect to `Some(empty)`, which matches nothing.
fn intersect(existing: &mut Option<Vec<String>>, incoming: &[String]) {
    match existing {
        None => *existing = Some(incoming.to_vec()),
        Some(current) => current.retain(|v| incoming.contains(v)),
    }
}

fn values_of(value: &FilterValue) -> Option<Vec<String>> {
    match value {
        FilterValue::Text(s) => Some(vec![s.clone()]),
        FilterValue::List(items) => Some(items.clone()),
        _ => None,
    }
}

/// Custom filters carry their target metadata field in the value,
/// "key:value"; a value without a colon is a no-op.
fn split_custom(value: &FilterValue) -> Option<(String, String)> {
    let text = value.as_text()?;
    let (key, val) = text.split_once(':')?;
    if key.is_empty() {
        return None;
    }
    Some((key.to_string(), val.to_string()))
}

/// Translate one filter into one query predicate
fn apply_one(mut query: CallQuery, filter: &AdminFilter) -> CallQuery {
    use FilterOperator::*;
    use FilterType::*;

    if !filter.is_legal() {
        debug!(
            "Skipping illegal filter combination: {} {}",
            filter.filter_type, filter.operator
        );
        return query;
    }

    match (filter.filter_type, filter.operator) {
        (AgentName, Equals) | (AgentName, In) => {
            if let Some(values) = values_of(&filter.filter_value) {
                intersect(&mut query.agent_names, &values);
            }
        }
        (AgentName, NotIn) => {
            if let Some(values) = values_of(&filter.filter_value) {
                query.agent_names_excluded.extend(values);
            }
        }
        (AgentName, Contains) => {
            if let Some(text) = filter.filter_value.as_text() {
                query
                    .agent_name_contains
                    .get_or_insert_with(|| text.to_string());
            }
        }

        (PublisherName, Equals) | (PublisherName, In) => {
            if let Some(values) = values_of(&filter.filter_value) {
                intersect(&mut query.publisher_names, &values);
            }
        }
        (PublisherName, NotIn) => {
            if let Some(values) = values_of(&filter.filter_value) {
                query.publisher_names_excluded.extend(values);
            }
        }
        (PublisherName, Contains) => {
            if let Some(text) = filter.filter_value.as_text() {
                query
                    .publisher_name_contains
                    .get_or_insert_with(|| text.to_string());
            }
        }

        (CampaignStatus, Equals) | (CampaignStatus, In) => {
            if let Some(values) = values_of(&filter.filter_value) {
                intersect(&mut query.campaign_statuses, &values);
            }
        }
        (CampaignStatus, NotIn) => {
            if let Some(values) = values_of(&filter.filter_value) {
                query.campaign_statuses_excluded.extend(values);
            }
        }

        (CallDuration, GreaterThan) => {
            if let Some(n) = filter.filter_value.as_number() {
                let floor = n + 1;
                query.min_duration = Some(query.min_duration.map_or(floor, |m| m.max(floor)));
            }
        }
        (CallDuration, LessThan) => {
            if let Some(n) = filter.filter_value.as_number() {
                let ceil = n - 1;
                query.max_duration = Some(query.max_duration.map_or(ceil, |m| m.min(ceil)));
            }
        }
        (CallDuration, Between) => {
            if let Some((min, max)) = filter.filter_value.as_range() {
                query.min_duration = Some(query.min_duration.map_or(min, |m| m.max(min)));
                query.max_duration = Some(query.max_duration.map_or(max, |m| m.min(max)));
            }
        }

        // Date ranges are stored as epoch seconds
        (DateRange, Between) => {
            if let Some((min, max)) = filter.filter_value.as_range() {
                if let (Some(start), Some(end)) = (
                    Utc.timestamp_opt(min, 0).single(),
                    Utc.timestamp_opt(max, 0).single(),
                ) {
                    query.start_date = Some(query.start_date.map_or(start, |s| s.max(start)));
                    query.end_date = Some(query.end_date.map_or(end, |e| e.min(end)));
                }
            }
        }

        (Keyword, Contains) => {
            if let Some(text) = filter.filter_value.as_text() {
                query.keywords.push(text.to_string());
            }
        }

        (Custom, Equals) => {
            if let Some(pair) = split_custom(&filter.filter_value) {
                query.custom_equals.push(pair);
            }
        }
        (Custom, Contains) => {
            if let Some(pair) = split_custom(&filter.filter_value) {
                query.custom_contains.push(pair);
            }
        }

        // Legal per the table but value shape checks above already cover
        // everything; any other combination was rejected by is_legal().
        _ => {}
    }

    query
}

#[cfg(test)]
mod tests {
    use super::*;
    use callscope_core::models::CallRecord;
    use callscope_core::traits::Repository;
    use callscope_db::InMemoryAdminFilterRepository;

    fn filter(
        filter_type: FilterType,
        operator: FilterOperator,
        value: FilterValue,
    ) -> AdminFilter {
        AdminFilter::new(filter_type, operator, value, "admin-1")
    }

    async fn engine_with(filters: Vec<AdminFilter>) -> FilterEngine {
        let repo = Arc::new(InMemoryAdminFilterRepository::new());
        for f in &filters {
            repo.create(f).await.unwrap();
        }
        FilterEngine::new(repo)
    }

    #[tokio::test]
    async fn test_zero_filters_is_identity() {
        let engine = engine_with(vec![]).await;
        let query = engine
            .apply_filters(CallQuery::default(), "admin-1", "reports")
            .await
            .unwrap();
        assert_eq!(query, CallQuery::default());
    }

    #[tokio::test]
    async fn test_duration_between_keeps_45_excludes_200() {
        let engine = engine_with(vec![filter(
            FilterType::CallDuration,
            FilterOperator::Between,
            FilterValue::Range { min: 30, max: 120 },
        )])
        .await;

        let query = engine
            .apply_filters(CallQuery::default(), "admin-1", "reports")
            .await
            .unwrap();

        let mut record = CallRecord::default();
        record.duration_seconds = 45;
        assert!(query.matches(&record));

        record.duration_seconds = 200;
        assert!(!query.matches(&record));
    }

    #[tokio::test]
    async fn test_illegal_combination_is_silent_noop() {
        // call_duration never takes contains
        let engine = engine_with(vec![filter(
            FilterType::CallDuration,
            FilterOperator::Contains,
            FilterValue::Text("45".to_string()),
        )])
        .await;

        let query = engine
            .apply_filters(CallQuery::default(), "admin-1", "reports")
            .await
            .unwrap();
        assert_eq!(query, CallQuery::default());
    }

    #[tokio::test]
    async fn test_value_shape_mismatch_is_silent_noop() {
        // between is legal for call_duration, but the value is not a range
        let engine = engine_with(vec![filter(
            FilterType::CallDuration,
            FilterOperator::Between,
            FilterValue::Text("30-120".to_string()),
        )])
        .await;

        let query = engine
            .apply_filters(CallQuery::default(), "admin-1", "reports")
            .await
            .unwrap();
        assert_eq!(query, CallQuery::default());
    }

    #[tokio::test]
    async fn test_filters_are_conjunctive() {
        let engine = engine_with(vec![
            filter(
                FilterType::AgentName,
                FilterOperator::In,
                FilterValue::List(vec!["a1".to_string(), "a2".to_string()]),
            ),
            filter(
                FilterType::CallDuration,
                FilterOperator::GreaterThan,
                FilterValue::Number(30),
            ),
        ])
        .await;

        let query = engine
            .apply_filters(CallQuery::default(), "admin-1", "reports")
            .await
            .unwrap();

        let mut record = CallRecord::default();
        record.agent_id = Some("a1".to_string());
        record.duration_seconds = 60;
        assert!(query.matches(&record));

        // Satisfies the agent filter but not the duration filter
        record.duration_seconds = 10;
        assert!(!query.matches(&record));

        // Satisfies the duration filter but not the agent filter
        record.duration_seconds = 60;
        record.agent_id = Some("a3".to_string());
        assert!(!query.matches(&record));
    }

    #[tokio::test]
    async fn test_two_equals_filters_intersect() {
        let engine = engine_with(vec![
            filter(
                FilterType::AgentName,
                FilterOperator::Equals,
                FilterValue::Text("a1".to_string()),
            ),
            filter(
                FilterType::AgentName,
                FilterOperator::Equals,
                FilterValue::Text("a2".to_string()),
            ),
        ])
        .await;

        let query = engine
            .apply_filters(CallQuery::default(), "admin-1", "reports")
            .await
            .unwrap();

        // Conjunction of two different equalities matches nothing
        let mut record = CallRecord::default();
        record.agent_id = Some("a1".to_string());
        assert!(!query.matches(&record));
        record.agent_id = Some("a2".to_string());
        assert!(!query.matches(&record));
    }

    #[tokio::test]
    async fn test_other_admins_filters_are_ignored() {
        let mine = filter(
            FilterType::Keyword,
            FilterOperator::Contains,
            FilterValue::Text("refund".to_string()),
        );
        let mut theirs = filter(
            FilterType::CallDuration,
            FilterOperator::GreaterThan,
            FilterValue::Number(100),
        );
        theirs.created_by = "admin-2".to_string();

        let engine = engine_with(vec![mine, theirs]).await;
        let query = engine
            .apply_filters(CallQuery::default(), "admin-1", "reports")
            .await
            .unwrap();

        assert_eq!(query.keywords, vec!["refund".to_string()]);
        assert!(query.min_duration.is_none());
    }

    #[tokio::test]
    async fn test_custom_filter_splits_key_value() {
        let engine = engine_with(vec![filter(
            FilterType::Custom,
            FilterOperator::Equals,
            FilterValue::Text("utm_source:google".to_string()),
        )])
        .await;

        let query = engine
            .apply_filters(CallQuery::default(), "admin-1", "reports")
            .await
            .unwrap();
        assert_eq!(
            query.custom_equals,
            vec![("utm_source".to_string(), "google".to_string())]
        );
    }

    #[tokio::test]
    async fn test_wrong_context_is_identity() {
        let engine = engine_with(vec![filter(
            FilterType::Keyword,
            FilterOperator::Contains,
            FilterValue::Text("refund".to_string()),
        )])
        .await;

        let query = engine
            .apply_filters(CallQuery::default(), "admin-1", "export")
            .await
            .unwrap();
        assert_eq!(query, CallQuery::default());
    }
}
