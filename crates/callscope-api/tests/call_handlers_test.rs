//! Integration tests for the call API DTOs
//!
//! These tests exercise the request/response conversions the handlers are
//! built from. Full end-to-end testing requires a database and vendor
//! credentials.

use callscope_api::dto::{
    ApiResponse, CallFilterParams, CallResponse, CreateFilterRequest, CreateIntegrationRequest,
    IntegrationResponse, PaginationParams,
};
use callscope_core::models::{
    CallDirection, CallRecord, FilterOperator, FilterType, ProcessingStatus, VendorKind,
};

#[test]
fn test_call_filter_params_to_query() {
    let params: CallFilterParams = serde_json::from_str(
        r#"{
            "page": 2,
            "per_page": 25,
            "vendor": "ringba",
            "direction": "inbound",
            "min_duration": 30,
            "start_date": "2025-03-01"
        }"#,
    )
    .unwrap();

    assert_eq!(params.pagination.page, 2);
    assert_eq!(params.pagination.offset(), 25);

    let query = params.to_query();
    assert_eq!(query.vendor, Some(VendorKind::Ringba));
    assert_eq!(query.direction, Some(CallDirection::Inbound));
    assert_eq!(query.min_duration, Some(30));
    assert!(query.start_date.is_some());
    assert!(query.end_date.is_none());
}

#[test]
fn test_pagination_defaults_apply() {
    let params: PaginationParams = serde_json::from_str("{}").unwrap();
    assert_eq!(params.page, 1);
    assert_eq!(params.per_page, 50);
}

#[test]
fn test_call_response_conversion() {
    let mut record = CallRecord::new(VendorKind::Retreaver, "r-42");
    record.from_number = "+15550001111".to_string();
    record.to_number = "+18005550199".to_string();
    record.duration_seconds = 61;
    record.disposition = Some("sale".to_string());

    let response = CallResponse::from(record);
    assert_eq!(response.id, "retreaver-r-42");
    assert_eq!(response.external_id, "r-42");
    assert_eq!(response.duration_display, "01:01");
    assert!(!response.has_recording);
    assert_eq!(response.status, ProcessingStatus::Pending);
}

#[test]
fn test_integration_request_round_trip() {
    let request: CreateIntegrationRequest = serde_json::from_str(
        r#"{
            "name": "main ringba line",
            "vendor": "ringba",
            "api_key": "rb-key-1234",
            "account_id": "RA9",
            "auto_transcribe": true
        }"#,
    )
    .unwrap();

    assert_eq!(request.sync_interval_minutes, 5); // default
    let new_integration = request.into_new_integration();
    assert_eq!(new_integration.vendor, VendorKind::Ringba);
    assert!(new_integration.config.auto_transcribe);
    assert_eq!(new_integration.config.account_id.as_deref(), Some("RA9"));
}

#[test]
fn test_integration_response_masks_key() {
    use callscope_core::models::{FetchFilters, Integration, IntegrationConfig};

    let integration = Integration::new(
        "line",
        VendorKind::Twilio,
        IntegrationConfig {
            api_key: "tw-auth-token-9911".to_string(),
            account_id: Some("AC7".to_string()),
            sync_interval_minutes: 15,
            auto_transcribe: false,
            filters: FetchFilters::default(),
        },
    );

    let response = IntegrationResponse::from(integration);
    assert_eq!(response.api_key_hint, "••••9911");
    assert_eq!(response.success_rate, 1.0);

    let wire = serde_json::to_string(&response).unwrap();
    assert!(!wire.contains("tw-auth-token"));
}

#[test]
fn test_filter_request_accepts_each_value_shape() {
    let shapes = [
        (r#"{"filter_type":"keyword","operator":"contains","filter_value":"refund"}"#, true),
        (r#"{"filter_type":"agent_name","operator":"in","filter_value":["a","b"]}"#, true),
        (r#"{"filter_type":"call_duration","operator":"greater_than","filter_value":45}"#, true),
        (
            r#"{"filter_type":"call_duration","operator":"between","filter_value":{"min":30,"max":120}}"#,
            true,
        ),
    ];

    for (json, legal) in shapes {
        let request: CreateFilterRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.filter_type.allows(request.operator), legal);
    }
}

#[test]
fn test_illegal_filter_combination_detected() {
    let request: CreateFilterRequest = serde_json::from_str(
        r#"{"filter_type":"call_duration","operator":"contains","filter_value":"45"}"#,
    )
    .unwrap();

    // The handler rejects this pair before storage
    assert!(!request.filter_type.allows(request.operator));
    assert_eq!(request.operator, FilterOperator::Contains);
    assert_eq!(request.filter_type, FilterType::CallDuration);
}

#[test]
fn test_mock_badge_serialization() {
    let plain = serde_json::to_value(ApiResponse::success(vec![1, 2])).unwrap();
    assert_eq!(plain.get("mock_data"), None);
    assert_eq!(plain.get("success"), Some(&serde_json::Value::Bool(true)));

    let mock = serde_json::to_value(ApiResponse::mock(vec![1, 2], "sample data")).unwrap();
    assert_eq!(mock.get("mock_data"), Some(&serde_json::Value::Bool(true)));
}
