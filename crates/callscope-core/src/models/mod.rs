//! Domain models for CallScope
//!
//! Contains the canonical call record, vendor integration, and admin
//! filter models shared by every crate in the workspace.

pub mod call;
pub mod filter;
pub mod integration;

pub use call::{CallDirection, CallRecord, ProcessingStatus, VendorKind};
pub use filter::{
    AdminFilter, CallQuery, FilterOperator, FilterType, FilterValue,
};
pub use integration::{
    FetchFilters, Integration, IntegrationConfig, IntegrationStatus,
};
