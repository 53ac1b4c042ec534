//! API layer for CallScope
//!
//! HTTP handlers and DTOs for call reports, CSV export, integration
//! management, admin filters, and dashboard statistics.

#![forbid(unsafe_code)]

pub mod dto;
pub mod handlers;

// Re-export common DTOs
pub use dto::{ApiResponse, PaginationParams};

// Re-export handler configuration functions
pub use handlers::{
    configure_calls, configure_dashboard, configure_filters, configure_integrations, live_calls,
};
