//! HTTP request handlers

pub mod calls;
pub mod dashboard;
pub mod export;
pub mod filters;
pub mod integrations;

pub use calls::configure as configure_calls;
pub use dashboard::configure as configure_dashboard;
pub use export::live_calls;
pub use filters::configure as configure_filters;
pub use integrations::configure as configure_integrations;
