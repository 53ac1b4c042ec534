//! Business logic services for CallScope
//!
//! This crate contains the services that orchestrate call ingestion:
//! polling vendor connections, deduplicating against the ledger,
//! downloading recordings, handing them to transcription, and tightening
//! report queries with admin filters.
//!
//! # Architecture
//!
//! Services are designed to be composable and testable:
//! - Each service is constructed explicitly by the composition root
//! - Dependencies (repositories, vendor clients, collaborators) are
//!   injected as trait objects, so tests swap in in-memory fakes
//! - All operations are instrumented with tracing
//! - Comprehensive error handling with AppError
//!
//! # Services
//!
//! - `IntegrationManager` - per-connection polling timers and sync cycles
//! - `FilterEngine` - folds stored admin filters onto call queries
//! - `HttpTranscriber` - submits recordings to the speech-to-text vendor

pub mod filter_engine;
pub mod integration_manager;
pub mod transcribe;

pub use filter_engine::FilterEngine;
pub use integration_manager::{IntegrationManager, NewIntegration, SyncOutcome};
pub use transcribe::{HttpTranscriber, NoopTranscriber};

/// Business logic constants
pub mod constants {
    /// Smallest polling interval an integration may request
    pub const MIN_SYNC_INTERVAL_MINUTES: u64 = 1;

    /// Largest polling interval an integration may request (one day)
    pub const MAX_SYNC_INTERVAL_MINUTES: u64 = 1440;

    /// Context tag the report endpoints use for admin filters
    pub const REPORTS_CONTEXT: &str = "reports";
}
