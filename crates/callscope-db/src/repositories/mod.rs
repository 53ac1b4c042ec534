//! Repository implementations
//!
//! PostgreSQL-backed implementations of the core repository traits.

pub mod call_repo;
pub mod filter_repo;
pub mod integration_repo;

pub use call_repo::PgCallRepository;
pub use filter_repo::PgAdminFilterRepository;
pub use integration_repo::PgIntegrationRepository;
