//! CallScope Database Layer
//!
//! This crate provides PostgreSQL access and repository implementations
//! for the CallScope system. It includes:
//!
//! - Connection pool management with sqlx
//! - Repository implementations for calls, integrations, and admin filters
//! - In-memory repositories sharing the same predicate semantics, used by
//!   service tests and credential-less local runs

pub mod memory;
pub mod pool;
pub mod repositories;

pub use memory::{InMemoryAdminFilterRepository, InMemoryCallRepository, InMemoryIntegrationRepository};
pub use pool::create_pool;
pub use repositories::*;

// Re-export commonly used types
pub use callscope_core::{AppError, AppResult};
pub use sqlx::PgPool;
