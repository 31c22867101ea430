//! Storage backends for target registration and metric persistence
//!
//! This module provides a trait-based abstraction over the relational
//! store the collector writes to.
//!
//! ## Design
//!
//! - **Trait-based**: `StorageBackend` trait allows swapping implementations
//! - **Async**: All operations are async for use from Tokio tasks
//! - **Append-only**: Samples are only ever inserted, never updated or deleted
//!
//! ## Backends
//!
//! - **SQLite** (default): Embedded database with a unique `(name, address)` constraint
//! - **In-Memory** (fallback): No persistence, for testing or ad-hoc runs
//!
//! ## Usage
//!
//! ```no_run
//! use guardia_collector::storage::{StorageBackend, sqlite::SqliteBackend};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let backend = SqliteBackend::new("./metrics.db").await?;
//!     let status = backend.health_check().await?;
//!     println!("{}", status.message);
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod error;
pub mod memory;
pub mod schema;
#[cfg(feature = "storage-sqlite")]
pub mod sqlite;

pub use backend::{HealthStatus, StorageBackend};
pub use error::{StorageError, StorageResult};
pub use schema::{MetricName, MetricSample, ObjectType};
