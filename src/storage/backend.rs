//! Storage backend trait definition
//!
//! This module defines the core `StorageBackend` trait that all
//! storage implementations must implement.

use std::collections::HashMap;

use async_trait::async_trait;

use super::error::StorageResult;
use super::schema::MetricSample;
use crate::Target;

/// Health status of the storage backend
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Is the backend operational?
    pub healthy: bool,

    /// Human-readable status message
    pub message: String,

    /// Additional backend-specific metadata
    pub metadata: HashMap<String, String>,
}

/// Trait for persistent storage backends
///
/// The collector only needs a handful of primitives from the store:
///
/// - **Registration**: look up and insert targets, with uniqueness on `(name, address)`
/// - **Append**: insert single metric samples
/// - **Maintenance**: health checks and shutdown
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync`; one backend is shared by all
/// collector tasks and writes may arrive concurrently. Serializing or
/// interleaving them is left to the backend.
///
/// ## Error Handling
///
/// Implementations must report uniqueness violations from
/// [`insert_target`](StorageBackend::insert_target) as
/// `StorageError::DuplicateKey`. The registry relies on this to resolve
/// concurrent registrations.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Find the identifier of a target by its identity
    async fn lookup_target(&self, name: &str, address: &str) -> StorageResult<Option<i64>>;

    /// Insert a new target and return its identifier
    ///
    /// Fails with `StorageError::DuplicateKey` if `(name, address)` already exists.
    async fn insert_target(&self, target: &Target) -> StorageResult<i64>;

    /// Check whether a target with the given identifier exists
    async fn target_exists(&self, id: i64) -> StorageResult<bool>;

    /// Append one metric sample
    async fn insert_metric(&self, sample: &MetricSample) -> StorageResult<()>;

    /// Check backend health
    ///
    /// Performs a lightweight operation to verify the backend
    /// is operational (e.g., ping database).
    async fn health_check(&self) -> StorageResult<HealthStatus>;

    /// Get backend-specific statistics
    ///
    /// Returns human-readable stats about the backend
    /// (e.g., "SQLite: 3 servers, 1200 samples").
    async fn get_stats(&self) -> StorageResult<String>;

    /// Close the backend and release resources
    async fn close(&self) -> StorageResult<()>;
}
