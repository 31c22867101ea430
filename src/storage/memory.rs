//! In-memory storage backend (no persistence)
//!
//! Keeps registered targets and samples in memory. It's useful for:
//! - Testing without database dependencies
//! - Running without a database (`"backend": "none"`)
//!
//! ## Limitations
//!
//! - **No persistence**: All data lost on restart, so identifiers are not stable across runs
//! - **Unbounded**: Samples are never evicted

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::backend::{HealthStatus, StorageBackend};
use super::error::{StorageError, StorageResult};
use super::schema::MetricSample;
use crate::Target;

#[derive(Debug, Default)]
struct MemoryState {
    /// `(name, address)` -> identifier
    targets: HashMap<(String, String), i64>,
    next_id: i64,
    samples: Vec<MetricSample>,
}

/// In-memory storage backend
///
/// Enforces the same `(name, address)` uniqueness as the SQL schema.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: RwLock<MemoryState>,
}

impl MemoryBackend {
    /// Create a new in-memory backend
    pub fn new() -> Self {
        Self::default()
    }

    /// All samples written so far, in insertion order
    pub async fn samples(&self) -> Vec<MetricSample> {
        self.state.read().await.samples.clone()
    }

    /// Samples written for one object
    pub async fn samples_for(&self, object_id: i64) -> Vec<MetricSample> {
        self.state
            .read()
            .await
            .samples
            .iter()
            .filter(|sample| sample.object_id == object_id)
            .cloned()
            .collect()
    }

    pub async fn target_count(&self) -> usize {
        self.state.read().await.targets.len()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn lookup_target(&self, name: &str, address: &str) -> StorageResult<Option<i64>> {
        let state = self.state.read().await;
        Ok(state
            .targets
            .get(&(name.to_string(), address.to_string()))
            .copied())
    }

    async fn insert_target(&self, target: &Target) -> StorageResult<i64> {
        let mut state = self.state.write().await;
        let key = (target.name.clone(), target.address.clone());

        if state.targets.contains_key(&key) {
            return Err(StorageError::DuplicateKey(format!(
                "target {target} already exists"
            )));
        }

        state.next_id += 1;
        let id = state.next_id;
        state.targets.insert(key, id);
        debug!("in-memory backend: registered {target} as {id}");

        Ok(id)
    }

    async fn target_exists(&self, id: i64) -> StorageResult<bool> {
        let state = self.state.read().await;
        Ok(state.targets.values().any(|existing| *existing == id))
    }

    async fn insert_metric(&self, sample: &MetricSample) -> StorageResult<()> {
        self.state.write().await.samples.push(sample.clone());
        Ok(())
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        let state = self.state.read().await;
        Ok(HealthStatus {
            healthy: true,
            message: "In-memory storage operational".to_string(),
            metadata: HashMap::from([
                ("backend".to_string(), "memory".to_string()),
                ("total_samples".to_string(), state.samples.len().to_string()),
            ]),
        })
    }

    async fn get_stats(&self) -> StorageResult<String> {
        let state = self.state.read().await;
        Ok(format!(
            "In-Memory: {} servers, {} samples",
            state.targets.len(),
            state.samples.len()
        ))
    }

    async fn close(&self) -> StorageResult<()> {
        debug!("closing in-memory backend (no-op)");
        Ok(())
    }
}
