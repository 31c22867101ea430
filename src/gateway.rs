//! Append-only write path for metric samples

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{trace, warn};

use crate::storage::{MetricName, MetricSample, ObjectType, StorageBackend, StorageError};

/// A single sample could not be persisted
#[derive(Debug, Error)]
#[error("failed to write {metric_name} for {object_type} {object_id}: {source}")]
pub struct WriteError {
    pub object_type: ObjectType,
    pub object_id: i64,
    pub metric_name: MetricName,
    #[source]
    pub source: StorageError,
}

/// Writes samples to the shared backend
///
/// Every call is an independent insert. There is no deduplication and no
/// retry; a failed write is reported to the caller and dropped.
#[derive(Clone)]
pub struct MetricGateway {
    backend: Arc<dyn StorageBackend>,
}

impl MetricGateway {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    pub async fn write(
        &self,
        object_type: ObjectType,
        object_id: i64,
        metric_name: MetricName,
        value: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<(), WriteError> {
        let sample = MetricSample {
            object_type,
            object_id,
            metric_name,
            value,
            timestamp,
        };
        self.write_sample(&sample).await
    }

    pub async fn write_sample(&self, sample: &MetricSample) -> Result<(), WriteError> {
        match self.backend.insert_metric(sample).await {
            Ok(()) => {
                trace!(
                    "stored {}={} for {} {}",
                    sample.metric_name, sample.value, sample.object_type, sample.object_id
                );
                Ok(())
            }
            Err(source) => {
                warn!(
                    "failed to store {} for {} {}: {}",
                    sample.metric_name, sample.object_type, sample.object_id, source
                );
                Err(WriteError {
                    object_type: sample.object_type,
                    object_id: sample.object_id,
                    metric_name: sample.metric_name,
                    source,
                })
            }
        }
    }
}
