//! Row types for the `servers` and `metrics` tables
//!
//! Samples are stored one value per row, keyed by
//! `(object_type, object_id, metric_name)` plus a timestamp. New kinds of
//! monitored objects or new metric names do not require a migration.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of object a sample belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    /// A configured server (`servers.id`)
    Server,
}

impl ObjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::Server => "server",
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name of a sampled metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricName {
    /// Global CPU utilisation (percentage 0-100)
    CpuPercent,

    /// Used memory in megabytes
    MemoryMb,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::CpuPercent => "cpu_percent",
            MetricName::MemoryMb => "memory_mb",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single timestamped value
///
/// Written once and never updated. Two samples with the same key and
/// timestamp are stored as two rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub object_type: ObjectType,
    pub object_id: i64,
    pub metric_name: MetricName,
    pub value: f64,
    /// When the value was captured (always UTC)
    pub timestamp: DateTime<Utc>,
}

impl MetricSample {
    pub fn server(
        object_id: i64,
        metric_name: MetricName,
        value: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            object_type: ObjectType::Server,
            object_id,
            metric_name,
            value,
            timestamp,
        }
    }
}
