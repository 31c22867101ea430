//! Helper types for integration tests

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use guardia_collector::Target;
use guardia_collector::monitors::probe::{ProbeError, Prober};
use guardia_collector::monitors::system::{MetricsSource, SampleError};
use guardia_collector::storage::memory::MemoryBackend;
use guardia_collector::storage::{
    HealthStatus, MetricName, MetricSample, StorageBackend, StorageError, StorageResult,
};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;

pub fn create_test_target(name: &str) -> Target {
    Target::new(name, format!("{name}.internal:8080"), format!("test server {name}"))
}

/// Reports fixed readings and counts how often it was sampled
pub struct StaticSource {
    pub cpu: f64,
    pub memory_mb: u64,
    pub samples: AtomicUsize,
}

impl StaticSource {
    pub fn new(cpu: f64, memory_mb: u64) -> Self {
        Self {
            cpu,
            memory_mb,
            samples: AtomicUsize::new(0),
        }
    }

    pub fn sample_count(&self) -> usize {
        self.samples.load(Ordering::SeqCst)
    }
}

impl MetricsSource for StaticSource {
    fn cpu_percent(&self) -> Result<f64, SampleError> {
        self.samples.fetch_add(1, Ordering::SeqCst);
        Ok(self.cpu)
    }

    fn used_memory_bytes(&self) -> Result<u64, SampleError> {
        Ok(self.memory_mb * 1024 * 1024)
    }
}

/// Fails every CPU read
pub struct FailingSource;

impl MetricsSource for FailingSource {
    fn cpu_percent(&self) -> Result<f64, SampleError> {
        Err(SampleError::Cpu("sensor unavailable".to_string()))
    }

    fn used_memory_bytes(&self) -> Result<u64, SampleError> {
        Ok(1024 * 1024)
    }
}

/// Reads CPU successfully, then fails the memory read
pub struct MemoryFailingSource {
    pub cpu_reads: AtomicUsize,
}

impl MemoryFailingSource {
    pub fn new() -> Self {
        Self {
            cpu_reads: AtomicUsize::new(0),
        }
    }
}

impl MetricsSource for MemoryFailingSource {
    fn cpu_percent(&self) -> Result<f64, SampleError> {
        self.cpu_reads.fetch_add(1, Ordering::SeqCst);
        Ok(55.0)
    }

    fn used_memory_bytes(&self) -> Result<u64, SampleError> {
        Err(SampleError::Memory("meminfo unreadable".to_string()))
    }
}

/// Memory backend that rejects every write of one metric
pub struct FlakyBackend {
    pub inner: MemoryBackend,
    pub failing_metric: MetricName,
    pub attempts: AtomicUsize,
}

impl FlakyBackend {
    pub fn new(failing_metric: MetricName) -> Self {
        Self {
            inner: MemoryBackend::new(),
            failing_metric,
            attempts: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl StorageBackend for FlakyBackend {
    async fn lookup_target(&self, name: &str, address: &str) -> StorageResult<Option<i64>> {
        self.inner.lookup_target(name, address).await
    }

    async fn insert_target(&self, target: &Target) -> StorageResult<i64> {
        self.inner.insert_target(target).await
    }

    async fn target_exists(&self, id: i64) -> StorageResult<bool> {
        self.inner.target_exists(id).await
    }

    async fn insert_metric(&self, sample: &MetricSample) -> StorageResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if sample.metric_name == self.failing_metric {
            return Err(StorageError::QueryFailed("disk full".to_string()));
        }
        self.inner.insert_metric(sample).await
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        self.inner.health_check().await
    }

    async fn get_stats(&self) -> StorageResult<String> {
        self.inner.get_stats().await
    }

    async fn close(&self) -> StorageResult<()> {
        self.inner.close().await
    }
}

/// Replays a list of up/down outcomes, then reports up
pub struct ScriptedProber {
    outcomes: Mutex<VecDeque<bool>>,
}

impl ScriptedProber {
    pub fn new(outcomes: &[bool]) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.iter().copied().collect()),
        }
    }
}

#[async_trait]
impl Prober for ScriptedProber {
    async fn probe(&self, _address: &str) -> Result<u16, ProbeError> {
        let up = self.outcomes.lock().unwrap().pop_front().unwrap_or(true);
        if up {
            Ok(200)
        } else {
            Err(ProbeError::Transport("connection refused".to_string()))
        }
    }
}

/// Address on localhost with nothing listening
pub async fn closed_address() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    drop(listener);
    address
}

/// Address that accepts TCP connections but never speaks HTTP
pub async fn garbage_responder() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let _ = socket.write_all(b"SSH-2.0-OpenSSH_9.6\r\n\r\n").await;
            let _ = socket.shutdown().await;
        }
    });
    address
}
