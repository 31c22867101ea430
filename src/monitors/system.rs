//! Local CPU and memory sampling

use std::sync::Mutex;

use sysinfo::{CpuRefreshKind, MemoryRefreshKind, RefreshKind, System};
use thiserror::Error;
use tracing::trace;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SampleError {
    #[error("failed to read CPU usage: {0}")]
    Cpu(String),

    #[error("failed to read memory usage: {0}")]
    Memory(String),
}

/// Source of host resource readings
///
/// Both methods block the calling thread; async callers should run them
/// on the blocking pool.
pub trait MetricsSource: Send + Sync {
    /// Current global CPU utilisation in percent, measured over a short window
    fn cpu_percent(&self) -> Result<f64, SampleError>;

    /// Memory currently in use, in bytes
    fn used_memory_bytes(&self) -> Result<u64, SampleError>;
}

/// One reading of both resources
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub cpu_percent: f64,
    pub memory_mb: f64,
}

/// Read CPU first, then memory. Stops at the first failure.
pub fn take_sample(source: &dyn MetricsSource) -> Result<Sample, SampleError> {
    let cpu_percent = source.cpu_percent()?;
    let memory_mb = source.used_memory_bytes()? as f64 / BYTES_PER_MB;

    Ok(Sample {
        cpu_percent,
        memory_mb,
    })
}

/// [`MetricsSource`] backed by `sysinfo`
pub struct SysinfoSource {
    system: Mutex<System>,
}

impl SysinfoSource {
    pub fn new() -> Self {
        let system = System::new_with_specifics(
            RefreshKind::nothing()
                .with_cpu(CpuRefreshKind::nothing().with_cpu_usage())
                .with_memory(MemoryRefreshKind::nothing().with_ram()),
        );

        Self {
            system: Mutex::new(system),
        }
    }
}

impl Default for SysinfoSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsSource for SysinfoSource {
    fn cpu_percent(&self) -> Result<f64, SampleError> {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            return Err(SampleError::Cpu("platform not supported".to_string()));
        }

        let mut system = self
            .system
            .lock()
            .map_err(|_| SampleError::Cpu("sampler lock poisoned".to_string()))?;

        // usage is the delta between two refreshes
        system.refresh_cpu_usage();
        std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
        system.refresh_cpu_usage();

        if system.cpus().is_empty() {
            return Err(SampleError::Cpu("no CPUs reported".to_string()));
        }

        let usage = system.global_cpu_usage();
        trace!("sampled cpu usage: {usage:.2}%");
        Ok(usage as f64)
    }

    fn used_memory_bytes(&self) -> Result<u64, SampleError> {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            return Err(SampleError::Memory("platform not supported".to_string()));
        }

        let mut system = self
            .system
            .lock()
            .map_err(|_| SampleError::Memory("sampler lock poisoned".to_string()))?;

        system.refresh_memory();

        if system.total_memory() == 0 {
            return Err(SampleError::Memory("no memory information available".to_string()));
        }

        Ok(system.used_memory())
    }
}
