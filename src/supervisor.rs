//! Startup and shutdown orchestration
//!
//! ```text
//! open_backend ─→ register_targets (sequential) ─→ spawn collectors (one per registered target)
//!                                                └→ spawn health checker (all configured targets)
//! ```
//!
//! Every spawned unit gets a child of one shared [`CancellationToken`].

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::actors::collector::CollectorHandle;
use crate::actors::health_checker::HealthCheckerHandle;
use crate::config::{Config, StorageConfig};
use crate::gateway::MetricGateway;
use crate::monitors::probe::Prober;
use crate::monitors::system::MetricsSource;
use crate::registry::TargetRegistry;
use crate::storage::memory::MemoryBackend;
use crate::storage::{StorageBackend, StorageError, StorageResult};
use crate::{RegisteredTarget, Target};

/// Upper bound for the connectivity check at startup
pub const BACKEND_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Open the configured backend and make sure it answers
pub async fn open_backend(config: &StorageConfig) -> StorageResult<Arc<dyn StorageBackend>> {
    let backend: Arc<dyn StorageBackend> = match config {
        StorageConfig::None => {
            warn!("using in-memory storage, nothing is persisted");
            Arc::new(MemoryBackend::new())
        }
        #[cfg(feature = "storage-sqlite")]
        StorageConfig::Sqlite { path } => {
            info!("opening SQLite database at {}", path.display());
            Arc::new(crate::storage::sqlite::SqliteBackend::new(path).await?)
        }
        #[cfg(not(feature = "storage-sqlite"))]
        StorageConfig::Sqlite { .. } => {
            return Err(StorageError::ConnectionFailed(
                "built without SQLite support (feature `storage-sqlite`)".to_string(),
            ));
        }
    };

    let status = timeout(BACKEND_CHECK_TIMEOUT, backend.health_check())
        .await
        .map_err(|_| {
            StorageError::ConnectionFailed(format!(
                "health check did not answer within {}s",
                BACKEND_CHECK_TIMEOUT.as_secs()
            ))
        })??;

    if !status.healthy {
        return Err(StorageError::UnhealthyBackend(status.message));
    }

    Ok(backend)
}

/// Register targets one after another
///
/// A target that fails to register is logged and left out; the others
/// are unaffected.
#[instrument(skip_all, fields(targets = targets.len()))]
pub async fn register_targets(
    registry: &TargetRegistry,
    targets: &[Target],
) -> Vec<RegisteredTarget> {
    let mut registered = Vec::with_capacity(targets.len());

    for target in targets {
        match registry.register_target(target).await {
            Ok(entry) => {
                info!("server {} registered with id {}", target, entry.store_id);
                registered.push(entry);
            }
            Err(e) => error!("skipping server {target}: {e}"),
        }
    }

    registered
}

/// Runtime settings derived from [`Config`]
#[derive(Debug, Clone, Copy)]
pub struct MonitorSettings {
    pub collection_interval: Duration,
    pub health_interval: Duration,
    pub quiet: bool,
}

impl From<&Config> for MonitorSettings {
    fn from(config: &Config) -> Self {
        Self {
            collection_interval: config.collector.interval(),
            health_interval: config.health.interval(),
            quiet: config.health.quiet,
        }
    }
}

/// All running units of one process
pub struct Monitor {
    cancel: CancellationToken,
    collectors: Vec<CollectorHandle>,
    health: HealthCheckerHandle,
}

impl Monitor {
    /// Register targets, then spawn one collector per registered target and
    /// a health checker over all of `targets`
    ///
    /// `source` is called once per collector.
    pub async fn start<F>(
        backend: Arc<dyn StorageBackend>,
        targets: &[Target],
        settings: &MonitorSettings,
        source: F,
        prober: Arc<dyn Prober>,
        cancel: &CancellationToken,
    ) -> Self
    where
        F: Fn() -> Arc<dyn MetricsSource>,
    {
        let registry = TargetRegistry::new(Arc::clone(&backend));
        let registered = register_targets(&registry, targets).await;

        if registered.len() < targets.len() {
            warn!(
                "{} of {} servers could not be registered, no metrics will be collected for them",
                targets.len() - registered.len(),
                targets.len()
            );
        }

        let gateway = MetricGateway::new(backend);
        let collectors = registered
            .into_iter()
            .map(|entry| {
                CollectorHandle::spawn(
                    entry,
                    gateway.clone(),
                    source(),
                    settings.collection_interval,
                    cancel,
                )
            })
            .collect::<Vec<_>>();

        let health = HealthCheckerHandle::spawn(
            targets.to_vec(),
            prober,
            settings.health_interval,
            settings.quiet,
            cancel,
        );

        info!(
            "started {} collector(s) and a health checker for {} server(s)",
            collectors.len(),
            targets.len()
        );

        Self {
            cancel: cancel.clone(),
            collectors,
            health,
        }
    }

    pub fn collectors(&self) -> &[CollectorHandle] {
        &self.collectors
    }

    pub fn health(&self) -> &HealthCheckerHandle {
        &self.health
    }

    /// Cancel everything and wait up to `grace` for all units to exit
    ///
    /// Returns an error if some unit was still running when the grace
    /// period ran out.
    pub async fn shutdown(self, grace: Duration) -> anyhow::Result<()> {
        self.cancel.cancel();

        let collectors = futures::future::join_all(self.collectors.iter().map(|c| c.join()));
        let all = async {
            let (collectors, health) = tokio::join!(collectors, self.health.join());
            collectors
                .into_iter()
                .chain(std::iter::once(health))
                .collect::<anyhow::Result<()>>()
        };

        timeout(grace, all).await.map_err(|_| {
            anyhow::anyhow!("not all tasks stopped within {}s", grace.as_secs_f64())
        })?
    }
}
