//! MetricCollectorActor - Samples local resources for one registered target
//!
//! ## Message Flow
//!
//! ```text
//! Timer tick → Sample CPU + memory → Write cpu_percent, memory_mb → [MetricGateway]
//!     ↑
//!     ├─── Commands (CollectNow)
//!     └─── CancellationToken (stop)
//! ```
//!
//! ## Scheduling
//!
//! Ticks are fixed-period. A tick that is missed because the previous
//! collection overran is skipped, not replayed. Collections never overlap:
//! each one finishes inside the loop before the next tick is awaited, and
//! cancellation is only observed between collections, so writes already
//! issued always complete.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::RegisteredTarget;
use crate::config::DEFAULT_COLLECTION_INTERVAL;
use crate::gateway::{MetricGateway, WriteError};
use crate::monitors::system::{MetricsSource, Sample, SampleError, take_sample};
use crate::storage::{MetricName, ObjectType};

use super::messages::{ActorState, CollectorCommand};

/// Stand-in deadline when the first tick cannot be represented as an `Instant`
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Why a single collection did not fully succeed
#[derive(Debug, Error)]
pub enum CollectError {
    /// Reading CPU or memory failed; nothing was written
    #[error(transparent)]
    Sample(#[from] SampleError),

    /// The blocking sampling task died
    #[error("sampling task failed: {0}")]
    Sampler(String),

    /// At least one of the two writes failed; the other was still attempted
    #[error("{} metric write(s) failed: {}", .0.len(), join_errors(.0))]
    PartialWrite(Vec<WriteError>),

    /// The actor has already stopped
    #[error("collector is not running")]
    NotRunning,
}

fn join_errors(errors: &[WriteError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Actor that periodically samples and stores metrics for one target
pub struct MetricCollectorActor {
    registered: RegisteredTarget,

    gateway: MetricGateway,

    source: Arc<dyn MetricsSource>,

    command_rx: mpsc::Receiver<CollectorCommand>,

    cancel: CancellationToken,

    state_tx: watch::Sender<ActorState>,

    interval_duration: Duration,
}

impl MetricCollectorActor {
    pub fn new(
        registered: RegisteredTarget,
        gateway: MetricGateway,
        source: Arc<dyn MetricsSource>,
        interval_duration: Duration,
        command_rx: mpsc::Receiver<CollectorCommand>,
        cancel: CancellationToken,
        state_tx: watch::Sender<ActorState>,
    ) -> Self {
        let interval_duration = if interval_duration.is_zero() {
            DEFAULT_COLLECTION_INTERVAL
        } else {
            interval_duration
        };

        Self {
            registered,
            gateway,
            source,
            command_rx,
            cancel,
            state_tx,
            interval_duration,
        }
    }

    /// Run the actor's main loop until the cancellation token fires
    #[instrument(
        skip(self),
        fields(server = %self.registered.target, server_id = self.registered.store_id)
    )]
    pub async fn run(mut self) {
        self.state_tx.send_replace(ActorState::Running);
        debug!("collector started, interval={:?}", self.interval_duration);

        let now = Instant::now();
        let first_tick = now
            .checked_add(self.interval_duration)
            .unwrap_or_else(|| now + FAR_FUTURE);
        let mut ticker = interval_at(first_tick, self.interval_duration);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    debug!("cancellation requested");
                    break;
                }

                _ = ticker.tick() => {
                    if let Err(e) = self.collect_once().await {
                        error!("collect error: {e}");
                    }
                }

                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        CollectorCommand::CollectNow { respond_to } => {
                            debug!("received CollectNow command");
                            let result = self.collect_once().await;
                            let _ = respond_to.send(result);
                        }
                    }
                }
            }
        }

        self.state_tx.send_replace(ActorState::Stopped);
        info!("collector stopped");
    }

    /// Sample once and write both values with a shared timestamp
    ///
    /// A sampling failure writes nothing. A failed write does not prevent
    /// the other write; it is reported afterwards and not retried.
    async fn collect_once(&self) -> Result<Sample, CollectError> {
        let timestamp = Utc::now();
        let object_id = self.registered.store_id;

        let source = Arc::clone(&self.source);
        let sample = tokio::task::spawn_blocking(move || take_sample(source.as_ref()))
            .await
            .map_err(|e| CollectError::Sampler(e.to_string()))??;

        let writes = [
            (MetricName::CpuPercent, sample.cpu_percent),
            (MetricName::MemoryMb, sample.memory_mb),
        ];

        let mut failed = Vec::new();
        for (metric_name, value) in writes {
            if let Err(e) = self
                .gateway
                .write(ObjectType::Server, object_id, metric_name, value, timestamp)
                .await
            {
                failed.push(e);
            }
        }

        if !failed.is_empty() {
            warn!(
                "cpu={:.2}% memory={:.1}MB server_id={object_id} ({} write(s) failed)",
                sample.cpu_percent,
                sample.memory_mb,
                failed.len()
            );
            return Err(CollectError::PartialWrite(failed));
        }

        info!(
            "cpu={:.2}% memory={:.1}MB server_id={object_id}",
            sample.cpu_percent, sample.memory_mb
        );
        Ok(sample)
    }
}

/// Handle for controlling a MetricCollectorActor
///
/// Cloning the handle does not spawn a second collector; all clones
/// control the same task.
#[derive(Clone)]
pub struct CollectorHandle {
    sender: mpsc::Sender<CollectorCommand>,

    cancel: CancellationToken,

    state_rx: watch::Receiver<ActorState>,

    registered: RegisteredTarget,
}

impl CollectorHandle {
    /// Spawn a new collector actor
    ///
    /// Returns immediately. The collector stops when `cancel` (or any of
    /// its parents) is cancelled, or when [`stop`](Self::stop) is called.
    pub fn spawn(
        registered: RegisteredTarget,
        gateway: MetricGateway,
        source: Arc<dyn MetricsSource>,
        interval: Duration,
        cancel: &CancellationToken,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let (state_tx, state_rx) = watch::channel(ActorState::Idle);
        let cancel = cancel.child_token();

        let actor = MetricCollectorActor::new(
            registered.clone(),
            gateway,
            source,
            interval,
            cmd_rx,
            cancel.clone(),
            state_tx,
        );

        tokio::spawn(actor.run());

        Self {
            sender: cmd_tx,
            cancel,
            state_rx,
            registered,
        }
    }

    /// Trigger an immediate collection
    pub async fn collect_now(&self) -> Result<Sample, CollectError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(CollectorCommand::CollectNow { respond_to: tx })
            .await
            .map_err(|_| CollectError::NotRunning)?;

        rx.await.map_err(|_| CollectError::NotRunning)?
    }

    /// Request cancellation; safe to call any number of times
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn state(&self) -> ActorState {
        *self.state_rx.borrow()
    }

    /// Wait until the collector loop has exited
    pub async fn join(&self) -> anyhow::Result<()> {
        let mut state_rx = self.state_rx.clone();
        state_rx
            .wait_for(|state| *state == ActorState::Stopped)
            .await
            .map_err(|_| {
                anyhow::anyhow!("collector for {} exited abnormally", self.registered.target)
            })?;
        Ok(())
    }

    pub fn registered(&self) -> &RegisteredTarget {
        &self.registered
    }

    pub fn server_id(&self) -> i64 {
        self.registered.store_id
    }
}
