//! HealthCheckerActor - Probes every configured target and reports transitions
//!
//! ## Message Flow
//!
//! ```text
//! Cycle → probe(target) → HealthState::observe → HealthNotice ──┬─→ log
//!   ↑                                                           └─→ broadcast subscribers
//!   ├─── Commands (CheckNow)
//!   └─── CancellationToken (stop)
//! ```
//!
//! Targets are probed one after another within a cycle. The first cycle runs
//! immediately on start; each following cycle starts one interval after the
//! previous one finished.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::Target;
use crate::config::DEFAULT_HEALTH_INTERVAL;
use crate::monitors::health::{HealthEvent, HealthState};
use crate::monitors::probe::Prober;

use super::messages::{ActorState, HealthCommand, HealthNotice};

const NOTICE_CHANNEL_CAPACITY: usize = 256;

pub struct HealthCheckerActor {
    targets: Vec<Target>,

    prober: Arc<dyn Prober>,

    /// Per-target state, only touched by this task
    states: HashMap<Target, HealthState>,

    interval_duration: Duration,

    /// Suppress `OK` notices
    quiet: bool,

    command_rx: mpsc::Receiver<HealthCommand>,

    notice_tx: broadcast::Sender<HealthNotice>,

    cancel: CancellationToken,

    state_tx: watch::Sender<ActorState>,
}

impl HealthCheckerActor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        targets: Vec<Target>,
        prober: Arc<dyn Prober>,
        interval_duration: Duration,
        quiet: bool,
        command_rx: mpsc::Receiver<HealthCommand>,
        notice_tx: broadcast::Sender<HealthNotice>,
        cancel: CancellationToken,
        state_tx: watch::Sender<ActorState>,
    ) -> Self {
        let interval_duration = if interval_duration.is_zero() {
            DEFAULT_HEALTH_INTERVAL
        } else {
            interval_duration
        };

        let states = targets
            .iter()
            .map(|target| (target.clone(), HealthState::default()))
            .collect();

        Self {
            targets,
            prober,
            states,
            interval_duration,
            quiet,
            command_rx,
            notice_tx,
            cancel,
            state_tx,
        }
    }

    #[instrument(skip(self), fields(targets = self.targets.len()))]
    pub async fn run(mut self) {
        self.state_tx.send_replace(ActorState::Running);
        debug!("health checker started, interval={:?}", self.interval_duration);

        'outer: loop {
            if self.cancel.is_cancelled() {
                break;
            }

            self.check_cycle().await;

            let sleep = tokio::time::sleep(self.interval_duration);
            tokio::pin!(sleep);

            loop {
                tokio::select! {
                    biased;

                    _ = self.cancel.cancelled() => {
                        debug!("cancellation requested");
                        break 'outer;
                    }

                    _ = &mut sleep => break,

                    Some(cmd) = self.command_rx.recv() => {
                        match cmd {
                            HealthCommand::CheckNow { respond_to } => {
                                debug!("received CheckNow command");
                                let notices = self.check_cycle().await;
                                let _ = respond_to.send(notices);
                            }
                        }
                    }
                }
            }
        }

        self.state_tx.send_replace(ActorState::Stopped);
        info!("health checker stopped");
    }

    /// Probe each target once, in order
    ///
    /// Returns the notices that were emitted. Stops early when cancelled;
    /// remaining targets keep their previous state.
    async fn check_cycle(&mut self) -> Vec<HealthNotice> {
        let mut emitted = Vec::with_capacity(self.targets.len());

        for target in &self.targets {
            if self.cancel.is_cancelled() {
                break;
            }

            let result = self.prober.probe(&target.address).await;

            let state = self.states.entry(target.clone()).or_default();
            let event = state.observe(result.is_ok());

            let (status_code, probe_error) = match result {
                Ok(code) => (Some(code), None),
                Err(e) => (None, Some(e)),
            };

            let notice = HealthNotice {
                target: target.clone(),
                event,
                status_code,
                error: probe_error,
                timestamp: Utc::now(),
            };

            if self.quiet && event == HealthEvent::Ok {
                continue;
            }

            match event {
                HealthEvent::Alert => error!("{}", notice.message()),
                HealthEvent::Down => warn!("{}", notice.message()),
                HealthEvent::Recovered | HealthEvent::Ok => info!("{}", notice.message()),
            }

            // no subscribers is fine, the log line above is the primary sink
            let _ = self.notice_tx.send(notice.clone());
            emitted.push(notice);
        }

        emitted
    }
}

/// Handle for controlling the HealthCheckerActor
#[derive(Clone)]
pub struct HealthCheckerHandle {
    sender: mpsc::Sender<HealthCommand>,

    notice_tx: broadcast::Sender<HealthNotice>,

    cancel: CancellationToken,

    state_rx: watch::Receiver<ActorState>,
}

impl HealthCheckerHandle {
    /// Spawn a health checker over `targets`
    ///
    /// The first cycle starts right away. The checker stops when `cancel`
    /// (or any parent) is cancelled, or when [`stop`](Self::stop) is called.
    pub fn spawn(
        targets: Vec<Target>,
        prober: Arc<dyn Prober>,
        interval: Duration,
        quiet: bool,
        cancel: &CancellationToken,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let (notice_tx, _) = broadcast::channel(NOTICE_CHANNEL_CAPACITY);
        let (state_tx, state_rx) = watch::channel(ActorState::Idle);
        let cancel = cancel.child_token();

        let actor = HealthCheckerActor::new(
            targets,
            prober,
            interval,
            quiet,
            cmd_rx,
            notice_tx.clone(),
            cancel.clone(),
            state_tx,
        );

        tokio::spawn(actor.run());

        Self {
            sender: cmd_tx,
            notice_tx,
            cancel,
            state_rx,
        }
    }

    /// Receive every notice emitted after this call
    pub fn subscribe(&self) -> broadcast::Receiver<HealthNotice> {
        self.notice_tx.subscribe()
    }

    /// Run one cycle now and return its notices
    pub async fn check_now(&self) -> anyhow::Result<Vec<HealthNotice>> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(HealthCommand::CheckNow { respond_to: tx })
            .await
            .map_err(|_| anyhow::anyhow!("health checker is not running"))?;

        rx.await
            .map_err(|_| anyhow::anyhow!("health checker stopped before answering"))
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn state(&self) -> ActorState {
        *self.state_rx.borrow()
    }

    pub async fn join(&self) -> anyhow::Result<()> {
        let mut state_rx = self.state_rx.clone();
        state_rx
            .wait_for(|state| *state == ActorState::Stopped)
            .await
            .map_err(|_| anyhow::anyhow!("health checker exited abnormally"))?;
        Ok(())
    }
}
