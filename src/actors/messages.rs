//! Message types for actor communication
//!
//! ## Design Principles
//!
//! 1. **Commands**: Request/response messages sent to a specific actor via mpsc
//! 2. **Notices**: Health notices broadcast to any number of subscribers
//! 3. **Lifecycle**: Each actor publishes its [`ActorState`] through a watch channel

use chrono::{DateTime, Utc};
use tokio::sync::oneshot;

use crate::Target;
use crate::monitors::health::HealthEvent;
use crate::monitors::probe::{ProbeError, ProbeLayer};
use crate::monitors::system::Sample;

use super::collector::CollectError;

/// Lifecycle of a spawned actor
///
/// `Idle -> Running -> Stopped`; `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorState {
    /// Created, task not yet running
    Idle,
    /// Loop is active
    Running,
    /// Loop has exited after cancellation
    Stopped,
}

/// Commands that can be sent to a MetricCollectorActor
#[derive(Debug)]
pub enum CollectorCommand {
    /// Run one collection immediately, outside of the tick schedule
    CollectNow {
        respond_to: oneshot::Sender<Result<Sample, CollectError>>,
    },
}

/// Commands that can be sent to the HealthCheckerActor
#[derive(Debug)]
pub enum HealthCommand {
    /// Probe every target once immediately and return the emitted notices
    CheckNow {
        respond_to: oneshot::Sender<Vec<HealthNotice>>,
    },
}

/// Result of probing one target, after transition gating
///
/// Broadcast to subscribers and written to the log.
#[derive(Debug, Clone)]
pub struct HealthNotice {
    pub target: Target,

    pub event: HealthEvent,

    /// Status code of the HTTP response, if one was received
    pub status_code: Option<u16>,

    /// Why the probe failed, if it did
    pub error: Option<ProbeError>,

    pub timestamp: DateTime<Utc>,
}

impl HealthNotice {
    pub fn failed_layer(&self) -> Option<ProbeLayer> {
        self.error.as_ref().map(ProbeError::layer)
    }

    /// Human-readable line for the notification log
    pub fn message(&self) -> String {
        let Target { name, address, .. } = &self.target;
        let status = self
            .status_code
            .map(|code| format!(" (HTTP {code})"))
            .unwrap_or_default();

        match (self.event, &self.error) {
            (HealthEvent::Alert, Some(ProbeError::Transport(reason))) => {
                format!("[ALERT] server {name} ({address}) is unreachable (TCP): {reason}")
            }
            (HealthEvent::Alert, Some(ProbeError::Application(reason))) => format!(
                "[ALERT] server {name} ({address}) accepts TCP but does not answer HTTP: {reason}"
            ),
            (HealthEvent::Down, Some(ProbeError::Transport(_))) => {
                format!("[DOWN] server {name} ({address}) is still unreachable (TCP)")
            }
            (HealthEvent::Down, Some(ProbeError::Application(_))) => {
                format!("[DOWN] server {name} ({address}) still does not answer HTTP")
            }
            (HealthEvent::Recovered, _) => {
                format!("[RECOVERED] server {name} ({address}) is reachable again{status}")
            }
            (event, _) => format!("[{event}] server {name} ({address}) is reachable{status}"),
        }
    }
}
