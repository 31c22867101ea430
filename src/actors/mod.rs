//! Actor-based monitoring
//!
//! Each actor runs as an independent async task and is controlled through a
//! cloneable handle.
//!
//! ## Architecture Overview
//!
//! ```text
//!                  ┌─────────────────┐
//!                  │   Supervisor    │
//!                  └────────┬────────┘
//!                           │ spawns (child CancellationTokens)
//!          ┌────────────────┼─────────────────┐
//!          │                │                 │
//!  ┌───────▼───────┐ ┌──────▼────────┐ ┌──────▼────────┐
//!  │ Collector-1   │ │ Collector-N   │ │ HealthChecker │
//!  │ (server_id 1) │ │ (server_id N) │ │ (all targets) │
//!  └───────┬───────┘ └──────┬────────┘ └──────┬────────┘
//!          │                │                 │
//!          └───────┬────────┘          ┌──────▼────────┐
//!          ┌───────▼────────┐          │  Broadcast    │
//!          │ MetricGateway  │          │  (notices)    │
//!          └────────────────┘          └───────────────┘
//! ```
//!
//! ## Actor Types
//!
//! - **MetricCollectorActor**: Samples CPU and memory at a fixed interval for one target
//! - **HealthCheckerActor**: Probes all targets and reports up/down transitions
//!
//! ## Communication Patterns
//!
//! 1. **Commands**: Each actor has an mpsc command channel for on-demand work
//! 2. **Notices**: Health notices are published on a broadcast channel for fan-out
//! 3. **Request/Response**: oneshot channels carry command replies
//! 4. **Lifecycle**: a watch channel exposes [`messages::ActorState`]

pub mod collector;
pub mod health_checker;
pub mod messages;
