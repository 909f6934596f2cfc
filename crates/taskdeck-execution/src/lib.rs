//! Task execution runtime.
//!
//! - [`broadcaster`]: fan-out of dashboard events to live subscribers
//! - [`registry`]: in-memory task store and counters
//! - [`status`]: system status aggregation and metrics sources
//! - [`orchestrator`]: submission, background execution and cancellation
//! - [`ssh_executor`], [`dry_run`]: [`RemoteExecutor`] implementations

pub mod broadcaster;
pub mod dry_run;
pub mod orchestrator;
pub mod registry;
pub mod ssh_executor;
pub mod status;

use std::sync::Arc;
use std::time::Duration;

use taskdeck_core::config::{ExecutorConfig, ExecutorMode};
use taskdeck_core::executor::RemoteExecutor;

pub use broadcaster::{Broadcaster, SubscriberId, Subscription};
pub use dry_run::DryRunExecutor;
pub use orchestrator::{OrchestratorSettings, TaskOrchestrator};
pub use registry::{TaskCounts, TaskRegistry};
pub use ssh_executor::SshExecutor;
pub use status::{MetricsSample, MetricsSource, SimulatedMetrics, StatusAggregator};

/// Builds the executor selected by `config.mode`.
pub fn executor_from_config(config: &ExecutorConfig) -> Arc<dyn RemoteExecutor> {
    match config.mode {
        ExecutorMode::DryRun => Arc::new(DryRunExecutor::new(Duration::from_millis(
            config.dry_run_latency_ms,
        ))),
        ExecutorMode::Ssh => Arc::new(SshExecutor::new(&config.ssh)),
    }
}
