//! System status aggregation.
//!
//! [`StatusAggregator`] owns the health, component and security fields of the
//! status snapshot, takes the task counters from the registry, and refreshes
//! the performance figures from a pluggable [`MetricsSource`].

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use taskdeck_core::error::Result;
use taskdeck_core::status::{
    OverallHealth, PerformanceSnapshot, SecurityFlags, SystemStatus,
};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::registry::TaskRegistry;

/// Performance figures produced by a metrics source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsSample {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub latency_p80: f64,
    pub accuracy: f64,
}

impl Default for MetricsSample {
    fn default() -> Self {
        let defaults = PerformanceSnapshot::default();
        Self {
            cpu_percent: defaults.cpu_percent,
            memory_percent: defaults.memory_percent,
            latency_p80: defaults.latency_p80,
            accuracy: defaults.accuracy,
        }
    }
}

/// Source of performance figures.
///
/// Swap [`SimulatedMetrics`] for a real instrumentation source without
/// touching the orchestrator or the broadcaster.
#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// Produces the next sample given the previous one.
    async fn sample(&self, previous: &MetricsSample) -> Result<MetricsSample>;
}

/// Closed range a simulated metric stays within, with its maximum step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Walk {
    pub floor: f64,
    pub ceiling: f64,
    pub step: f64,
}

impl Walk {
    fn next(&self, current: f64, rng: &mut impl Rng) -> f64 {
        let delta = rng.gen_range(-self.step..=self.step);
        (current + delta).clamp(self.floor, self.ceiling)
    }
}

/// Bounded random walk standing in for real instrumentation.
#[derive(Debug, Clone)]
pub struct SimulatedMetrics {
    pub cpu: Walk,
    pub memory: Walk,
    pub latency: Walk,
}

impl Default for SimulatedMetrics {
    fn default() -> Self {
        Self {
            cpu: Walk {
                floor: 20.0,
                ceiling: 80.0,
                step: 5.0,
            },
            memory: Walk {
                floor: 30.0,
                ceiling: 90.0,
                step: 3.0,
            },
            latency: Walk {
                floor: 50.0,
                ceiling: 300.0,
                step: 10.0,
            },
        }
    }
}

impl SimulatedMetrics {
    fn perturb(&self, previous: &MetricsSample) -> MetricsSample {
        let mut rng = rand::thread_rng();
        MetricsSample {
            cpu_percent: self.cpu.next(previous.cpu_percent, &mut rng),
            memory_percent: self.memory.next(previous.memory_percent, &mut rng),
            latency_p80: self.latency.next(previous.latency_p80, &mut rng),
            accuracy: previous.accuracy,
        }
    }
}

#[async_trait]
impl MetricsSource for SimulatedMetrics {
    async fn sample(&self, previous: &MetricsSample) -> Result<MetricsSample> {
        Ok(self.perturb(previous))
    }
}

struct StatusState {
    health: OverallHealth,
    components: BTreeMap<String, String>,
    metrics: MetricsSample,
    security: SecurityFlags,
}

impl Default for StatusState {
    fn default() -> Self {
        let defaults = SystemStatus::default();
        Self {
            health: defaults.status,
            components: defaults.components,
            metrics: MetricsSample::default(),
            security: defaults.security,
        }
    }
}

/// Maintains the process-wide [`SystemStatus`].
pub struct StatusAggregator {
    state: RwLock<StatusState>,
    registry: Arc<TaskRegistry>,
    metrics: Arc<dyn MetricsSource>,
}

impl StatusAggregator {
    pub fn new(registry: Arc<TaskRegistry>, metrics: Arc<dyn MetricsSource>) -> Self {
        Self {
            state: RwLock::new(StatusState::default()),
            registry,
            metrics,
        }
    }

    /// Current status; task counters are read from the registry.
    pub async fn snapshot(&self) -> SystemStatus {
        let mut status = self.local_status().await;
        let counts = self.registry.counts().await;
        status.performance.active_tasks = counts.active;
        status.performance.total_tasks = counts.total;
        status
    }

    /// Broadcasts the current status to every subscriber. The counters are
    /// taken under the registry lock at publish time.
    pub async fn publish_snapshot(&self) -> SystemStatus {
        let status = self.local_status().await;
        self.registry.publish_status(status).await
    }

    async fn local_status(&self) -> SystemStatus {
        let state = self.state.read().await;
        SystemStatus {
            status: state.health,
            components: state.components.clone(),
            performance: PerformanceSnapshot {
                cpu_percent: state.metrics.cpu_percent,
                memory_percent: state.metrics.memory_percent,
                latency_p80: state.metrics.latency_p80,
                accuracy: state.metrics.accuracy,
                active_tasks: 0,
                total_tasks: 0,
            },
            security: state.security.clone(),
        }
    }

    /// Pulls one sample from the metrics source and broadcasts the result.
    pub async fn refresh(&self) -> Result<SystemStatus> {
        let previous = self.state.read().await.metrics;
        let next = self.metrics.sample(&previous).await?;
        self.state.write().await.metrics = next;
        Ok(self.publish_snapshot().await)
    }

    /// Sets or clears the kill-switch flag. An active kill switch forces the
    /// overall status to critical; clearing it restores healthy.
    pub async fn set_kill_switch(&self, active: bool) {
        let mut state = self.state.write().await;
        state.security.kill_switch_active = active;
        state.health = if active {
            OverallHealth::Critical
        } else {
            OverallHealth::Healthy
        };
    }

    /// Runs [`Self::refresh`] every `interval` until `shutdown` fires. A failed
    /// refresh is logged and retried after `error_backoff`.
    pub fn spawn_refresher(
        self: &Arc<Self>,
        interval: Duration,
        error_backoff: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut delay = interval;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
                match this.refresh().await {
                    Ok(_) => delay = interval,
                    Err(e) => {
                        tracing::error!(error = %e, "status refresh failed");
                        delay = error_backoff;
                    }
                }
            }
            tracing::debug!("status refresher stopped");
        })
    }
}
