//! Composition root: logging, service wiring and the serve loop.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use taskdeck_core::config::AppConfig;
use taskdeck_execution::{SimulatedMetrics, TaskOrchestrator, executor_from_config};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::{AppState, router};

/// Installs the fmt subscriber. `RUST_LOG` wins over `default_level`.
pub fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// Running services behind the HTTP surface.
pub struct Services {
    pub orchestrator: Arc<TaskOrchestrator>,
    shutdown: CancellationToken,
    refresher: JoinHandle<()>,
}

impl Services {
    pub fn state(&self) -> AppState {
        AppState::new(self.orchestrator.clone())
    }

    /// Stops the background refresher.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        if let Err(e) = self.refresher.await {
            tracing::warn!(error = %e, "status refresher ended abnormally");
        }
    }
}

/// Builds the orchestrator from `config` and starts the status refresher.
/// Must be called inside a Tokio runtime.
pub fn start(config: &AppConfig) -> Services {
    let executor = executor_from_config(&config.executor);
    tracing::info!(executor = executor.name(), "remote executor selected");

    let orchestrator =
        TaskOrchestrator::from_config(config, executor, Arc::new(SimulatedMetrics::default()));

    let shutdown = CancellationToken::new();
    let refresher = orchestrator.status_aggregator().spawn_refresher(
        Duration::from_secs(config.status.refresh_interval_secs),
        Duration::from_secs(config.status.error_backoff_secs),
        shutdown.clone(),
    );

    Services {
        orchestrator,
        shutdown,
        refresher,
    }
}

/// Serves the API on `listener` until `signal` resolves, then stops the
/// background services.
pub async fn serve<F>(listener: TcpListener, services: Services, signal: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr().context("listener has no local address")?;
    tracing::info!(%addr, "taskdeck listening");

    let app = router(services.state());
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(signal)
        .await
        .context("server terminated with error");

    services.shutdown().await;
    tracing::info!("taskdeck stopped");
    result
}
