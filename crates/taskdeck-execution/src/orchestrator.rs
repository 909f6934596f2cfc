//! Task orchestration.
//!
//! [`TaskOrchestrator`] is the entry point for every task operation. A
//! submission is validated, interpreted, registered as pending and handed to a
//! spawned execution unit that:
//!
//! 1. waits for a concurrency permit (cancellable while pending),
//! 2. moves the task to running and maps its intent to a device instruction,
//! 3. races the remote executor against the task's cancellation token while
//!    advancing progress on a ticker,
//! 4. records the outcome and notifies subscribers.
//!
//! Cancellation is cooperative. The registry transition happens first, then the
//! token is fired; a result that arrives after the transition fails the state
//! machine check and is dropped.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use taskdeck_core::config::AppConfig;
use taskdeck_core::error::{Result, TaskdeckError};
use taskdeck_core::event::{DashboardEvent, Notification};
use taskdeck_core::executor::{ExecutionOutcome, RemoteExecutor};
use taskdeck_core::intent::parse;
use taskdeck_core::status::SystemStatus;
use taskdeck_core::task::{Task, TaskStatus, validate_submission};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::broadcaster::{Broadcaster, SubscriberId, Subscription};
use crate::registry::TaskRegistry;
use crate::status::{MetricsSource, StatusAggregator};

/// Progress reported while running never exceeds this; completion sets 100.
pub const MAX_RUNNING_PROGRESS: u8 = 95;

/// Tunables for [`TaskOrchestrator`].
#[derive(Debug, Clone, Copy)]
pub struct OrchestratorSettings {
    pub max_concurrent_tasks: usize,
    pub progress_tick: Duration,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: 8,
            progress_tick: Duration::from_secs(1),
        }
    }
}

impl From<&AppConfig> for OrchestratorSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            max_concurrent_tasks: config.orchestrator.max_concurrent_tasks.max(1),
            progress_tick: Duration::from_millis(config.orchestrator.progress_tick_ms.max(1)),
        }
    }
}

pub struct TaskOrchestrator {
    registry: Arc<TaskRegistry>,
    status: Arc<StatusAggregator>,
    broadcaster: Arc<Broadcaster>,
    executor: Arc<dyn RemoteExecutor>,
    permits: Arc<Semaphore>,
    in_flight: Mutex<HashMap<String, CancellationToken>>,
    progress_tick: Duration,
}

impl TaskOrchestrator {
    pub fn new(
        registry: Arc<TaskRegistry>,
        status: Arc<StatusAggregator>,
        broadcaster: Arc<Broadcaster>,
        executor: Arc<dyn RemoteExecutor>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            registry,
            status,
            broadcaster,
            executor,
            permits: Arc::new(Semaphore::new(settings.max_concurrent_tasks.max(1))),
            in_flight: Mutex::new(HashMap::new()),
            progress_tick: settings.progress_tick,
        }
    }

    /// Wires a broadcaster, registry and status aggregator from `config`.
    pub fn from_config(
        config: &AppConfig,
        executor: Arc<dyn RemoteExecutor>,
        metrics: Arc<dyn MetricsSource>,
    ) -> Arc<Self> {
        let broadcaster = Arc::new(Broadcaster::new(config.broadcast.subscriber_buffer));
        let registry = Arc::new(TaskRegistry::new(broadcaster.clone()));
        let status = Arc::new(StatusAggregator::new(registry.clone(), metrics));
        Arc::new(Self::new(
            registry,
            status,
            broadcaster,
            executor,
            OrchestratorSettings::from(config),
        ))
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    pub fn status_aggregator(&self) -> &Arc<StatusAggregator> {
        &self.status
    }

    pub fn broadcaster(&self) -> &Arc<Broadcaster> {
        &self.broadcaster
    }

    /// Validates and registers a command, then starts executing it in the
    /// background. Returns the pending task without waiting for execution.
    ///
    /// Validation happens before any side effect: a rejected submission leaves
    /// the registry and counters untouched.
    pub async fn submit(
        self: &Arc<Self>,
        command: &str,
        user_id: &str,
        priority: i64,
    ) -> Result<Task> {
        let priority = validate_submission(command, priority)?;
        let intent = parse(command);

        let task = self.registry.create(command, intent, user_id, priority).await;
        let token = CancellationToken::new();
        self.in_flight()
            .insert(task.task_id.clone(), token.clone());

        tracing::info!(
            task_id = %task.task_id,
            intent = task.parsed_command.kind.name(),
            priority,
            "task submitted"
        );

        let this = Arc::clone(self);
        let task_id = task.task_id.clone();
        let span = tracing::info_span!("task", task_id = %task_id);
        tokio::spawn(async move { this.run(task_id, token).await }.instrument(span));

        Ok(task)
    }

    pub async fn get(&self, task_id: &str) -> Result<Task> {
        self.registry.get(task_id).await
    }

    pub async fn list(&self) -> Vec<Task> {
        self.registry.list().await
    }

    pub async fn status(&self) -> SystemStatus {
        self.status.snapshot().await
    }

    /// Cancels a pending or running task.
    ///
    /// Fails with `NotFound` for unknown ids and `InvalidState` for tasks that
    /// already finished. Does not wait for the execution unit to stop.
    pub async fn cancel(&self, task_id: &str) -> Result<Task> {
        let task = self
            .registry
            .transition(task_id, TaskStatus::Cancelled)
            .await?;
        if let Some(token) = self.forget(task_id) {
            token.cancel();
        }

        tracing::info!(task_id = %task_id, progress = task.progress, "task cancelled");
        self.status.publish_snapshot().await;
        Ok(task)
    }

    /// Emergency stop: raises the kill-switch flag, cancels every pending or
    /// running task and tells subscribers. Returns the cancelled tasks.
    pub async fn activate_kill_switch(&self, reason: &str) -> Vec<Task> {
        self.status.set_kill_switch(true).await;

        let cancelled = self.registry.cancel_all().await;
        let tokens: Vec<CancellationToken> = {
            let mut in_flight = self.in_flight();
            cancelled
                .iter()
                .filter_map(|task| in_flight.remove(&task.task_id))
                .collect()
        };
        for token in tokens {
            token.cancel();
        }

        tracing::warn!(reason, cancelled = cancelled.len(), "kill switch activated");
        self.broadcaster
            .publish(DashboardEvent::Notification(Notification::warning(
                "Kill Switch Activated",
                reason,
            )));
        self.status.publish_snapshot().await;
        cancelled
    }

    /// Clears the kill switch. Tasks cancelled by it stay cancelled.
    pub async fn reset_kill_switch(&self) {
        self.status.set_kill_switch(false).await;
        tracing::info!("kill switch reset");
        self.status.publish_snapshot().await;
    }

    /// Registers a live viewer, primed with the current status and task list.
    pub async fn subscribe(&self) -> Subscription {
        let status = self.status.snapshot().await;
        self.registry.subscribe(status).await
    }

    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.broadcaster.unsubscribe(id)
    }

    async fn run(self: Arc<Self>, task_id: String, token: CancellationToken) {
        let Some(permit) = self.acquire_permit(&token).await else {
            tracing::debug!("cancelled before start");
            self.forget(&task_id);
            return;
        };

        let task = match self.registry.transition(&task_id, TaskStatus::Running).await {
            Ok(task) => task,
            Err(e) => {
                // Cancelled between permit and start.
                tracing::debug!(error = %e, "task no longer runnable");
                self.forget(&task_id);
                return;
            }
        };
        self.status.publish_snapshot().await;

        match self.execute(&task, &token).await {
            Some(Ok(ExecutionOutcome::Succeeded)) => self.complete(&task).await,
            Some(Ok(ExecutionOutcome::Failed { reason })) => {
                let notification =
                    Notification::error("Task Failed", format!("Task failed: {}", task.command));
                self.fail(&task, reason, notification).await;
            }
            Some(Err(e)) => {
                let notification = Notification::error("Task Error", format!("Task error: {e}"));
                self.fail(&task, e.to_string(), notification).await;
            }
            None => tracing::debug!(progress = task.progress, "execution abandoned after cancel"),
        }

        drop(permit);
        self.forget(&task_id);
        self.status.publish_snapshot().await;
    }

    async fn acquire_permit(&self, token: &CancellationToken) -> Option<OwnedSemaphorePermit> {
        tokio::select! {
            biased;
            _ = token.cancelled() => None,
            permit = self.permits.clone().acquire_owned() => match permit {
                Ok(permit) => Some(permit),
                Err(e) => {
                    tracing::error!(error = %e, "concurrency limiter closed");
                    None
                }
            },
        }
    }

    /// Runs the executor for a running task. Returns `None` when the task was
    /// cancelled first; the in-flight call is dropped in that case.
    async fn execute(
        &self,
        task: &Task,
        token: &CancellationToken,
    ) -> Option<Result<ExecutionOutcome>> {
        let Some(instruction) = task.parsed_command.to_instruction() else {
            return Some(Ok(ExecutionOutcome::failed(format!(
                "no device instruction for '{}' intent",
                task.parsed_command.kind.name()
            ))));
        };

        tracing::debug!(executor = self.executor.name(), %instruction, "dispatching instruction");
        let started = Instant::now();
        let mut ticker = tokio::time::interval_at(started + self.progress_tick, self.progress_tick);
        let mut execution = self.executor.execute(instruction);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => return None,
                result = &mut execution => return Some(result),
                _ = ticker.tick() => {
                    self.advance_progress(task, started.elapsed()).await;
                }
            }
        }
    }

    async fn advance_progress(&self, task: &Task, elapsed: Duration) {
        let estimated = f64::from(task.estimated_duration.max(1));
        let percent = (elapsed.as_secs_f64() / estimated * 100.0)
            .min(f64::from(MAX_RUNNING_PROGRESS)) as u8;

        let result = self
            .registry
            .update(&task.task_id, |current| {
                if current.status == TaskStatus::Running && current.progress < percent {
                    current.progress = percent;
                }
            })
            .await;
        if let Err(e) = result {
            tracing::warn!(error = %e, "progress update failed");
        }
    }

    async fn complete(&self, task: &Task) {
        match self
            .registry
            .transition(&task.task_id, TaskStatus::Completed)
            .await
        {
            Ok(_) => {
                tracing::info!("task completed");
                self.broadcaster
                    .publish(DashboardEvent::Notification(Notification::success(
                        "Task Completed",
                        format!("Task completed: {}", task.command),
                    )));
            }
            Err(e) => self.discard_late_result(e),
        }
    }

    async fn fail(&self, task: &Task, reason: String, notification: Notification) {
        tracing::warn!(reason = %reason, "task failed");
        match self
            .registry
            .transition_with(&task.task_id, TaskStatus::Failed, |failed| {
                failed.error = Some(reason)
            })
            .await
        {
            Ok(_) => self
                .broadcaster
                .publish(DashboardEvent::Notification(notification)),
            Err(e) => self.discard_late_result(e),
        }
    }

    fn discard_late_result(&self, error: TaskdeckError) {
        if error.is_invalid_state() {
            tracing::debug!(error = %error, "discarding result for cancelled task");
        } else {
            tracing::error!(error = %error, "failed to record task outcome");
        }
    }

    fn forget(&self, task_id: &str) -> Option<CancellationToken> {
        self.in_flight().remove(task_id)
    }

    fn in_flight(&self) -> MutexGuard<'_, HashMap<String, CancellationToken>> {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
