//! In-memory task registry.
//!
//! The registry owns every task for the process lifetime together with the
//! active/total counters. All mutations go through one lock, and each committed
//! change is published while that lock is held, so subscribers observe a
//! task's updates in the order they were applied.

use std::collections::HashMap;
use std::sync::Arc;

use taskdeck_core::error::{Result, TaskdeckError};
use taskdeck_core::event::DashboardEvent;
use taskdeck_core::intent::Intent;
use taskdeck_core::status::SystemStatus;
use taskdeck_core::task::{Task, TaskStatus};
use tokio::sync::Mutex;

use crate::broadcaster::{Broadcaster, Subscription};

/// Task counters kept in lockstep with the task list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TaskCounts {
    /// Tasks currently in `Running`.
    pub active: usize,
    /// Tasks ever created.
    pub total: u64,
}

#[derive(Default)]
struct RegistryState {
    tasks: Vec<Task>,
    index: HashMap<String, usize>,
    counts: TaskCounts,
}

impl RegistryState {
    fn get_mut(&mut self, task_id: &str) -> Result<&mut Task> {
        let position = *self
            .index
            .get(task_id)
            .ok_or_else(|| TaskdeckError::not_found("task", task_id))?;
        Ok(&mut self.tasks[position])
    }

    fn apply_transition(&mut self, task_id: &str, next: TaskStatus) -> Result<Task> {
        let task = self.get_mut(task_id)?;
        let previous = task.status;
        task.transition(next)?;
        let updated = task.clone();

        if previous == TaskStatus::Running {
            self.counts.active -= 1;
        }
        if next == TaskStatus::Running {
            self.counts.active += 1;
        }
        Ok(updated)
    }

    fn fill_counts(&self, status: &mut SystemStatus) {
        status.performance.active_tasks = self.counts.active;
        status.performance.total_tasks = self.counts.total;
    }
}

/// Insertion-ordered store of tasks.
pub struct TaskRegistry {
    state: Mutex<RegistryState>,
    broadcaster: Arc<Broadcaster>,
}

impl TaskRegistry {
    pub fn new(broadcaster: Arc<Broadcaster>) -> Self {
        Self {
            state: Mutex::new(RegistryState::default()),
            broadcaster,
        }
    }

    /// Registers a new pending task and announces it.
    pub async fn create(
        &self,
        command: &str,
        parsed_command: Intent,
        user_id: &str,
        priority: u8,
    ) -> Task {
        let task = Task::new(command, parsed_command, user_id, priority);

        let mut state = self.state.lock().await;
        let position = state.tasks.len();
        state.index.insert(task.task_id.clone(), position);
        state.tasks.push(task.clone());
        state.counts.total += 1;
        self.broadcaster
            .publish(DashboardEvent::TaskUpdate(task.clone()));

        tracing::debug!(task_id = %task.task_id, total = state.counts.total, "task registered");
        task
    }

    pub async fn get(&self, task_id: &str) -> Result<Task> {
        let mut state = self.state.lock().await;
        state.get_mut(task_id).map(|task| task.clone())
    }

    /// All tasks in creation order.
    pub async fn list(&self) -> Vec<Task> {
        self.state.lock().await.tasks.clone()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.tasks.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn counts(&self) -> TaskCounts {
        self.state.lock().await.counts
    }

    /// Task list and counters read under one lock.
    pub async fn snapshot(&self) -> (Vec<Task>, TaskCounts) {
        let state = self.state.lock().await;
        (state.tasks.clone(), state.counts)
    }

    /// Fills the task counters of `status` and broadcasts it.
    ///
    /// Counting and publishing share the registry lock, so a status event is
    /// never ordered before a task change its counters already include.
    pub async fn publish_status(&self, mut status: SystemStatus) -> SystemStatus {
        let state = self.state.lock().await;
        state.fill_counts(&mut status);
        self.broadcaster
            .publish(DashboardEvent::SystemStatus(status.clone()));
        status
    }

    /// Applies `mutator` to a task atomically and publishes the result if it
    /// changed anything. Status changes must go through [`Self::transition`];
    /// a mutator that alters the status is rejected and nothing is committed.
    pub async fn update<F>(&self, task_id: &str, mutator: F) -> Result<Task>
    where
        F: FnOnce(&mut Task),
    {
        let mut state = self.state.lock().await;
        let task = state.get_mut(task_id)?;

        let mut candidate = task.clone();
        mutator(&mut candidate);
        if candidate.status != task.status || candidate.task_id != task.task_id {
            return Err(TaskdeckError::invalid_state(
                "task",
                task_id,
                "status and identity can only change through a transition",
            ));
        }
        if candidate == *task {
            return Ok(candidate);
        }

        *task = candidate.clone();
        self.broadcaster
            .publish(DashboardEvent::TaskUpdate(candidate.clone()));
        Ok(candidate)
    }

    /// Moves a task along its lifecycle and publishes the new state.
    ///
    /// Fails with `NotFound` for unknown ids and `InvalidState` when the
    /// lifecycle forbids the move; neither case changes anything.
    pub async fn transition(&self, task_id: &str, next: TaskStatus) -> Result<Task> {
        self.transition_with(task_id, next, |_| {}).await
    }

    /// Like [`Self::transition`], then applies `decorate` (e.g. to record a
    /// failure reason) before the update is published.
    pub async fn transition_with<F>(
        &self,
        task_id: &str,
        next: TaskStatus,
        decorate: F,
    ) -> Result<Task>
    where
        F: FnOnce(&mut Task),
    {
        let mut state = self.state.lock().await;
        state.apply_transition(task_id, next)?;

        let task = state.get_mut(task_id)?;
        decorate(task);
        let updated = task.clone();

        self.broadcaster
            .publish(DashboardEvent::TaskUpdate(updated.clone()));
        tracing::debug!(
            task_id = %task_id,
            status = %next,
            active = state.counts.active,
            "task transitioned"
        );
        Ok(updated)
    }

    /// Cancels every pending or running task in one critical section and
    /// returns the cancelled tasks.
    pub async fn cancel_all(&self) -> Vec<Task> {
        let mut state = self.state.lock().await;
        let targets: Vec<String> = state
            .tasks
            .iter()
            .filter(|task| !task.status.is_terminal())
            .map(|task| task.task_id.clone())
            .collect();

        let mut cancelled = Vec::with_capacity(targets.len());
        for task_id in targets {
            match state.apply_transition(&task_id, TaskStatus::Cancelled) {
                Ok(task) => {
                    self.broadcaster
                        .publish(DashboardEvent::TaskUpdate(task.clone()));
                    cancelled.push(task);
                }
                Err(e) => tracing::warn!(task_id = %task_id, error = %e, "bulk cancel skipped task"),
            }
        }
        cancelled
    }

    /// Registers a subscriber primed with `status` and the current task list.
    ///
    /// The snapshot is taken under the registry lock, so the subscriber sees
    /// every later task update and none that the snapshot already includes.
    pub async fn subscribe(&self, mut status: SystemStatus) -> Subscription {
        let state = self.state.lock().await;
        state.fill_counts(&mut status);

        self.broadcaster.subscribe(vec![
            DashboardEvent::SystemStatus(status),
            DashboardEvent::TasksUpdate {
                tasks: state.tasks.clone(),
            },
        ])
    }
}
