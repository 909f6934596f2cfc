//! Task domain model.
//!
//! This module contains the core Task entity and its lifecycle state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;
use uuid::Uuid;

use crate::error::{Result, TaskdeckError};
use crate::intent::Intent;

/// Lowest accepted task priority.
pub const MIN_PRIORITY: u8 = 1;
/// Highest accepted task priority.
pub const MAX_PRIORITY: u8 = 10;
/// Priority used when a submission does not specify one.
pub const DEFAULT_PRIORITY: u8 = 5;

/// Represents the current status of a task.
///
/// Tasks progress through these states as they are processed:
/// `Pending → Running → {Completed | Failed | Cancelled}`, with
/// `Pending → Cancelled` also allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TaskStatus {
    /// The task has been created but is not yet running.
    Pending,
    /// The task is currently being executed.
    Running,
    /// The task completed successfully.
    Completed,
    /// The task failed during execution.
    Failed,
    /// The task was cancelled before it finished.
    Cancelled,
}

impl TaskStatus {
    /// Returns true for states no task ever leaves.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }

    /// Whether the lifecycle allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Pending, Cancelled)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Cancelled)
        )
    }
}

/// The unit of work tracked by the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// A unique identifier for the task.
    pub task_id: String,
    /// The user's original command text.
    pub command: String,
    /// The interpreted command.
    pub parsed_command: Intent,
    /// The current status of the task.
    pub status: TaskStatus,
    pub priority: u8,
    pub user_id: String,
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    /// Set once, when the task reaches a terminal state.
    pub finished_at: Option<DateTime<Utc>>,
    /// Completion percentage (0-100).
    pub progress: u8,
    /// Informational estimate in seconds.
    pub estimated_duration: u32,
    /// Failure reason, if the task failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Task {
    /// Creates a pending task with a fresh identifier.
    pub fn new(
        command: impl Into<String>,
        parsed_command: Intent,
        user_id: impl Into<String>,
        priority: u8,
    ) -> Self {
        let estimated_duration = parsed_command.estimated_duration_secs();
        Self {
            task_id: Uuid::new_v4().to_string(),
            command: command.into(),
            parsed_command,
            status: TaskStatus::Pending,
            priority,
            user_id: user_id.into(),
            session_id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            finished_at: None,
            progress: 0,
            estimated_duration,
            error: None,
        }
    }

    /// Moves the task to `next`, applying the progress and timestamp rules of
    /// the target state. Fails with `InvalidState` if the lifecycle forbids it;
    /// the task is left untouched in that case.
    pub fn transition(&mut self, next: TaskStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(TaskdeckError::invalid_state(
                "task",
                &self.task_id,
                format!("cannot move from {} to {}", self.status, next),
            ));
        }

        self.status = next;
        match next {
            TaskStatus::Completed => self.progress = 100,
            TaskStatus::Failed => self.progress = 0,
            // Cancellation keeps whatever progress was reached.
            TaskStatus::Pending | TaskStatus::Running | TaskStatus::Cancelled => {}
        }
        if next.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
        Ok(())
    }
}

/// Checks the submission rules shared by every entry point and returns the
/// priority narrowed to its stored width.
pub fn validate_submission(command: &str, priority: i64) -> Result<u8> {
    if command.trim().is_empty() {
        return Err(TaskdeckError::validation("command must not be empty"));
    }
    if !(i64::from(MIN_PRIORITY)..=i64::from(MAX_PRIORITY)).contains(&priority) {
        return Err(TaskdeckError::validation(format!(
            "priority must be between {} and {}, got {}",
            MIN_PRIORITY, MAX_PRIORITY, priority
        )));
    }
    Ok(priority as u8)
}
