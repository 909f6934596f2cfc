use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use taskdeck_core::TaskdeckError;
use taskdeck_core::status::SystemStatus;
use taskdeck_core::task::{DEFAULT_PRIORITY, Task, TaskStatus};

use crate::AppState;

const DEFAULT_USER: &str = "web_user";
const DEFAULT_KILL_REASON: &str = "Emergency stop activated";

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

/// Domain error rendered as `{code, message}` with a matching status code.
#[derive(Debug)]
pub struct ApiError(TaskdeckError);

impl From<TaskdeckError> for ApiError {
    fn from(err: TaskdeckError) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match &self.0 {
            TaskdeckError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation"),
            TaskdeckError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
            TaskdeckError::InvalidState { .. } => (StatusCode::BAD_REQUEST, "invalid_state"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        (
            status,
            Json(ErrorBody {
                code: code.to_string(),
                message: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

fn default_user() -> String {
    DEFAULT_USER.to_string()
}

fn default_priority() -> i64 {
    i64::from(DEFAULT_PRIORITY)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TaskRequest {
    pub command: String,
    #[serde(default = "default_user")]
    pub user_id: String,
    #[serde(default = "default_priority")]
    pub priority: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TaskResponse {
    pub task_id: String,
    pub command: String,
    pub status: TaskStatus,
    pub priority: u8,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub estimated_duration: u32,
}

impl From<Task> for TaskResponse {
    fn from(task: Task) -> Self {
        Self {
            task_id: task.task_id,
            command: task.command,
            status: task.status,
            priority: task.priority,
            user_id: task.user_id,
            created_at: task.created_at,
            estimated_duration: task.estimated_duration,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct KillSwitchRequest {
    pub reason: Option<String>,
}

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let status = state.orchestrator.status().await;
    let uptime = Utc::now() - state.started_at;
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now(),
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": uptime.num_seconds(),
        "components": status.components,
    }))
}

pub async fn create_task(
    State(state): State<AppState>,
    Json(request): Json<TaskRequest>,
) -> Result<Json<TaskResponse>, ApiError> {
    let task = state
        .orchestrator
        .submit(&request.command, &request.user_id, request.priority)
        .await?;
    Ok(Json(task.into()))
}

pub async fn list_tasks(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "tasks": state.orchestrator.list().await }))
}

pub async fn get_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<Task>, ApiError> {
    Ok(Json(state.orchestrator.get(&task_id).await?))
}

pub async fn cancel_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.orchestrator.cancel(&task_id).await?;
    Ok(Json(json!({ "message": "Task cancelled successfully" })))
}

pub async fn system_status(State(state): State<AppState>) -> Json<SystemStatus> {
    Json(state.orchestrator.status().await)
}

pub async fn activate_kill_switch(
    State(state): State<AppState>,
    request: Option<Json<KillSwitchRequest>>,
) -> Json<Value> {
    let reason = request
        .and_then(|Json(body)| body.reason)
        .filter(|reason| !reason.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_KILL_REASON.to_string());

    state.orchestrator.activate_kill_switch(&reason).await;
    Json(json!({ "message": format!("Kill switch activated: {reason}") }))
}

pub async fn reset_kill_switch(State(state): State<AppState>) -> Json<Value> {
    state.orchestrator.reset_kill_switch().await;
    Json(json!({ "message": "Kill switch reset successfully" }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (TaskdeckError::validation("bad"), StatusCode::UNPROCESSABLE_ENTITY),
            (TaskdeckError::not_found("task", "x"), StatusCode::NOT_FOUND),
            (
                TaskdeckError::invalid_state("task", "x", "already completed"),
                StatusCode::BAD_REQUEST,
            ),
            (TaskdeckError::executor("boom"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), expected);
        }
    }

    #[test]
    fn test_request_defaults() {
        let request: TaskRequest = serde_json::from_str(r#"{"command": "scroll up"}"#).unwrap();
        assert_eq!(request.user_id, "web_user");
        assert_eq!(request.priority, 5);
    }
}
