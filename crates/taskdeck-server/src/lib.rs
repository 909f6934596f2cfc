//! HTTP and WebSocket surface of taskdeck.
//!
//! The binary in `main.rs` loads configuration, installs logging and calls
//! [`bootstrap::start`]; tests build the same [`router`] around their own
//! orchestrator.

pub mod bootstrap;
mod routes;
mod ws;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use chrono::{DateTime, Utc};
use taskdeck_execution::TaskOrchestrator;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use routes::{ApiError, ErrorBody, TaskRequest, TaskResponse};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<TaskOrchestrator>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(orchestrator: Arc<TaskOrchestrator>) -> Self {
        Self {
            orchestrator,
            started_at: Utc::now(),
        }
    }
}

/// Builds the full route table.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/tasks", post(routes::create_task).get(routes::list_tasks))
        .route(
            "/tasks/{task_id}",
            get(routes::get_task).delete(routes::cancel_task),
        )
        .route("/status", get(routes::system_status))
        .route("/kill-switch", post(routes::activate_kill_switch))
        .route("/kill-switch/reset", post(routes::reset_kill_switch))
        .route("/ws", get(ws::upgrade))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
