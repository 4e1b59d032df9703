//! HTTP control surface.
//!
//! - `workflow`: start/status/cancel/results and the SSE progress stream
//! - `tracker`: application history per subject

pub mod tracker;
pub mod workflow;

use std::sync::Arc;
use std::time::Duration;

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use tracing::error;

use crate::error::SupervisorError;
use crate::jobboard::JobBoard;
use crate::store::ApplicationStore;
use crate::workflow::RunSupervisor;

pub use tracker::tracker_routes;
pub use workflow::workflow_routes;

/// Shared state for every route.
#[derive(Clone)]
pub struct ApiState {
    pub supervisor: Arc<RunSupervisor>,
    pub store: Arc<dyn ApplicationStore>,
    pub board: Arc<dyn JobBoard>,
    /// Idle interval between SSE keepalive comments.
    pub keepalive: Duration,
}

/// All routes, including `/health`.
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .with_state(state.clone())
        .merge(workflow_routes(state.clone()))
        .merge(tracker_routes(state))
}

async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    let job_board = state.board.health_check().await;
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "job_board": if job_board { "reachable" } else { "unreachable" },
    }))
}

pub(crate) fn supervisor_error(err: SupervisorError) -> (StatusCode, Json<serde_json::Value>) {
    let status = match &err {
        SupervisorError::NotFound { .. } => StatusCode::NOT_FOUND,
        SupervisorError::AlreadyRunning { .. } => StatusCode::CONFLICT,
        SupervisorError::InvalidProfile(_) => StatusCode::BAD_REQUEST,
        SupervisorError::Database(e) => {
            error!(error = %e, "Store failure while serving request");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Json(serde_json::json!({"error": err.to_string()})))
}
