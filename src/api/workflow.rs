//! Workflow control routes.

use std::convert::Infallible;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{
        IntoResponse,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use futures::Stream;
use tracing::{debug, info};

use crate::api::{ApiState, supervisor_error};
use crate::workflow::StartRequest;

pub fn workflow_routes(state: ApiState) -> Router {
    Router::new()
        .route("/api/workflow/start", post(start))
        .route("/api/workflow/status/{subject}", get(status))
        .route("/api/workflow/cancel/{subject}", post(cancel))
        .route("/api/workflow/results/{subject}", get(results))
        .route("/api/workflow/stream/{subject}", get(stream))
        .with_state(state)
}

async fn start(State(state): State<ApiState>, Json(body): Json<StartRequest>) -> impl IntoResponse {
    let subject = body.subject.clone();
    match state.supervisor.start(body).await {
        Ok(run_id) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "started",
                "subject": subject,
                "run_id": run_id,
            })),
        ),
        Err(e) => supervisor_error(e),
    }
}

async fn status(State(state): State<ApiState>, Path(subject): Path<String>) -> impl IntoResponse {
    match state.supervisor.status(&subject).await {
        Ok(report) => (StatusCode::OK, Json(serde_json::json!(report))),
        Err(e) => supervisor_error(e),
    }
}

async fn cancel(State(state): State<ApiState>, Path(subject): Path<String>) -> impl IntoResponse {
    match state.supervisor.cancel(&subject).await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "cancelling",
                "message": "Run will stop before its next submission",
            })),
        ),
        Err(e) => supervisor_error(e),
    }
}

async fn results(State(state): State<ApiState>, Path(subject): Path<String>) -> impl IntoResponse {
    match state.supervisor.results(&subject).await {
        Ok(results) => (StatusCode::OK, Json(serde_json::json!(results))),
        Err(e) => supervisor_error(e),
    }
}

async fn stream(
    State(state): State<ApiState>,
    Path(subject): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!(subject = %subject, "Progress stream client connected");
    let subscription = state.supervisor.subscribe(&subject).await;

    let events = futures::stream::unfold(subscription, |mut subscription| async move {
        let event = subscription.next().await?;
        let sse = Event::default()
            .event(event.event_type())
            .json_data(&event)
            .unwrap_or_else(|e| {
                debug!(error = %e, "Failed to encode progress event");
                Event::default().comment("encoding error")
            });
        Some((Ok(sse), subscription))
    });

    Sse::new(events).keep_alive(KeepAlive::new().interval(state.keepalive))
}
