//! Application tracker routes.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::api::ApiState;
use crate::model::{ApplicationRecord, ApplicationStatus};

pub fn tracker_routes(state: ApiState) -> Router {
    Router::new()
        .route(
            "/api/tracker/applications/{subject}",
            get(list_applications).delete(purge_applications),
        )
        .route(
            "/api/tracker/applications/{subject}/{posting_id}",
            get(application_detail),
        )
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    status: Option<String>,
}

/// Counts over a list of records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackerSummary {
    pub total: usize,
    pub submitted: usize,
    pub failed: usize,
    /// Percentage submitted, one decimal place.
    pub success_rate: f64,
}

impl TrackerSummary {
    pub fn of(records: &[ApplicationRecord]) -> Self {
        let total = records.len();
        let count = |status: ApplicationStatus| records.iter().filter(|r| r.status == status).count();
        let submitted = count(ApplicationStatus::Submitted);
        let failed = count(ApplicationStatus::Failed);
        let success_rate = if total == 0 {
            0.0
        } else {
            (submitted as f64 / total as f64 * 1000.0).round() / 10.0
        };
        Self {
            total,
            submitted,
            failed,
            success_rate,
        }
    }
}

fn store_failure(e: impl std::fmt::Display) -> (StatusCode, Json<serde_json::Value>) {
    error!(error = %e, "Tracker store failure");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({"error": e.to_string()})),
    )
}

async fn list_applications(
    State(state): State<ApiState>,
    Path(subject): Path<String>,
    Query(query): Query<ListQuery>,
) -> impl IntoResponse {
    let filter = match query.status.as_deref().filter(|s| !s.is_empty()) {
        None => None,
        Some(raw) => match ApplicationStatus::parse(raw) {
            Some(status) => Some(status),
            None => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(serde_json::json!({"error": format!("Unknown status filter: {raw}")})),
                );
            }
        },
    };

    let mut records = match state.store.list_by_subject(&subject).await {
        Ok(records) => records,
        Err(e) => return store_failure(e),
    };
    if let Some(status) = filter {
        records.retain(|r| r.status == status);
    }

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "subject": subject,
            "summary": TrackerSummary::of(&records),
            "applications": records,
        })),
    )
}

async fn application_detail(
    State(state): State<ApiState>,
    Path((subject, posting_id)): Path<(String, String)>,
) -> impl IntoResponse {
    match state.store.get(&subject, &posting_id).await {
        Ok(Some(record)) => (StatusCode::OK, Json(serde_json::json!(record))),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": "Application not found"})),
        ),
        Err(e) => store_failure(e),
    }
}

async fn purge_applications(
    State(state): State<ApiState>,
    Path(subject): Path<String>,
) -> impl IntoResponse {
    match state.store.delete_by_subject(&subject).await {
        Ok(removed) => {
            info!(subject = %subject, removed, "Purged application records");
            (
                StatusCode::OK,
                Json(serde_json::json!({"success": true, "removed": removed})),
            )
        }
        Err(e) => store_failure(e),
    }
}
