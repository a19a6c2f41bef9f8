use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::domain::{Job, JobId};
use crate::presentation::state::AppState;

use super::error::error_response;

#[derive(Serialize)]
pub struct StatusResponse {
    pub status: String,
    pub task_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcription_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&Job> for StatusResponse {
    fn from(job: &Job) -> Self {
        Self {
            status: job.status().as_str().to_string(),
            task_id: job.id.to_string(),
            transcription_id: Some(job.transcription_id.value()),
            text: job.state.text().map(String::from),
            error: job.state.error().map(String::from),
        }
    }
}

#[tracing::instrument(skip(state))]
pub async fn status_handler(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Response {
    let job_id: JobId = match task_id.parse() {
        Ok(id) => id,
        Err(_) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                format!("Invalid task ID: {}", task_id),
            );
        }
    };

    match state.job_repository.get_by_id(job_id).await {
        Ok(Some(job)) => (StatusCode::OK, Json(StatusResponse::from(&job))).into_response(),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            format!("Task not found: {}", task_id),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to fetch task status");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to fetch task status",
            )
        }
    }
}
