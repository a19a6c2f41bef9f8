use axum::Json;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::application::services::{FileSubmission, SubmissionError};
use crate::domain::{AudioUpload, JobStatus};
use crate::presentation::state::AppState;

use super::error::error_response;

const FILES_FIELD: &str = "files";

#[derive(Serialize)]
pub struct TaskResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcription_id: Option<i64>,
    pub filename: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&FileSubmission> for TaskResponse {
    fn from(file: &FileSubmission) -> Self {
        let job = file.job();
        match file {
            FileSubmission::Accepted { job, .. } => Self {
                task_id: Some(job.id.to_string()),
                transcription_id: Some(job.transcription_id.value()),
                filename: file.original_filename().to_string(),
                status: job.status().as_str().to_string(),
                error: None,
            },
            FileSubmission::Rejected { error, .. } => Self {
                task_id: job.map(|j| j.id.to_string()),
                transcription_id: job.map(|j| j.transcription_id.value()),
                filename: file.original_filename().to_string(),
                status: JobStatus::Failed.as_str().to_string(),
                error: Some(error.to_string()),
            },
        }
    }
}

#[derive(Serialize)]
pub struct TranscribeResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub tasks: Vec<TaskResponse>,
}

#[tracing::instrument(skip(state, multipart))]
pub async fn transcribe_handler(State(state): State<AppState>, multipart: Multipart) -> Response {
    let uploads = match read_uploads(multipart).await {
        Ok(uploads) => uploads,
        Err(response) => return response,
    };

    tracing::debug!(files = uploads.len(), "Received transcription batch");

    let batch = match state.submission_service.submit(uploads).await {
        Ok(batch) => batch,
        Err(SubmissionError::Validation(e)) => {
            tracing::warn!(error = %e, "Rejected transcription batch");
            let status = if e.is_size_limit() {
                StatusCode::PAYLOAD_TOO_LARGE
            } else {
                StatusCode::BAD_REQUEST
            };
            return error_response(status, e.to_string());
        }
    };

    let tasks: Vec<TaskResponse> = batch.files.iter().map(TaskResponse::from).collect();

    if batch.all_rejected() {
        tracing::error!(files = batch.len(), "No file of the batch could be queued");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(TranscribeResponse {
                error: Some("No file could be queued for transcription".to_string()),
                tasks,
            }),
        )
            .into_response();
    }

    (
        StatusCode::ACCEPTED,
        Json(TranscribeResponse { error: None, tasks }),
    )
        .into_response()
}

async fn read_uploads(mut multipart: Multipart) -> Result<Vec<AudioUpload>, Response> {
    let mut uploads = Vec::new();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read multipart");
                return Err(error_response(
                    e.status(),
                    format!("Failed to read multipart: {}", e.body_text()),
                ));
            }
        };

        if field.name() != Some(FILES_FIELD) {
            continue;
        }

        let filename = field.file_name().map(String::from);
        let content_type = field.content_type().map(String::from);
        let data = field.bytes().await.map_err(|e| {
            tracing::warn!(error = %e, "Failed to read file bytes");
            error_response(e.status(), format!("Failed to read file: {}", e.body_text()))
        })?;

        uploads.push(AudioUpload {
            filename,
            content_type,
            data,
        });
    }

    Ok(uploads)
}
