use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::application::ports::{DEFAULT_LIST_LIMIT, JobFilter, MAX_LIST_LIMIT};
use crate::application::services::sanitize_search_query;
use crate::domain::JobStatus;
use crate::presentation::state::AppState;

use super::error::error_response;
use super::job_view::TranscriptionView;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub skip: Option<u32>,
    pub limit: Option<u32>,
    pub status: Option<String>,
}

#[tracing::instrument(skip(state))]
pub async fn list_transcriptions_handler(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Response {
    let limit = params.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    if !(1..=MAX_LIST_LIMIT).contains(&limit) {
        return error_response(
            StatusCode::BAD_REQUEST,
            format!("limit must be between 1 and {}", MAX_LIST_LIMIT),
        );
    }

    let status = match params.status.as_deref().map(str::parse::<JobStatus>) {
        None => None,
        Some(Ok(status)) => Some(status),
        Some(Err(e)) => return error_response(StatusCode::BAD_REQUEST, e),
    };

    let filter = JobFilter {
        status,
        skip: params.skip.unwrap_or(0),
        limit,
    };

    match state.job_repository.list(filter).await {
        Ok(jobs) => {
            let views: Vec<TranscriptionView> = jobs.iter().map(TranscriptionView::from).collect();
            (StatusCode::OK, Json(views)).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to list transcriptions");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to list transcriptions",
            )
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub filename: String,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub results: Vec<TranscriptionView>,
    pub query: String,
}

#[tracing::instrument(skip(state))]
pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Response {
    let query = sanitize_search_query(&params.filename);
    if query.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Invalid search query");
    }

    match state.job_repository.search_by_filename(&query).await {
        Ok(jobs) => (
            StatusCode::OK,
            Json(SearchResponse {
                results: jobs.iter().map(TranscriptionView::from).collect(),
                query,
            }),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to search transcriptions");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Search failed")
        }
    }
}
