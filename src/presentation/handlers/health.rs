use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;

use crate::domain::{HealthReport, HealthSignal};
use crate::presentation::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub model_loaded: bool,
    pub db_healthy: bool,
    pub queue_healthy: bool,
    pub workers_active: bool,
    pub issues: Vec<String>,
}

impl From<&HealthReport> for HealthResponse {
    fn from(report: &HealthReport) -> Self {
        Self {
            status: report.status.as_str().to_string(),
            timestamp: report.checked_at.to_rfc3339(),
            model_loaded: report.passed(HealthSignal::ModelLoaded),
            db_healthy: report.passed(HealthSignal::Database),
            queue_healthy: report.passed(HealthSignal::Queue),
            workers_active: report.passed(HealthSignal::Workers),
            issues: report.issues.clone(),
        }
    }
}

/// Serves the latest sampled report; a degraded system still answers 200.
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let report = state.health_monitor.latest();
    (StatusCode::OK, Json(HealthResponse::from(&report)))
}

#[derive(Serialize)]
pub struct RootResponse {
    pub message: String,
}

pub async fn root_handler() -> impl IntoResponse {
    Json(RootResponse {
        message: "Ok".to_string(),
    })
}
