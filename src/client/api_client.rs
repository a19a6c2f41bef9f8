use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use crate::domain::{
    AudioUpload, HealthReport, HealthSignal, HealthStatus, JobId, JobState, JobStatus,
    SignalReading,
};

use super::{StatusSource, TransportError};

const RATE_LIMIT_HEADER: &str = "x-ratelimit-limit";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("rate limit exceeded{}", .limit.as_deref().map(|l| format!(": {}", l)).unwrap_or_default())]
    RateLimited { limit: Option<String> },
    #[error("submission rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// One entry of a submission response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SubmittedTask {
    pub task_id: Option<String>,
    pub transcription_id: Option<i64>,
    pub filename: String,
    pub status: String,
    pub error: Option<String>,
}

impl SubmittedTask {
    pub fn job_id(&self) -> Option<JobId> {
        self.task_id.as_deref().and_then(|id| id.parse().ok())
    }

    /// A task the server created and queued, as opposed to one that failed on arrival.
    pub fn is_queued(&self) -> bool {
        self.job_id().is_some() && self.status != JobStatus::Failed.as_str()
    }
}

/// Submission side of the service, as seen by a client.
#[async_trait]
pub trait JobSubmitter: Send + Sync {
    async fn submit(&self, files: Vec<AudioUpload>) -> Result<Vec<SubmittedTask>, SubmitError>;
}

#[derive(Deserialize)]
struct SubmitResponse {
    tasks: Vec<SubmittedTask>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
    limit: Option<String>,
}

#[derive(Deserialize)]
struct StatusBody {
    status: String,
    text: Option<String>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct HealthBody {
    status: String,
    timestamp: Option<DateTime<Utc>>,
    model_loaded: bool,
    db_healthy: bool,
    queue_healthy: bool,
    workers_active: bool,
    #[serde(default)]
    issues: Vec<String>,
}

impl HealthBody {
    fn into_report(self) -> HealthReport {
        let readings: Vec<SignalReading> = [
            (HealthSignal::ModelLoaded, self.model_loaded),
            (HealthSignal::Database, self.db_healthy),
            (HealthSignal::Queue, self.queue_healthy),
            (HealthSignal::Workers, self.workers_active),
        ]
        .into_iter()
        .map(|(signal, passed)| SignalReading {
            signal,
            passed,
            detail: None,
        })
        .collect();

        let healthy = self.status == HealthStatus::Healthy.as_str() && readings.iter().all(|r| r.passed);
        HealthReport {
            status: if healthy {
                HealthStatus::Healthy
            } else {
                HealthStatus::Degraded
            },
            checked_at: self.timestamp.unwrap_or_else(Utc::now),
            readings,
            issues: self.issues,
        }
    }
}

/// HTTP client for the transcription API.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, TransportError> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn status(&self, job_id: JobId) -> Result<JobState, TransportError> {
        let response = self
            .http
            .get(self.url(&format!("/api/v1/status/{}", job_id)))
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = error_message(response).await;
            return Err(TransportError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let body: StatusBody = response
            .json()
            .await
            .map_err(|e| TransportError::Protocol(e.to_string()))?;
        let job_status: JobStatus = body.status.parse().map_err(TransportError::Protocol)?;
        JobState::from_parts(job_status, body.text, body.error).map_err(TransportError::Protocol)
    }

    /// Never fails: an unreachable or unreadable endpoint is reported as degraded.
    pub async fn health(&self) -> HealthReport {
        let response = match self.http.get(self.url("/api/v1/health")).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "Health endpoint unreachable");
                return HealthReport::unreachable(format!("health endpoint unreachable: {}", e));
            }
        };

        if !response.status().is_success() {
            return HealthReport::unreachable(format!(
                "health endpoint returned {}",
                response.status()
            ));
        }

        match response.json::<HealthBody>().await {
            Ok(body) => body.into_report(),
            Err(e) => HealthReport::unreachable(format!("invalid health response: {}", e)),
        }
    }
}

#[async_trait]
impl JobSubmitter for ApiClient {
    async fn submit(&self, files: Vec<AudioUpload>) -> Result<Vec<SubmittedTask>, SubmitError> {
        let mut form = Form::new();
        for file in files {
            let filename = file.display_name().to_string();
            let mime = file.content_type.as_deref().unwrap_or("audio/mpeg");
            let part = Part::stream(file.data.clone())
                .file_name(filename)
                .mime_str(mime)
                .map_err(|e| TransportError::Request(e.to_string()))?;
            form = form.part("files", part);
        }

        let response = self
            .http
            .post(self.url("/api/v1/transcribe"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let header_limit = response
                .headers()
                .get(RATE_LIMIT_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(String::from);
            let body_limit = response
                .json::<ErrorBody>()
                .await
                .ok()
                .and_then(|b| b.limit);
            return Err(SubmitError::RateLimited {
                limit: body_limit.or(header_limit),
            });
        }

        if !status.is_success() {
            return Err(SubmitError::Rejected {
                status: status.as_u16(),
                message: error_message(response).await,
            });
        }

        let body: SubmitResponse = response
            .json()
            .await
            .map_err(|e| TransportError::Protocol(e.to_string()))?;
        Ok(body.tasks)
    }
}

#[async_trait]
impl StatusSource for ApiClient {
    async fn fetch_status(&self, job_id: JobId) -> Result<JobState, TransportError> {
        self.status(job_id).await
    }
}

async fn error_message(response: reqwest::Response) -> String {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorBody>(&text) {
        Ok(ErrorBody {
            error: Some(error), ..
        }) => error,
        _ if !text.is_empty() => text,
        _ => status.to_string(),
    }
}
