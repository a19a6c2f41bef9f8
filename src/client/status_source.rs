use async_trait::async_trait;

use crate::domain::{JobId, JobState};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("unexpected status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("invalid response: {0}")]
    Protocol(String),
}

/// Read side of the job record store, as seen by a polling client.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn fetch_status(&self, job_id: JobId) -> Result<JobState, TransportError>;
}
