use serde::Serialize;

use crate::domain::Job;

/// A stored transcription record as returned by listing and search.
#[derive(Serialize)]
pub struct TranscriptionView {
    pub id: i64,
    pub task_id: String,
    pub filename: String,
    pub original_filename: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&Job> for TranscriptionView {
    fn from(job: &Job) -> Self {
        Self {
            id: job.transcription_id.value(),
            task_id: job.id.to_string(),
            filename: job.filename.clone(),
            original_filename: job.original_filename.clone(),
            status: job.status().as_str().to_string(),
            text: job.state.text().map(String::from),
            error: job.state.error().map(String::from),
            created_at: job.created_at.to_rfc3339(),
            updated_at: job.updated_at.to_rfc3339(),
        }
    }
}
