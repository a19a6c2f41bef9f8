use chrono::{DateTime, Utc};

use super::{JobId, JobState, JobStatus, StoragePath, TranscriptionId};

#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: JobId,
    pub transcription_id: TranscriptionId,
    pub filename: String,
    pub original_filename: String,
    pub storage_path: StoragePath,
    pub state: JobState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn status(&self) -> JobStatus {
        self.state.status()
    }
}

/// A job record before the store has assigned its transcription number.
#[derive(Debug, Clone, PartialEq)]
pub struct NewJob {
    pub id: JobId,
    pub filename: String,
    pub original_filename: String,
    pub storage_path: StoragePath,
    pub created_at: DateTime<Utc>,
}

impl NewJob {
    pub fn new(filename: String, original_filename: String) -> Self {
        let id = JobId::new();
        Self {
            storage_path: StoragePath::new(&id, &filename),
            id,
            filename,
            original_filename,
            created_at: Utc::now(),
        }
    }

    pub fn into_job(self, transcription_id: TranscriptionId) -> Job {
        Job {
            id: self.id,
            transcription_id,
            filename: self.filename,
            original_filename: self.original_filename,
            storage_path: self.storage_path,
            state: JobState::Queued,
            created_at: self.created_at,
            updated_at: self.created_at,
        }
    }
}
