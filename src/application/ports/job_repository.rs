use async_trait::async_trait;

use crate::domain::{Job, JobId, JobState, JobStatus, NewJob};

use super::RepositoryError;

pub const DEFAULT_LIST_LIMIT: u32 = 100;
pub const MAX_LIST_LIMIT: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub skip: u32,
    pub limit: u32,
}

impl Default for JobFilter {
    fn default() -> Self {
        Self {
            status: None,
            skip: 0,
            limit: DEFAULT_LIST_LIMIT,
        }
    }
}

impl JobFilter {
    pub fn with_status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

/// Result of a compare-and-set state transition.
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionOutcome {
    Applied(Job),
    Rejected { current: JobStatus },
    Missing,
}

#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Persists a new record in `queued` and assigns its transcription number.
    async fn create(&self, job: &NewJob) -> Result<Job, RepositoryError>;

    async fn get_by_id(&self, id: JobId) -> Result<Option<Job>, RepositoryError>;

    /// Atomically moves the job to `next` if its current status is one of `expected`
    /// and the edge is legal. Status and payload are written together.
    async fn transition(
        &self,
        id: JobId,
        expected: &[JobStatus],
        next: JobState,
    ) -> Result<TransitionOutcome, RepositoryError>;

    /// Newest first.
    async fn list(&self, filter: JobFilter) -> Result<Vec<Job>, RepositoryError>;

    /// Substring match on the stored filename, newest first.
    async fn search_by_filename(&self, query: &str) -> Result<Vec<Job>, RepositoryError>;

    async fn ping(&self) -> Result<(), RepositoryError>;
}
