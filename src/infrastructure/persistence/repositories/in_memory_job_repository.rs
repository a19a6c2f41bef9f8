use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::application::ports::{JobFilter, JobRepository, RepositoryError, TransitionOutcome};
use crate::domain::{Job, JobId, JobState, JobStatus, NewJob, TranscriptionId};

/// Process-local job store. Every write happens under one write lock, so readers
/// observe either the old or the new state of a transition, never a mix.
pub struct InMemoryJobRepository {
    jobs: RwLock<HashMap<JobId, Job>>,
    next_transcription_id: AtomicI64,
    available: AtomicBool,
}

impl InMemoryJobRepository {
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            next_transcription_id: AtomicI64::new(1),
            available: AtomicBool::new(true),
        }
    }

    /// Simulates losing the backing store; every call fails while unavailable.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> Result<(), RepositoryError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(RepositoryError::ConnectionFailed(
                "in-memory store marked unavailable".to_string(),
            ))
        }
    }
}

impl Default for InMemoryJobRepository {
    fn default() -> Self {
        Self::new()
    }
}

fn newest_first(jobs: &mut [Job]) {
    jobs.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then(b.transcription_id.cmp(&a.transcription_id))
    });
}

#[async_trait]
impl JobRepository for InMemoryJobRepository {
    async fn create(&self, job: &NewJob) -> Result<Job, RepositoryError> {
        self.ensure_available()?;
        let mut jobs = self.jobs.write().await;

        if jobs.contains_key(&job.id) {
            return Err(RepositoryError::ConstraintViolation(format!(
                "job {} already exists",
                job.id
            )));
        }
        if jobs.values().any(|j| j.filename == job.filename) {
            return Err(RepositoryError::ConstraintViolation(format!(
                "filename {} already exists",
                job.filename
            )));
        }

        let transcription_id =
            TranscriptionId::new(self.next_transcription_id.fetch_add(1, Ordering::SeqCst));
        let created = job.clone().into_job(transcription_id);
        jobs.insert(created.id, created.clone());

        tracing::debug!(job_id = %created.id, transcription_id = %transcription_id, "Job created");
        Ok(created)
    }

    async fn get_by_id(&self, id: JobId) -> Result<Option<Job>, RepositoryError> {
        self.ensure_available()?;
        Ok(self.jobs.read().await.get(&id).cloned())
    }

    async fn transition(
        &self,
        id: JobId,
        expected: &[JobStatus],
        next: JobState,
    ) -> Result<TransitionOutcome, RepositoryError> {
        self.ensure_available()?;
        let mut jobs = self.jobs.write().await;

        let Some(job) = jobs.get_mut(&id) else {
            return Ok(TransitionOutcome::Missing);
        };

        let current = job.status();
        if !expected.contains(&current) || !current.can_transition_to(next.status()) {
            return Ok(TransitionOutcome::Rejected { current });
        }

        job.state = next;
        job.updated_at = Utc::now();
        Ok(TransitionOutcome::Applied(job.clone()))
    }

    async fn list(&self, filter: JobFilter) -> Result<Vec<Job>, RepositoryError> {
        self.ensure_available()?;
        let jobs = self.jobs.read().await;

        let mut matching: Vec<Job> = jobs
            .values()
            .filter(|j| filter.status.is_none_or(|s| j.status() == s))
            .cloned()
            .collect();
        newest_first(&mut matching);

        Ok(matching
            .into_iter()
            .skip(filter.skip as usize)
            .take(filter.limit as usize)
            .collect())
    }

    async fn search_by_filename(&self, query: &str) -> Result<Vec<Job>, RepositoryError> {
        self.ensure_available()?;
        let needle = query.to_lowercase();
        let jobs = self.jobs.read().await;

        let mut matching: Vec<Job> = jobs
            .values()
            .filter(|j| j.filename.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        newest_first(&mut matching);
        Ok(matching)
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        self.ensure_available()
    }
}
