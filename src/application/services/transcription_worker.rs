use std::sync::Arc;
use std::time::Duration;

use crate::application::ports::{
    JobRepository, RepositoryError, StagingStore, TranscriptionEngine, TranscriptionError,
    TransitionOutcome, WorkQueue, WorkQueueError,
};
use crate::domain::{Delivery, JobState, JobStatus, StoragePath};

pub const DEFAULT_TASK_TIME_LIMIT: Duration = Duration::from_secs(180);

/// What the worker did with one delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkOutcome {
    Completed,
    Failed,
    /// Duplicate or stale delivery: the job was terminal, owned elsewhere, or unknown.
    Skipped { current: Option<JobStatus> },
}

/// Takes one job from `queued` through `processing` to a terminal state.
///
/// Only the worker holding a delivery writes to its job, and every write is a
/// compare-and-set, so a redelivered item can never overwrite a stored result.
pub struct TranscriptionWorker {
    job_repository: Arc<dyn JobRepository>,
    staging_store: Arc<dyn StagingStore>,
    engine: Arc<dyn TranscriptionEngine>,
    work_queue: Arc<dyn WorkQueue>,
    task_time_limit: Duration,
}

impl TranscriptionWorker {
    pub fn new(
        job_repository: Arc<dyn JobRepository>,
        staging_store: Arc<dyn StagingStore>,
        engine: Arc<dyn TranscriptionEngine>,
        work_queue: Arc<dyn WorkQueue>,
        task_time_limit: Duration,
    ) -> Self {
        Self {
            job_repository,
            staging_store,
            engine,
            work_queue,
            task_time_limit,
        }
    }

    /// Processes a delivery and settles it with the queue: acked once the job is
    /// terminal or skipped, nacked if the store could not be written.
    pub async fn handle(&self, delivery: Delivery) -> Result<WorkOutcome, WorkerError> {
        match self.process(&delivery).await {
            Ok(outcome) => {
                self.work_queue
                    .ack(delivery.tag)
                    .await
                    .map_err(WorkerError::Unacknowledged)?;
                Ok(outcome)
            }
            Err(e) => {
                if let Err(nack_err) = self.work_queue.nack(delivery.tag).await {
                    tracing::error!(error = %nack_err, "Failed to return delivery to the queue");
                }
                Err(e)
            }
        }
    }

    async fn process(&self, delivery: &Delivery) -> Result<WorkOutcome, WorkerError> {
        let job_id = delivery.item.job_id;
        let claimable: &[JobStatus] = if delivery.redelivered {
            &[JobStatus::Queued, JobStatus::Processing]
        } else {
            &[JobStatus::Queued]
        };

        match self
            .job_repository
            .transition(job_id, claimable, JobState::Processing)
            .await?
        {
            TransitionOutcome::Applied(_) => {
                tracing::debug!(status = %JobStatus::Processing, "Job status transition");
            }
            TransitionOutcome::Rejected { current } => {
                tracing::info!(current = %current, "Skipping delivery for job not claimable");
                return Ok(WorkOutcome::Skipped {
                    current: Some(current),
                });
            }
            TransitionOutcome::Missing => {
                tracing::warn!("Skipping delivery for unknown job");
                return Ok(WorkOutcome::Skipped { current: None });
            }
        }

        let terminal = match self.transcribe(&delivery.item.storage_path).await {
            Ok(text) => JobState::Completed { text },
            Err(reason) => {
                tracing::warn!(reason = %reason, "Transcription failed");
                JobState::Failed { reason }
            }
        };
        let terminal_status = terminal.status();

        match self
            .job_repository
            .transition(job_id, &[JobStatus::Processing], terminal)
            .await?
        {
            TransitionOutcome::Applied(job) => {
                tracing::info!(
                    status = %terminal_status,
                    transcription_id = %job.transcription_id,
                    "Transcription job finished"
                );
                self.discard_audio(&delivery.item.storage_path).await;
                Ok(match terminal_status {
                    JobStatus::Completed => WorkOutcome::Completed,
                    _ => WorkOutcome::Failed,
                })
            }
            TransitionOutcome::Rejected { current } => {
                tracing::warn!(current = %current, "Job settled elsewhere; result discarded");
                Ok(WorkOutcome::Skipped {
                    current: Some(current),
                })
            }
            TransitionOutcome::Missing => Ok(WorkOutcome::Skipped { current: None }),
        }
    }

    async fn discard_audio(&self, path: &StoragePath) {
        if let Err(e) = self.staging_store.delete(path).await {
            tracing::warn!(error = %e, path = %path, "Failed to delete staged audio");
        }
    }

    /// Runs the engine in its own task so a panic or overrun becomes a failure reason.
    async fn transcribe(&self, path: &StoragePath) -> Result<String, String> {
        let audio = self
            .staging_store
            .fetch(path)
            .await
            .map_err(|e| format!("audio unavailable: {e}"))?;

        let engine = Arc::clone(&self.engine);
        let task = tokio::spawn(async move { engine.transcribe(&audio).await });
        let abort = task.abort_handle();

        match tokio::time::timeout(self.task_time_limit, task).await {
            Ok(Ok(Ok(text))) => Ok(text),
            Ok(Ok(Err(e))) => Err(e.to_string()),
            Ok(Err(join_err)) => Err(format!("transcription aborted: {join_err}")),
            Err(_) => {
                abort.abort();
                Err(TranscriptionError::TimedOut(self.task_time_limit.as_secs()).to_string())
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("repository: {0}")]
    Repository(#[from] RepositoryError),
    /// The job was settled but the queue did not accept the ack.
    #[error("ack failed: {0}")]
    Unacknowledged(WorkQueueError),
}
