use std::sync::Arc;

use crate::application::ports::{
    JobFilter, JobRepository, MAX_LIST_LIMIT, RepositoryError, StagingStore, StagingStoreError,
    TransitionOutcome, WorkQueue, WorkQueueError,
};
use crate::domain::{AudioUpload, Job, JobState, JobStatus, NewJob, WorkItem};

use super::filenames::unique_filename;
use super::upload_policy::{UploadPolicy, ValidationError};

/// Registers a batch of uploads as queued jobs and hands them to the work queue.
pub struct SubmissionService {
    job_repository: Arc<dyn JobRepository>,
    work_queue: Arc<dyn WorkQueue>,
    staging_store: Arc<dyn StagingStore>,
    policy: UploadPolicy,
}

impl SubmissionService {
    pub fn new(
        job_repository: Arc<dyn JobRepository>,
        work_queue: Arc<dyn WorkQueue>,
        staging_store: Arc<dyn StagingStore>,
        policy: UploadPolicy,
    ) -> Self {
        Self {
            job_repository,
            work_queue,
            staging_store,
            policy,
        }
    }

    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    /// Validates the whole batch, then registers each file in input order.
    ///
    /// A record always exists before its work item is enqueued. A file that fails
    /// after validation is reported in its slot without affecting its siblings.
    pub async fn submit(
        &self,
        uploads: Vec<AudioUpload>,
    ) -> Result<BatchSubmission, SubmissionError> {
        self.policy.validate_batch(&uploads)?;

        let mut files = Vec::with_capacity(uploads.len());
        for upload in uploads {
            files.push(self.submit_one(upload).await);
        }

        let submission = BatchSubmission { files };
        tracing::info!(
            accepted = submission.accepted().count(),
            rejected = submission.rejected().count(),
            "Batch submitted"
        );
        Ok(submission)
    }

    async fn submit_one(&self, upload: AudioUpload) -> FileSubmission {
        let original_filename = upload.display_name().to_string();
        let new_job = NewJob::new(unique_filename(&original_filename), original_filename.clone());

        if let Err(e) = self
            .staging_store
            .store(&new_job.storage_path, upload.data)
            .await
        {
            tracing::error!(error = %e, filename = %original_filename, "Failed to stage audio");
            return FileSubmission::Rejected {
                original_filename,
                error: FileSubmissionError::Staging(e),
            };
        }

        let job = match self.job_repository.create(&new_job).await {
            Ok(job) => job,
            Err(e) => {
                tracing::error!(error = %e, filename = %original_filename, "Failed to create job record");
                if let Err(del_err) = self.staging_store.delete(&new_job.storage_path).await {
                    tracing::warn!(error = %del_err, path = %new_job.storage_path, "Failed to remove orphaned audio");
                }
                return FileSubmission::Rejected {
                    original_filename,
                    error: FileSubmissionError::Repository(e),
                };
            }
        };

        let item = WorkItem {
            job_id: job.id,
            storage_path: job.storage_path.clone(),
        };

        match self.work_queue.enqueue(item).await {
            Ok(()) => {
                tracing::info!(
                    job_id = %job.id,
                    transcription_id = %job.transcription_id,
                    filename = %job.filename,
                    "Transcription job enqueued"
                );
                FileSubmission::Accepted {
                    original_filename,
                    job,
                }
            }
            Err(e) => {
                tracing::error!(job_id = %job.id, error = %e, "Failed to enqueue transcription job");
                let job = self.mark_unqueued(job, &e).await;
                FileSubmission::Rejected {
                    original_filename,
                    error: FileSubmissionError::Enqueue {
                        job: Box::new(job),
                        source: e,
                    },
                }
            }
        }
    }

    /// Moves a record that never reached the queue to `failed` so it does not sit queued forever.
    async fn mark_unqueued(&self, job: Job, cause: &WorkQueueError) -> Job {
        let reason = format!("could not be queued: {cause}");
        match self
            .job_repository
            .transition(job.id, &[JobStatus::Queued], JobState::Failed { reason })
            .await
        {
            Ok(TransitionOutcome::Applied(failed)) => failed,
            Ok(other) => {
                tracing::warn!(job_id = %job.id, outcome = ?other, "Unqueued job was not marked failed");
                job
            }
            Err(e) => {
                tracing::error!(job_id = %job.id, error = %e, "Failed to mark unqueued job as failed");
                job
            }
        }
    }

    /// Re-enqueues every job still `queued` or `processing`, e.g. after a restart
    /// lost the in-process queue. Returns how many items were requeued.
    pub async fn requeue_stranded(&self) -> Result<usize, RepositoryError> {
        let mut requeued = 0;

        for status in [JobStatus::Processing, JobStatus::Queued] {
            let mut skip = 0;
            loop {
                let page = self
                    .job_repository
                    .list(JobFilter {
                        status: Some(status),
                        skip,
                        limit: MAX_LIST_LIMIT,
                    })
                    .await?;
                let page_len = page.len();

                for job in page.into_iter().rev() {
                    let item = WorkItem {
                        job_id: job.id,
                        storage_path: job.storage_path,
                    };
                    match self.work_queue.requeue(item).await {
                        Ok(()) => requeued += 1,
                        Err(e) => {
                            tracing::error!(job_id = %job.id, error = %e, "Failed to requeue stranded job")
                        }
                    }
                }

                if page_len < MAX_LIST_LIMIT as usize {
                    break;
                }
                skip += MAX_LIST_LIMIT;
            }
        }

        if requeued > 0 {
            tracing::info!(requeued, "Requeued stranded transcription jobs");
        }
        Ok(requeued)
    }
}

/// Per-file result of one submission, in input order.
#[derive(Debug)]
pub struct BatchSubmission {
    pub files: Vec<FileSubmission>,
}

impl BatchSubmission {
    pub fn accepted(&self) -> impl Iterator<Item = &Job> {
        self.files.iter().filter_map(|f| match f {
            FileSubmission::Accepted { job, .. } => Some(job),
            FileSubmission::Rejected { .. } => None,
        })
    }

    pub fn rejected(&self) -> impl Iterator<Item = &FileSubmission> {
        self.files
            .iter()
            .filter(|f| matches!(f, FileSubmission::Rejected { .. }))
    }

    pub fn all_rejected(&self) -> bool {
        self.accepted().next().is_none()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[derive(Debug)]
pub enum FileSubmission {
    Accepted {
        original_filename: String,
        job: Job,
    },
    Rejected {
        original_filename: String,
        error: FileSubmissionError,
    },
}

impl FileSubmission {
    pub fn original_filename(&self) -> &str {
        match self {
            FileSubmission::Accepted {
                original_filename, ..
            }
            | FileSubmission::Rejected {
                original_filename, ..
            } => original_filename,
        }
    }

    /// The persisted record, if one exists for this file.
    pub fn job(&self) -> Option<&Job> {
        match self {
            FileSubmission::Accepted { job, .. } => Some(job),
            FileSubmission::Rejected {
                error: FileSubmissionError::Enqueue { job, .. },
                ..
            } => Some(job),
            FileSubmission::Rejected { .. } => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

#[derive(Debug, thiserror::Error)]
pub enum FileSubmissionError {
    #[error("could not stage audio: {0}")]
    Staging(StagingStoreError),
    #[error("could not create job record: {0}")]
    Repository(RepositoryError),
    #[error("could not be queued: {source}")]
    Enqueue {
        job: Box<Job>,
        #[source]
        source: WorkQueueError,
    },
}
