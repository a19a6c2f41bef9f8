mod filenames;
mod health_aggregator;
mod submission_service;
mod transcription_worker;
mod upload_policy;
mod worker_pool;

pub use filenames::{sanitize_filename, sanitize_search_query, unique_filename};
pub use health_aggregator::{
    DEFAULT_PROBE_TIMEOUT, DEFAULT_REFRESH_INTERVAL, HealthAggregator, HealthMonitor,
};
pub use submission_service::{
    BatchSubmission, FileSubmission, FileSubmissionError, SubmissionError, SubmissionService,
};
pub use transcription_worker::{
    DEFAULT_TASK_TIME_LIMIT, TranscriptionWorker, WorkOutcome, WorkerError,
};
pub use upload_policy::{UploadPolicy, ValidationError};
pub use worker_pool::{WorkerActivity, WorkerPool};
