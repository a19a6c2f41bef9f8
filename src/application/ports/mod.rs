mod health_probe;
mod job_repository;
mod repository_error;
mod staging_store;
mod transcription_engine;
mod work_queue;

pub use health_probe::HealthProbe;
pub use job_repository::{
    DEFAULT_LIST_LIMIT, JobFilter, JobRepository, MAX_LIST_LIMIT, TransitionOutcome,
};
pub use repository_error::RepositoryError;
pub use staging_store::{StagingStore, StagingStoreError};
pub use transcription_engine::{TranscriptionEngine, TranscriptionError};
pub use work_queue::{WorkQueue, WorkQueueError};
