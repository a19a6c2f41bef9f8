mod audio_upload;
mod health;
mod job;
mod job_id;
mod job_state;
mod job_status;
mod storage_path;
mod work_item;

pub use audio_upload::AudioUpload;
pub use health::{HealthReport, HealthSignal, HealthStatus, SignalReading};
pub use job::{Job, NewJob};
pub use job_id::{JobId, TranscriptionId};
pub use job_state::JobState;
pub use job_status::JobStatus;
pub use storage_path::StoragePath;
pub use work_item::{Delivery, DeliveryTag, WorkItem};
