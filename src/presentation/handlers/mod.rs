mod error;
mod health;
mod job_view;
mod status;
mod transcribe;
mod transcriptions;

pub use error::ErrorResponse;
pub use health::{HealthResponse, health_handler, root_handler};
pub use job_view::TranscriptionView;
pub use status::{StatusResponse, status_handler};
pub use transcribe::{TaskResponse, TranscribeResponse, transcribe_handler};
pub use transcriptions::{list_transcriptions_handler, search_handler};
