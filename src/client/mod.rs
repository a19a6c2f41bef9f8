//! Client side of the transcription API: HTTP access, status polling and batch tracking.

mod api_client;
mod batch_tracker;
mod poller;
mod status_source;

pub use api_client::{ApiClient, JobSubmitter, SubmitError, SubmittedTask};
pub use batch_tracker::{BatchEntry, BatchReport, BatchTracker, FileOutcome};
pub use poller::{
    DEFAULT_MAX_ATTEMPTS, DEFAULT_POLL_INTERVAL, PollEvent, PollOutcome, PollPolicy,
    StatusPoller,
};
pub use status_source::{StatusSource, TransportError};
