use std::sync::Arc;

use crate::application::ports::JobRepository;
use crate::application::services::{HealthMonitor, SubmissionService};
use crate::presentation::config::Settings;
use crate::presentation::middleware::ClientRateLimiter;

#[derive(Clone)]
pub struct AppState {
    pub submission_service: Arc<SubmissionService>,
    pub job_repository: Arc<dyn JobRepository>,
    pub health_monitor: Arc<HealthMonitor>,
    pub transcribe_limiter: Arc<ClientRateLimiter>,
    pub settings: Settings,
}
