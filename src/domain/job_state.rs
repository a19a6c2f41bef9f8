use super::JobStatus;

/// Current state of a job together with the payload that state carries.
///
/// Text exists only on `Completed` and a reason only on `Failed`, so a record can
/// never be observed half-written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Queued,
    Processing,
    Completed { text: String },
    Failed { reason: String },
}

impl JobState {
    pub fn status(&self) -> JobStatus {
        match self {
            JobState::Queued => JobStatus::Queued,
            JobState::Processing => JobStatus::Processing,
            JobState::Completed { .. } => JobStatus::Completed,
            JobState::Failed { .. } => JobStatus::Failed,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            JobState::Completed { text } => Some(text),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            JobState::Failed { reason } => Some(reason),
            _ => None,
        }
    }

    /// Rebuilds a state from flat columns, rejecting shapes the lifecycle never produces.
    pub fn from_parts(
        status: JobStatus,
        text: Option<String>,
        error: Option<String>,
    ) -> Result<Self, String> {
        match (status, text, error) {
            (JobStatus::Queued, None, None) => Ok(JobState::Queued),
            (JobStatus::Processing, None, None) => Ok(JobState::Processing),
            (JobStatus::Completed, Some(text), None) => Ok(JobState::Completed { text }),
            (JobStatus::Failed, None, Some(reason)) => Ok(JobState::Failed { reason }),
            (status, text, error) => Err(format!(
                "inconsistent job record: status={} text={} error={}",
                status,
                text.is_some(),
                error.is_some()
            )),
        }
    }

    pub fn into_parts(self) -> (JobStatus, Option<String>, Option<String>) {
        let status = self.status();
        match self {
            JobState::Completed { text } => (status, Some(text), None),
            JobState::Failed { reason } => (status, None, Some(reason)),
            _ => (status, None, None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_parts_rejects_text_on_processing() {
        let result = JobState::from_parts(JobStatus::Processing, Some("early".into()), None);
        assert!(result.is_err());
    }

    #[test]
    fn from_parts_rejects_completed_without_text() {
        assert!(JobState::from_parts(JobStatus::Completed, None, None).is_err());
    }

    #[test]
    fn from_parts_rejects_both_payloads() {
        let result = JobState::from_parts(
            JobStatus::Failed,
            Some("text".into()),
            Some("reason".into()),
        );
        assert!(result.is_err());
    }

    #[test]
    fn failed_state_keeps_reason() {
        let state = JobState::from_parts(JobStatus::Failed, None, Some("bad audio".into()))
            .unwrap();
        assert_eq!(state.error(), Some("bad audio"));
        assert_eq!(state.text(), None);
        assert!(state.is_terminal());
    }
}
