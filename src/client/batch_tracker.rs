use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::{AudioUpload, JobId};

use super::{
    JobSubmitter, PollOutcome, PollPolicy, StatusPoller, StatusSource, SubmitError,
    SubmittedTask,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// The server refused or failed the file on arrival; it was never polled.
    NotQueued { reason: String },
    Polled(PollOutcome),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchEntry {
    pub filename: String,
    pub job_id: Option<JobId>,
    pub outcome: FileOutcome,
}

impl BatchEntry {
    pub fn is_success(&self) -> bool {
        matches!(&self.outcome, FileOutcome::Polled(o) if o.is_success())
    }
}

/// Terminal outcome of every file of a batch, in submission order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub entries: Vec<BatchEntry>,
}

impl BatchReport {
    pub fn successes(&self) -> impl Iterator<Item = &BatchEntry> {
        self.entries.iter().filter(|e| e.is_success())
    }

    pub fn failures(&self) -> impl Iterator<Item = &BatchEntry> {
        self.entries.iter().filter(|e| {
            matches!(
                e.outcome,
                FileOutcome::NotQueued { .. }
                    | FileOutcome::Polled(PollOutcome::Failed { .. })
                    | FileOutcome::Polled(PollOutcome::TransportFailed { .. })
            )
        })
    }

    pub fn timeouts(&self) -> impl Iterator<Item = &BatchEntry> {
        self.entries
            .iter()
            .filter(|e| matches!(e.outcome, FileOutcome::Polled(PollOutcome::TimedOut { .. })))
    }
}

/// Submits a batch and follows every queued job to a terminal outcome.
pub struct BatchTracker {
    submitter: Arc<dyn JobSubmitter>,
    source: Arc<dyn StatusSource>,
    policy: PollPolicy,
}

impl BatchTracker {
    pub fn new(
        submitter: Arc<dyn JobSubmitter>,
        source: Arc<dyn StatusSource>,
        policy: PollPolicy,
    ) -> Self {
        Self {
            submitter,
            source,
            policy,
        }
    }

    /// Polling only starts once the server has returned every identifier of the batch.
    pub async fn submit_and_wait(&self, files: Vec<AudioUpload>) -> Result<BatchReport, SubmitError> {
        let tasks = self.submitter.submit(files).await?;
        tracing::info!(tasks = tasks.len(), "Batch accepted, polling for results");

        let (poller, mut events) = StatusPoller::new(self.source.clone(), self.policy);

        let mut slots: Vec<Option<FileOutcome>> = Vec::with_capacity(tasks.len());
        let mut pending: HashMap<JobId, usize> = HashMap::new();
        for (index, task) in tasks.iter().enumerate() {
            match task.job_id() {
                Some(job_id) if task.is_queued() => {
                    pending.insert(job_id, index);
                    slots.push(None);
                }
                _ => slots.push(Some(FileOutcome::NotQueued {
                    reason: not_queued_reason(task),
                })),
            }
        }

        for job_id in pending.keys() {
            poller.track(*job_id);
        }

        while !pending.is_empty() {
            let Some(event) = events.recv().await else {
                break;
            };
            if let Some(index) = pending.remove(&event.job_id) {
                tracing::debug!(job_id = %event.job_id, outcome = ?event.outcome, "Job finished");
                slots[index] = Some(FileOutcome::Polled(event.outcome));
            }
        }
        poller.teardown();

        let entries = tasks
            .into_iter()
            .zip(slots)
            .map(|(task, outcome)| BatchEntry {
                job_id: task.job_id(),
                filename: task.filename,
                outcome: outcome.unwrap_or(FileOutcome::Polled(PollOutcome::TransportFailed {
                    message: "poll session ended without an outcome".to_string(),
                })),
            })
            .collect();

        Ok(BatchReport { entries })
    }
}

fn not_queued_reason(task: &SubmittedTask) -> String {
    task.error
        .clone()
        .unwrap_or_else(|| format!("task was not queued (status {})", task.status))
}
