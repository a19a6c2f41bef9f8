use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::domain::{JobId, JobState};

use super::StatusSource;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_ATTEMPTS: u32 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Wait before each check, measured from the previous check's response.
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Completed { text: String },
    Failed { reason: String },
    TimedOut { attempts: u32 },
    TransportFailed { message: String },
}

impl PollOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PollOutcome::Completed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollEvent {
    pub job_id: JobId,
    pub outcome: PollOutcome,
}

struct Session {
    generation: u64,
    cancel: CancellationToken,
    attempts: Arc<AtomicU32>,
}

type Sessions = Arc<Mutex<HashMap<JobId, Session>>>;

/// Runs one independent poll schedule per tracked job.
///
/// Each session is registered in a map under its own cancellation token. Outcomes are
/// published while holding the map lock and only if the session is still registered,
/// so once `cancel` or `teardown` returns no further event for that job is delivered
/// and no further check is started.
pub struct StatusPoller {
    source: Arc<dyn StatusSource>,
    policy: PollPolicy,
    sessions: Sessions,
    events: mpsc::UnboundedSender<PollEvent>,
    next_generation: AtomicU64,
}

impl StatusPoller {
    pub fn new(
        source: Arc<dyn StatusSource>,
        policy: PollPolicy,
    ) -> (Self, mpsc::UnboundedReceiver<PollEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let poller = Self {
            source,
            policy,
            sessions: Arc::new(Mutex::new(HashMap::new())),
            events,
            next_generation: AtomicU64::new(0),
        };
        (poller, receiver)
    }

    pub fn policy(&self) -> PollPolicy {
        self.policy
    }

    /// Starts polling `job_id`. An existing session for the same job is cancelled first.
    pub fn track(&self, job_id: JobId) {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        let attempts = Arc::new(AtomicU32::new(0));

        {
            let mut sessions = lock(&self.sessions);
            if let Some(previous) = sessions.insert(
                job_id,
                Session {
                    generation,
                    cancel: cancel.clone(),
                    attempts: attempts.clone(),
                },
            ) {
                previous.cancel.cancel();
                tracing::debug!(job_id = %job_id, "Replaced existing poll session");
            }
        }

        let run = PollRun {
            job_id,
            generation,
            source: self.source.clone(),
            policy: self.policy,
            cancel,
            attempts,
            sessions: self.sessions.clone(),
            events: self.events.clone(),
        };
        tokio::spawn(run.run());
    }

    /// Cancels the session for `job_id`. Returns `false` if none was active.
    pub fn cancel(&self, job_id: JobId) -> bool {
        match lock(&self.sessions).remove(&job_id) {
            Some(session) => {
                session.cancel.cancel();
                tracing::debug!(job_id = %job_id, "Poll session cancelled");
                true
            }
            None => false,
        }
    }

    /// Cancels every session and clears the map.
    pub fn teardown(&self) {
        let mut sessions = lock(&self.sessions);
        let cancelled = sessions.len();
        for (_, session) in sessions.drain() {
            session.cancel.cancel();
        }
        if cancelled > 0 {
            tracing::debug!(cancelled, "Poll sessions torn down");
        }
    }

    /// Checks issued so far by the active session for `job_id`.
    pub fn attempts(&self, job_id: JobId) -> Option<u32> {
        lock(&self.sessions)
            .get(&job_id)
            .map(|s| s.attempts.load(Ordering::SeqCst))
    }

    pub fn is_tracking(&self, job_id: JobId) -> bool {
        lock(&self.sessions).contains_key(&job_id)
    }

    pub fn active_sessions(&self) -> usize {
        lock(&self.sessions).len()
    }
}

impl Drop for StatusPoller {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn lock(sessions: &Mutex<HashMap<JobId, Session>>) -> MutexGuard<'_, HashMap<JobId, Session>> {
    sessions.lock().unwrap_or_else(PoisonError::into_inner)
}

struct PollRun {
    job_id: JobId,
    generation: u64,
    source: Arc<dyn StatusSource>,
    policy: PollPolicy,
    cancel: CancellationToken,
    attempts: Arc<AtomicU32>,
    sessions: Sessions,
    events: mpsc::UnboundedSender<PollEvent>,
}

impl PollRun {
    async fn run(self) {
        let max_attempts = self.policy.max_attempts.max(1);

        let outcome = loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return,
                _ = tokio::time::sleep(self.policy.interval) => {}
            }

            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            let checked = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return,
                checked = self.source.fetch_status(self.job_id) => checked,
            };

            match checked {
                Ok(JobState::Completed { text }) => break PollOutcome::Completed { text },
                Ok(JobState::Failed { reason }) => break PollOutcome::Failed { reason },
                Ok(state) if attempt >= max_attempts => {
                    tracing::warn!(
                        job_id = %self.job_id,
                        attempts = attempt,
                        status = %state.status(),
                        "Gave up polling"
                    );
                    break PollOutcome::TimedOut { attempts: attempt };
                }
                Ok(state) => {
                    tracing::trace!(job_id = %self.job_id, attempt, status = %state.status(), "Job still pending");
                }
                Err(e) => {
                    tracing::warn!(job_id = %self.job_id, attempt, error = %e, "Status check failed");
                    break PollOutcome::TransportFailed {
                        message: e.to_string(),
                    };
                }
            }
        };

        self.deliver(outcome);
    }

    fn deliver(self, outcome: PollOutcome) {
        let mut sessions = lock(&self.sessions);
        let current = sessions
            .get(&self.job_id)
            .is_some_and(|s| s.generation == self.generation && !s.cancel.is_cancelled());
        if !current {
            return;
        }
        sessions.remove(&self.job_id);

        // A dropped receiver means nobody is waiting for this outcome any more.
        let _ = self.events.send(PollEvent {
            job_id: self.job_id,
            outcome,
        });
    }
}
