#![allow(dead_code)]

mod test_postgres;

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use tolka::application::ports::{
    JobRepository, StagingStore, TranscriptionEngine, TranscriptionError, WorkQueue,
};
use tolka::application::services::{SubmissionService, UploadPolicy};
use tolka::client::{StatusSource, TransportError};
use tolka::domain::{AudioUpload, JobId, JobState};
use tolka::infrastructure::persistence::InMemoryJobRepository;
use tolka::infrastructure::queue::InMemoryWorkQueue;
use tolka::infrastructure::storage::InMemoryStagingStore;

pub use test_postgres::TestPostgres;

pub fn mp3_bytes() -> Vec<u8> {
    let mut data = b"ID3\x04\x00\x00\x00\x00\x00\x00".to_vec();
    data.extend_from_slice(&[0xFF, 0xFB, 0x90, 0x64]);
    data.extend_from_slice(&[0u8; 64]);
    data
}

pub fn mp3_upload(name: &str) -> AudioUpload {
    AudioUpload::new(name, mp3_bytes())
}

/// In-memory backing services wired the way the server wires them.
pub struct Stack {
    pub repository: Arc<InMemoryJobRepository>,
    pub queue: Arc<InMemoryWorkQueue>,
    pub store: Arc<InMemoryStagingStore>,
    pub submission: Arc<SubmissionService>,
}

impl Stack {
    pub fn new() -> Self {
        Self::with_queue_capacity(64)
    }

    pub fn with_queue_capacity(capacity: usize) -> Self {
        let repository = Arc::new(InMemoryJobRepository::new());
        let queue = Arc::new(InMemoryWorkQueue::new(capacity));
        let store = Arc::new(InMemoryStagingStore::new());
        let submission = Arc::new(SubmissionService::new(
            repository.clone() as Arc<dyn JobRepository>,
            queue.clone() as Arc<dyn WorkQueue>,
            store.clone() as Arc<dyn StagingStore>,
            UploadPolicy::default(),
        ));
        Self {
            repository,
            queue,
            store,
            submission,
        }
    }

    pub fn repository(&self) -> Arc<dyn JobRepository> {
        self.repository.clone()
    }

    pub fn queue(&self) -> Arc<dyn WorkQueue> {
        self.queue.clone()
    }

    pub fn store(&self) -> Arc<dyn StagingStore> {
        self.store.clone()
    }
}

#[derive(Clone)]
pub enum EngineBehaviour {
    Succeed(String),
    Fail(String),
    Panic,
    Hang,
}

/// Engine whose result is fixed up front; counts how often it ran.
pub struct ScriptedEngine {
    behaviour: EngineBehaviour,
    calls: AtomicUsize,
    ready: bool,
}

impl ScriptedEngine {
    pub fn new(behaviour: EngineBehaviour) -> Self {
        Self {
            behaviour,
            calls: AtomicUsize::new(0),
            ready: true,
        }
    }

    pub fn not_ready() -> Self {
        Self {
            ready: false,
            ..Self::new(EngineBehaviour::Succeed(String::new()))
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TranscriptionEngine for ScriptedEngine {
    async fn transcribe(&self, _audio_data: &[u8]) -> Result<String, TranscriptionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behaviour {
            EngineBehaviour::Succeed(text) => Ok(text.clone()),
            EngineBehaviour::Fail(reason) => {
                Err(TranscriptionError::TranscriptionFailed(reason.clone()))
            }
            EngineBehaviour::Panic => panic!("decoder crashed"),
            EngineBehaviour::Hang => {
                tokio::time::sleep(Duration::from_secs(24 * 60 * 60)).await;
                Ok(String::new())
            }
        }
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Status source that plays back a per-job script of responses.
///
/// Once a script is exhausted its last response repeats. Every call is counted.
#[derive(Default)]
pub struct ScriptedStatusSource {
    scripts: Mutex<HashMap<JobId, Vec<Result<JobState, TransportError>>>>,
    calls: Mutex<HashMap<JobId, usize>>,
    gate: Option<Arc<Notify>>,
}

impl ScriptedStatusSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every check waits for the gate to be notified before answering.
    pub fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    pub fn script(&self, job_id: JobId, responses: Vec<Result<JobState, TransportError>>) {
        self.scripts.lock().unwrap().insert(job_id, responses);
    }

    /// `Processing` for `pending` checks, then `last`.
    pub fn finish_after(&self, job_id: JobId, pending: usize, last: JobState) {
        let mut responses: Vec<_> = (0..pending).map(|_| Ok(JobState::Processing)).collect();
        responses.push(Ok(last));
        self.script(job_id, responses);
    }

    pub fn never_finish(&self, job_id: JobId) {
        self.script(job_id, vec![Ok(JobState::Processing)]);
    }

    pub fn calls(&self, job_id: JobId) -> usize {
        self.calls.lock().unwrap().get(&job_id).copied().unwrap_or(0)
    }
}

#[async_trait]
impl StatusSource for ScriptedStatusSource {
    async fn fetch_status(&self, job_id: JobId) -> Result<JobState, TransportError> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            let count = calls.entry(job_id).or_insert(0);
            *count += 1;
            *count
        };

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        let scripts = self.scripts.lock().unwrap();
        let script = scripts
            .get(&job_id)
            .ok_or_else(|| TransportError::Status {
                status: 404,
                message: format!("Task not found: {}", job_id),
            })?;
        let index = (call - 1).min(script.len() - 1);
        script[index].clone()
    }
}

pub fn completed(text: &str) -> JobState {
    JobState::Completed {
        text: text.to_string(),
    }
}

pub fn failed(reason: &str) -> JobState {
    JobState::Failed {
        reason: reason.to_string(),
    }
}
