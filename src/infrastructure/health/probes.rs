use std::sync::Arc;

use async_trait::async_trait;

use crate::application::ports::{HealthProbe, JobRepository, TranscriptionEngine, WorkQueue};
use crate::application::services::WorkerActivity;
use crate::domain::HealthSignal;

pub struct RepositoryProbe(pub Arc<dyn JobRepository>);

#[async_trait]
impl HealthProbe for RepositoryProbe {
    fn signal(&self) -> HealthSignal {
        HealthSignal::Database
    }

    async fn check(&self) -> Result<(), String> {
        self.0.ping().await.map_err(|e| e.to_string())
    }
}

pub struct QueueProbe(pub Arc<dyn WorkQueue>);

#[async_trait]
impl HealthProbe for QueueProbe {
    fn signal(&self) -> HealthSignal {
        HealthSignal::Queue
    }

    async fn check(&self) -> Result<(), String> {
        self.0.ping().await.map_err(|e| e.to_string())
    }
}

pub struct EngineProbe(pub Arc<dyn TranscriptionEngine>);

#[async_trait]
impl HealthProbe for EngineProbe {
    fn signal(&self) -> HealthSignal {
        HealthSignal::ModelLoaded
    }

    async fn check(&self) -> Result<(), String> {
        if self.0.is_ready() {
            Ok(())
        } else {
            Err(format!("engine '{}' not ready", self.0.name()))
        }
    }
}

pub struct WorkerProbe(pub WorkerActivity);

#[async_trait]
impl HealthProbe for WorkerProbe {
    fn signal(&self) -> HealthSignal {
        HealthSignal::Workers
    }

    async fn check(&self) -> Result<(), String> {
        match self.0.active() {
            0 => Err("no active workers".to_string()),
            _ => Ok(()),
        }
    }
}

/// The standard probe set for a running server.
pub fn standard_probes(
    repository: Arc<dyn JobRepository>,
    queue: Arc<dyn WorkQueue>,
    engine: Arc<dyn TranscriptionEngine>,
    workers: WorkerActivity,
) -> Vec<Arc<dyn HealthProbe>> {
    vec![
        Arc::new(EngineProbe(engine)),
        Arc::new(RepositoryProbe(repository)),
        Arc::new(QueueProbe(queue)),
        Arc::new(WorkerProbe(workers)),
    ]
}
