mod probes;

pub use probes::{EngineProbe, QueueProbe, RepositoryProbe, WorkerProbe, standard_probes};
