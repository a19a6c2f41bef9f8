mod environment;
mod settings;

pub use environment::Environment;
pub use settings::{
    DatabaseBackend, DatabaseSettings, HealthSettings, LoggingSettings, RateLimitSettings,
    ServerSettings, Settings, StorageProviderSetting, StorageSettings, TranscriptionProviderSetting,
    TranscriptionSettings, UploadSettings, WorkerSettings,
};
