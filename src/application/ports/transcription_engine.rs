use async_trait::async_trait;

#[async_trait]
pub trait TranscriptionEngine: Send + Sync {
    async fn transcribe(&self, audio_data: &[u8]) -> Result<String, TranscriptionError>;

    fn is_ready(&self) -> bool {
        true
    }

    fn name(&self) -> &str;
}

#[derive(Debug, thiserror::Error)]
pub enum TranscriptionError {
    #[error("transcription failed: {0}")]
    TranscriptionFailed(String),
    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),
    #[error("model not loaded: {0}")]
    ModelNotLoaded(String),
    #[error("api request failed: {0}")]
    ApiRequestFailed(String),
    #[error("timed out after {0}s")]
    TimedOut(u64),
}
