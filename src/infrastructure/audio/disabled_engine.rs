use async_trait::async_trait;

use crate::application::ports::{TranscriptionEngine, TranscriptionError};

/// Stand-in when no transcription provider is configured.
///
/// Jobs still flow through the queue and fail with a readable reason; health
/// reports the model as not loaded.
pub struct DisabledTranscriptionEngine;

#[async_trait]
impl TranscriptionEngine for DisabledTranscriptionEngine {
    async fn transcribe(&self, _audio_data: &[u8]) -> Result<String, TranscriptionError> {
        Err(TranscriptionError::ModelNotLoaded(
            "no transcription provider configured".to_string(),
        ))
    }

    fn is_ready(&self) -> bool {
        false
    }

    fn name(&self) -> &str {
        "disabled"
    }
}
