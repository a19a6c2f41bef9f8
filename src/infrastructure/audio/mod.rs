mod disabled_engine;
mod openai_whisper_engine;
mod transcription_engine_factory;

pub use disabled_engine::DisabledTranscriptionEngine;
pub use openai_whisper_engine::OpenAiWhisperEngine;
pub use transcription_engine_factory::TranscriptionEngineFactory;
