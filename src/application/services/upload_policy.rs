use crate::domain::AudioUpload;

const MIB: usize = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("No files uploaded")]
    EmptyBatch,
    #[error("No filename provided")]
    MissingFilename,
    #[error("Invalid file type for {filename}. Allowed: {allowed}")]
    UnsupportedExtension { filename: String, allowed: String },
    #[error("File {filename} too large. Maximum size: {max_mb}MB")]
    FileTooLarge { filename: String, max_mb: usize },
    #[error("File {filename} is empty")]
    EmptyFile { filename: String },
    #[error("Invalid audio format for {filename}. Only MP3 files are allowed.")]
    InvalidAudio { filename: String },
}

impl ValidationError {
    pub fn is_size_limit(&self) -> bool {
        matches!(self, ValidationError::FileTooLarge { .. })
    }
}

/// Batch-level admission rules. One bad file rejects the whole batch.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    pub max_upload_size_mb: usize,
    pub allowed_extensions: Vec<String>,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_upload_size_mb: 15,
            allowed_extensions: vec![".mp3".to_string()],
        }
    }
}

impl UploadPolicy {
    pub fn max_upload_size_bytes(&self) -> usize {
        self.max_upload_size_mb * MIB
    }

    pub fn validate_batch(&self, uploads: &[AudioUpload]) -> Result<(), ValidationError> {
        if uploads.is_empty() {
            return Err(ValidationError::EmptyBatch);
        }
        uploads.iter().try_for_each(|u| self.validate(u))
    }

    pub fn validate(&self, upload: &AudioUpload) -> Result<(), ValidationError> {
        let filename = upload
            .filename
            .as_deref()
            .filter(|f| !f.trim().is_empty())
            .ok_or(ValidationError::MissingFilename)?;

        let lower = filename.to_lowercase();
        if !self
            .allowed_extensions
            .iter()
            .any(|ext| lower.ends_with(&ext.to_lowercase()))
        {
            return Err(ValidationError::UnsupportedExtension {
                filename: filename.to_string(),
                allowed: self.allowed_extensions.join(", "),
            });
        }

        if upload.data.is_empty() {
            return Err(ValidationError::EmptyFile {
                filename: filename.to_string(),
            });
        }

        if upload.data.len() > self.max_upload_size_bytes() {
            return Err(ValidationError::FileTooLarge {
                filename: filename.to_string(),
                max_mb: self.max_upload_size_mb,
            });
        }

        if !looks_like_mp3(&upload.data) {
            tracing::warn!(filename = %filename, "Rejected upload without MP3 signature");
            return Err(ValidationError::InvalidAudio {
                filename: filename.to_string(),
            });
        }

        Ok(())
    }
}

/// ID3v2 tag or an MPEG audio frame sync at the start of the payload.
fn looks_like_mp3(data: &[u8]) -> bool {
    match data {
        [b'I', b'D', b'3', ..] => true,
        [0xFF, second, ..] => second & 0xE0 == 0xE0 && second & 0x06 != 0,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mp3(name: &str) -> AudioUpload {
        AudioUpload::new(name, b"ID3\x04\x00\x00\x00\x00\x00\x00audio".to_vec())
    }

    #[test]
    fn accepts_id3_tagged_mp3() {
        assert!(UploadPolicy::default().validate(&mp3("talk.mp3")).is_ok());
    }

    #[test]
    fn accepts_bare_mpeg_frame() {
        let upload = AudioUpload::new("raw.MP3", vec![0xFF, 0xFB, 0x90, 0x64, 0x00]);
        assert!(UploadPolicy::default().validate(&upload).is_ok());
    }

    #[test]
    fn rejects_wrong_extension() {
        let err = UploadPolicy::default().validate(&mp3("talk.wav")).unwrap_err();
        assert!(matches!(err, ValidationError::UnsupportedExtension { .. }));
    }

    #[test]
    fn rejects_renamed_text_file() {
        let upload = AudioUpload::new("notes.mp3", b"hello world".to_vec());
        let err = UploadPolicy::default().validate(&upload).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidAudio { .. }));
    }

    #[test]
    fn rejects_oversized_file() {
        let policy = UploadPolicy {
            max_upload_size_mb: 1,
            ..UploadPolicy::default()
        };
        let mut data = b"ID3".to_vec();
        data.resize(MIB + 1, 0);
        let err = policy.validate(&AudioUpload::new("big.mp3", data)).unwrap_err();
        assert!(err.is_size_limit());
    }

    #[test]
    fn one_bad_file_rejects_the_batch() {
        let batch = vec![mp3("a.mp3"), AudioUpload::new("b.mp3", Vec::new())];
        assert!(matches!(
            UploadPolicy::default().validate_batch(&batch),
            Err(ValidationError::EmptyFile { .. })
        ));
    }

    #[test]
    fn empty_batch_is_rejected() {
        assert_eq!(
            UploadPolicy::default().validate_batch(&[]),
            Err(ValidationError::EmptyBatch)
        );
    }
}
