use bytes::Bytes;

/// One file of a submitted batch, as received at the boundary.
#[derive(Debug, Clone)]
pub struct AudioUpload {
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl AudioUpload {
    pub fn new(filename: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            filename: Some(filename.into()),
            content_type: None,
            data: data.into(),
        }
    }

    pub fn display_name(&self) -> &str {
        self.filename.as_deref().unwrap_or("unknown")
    }
}
