use serde::{Deserialize, Serialize};

/// Manifest returned for one upload request, in part arrival order
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UploadResult {
    pub files: Vec<FileInfo>,
}

/// Outcome of storing a single file part
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    pub name: String,
    #[serde(rename = "type")]
    pub content_type: String,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete_type: Option<String>,
}

impl FileInfo {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            ..Self::default()
        }
    }

    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.size = 0;
        self.error = Some(error.into());
        self
    }
}
