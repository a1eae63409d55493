use serde::{Deserialize, Serialize};

/// Server-assigned identifiers proving a file has been durably uploaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRef {
    /// Opaque upload id (used to reference the file in instructions)
    pub upload_id: String,
    /// Storage path inside the object store
    pub path: String,
    /// Publicly resolvable URL
    pub url: String,
}

impl RemoteRef {
    pub fn new(
        upload_id: impl Into<String>,
        path: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            upload_id: upload_id.into(),
            path: path.into(),
            url: url.into(),
        }
    }

    /// Last path segment of the storage path.
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}
