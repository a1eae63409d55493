use std::path::{Component, Path, PathBuf};
use std::time::Instant;

use async_trait::async_trait;
use carousel_core::{RemoteRef, UploadBackend};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::keys::generate_storage_key;
use crate::traits::{ProgressReporter, UploadEndpoint, UploadError, UploadRequest, UploadResult};

/// Local filesystem upload endpoint
///
/// Writes each file chunk by chunk under `base_path` and serves it from
/// `base_url`. Useful for development and for tests that need a real
/// endpoint without a server.
#[derive(Clone, Debug)]
pub struct LocalUploadEndpoint {
    base_path: PathBuf,
    base_url: String,
    chunk_bytes: usize,
}

impl LocalUploadEndpoint {
    /// Create a new endpoint, creating `base_path` if needed.
    ///
    /// # Arguments
    /// * `base_path` - Root directory for stored files (e.g., "/var/lib/carousel/media")
    /// * `base_url` - Base URL the files are served from (e.g., "http://localhost:3000/media")
    /// * `chunk_bytes` - Write granularity, which is also the progress granularity
    pub async fn new(
        base_path: impl Into<PathBuf>,
        base_url: impl Into<String>,
        chunk_bytes: usize,
    ) -> UploadResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            UploadError::Config(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(Self {
            base_path,
            base_url: base_url.into(),
            chunk_bytes: chunk_bytes.max(1),
        })
    }

    /// Convert a storage key to a path that cannot escape `base_path`.
    fn key_to_path(&self, storage_key: &str) -> UploadResult<PathBuf> {
        let relative = Path::new(storage_key);
        let only_normal = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        if storage_key.is_empty() || !only_normal {
            return Err(UploadError::InvalidKey(format!(
                "Storage key resolves outside storage directory: {}",
                storage_key
            )));
        }
        Ok(self.base_path.join(relative))
    }

    fn generate_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), key)
    }

    async fn discard_partial(&self, path: &Path) {
        match fs::remove_file(path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to remove partial upload")
            }
        }
    }

    /// Create `path` and write `data` chunk by chunk, then flush it to disk.
    /// The caller removes the file if this returns an error.
    async fn write_chunks(
        &self,
        path: &Path,
        data: &[u8],
        progress: &ProgressReporter,
        cancel: &CancellationToken,
    ) -> UploadResult<()> {
        let mut file = fs::File::create(path).await.map_err(|e| {
            UploadError::Transport(format!("Failed to create file {}: {}", path.display(), e))
        })?;

        let total = data.len() as u64;
        let mut written: u64 = 0;
        for chunk in data.chunks(self.chunk_bytes) {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(UploadError::Aborted),
                result = file.write_all(chunk) => result?,
            }
            written += chunk.len() as u64;
            progress.report_bytes(written, total);
        }

        file.sync_all().await.map_err(|e| {
            UploadError::Transport(format!("Failed to sync file {}: {}", path.display(), e))
        })
    }
}

#[async_trait]
impl UploadEndpoint for LocalUploadEndpoint {
    async fn upload(
        &self,
        request: UploadRequest,
        progress: ProgressReporter,
        cancel: CancellationToken,
    ) -> UploadResult<RemoteRef> {
        let upload_id = Uuid::new_v4().to_string();
        let key = generate_storage_key(&request.folder, &upload_id, &request.file.file_name)?;
        let path = self.key_to_path(&key)?;
        let total = request.file.size() as u64;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let start = Instant::now();
        if let Err(e) = self
            .write_chunks(&path, &request.file.data, &progress, &cancel)
            .await
        {
            self.discard_partial(&path).await;
            if matches!(e, UploadError::Aborted) {
                tracing::debug!(local_key = %request.local_key, "Local upload cancelled");
            }
            return Err(e);
        }
        progress.report(100);

        let url = self.generate_url(&key);
        tracing::info!(
            local_key = %request.local_key,
            upload_id = %upload_id,
            path = %key,
            size_bytes = total,
            duration_ms = start.elapsed().as_millis() as u64,
            "File stored locally"
        );

        Ok(RemoteRef::new(upload_id, key, url))
    }

    fn backend_type(&self) -> UploadBackend {
        UploadBackend::Local
    }
}
