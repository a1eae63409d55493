#[cfg(feature = "upload-http")]
use crate::HttpUploadEndpoint;
#[cfg(feature = "upload-local")]
use crate::LocalUploadEndpoint;
use crate::{UploadBackend, UploadEndpoint, UploadError, UploadResult};
use carousel_core::CarouselConfig;
use std::sync::Arc;

/// Create an upload endpoint based on configuration
pub async fn create_endpoint(config: &CarouselConfig) -> UploadResult<Arc<dyn UploadEndpoint>> {
    match config.upload_backend() {
        #[cfg(feature = "upload-http")]
        UploadBackend::Http => {
            let endpoint = HttpUploadEndpoint::from_config(config)?;
            Ok(Arc::new(endpoint))
        }

        #[cfg(not(feature = "upload-http"))]
        UploadBackend::Http => Err(UploadError::Config(
            "HTTP upload backend not available (upload-http feature not enabled)".to_string(),
        )),

        #[cfg(feature = "upload-local")]
        UploadBackend::Local => {
            let base_path = config.local_storage_path().ok_or_else(|| {
                UploadError::Config("CAROUSEL_LOCAL_STORAGE_PATH not configured".to_string())
            })?;
            let base_url = config.local_storage_base_url().ok_or_else(|| {
                UploadError::Config("CAROUSEL_LOCAL_STORAGE_BASE_URL not configured".to_string())
            })?;

            let endpoint =
                LocalUploadEndpoint::new(base_path, base_url, config.upload_chunk_bytes()).await?;
            Ok(Arc::new(endpoint))
        }

        #[cfg(not(feature = "upload-local"))]
        UploadBackend::Local => Err(UploadError::Config(
            "Local upload backend not available (upload-local feature not enabled)".to_string(),
        )),
    }
}

#[cfg(all(test, feature = "upload-local"))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_creates_local_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let config = CarouselConfig {
            upload_backend: UploadBackend::Local,
            local_storage_path: Some(dir.path().display().to_string()),
            local_storage_base_url: Some("http://localhost/media".to_string()),
            ..CarouselConfig::default()
        };
        let endpoint = create_endpoint(&config).await.unwrap();
        assert_eq!(endpoint.backend_type(), UploadBackend::Local);
    }

    #[tokio::test]
    async fn test_local_requires_path() {
        let config = CarouselConfig {
            upload_backend: UploadBackend::Local,
            ..CarouselConfig::default()
        };
        let err = create_endpoint(&config).await.err().unwrap();
        assert!(matches!(err, UploadError::Config(_)));
    }
}
