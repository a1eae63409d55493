//! HTTP upload endpoint
//!
//! Posts each file as `multipart/form-data` (`file` + `folder` fields) to the
//! media API. The file part is a streamed body so progress follows the bytes
//! actually handed to the connection.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use carousel_core::{CarouselConfig, RemoteRef, UploadBackend};
use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::traits::{ProgressReporter, UploadEndpoint, UploadError, UploadRequest, UploadResult};

const CONNECT_TIMEOUT_SECS: u64 = 5;
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Authentication strategy for the upload API.
#[derive(Clone, Debug)]
pub enum Auth {
    /// `Authorization: Bearer {token}`
    Bearer(String),
    /// `X-API-Key: {key}`
    XApiKey(String),
    None,
}

/// Body returned by the upload API.
#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(alias = "upload_id")]
    id: String,
    #[serde(alias = "storage_key")]
    path: String,
    url: String,
}

#[derive(Clone, Debug)]
pub struct HttpUploadEndpoint {
    client: Client,
    upload_url: String,
    auth: Auth,
    chunk_bytes: usize,
}

impl HttpUploadEndpoint {
    /// The overall deadline is not set on the client; the task runner owns it.
    pub fn new(upload_url: impl Into<String>, auth: Auth, chunk_bytes: usize) -> UploadResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| UploadError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            upload_url: upload_url.into(),
            auth,
            chunk_bytes: chunk_bytes.max(1),
        })
    }

    pub fn from_config(config: &CarouselConfig) -> UploadResult<Self> {
        let auth = config
            .api_key()
            .map(|key| Auth::XApiKey(key.to_string()))
            .unwrap_or(Auth::None);
        Self::new(config.upload_url(), auth, config.upload_chunk_bytes())
    }

    pub fn upload_url(&self) -> &str {
        &self.upload_url
    }

    fn apply_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth {
            Auth::Bearer(token) => request.header("Authorization", format!("Bearer {}", token)),
            Auth::XApiKey(key) => request.header("X-API-Key", key.as_str()),
            Auth::None => request,
        }
    }

    /// Split `data` into chunks that report progress as they are consumed.
    fn progress_body(&self, data: Bytes, progress: ProgressReporter) -> Body {
        let total = data.len() as u64;
        let chunks: Vec<Bytes> = (0..data.len())
            .step_by(self.chunk_bytes)
            .map(|start| data.slice(start..(start + self.chunk_bytes).min(data.len())))
            .collect();

        let mut sent: u64 = 0;
        let stream = futures::stream::iter(chunks).map(move |chunk| {
            sent += chunk.len() as u64;
            progress.report_bytes(sent, total);
            Ok::<Bytes, std::io::Error>(chunk)
        });
        Body::wrap_stream(stream)
    }
}

#[async_trait]
impl UploadEndpoint for HttpUploadEndpoint {
    async fn upload(
        &self,
        request: UploadRequest,
        progress: ProgressReporter,
        cancel: CancellationToken,
    ) -> UploadResult<RemoteRef> {
        let start = Instant::now();
        let file = request.file;
        let total = file.size() as u64;

        let part = Part::stream_with_length(self.progress_body(file.data, progress.clone()), total)
            .file_name(file.file_name.clone())
            .mime_str(&file.content_type)
            .map_err(|e| UploadError::Config(format!("Invalid content type: {}", e)))?;
        let form = Form::new()
            .part("file", part)
            .text("folder", request.folder.clone());

        let http_request = self.apply_auth(self.client.post(&self.upload_url).multipart(form));

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(UploadError::Aborted),
            result = http_request.send() => result.map_err(|e| UploadError::Transport(e.to_string()))?,
        };

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::warn!(
                local_key = %request.local_key,
                status = status.as_u16(),
                "Upload rejected by server"
            );
            return Err(UploadError::Server {
                status: status.as_u16(),
                message: message.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        let body: UploadResponse = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(UploadError::Aborted),
            result = response.json::<UploadResponse>() => {
                result.map_err(|e| UploadError::InvalidResponse(e.to_string()))?
            }
        };
        progress.report(100);

        tracing::info!(
            local_key = %request.local_key,
            upload_id = %body.id,
            file_name = %file.file_name,
            size_bytes = total,
            duration_ms = start.elapsed().as_millis() as u64,
            "File uploaded"
        );

        Ok(RemoteRef::new(body.id, body.path, body.url))
    }

    fn backend_type(&self) -> UploadBackend {
        UploadBackend::Http
    }
}
